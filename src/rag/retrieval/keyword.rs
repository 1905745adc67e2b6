// Lexical retrieval: BM25 over an in-RAM tantivy index
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{Field, Schema, Value, STORED, STRING, TEXT};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument};
use tracing::{debug, warn};

use crate::errors::{RagError, Result};
use crate::types::{Metadata, Passage, SOURCE_KEY, TITLE_KEY};

/// Writer heap, single indexing thread
const WRITER_HEAP_BYTES: usize = 50_000_000;

/// Lexical index over passage text
pub trait KeywordIndex: Send + Sync {
    /// Up to `k` passages sharing terms with `query`, best first
    fn search(&self, query: &str, k: usize) -> Result<Vec<(Passage, f64)>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn index_error(context: &str, e: impl std::fmt::Display) -> RagError {
    RagError::Retrieval(format!("{}: {}", context, e))
}

#[derive(Debug, Clone, Copy)]
struct Fields {
    identifier: Field,
    text: Field,
    title: Field,
    source: Field,
    /// Remaining metadata as a JSON object
    metadata: Field,
}

/// BM25 index built once from a fixed corpus
///
/// Text and title are tokenized and lowercased by tantivy's default
/// analyzer; scores are tantivy's BM25.
pub struct Bm25Index {
    index: Index,
    reader: IndexReader,
    fields: Fields,
    len: usize,
}

impl std::fmt::Debug for Bm25Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bm25Index").field("len", &self.len).finish()
    }
}

impl Bm25Index {
    pub fn build(passages: impl IntoIterator<Item = Passage>) -> Result<Self> {
        let mut schema_builder = Schema::builder();
        let fields = Fields {
            identifier: schema_builder.add_text_field("identifier", STRING | STORED),
            text: schema_builder.add_text_field("text", TEXT | STORED),
            title: schema_builder.add_text_field("title", TEXT | STORED),
            source: schema_builder.add_text_field("source", STRING | STORED),
            metadata: schema_builder.add_text_field("metadata", STORED),
        };
        let index = Index::create_in_ram(schema_builder.build());

        let mut writer: IndexWriter = index
            .writer_with_num_threads(1, WRITER_HEAP_BYTES)
            .map_err(|e| index_error("Failed to create keyword index writer", e))?;

        let mut len = 0;
        for passage in passages {
            let extra: Metadata = passage
                .metadata
                .iter()
                .filter(|(key, _)| key.as_str() != TITLE_KEY && key.as_str() != SOURCE_KEY)
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();

            writer
                .add_document(doc!(
                    fields.identifier => passage.identifier.as_str(),
                    fields.text => passage.text.as_str(),
                    fields.title => passage.title(),
                    fields.source => passage.source(),
                    fields.metadata => serde_json::to_string(&extra)?,
                ))
                .map_err(|e| index_error("Failed to add passage to keyword index", e))?;
            len += 1;
        }

        writer
            .commit()
            .map_err(|e| index_error("Failed to commit keyword index", e))?;

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(|e| index_error("Failed to open keyword index reader", e))?;

        debug!(passages = len, "keyword index built");
        Ok(Self {
            index,
            reader,
            fields,
            len,
        })
    }

    fn to_passage(&self, document: &TantivyDocument) -> Result<Passage> {
        let field = |field: Field| {
            document
                .get_first(field)
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string()
        };

        let mut metadata: Metadata = match document.get_first(self.fields.metadata).and_then(|v| v.as_str()) {
            Some(raw) => serde_json::from_str(raw)?,
            None => Metadata::new(),
        };
        for (key, value) in [(TITLE_KEY, field(self.fields.title)), (SOURCE_KEY, field(self.fields.source))] {
            if !value.is_empty() {
                metadata.insert(key.to_string(), value);
            }
        }

        Ok(Passage {
            identifier: field(self.fields.identifier),
            text: field(self.fields.text),
            metadata,
            relevance_score: None,
        })
    }
}

impl KeywordIndex for Bm25Index {
    fn search(&self, query: &str, k: usize) -> Result<Vec<(Passage, f64)>> {
        if k == 0 || self.len == 0 {
            return Ok(Vec::new());
        }

        let parser = QueryParser::for_index(&self.index, vec![self.fields.text, self.fields.title]);
        let (parsed, errors) = parser.parse_query_lenient(query);
        if !errors.is_empty() {
            warn!(query = %query, errors = errors.len(), "keyword query parsed leniently");
        }

        let searcher = self.reader.searcher();
        let top_docs = searcher
            .search(&parsed, &TopDocs::with_limit(k))
            .map_err(|e| index_error("Keyword search failed", e))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let document: TantivyDocument = searcher
                .doc(address)
                .map_err(|e| index_error("Failed to load keyword hit", e))?;
            hits.push((self.to_passage(&document)?, score as f64));
        }

        hits.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.identifier.cmp(&b.0.identifier))
        });
        Ok(hits)
    }

    fn len(&self) -> usize {
        self.len
    }
}
