//! Document loading from files, directories and web pages

use regex::Regex;
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::errors::{RagError, Result};
use crate::types::{Metadata, SOURCE_KEY, TITLE_KEY};

const FETCH_TIMEOUT_SECS: u64 = 30;

/// A loaded document before splitting
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub text: String,
    pub metadata: Metadata,
}

impl Document {
    pub fn new(text: impl Into<String>, source: &str, title: &str) -> Self {
        let mut metadata = Metadata::new();
        metadata.insert(SOURCE_KEY.to_string(), source.to_string());
        metadata.insert(TITLE_KEY.to_string(), title.to_string());
        Self {
            text: text.into(),
            metadata,
        }
    }

    pub fn source(&self) -> &str {
        self.metadata.get(SOURCE_KEY).map(String::as_str).unwrap_or("")
    }

    pub fn title(&self) -> &str {
        self.metadata.get(TITLE_KEY).map(String::as_str).unwrap_or("")
    }
}

/// Loads documents from the configured sources
pub struct DocumentLoader {
    extensions: Vec<String>,
    client: Client,
    html: HtmlStripper,
}

impl DocumentLoader {
    /// `extensions` filters directory walks; explicit file paths are always read
    pub fn new(extensions: &[String]) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            extensions: extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            client,
            html: HtmlStripper::new()?,
        })
    }

    /// Load every source in order
    pub async fn load_all(&self, sources: &[String]) -> Result<Vec<Document>> {
        let mut documents = Vec::new();
        for source in sources {
            let loaded = self.load(source).await?;
            info!(source = %source, documents = loaded.len(), "loaded source");
            documents.extend(loaded);
        }
        Ok(documents)
    }

    /// Load one source: an http(s) URL, a directory or a file
    pub async fn load(&self, source: &str) -> Result<Vec<Document>> {
        if source.starts_with("http://") || source.starts_with("https://") {
            return Ok(vec![self.load_url(source).await?]);
        }

        let path = crate::config::Config::expand_path(source);
        if path.is_dir() {
            self.load_directory(&path).await
        } else if path.is_file() {
            Ok(vec![self.load_file(&path).await?])
        } else {
            Err(RagError::Ingestion(format!(
                "Source not found: {}",
                path.display()
            )))
        }
    }

    async fn load_directory(&self, dir: &Path) -> Result<Vec<Document>> {
        let mut paths: Vec<_> = WalkDir::new(dir)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "skipping unreadable entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| self.accepts(path))
            .collect();
        paths.sort();

        let mut documents = Vec::with_capacity(paths.len());
        for path in paths {
            documents.push(self.load_file(&path).await?);
        }
        Ok(documents)
    }

    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(e)))
            .unwrap_or(false)
    }

    async fn load_file(&self, path: &Path) -> Result<Document> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            RagError::Ingestion(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let source = path.display().to_string();
        debug!(source = %source, bytes = raw.len(), "read file");

        let is_html = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("html") || e.eq_ignore_ascii_case("htm"))
            .unwrap_or(false);

        if is_html {
            let (title, text) = self.html.html_to_text(&raw);
            let title = title.unwrap_or_else(|| file_title(path));
            return Ok(Document::new(text, &source, &title));
        }

        let title = markdown_title(&raw).unwrap_or_else(|| file_title(path));
        Ok(Document::new(raw, &source, &title))
    }

    async fn load_url(&self, url: &str) -> Result<Document> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RagError::Ingestion(format!("Failed to fetch {}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(RagError::Ingestion(format!(
                "Failed to fetch {}: HTTP {}",
                url,
                response.status()
            )));
        }

        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("html"))
            .unwrap_or(true);

        let body = response
            .text()
            .await
            .map_err(|e| RagError::Ingestion(format!("Failed to read body of {}: {}", url, e)))?;

        if is_html {
            let (title, text) = self.html.html_to_text(&body);
            Ok(Document::new(text, url, title.as_deref().unwrap_or(url)))
        } else {
            Ok(Document::new(body, url, url))
        }
    }
}

fn file_title(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// First level-one markdown heading
fn markdown_title(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("# "))
        .map(|title| title.trim().to_string())
        .filter(|title| !title.is_empty())
}

/// Compiled patterns for reducing HTML to text
pub struct HtmlStripper {
    title: Regex,
    hidden: Regex,
    block: Regex,
    tag: Regex,
    spaces: Regex,
    blank_lines: Regex,
}

impl HtmlStripper {
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| RagError::Configuration(format!("Invalid HTML pattern: {}", e)))
        };

        Ok(Self {
            title: compile(r"(?is)<title[^>]*>(.*?)</title>")?,
            hidden: compile(r"(?is)<script[^>]*>.*?</script>|<style[^>]*>.*?</style>|<noscript[^>]*>.*?</noscript>|<head[^>]*>.*?</head>")?,
            block: compile(r"(?i)</?(p|div|br|li|ul|ol|h[1-6]|tr|section|article|header|footer)[^>]*>")?,
            tag: compile(r"(?s)<[^>]+>")?,
            spaces: compile(r"[ \t]+")?,
            blank_lines: compile(r"\n\s*\n+")?,
        })
    }

    /// Reduce an HTML page to its title and visible text
    pub fn html_to_text(&self, html: &str) -> (Option<String>, String) {
        let title = self
            .title
            .captures(html)
            .and_then(|c| c.get(1))
            .map(|m| decode_entities(m.as_str().trim()))
            .filter(|t| !t.is_empty());

        let text = self.hidden.replace_all(html, " ");
        let text = self.block.replace_all(&text, "\n");
        let text = self.tag.replace_all(&text, " ");
        let text = decode_entities(&text);
        let text = self.spaces.replace_all(&text, " ");
        let text: String = text
            .lines()
            .map(str::trim)
            .collect::<Vec<_>>()
            .join("\n");
        let text = self.blank_lines.replace_all(&text, "\n\n");

        (title, text.trim().to_string())
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
