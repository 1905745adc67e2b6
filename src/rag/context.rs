// Evidence formatting for generator and grader prompts
use crate::types::Passage;

/// Render passages as tagged evidence blocks
///
/// Each passage becomes
/// `<docN>:\nId:..\nTitle:..\nSource:..\nContent:..\n</docN>\n` with `N`
/// starting at 1; blocks are joined by a blank line. The `Id` line lets
/// the highlighter cite passages by identifier.
pub fn format_docs(passages: &[Passage]) -> String {
    passages
        .iter()
        .enumerate()
        .map(|(idx, passage)| format_document(idx + 1, passage))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_document(number: usize, passage: &Passage) -> String {
    format!(
        "<doc{n}>:\nId:{id}\nTitle:{title}\nSource:{source}\nContent:{content}\n</doc{n}>\n",
        n = number,
        id = passage.identifier,
        title = passage.title(),
        source = passage.source(),
        content = passage.text,
    )
}
