use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use lector_core::paths::resolve_input_path;
use lector_ml::Document;

/// Writes the JSON export when `json_out` is a non-empty path, then the text
/// to `out` unless `no_text` is set.
pub fn emit(
    document: &Document,
    json_out: Option<&Path>,
    no_text: bool,
    out: &mut impl Write,
) -> Result<()> {
    if let Some(json_out) = json_out.filter(|path| !path.as_os_str().is_empty()) {
        let json_out =
            resolve_input_path(json_out).context("failed to resolve JSON output path")?;
        write_json(&json_out, document)?;
    }

    if !no_text {
        writeln!(out, "{}", extract_text(document)).context("failed to write text")?;
    }

    Ok(())
}

/// Plain text of a document, one line per OCR line.
///
/// Empty words are dropped, lines without words are skipped and pages are
/// separated by a blank line.
pub fn extract_text(document: &Document) -> String {
    let mut lines = Vec::new();

    for (index, page) in document.pages.iter().enumerate() {
        for line in page.blocks.iter().flat_map(|block| &block.lines) {
            let words: Vec<&str> = line
                .words
                .iter()
                .map(|word| word.value.as_str())
                .filter(|value| !value.is_empty())
                .collect();
            if !words.is_empty() {
                lines.push(words.join(" "));
            }
        }

        if index + 1 != document.pages.len() {
            lines.push(String::new());
        }
    }

    lines.join("\n").trim().to_string()
}

/// Writes the exported document as indented UTF-8 JSON, creating parent
/// directories as needed.
pub fn write_json(path: &Path, document: &Document) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let json = serde_json::to_string_pretty(&document.export()?)?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;

    tracing::info!(path = %path.display(), "JSON written");
    Ok(())
}
