use serde::Serialize;

use crate::storage::{EntryKind, TreeEntry};

pub const DEFAULT_DOCS_DIR: &str = "docs";

const MARKDOWN_EXTENSIONS: [&str; 2] = [".md", ".mdx"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocFile {
    pub name: String,
    pub path: String,
}

pub fn is_markdown(path: &str) -> bool {
    MARKDOWN_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// Keep only markdown blobs, in tree order.
pub fn markdown_files(entries: Vec<TreeEntry>) -> Vec<DocFile> {
    entries
        .into_iter()
        .filter(|entry| entry.kind == EntryKind::Blob && is_markdown(&entry.path))
        .map(|entry| DocFile {
            name: entry.name,
            path: entry.path,
        })
        .collect()
}
