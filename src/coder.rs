use anyhow::{Context, Result};
use base64::{engine::general_purpose, Engine as _};

pub const DEFAULT_ASSET_DIR: &str = "static/img";

/// Base64 payload as the repository files API expects with `encoding: base64`.
pub fn encode_content(bytes: &[u8]) -> String {
    general_purpose::STANDARD.encode(bytes)
}

/// Decode a base64 payload. GitLab may wrap long content with newlines.
pub fn decode_content(encoded: &str) -> Result<Vec<u8>> {
    let cleaned: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    general_purpose::STANDARD
        .decode(cleaned)
        .context("Failed to decode base64 content")
}

/// Percent-escape a repository path so it fits in a single URL segment.
pub fn escape_path(path: &str) -> String {
    urlencoding::encode(path).into_owned()
}

/// Storage path of an uploaded asset. The filename is used verbatim.
pub fn asset_path(dir: &str, filename: &str) -> String {
    let dir = dir.trim_end_matches('/');
    if dir.is_empty() {
        filename.to_string()
    } else {
        format!("{}/{}", dir, filename)
    }
}
