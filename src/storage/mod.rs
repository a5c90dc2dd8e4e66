mod gitlab;
pub mod memory;

use std::fmt;

use async_trait::async_trait;
use error_stack::Report;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{StorageError, StorageResult};

pub use gitlab::{GitLabStorage, DEFAULT_API_BASE};
pub use memory::{MemoryStore, StoreCall, StoreOp};

pub const DEFAULT_BRANCH: &str = "main";

/// Access token supplied by the caller for a single request.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Credential(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// GitLab project identifier, numeric id or encoded namespace path.
///
/// Accepts a JSON number as well, since that is how `/repos` hands ids out.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProjectId(String);

impl<'de> Deserialize<'de> for ProjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(u64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(id) => ProjectId(id),
            Raw::Number(id) => ProjectId(id.to_string()),
        })
    }
}

impl ProjectId {
    pub fn new(id: impl Into<String>) -> Self {
        ProjectId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: u64,
    pub name: String,
    pub path_with_namespace: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub path: String,
    pub mode: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Blob,
    Tree,
    Commit,
}

/// File metadata returned by a probe. The content itself is never kept.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileRecord {
    pub file_name: String,
    pub file_path: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub blob_id: String,
    #[serde(default)]
    pub last_commit_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    Text,
    Base64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileWrite {
    pub path: String,
    pub content: String,
    pub commit_message: String,
    pub encoding: Encoding,
}

impl FileWrite {
    pub fn text(
        path: impl Into<String>,
        content: impl Into<String>,
        commit_message: impl Into<String>,
    ) -> Self {
        FileWrite {
            path: path.into(),
            content: content.into(),
            commit_message: commit_message.into(),
            encoding: Encoding::Text,
        }
    }

    pub fn base64(
        path: impl Into<String>,
        content: impl Into<String>,
        commit_message: impl Into<String>,
    ) -> Self {
        FileWrite {
            encoding: Encoding::Base64,
            ..FileWrite::text(path, content, commit_message)
        }
    }
}

/// Acknowledgement of a create or update commit.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileMeta {
    pub file_path: String,
    pub branch: String,
}

/// Result of checking whether a path exists.
///
/// Not-found is an ordinary outcome here, not an error.
#[derive(Debug)]
pub enum ProbeOutcome {
    Found(FileRecord),
    NotFound,
    Failed(Report<StorageError>),
}

/// Repository file operations, keyed by (project, path, branch).
///
/// The branch belongs to the store. The credential is passed on every call
/// and never retained.
#[async_trait]
pub trait FileStore: Send + Sync {
    fn branch(&self) -> &str;

    /// Publicly resolvable raw URL for `path`. Built, not checked.
    fn raw_url(&self, project: &ProjectId, path: &str) -> String;

    async fn list_projects(&self, credential: &Credential) -> StorageResult<Vec<Project>>;

    async fn list_tree(
        &self,
        credential: &Credential,
        project: &ProjectId,
        path: &str,
    ) -> StorageResult<Vec<TreeEntry>>;

    async fn read_raw(
        &self,
        credential: &Credential,
        project: &ProjectId,
        path: &str,
    ) -> StorageResult<String>;

    async fn probe(&self, credential: &Credential, project: &ProjectId, path: &str)
        -> ProbeOutcome;

    async fn create_file(
        &self,
        credential: &Credential,
        project: &ProjectId,
        write: &FileWrite,
    ) -> StorageResult<FileMeta>;

    async fn update_file(
        &self,
        credential: &Credential,
        project: &ProjectId,
        write: &FileWrite,
    ) -> StorageResult<FileMeta>;

    async fn delete_file(
        &self,
        credential: &Credential,
        project: &ProjectId,
        path: &str,
        commit_message: &str,
    ) -> StorageResult<()>;
}

pub(crate) fn ensure_path(path: &str) -> StorageResult<()> {
    if path.is_empty() {
        return Err(Report::new(StorageError::InvalidPath(
            "Path cannot be empty".into(),
        )));
    }
    Ok(())
}
