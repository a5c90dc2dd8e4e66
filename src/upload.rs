//! Binary asset upload with create-or-update semantics.
//!
//! Each upload runs `Probing → {Updating | Creating} → {Done | Failed}`:
//! one existence probe, then exactly one write chosen by the probe. The
//! returned URL is built from the target, not read back.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::coder::{asset_path, encode_content, DEFAULT_ASSET_DIR};
use crate::error::{UploadError, UploadResult};
use crate::storage::{Credential, FileStore, FileWrite, ProbeOutcome, ProjectId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Create,
    Update,
}

impl WriteKind {
    pub fn commit_message(self, filename: &str) -> String {
        match self {
            WriteKind::Create => format!("Upload image: {}", filename),
            WriteKind::Update => format!("Update image: {}", filename),
        }
    }
}

impl fmt::Display for WriteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteKind::Create => f.write_str("create"),
            WriteKind::Update => f.write_str("update"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAsset {
    pub url: String,
    pub path: String,
    pub kind: WriteKind,
}

#[derive(Clone)]
pub struct AssetUploader {
    store: Arc<dyn FileStore>,
    asset_dir: String,
}

impl AssetUploader {
    pub fn new(store: Arc<dyn FileStore>, asset_dir: Option<&str>) -> Self {
        AssetUploader {
            store,
            asset_dir: asset_dir.unwrap_or(DEFAULT_ASSET_DIR).to_string(),
        }
    }

    /// Store `payload` at `<asset_dir>/<filename>`, overwriting any file
    /// already there.
    pub async fn upsert(
        &self,
        credential: &Credential,
        project: &ProjectId,
        filename: &str,
        payload: Option<&[u8]>,
    ) -> UploadResult<StoredAsset> {
        let payload = match payload {
            Some(bytes) if !bytes.is_empty() => bytes,
            _ => return Err(UploadError::no_file()),
        };
        if filename.is_empty() {
            return Err(UploadError::Validation("Uploaded file has no name".into()));
        }

        let path = asset_path(&self.asset_dir, filename);
        let content = encode_content(payload);

        let kind = match self.store.probe(credential, project, &path).await {
            ProbeOutcome::Found(record) => {
                debug!(project = %project, path = %path, blob = %record.blob_id, "asset exists");
                WriteKind::Update
            }
            ProbeOutcome::NotFound => WriteKind::Create,
            ProbeOutcome::Failed(report) => {
                warn!(project = %project, path = %path, "probe failed: {:?}", report);
                return Err(UploadError::from(report));
            }
        };

        let write = FileWrite::base64(&path, content, kind.commit_message(filename));
        let written = match kind {
            WriteKind::Update => self.store.update_file(credential, project, &write).await,
            WriteKind::Create => self.store.create_file(credential, project, &write).await,
        };
        if let Err(report) = written {
            warn!(project = %project, path = %path, %kind, "asset write failed: {:?}", report);
            return Err(UploadError::from(report));
        }

        info!(
            project = %project,
            path = %path,
            branch = self.store.branch(),
            %kind,
            bytes = payload.len(),
            "asset stored"
        );
        Ok(StoredAsset {
            url: self.store.raw_url(project, &path),
            path,
            kind,
        })
    }
}
