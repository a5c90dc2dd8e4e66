//! In-process [`FileStore`] used for local front-end work and tests.
//!
//! Answers the way GitLab does for the calls the relay makes and lets a
//! caller inject a failure for the next call of a given operation. A store
//! built with [`MemoryStore::recording`] also keeps a log of every call.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use error_stack::Report;
use http::StatusCode;

use crate::coder::{decode_content, escape_path};
use crate::error::{GitLabStorageError, StorageError, StorageResult, UpstreamDetail};

use super::{
    ensure_path, Credential, Encoding, EntryKind, FileMeta, FileRecord, FileStore, FileWrite,
    ProbeOutcome, Project, ProjectId, TreeEntry, DEFAULT_BRANCH,
};

const BASE_URL: &str = "memory://gitlab";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    ListProjects,
    ListTree,
    ReadRaw,
    Probe,
    Create,
    Update,
    Delete,
}

impl StoreOp {
    pub fn is_write(self) -> bool {
        matches!(self, StoreOp::Create | StoreOp::Update | StoreOp::Delete)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCall {
    pub op: StoreOp,
    pub project: Option<ProjectId>,
    pub path: Option<String>,
    pub write: Option<FileWrite>,
    pub commit_message: Option<String>,
}

impl StoreCall {
    fn new(op: StoreOp) -> Self {
        StoreCall {
            op,
            project: None,
            path: None,
            write: None,
            commit_message: None,
        }
    }

    fn at(mut self, project: &ProjectId, path: &str) -> Self {
        self.project = Some(project.clone());
        self.path = Some(path.to_string());
        self
    }
}

#[derive(Default)]
struct State {
    projects: Vec<Project>,
    files: BTreeMap<(ProjectId, String), Vec<u8>>,
    calls: Vec<StoreCall>,
    faults: HashMap<StoreOp, UpstreamDetail>,
}

pub struct MemoryStore {
    branch: String,
    record_calls: bool,
    state: Mutex<State>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(None)
    }
}

impl MemoryStore {
    pub fn new(branch: Option<&str>) -> Self {
        MemoryStore {
            branch: branch.unwrap_or(DEFAULT_BRANCH).to_string(),
            record_calls: false,
            state: Mutex::new(State::default()),
        }
    }

    /// Store on the default branch that logs every call for [`calls`](Self::calls).
    pub fn recording() -> Self {
        MemoryStore {
            record_calls: true,
            ..Self::new(None)
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert_project(&self, project: Project) {
        self.state().projects.push(project);
    }

    pub fn insert_file(&self, project: &ProjectId, path: &str, content: impl Into<Vec<u8>>) {
        self.state()
            .files
            .insert((project.clone(), path.to_string()), content.into());
    }

    pub fn file(&self, project: &ProjectId, path: &str) -> Option<Vec<u8>> {
        self.state()
            .files
            .get(&(project.clone(), path.to_string()))
            .cloned()
    }

    /// Make the next call of `op` fail with `status` and `message`.
    pub fn fail_next(&self, op: StoreOp, status: StatusCode, message: &str) {
        self.state()
            .faults
            .insert(op, UpstreamDetail::new(status, message));
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.state().calls.clone()
    }

    pub fn count(&self, op: StoreOp) -> usize {
        self.state().calls.iter().filter(|c| c.op == op).count()
    }

    /// Record the call, then fire any fault queued for it.
    fn enter(&self, call: StoreCall) -> StorageResult<MutexGuard<'_, State>> {
        let mut state = self.state();
        let op = call.op;
        if self.record_calls {
            state.calls.push(call);
        }
        match state.faults.remove(&op) {
            Some(detail) => Err(rejected(detail)),
            None => Ok(state),
        }
    }

    fn write(
        &self,
        op: StoreOp,
        project: &ProjectId,
        write: &FileWrite,
    ) -> StorageResult<FileMeta> {
        ensure_path(&write.path)?;

        let mut call = StoreCall::new(op).at(project, &write.path);
        call.write = Some(write.clone());
        let mut state = self.enter(call)?;

        let key = (project.clone(), write.path.clone());
        let exists = state.files.contains_key(&key);
        match (op, exists) {
            (StoreOp::Create, true) => {
                return Err(rejected(UpstreamDetail::new(
                    StatusCode::BAD_REQUEST,
                    "A file with this name already exists",
                )))
            }
            (StoreOp::Update, false) => {
                return Err(rejected(UpstreamDetail::new(
                    StatusCode::BAD_REQUEST,
                    "A file with this name doesn't exist",
                )))
            }
            _ => {}
        }

        let bytes = match write.encoding {
            Encoding::Text => write.content.clone().into_bytes(),
            Encoding::Base64 => decode_content(&write.content).map_err(|e| {
                rejected(UpstreamDetail::new(StatusCode::BAD_REQUEST, e.to_string()))
            })?,
        };
        state.files.insert(key, bytes);

        Ok(FileMeta {
            file_path: write.path.clone(),
            branch: self.branch.clone(),
        })
    }
}

fn rejected(detail: UpstreamDetail) -> Report<StorageError> {
    let kind = match detail.status {
        Some(status) => GitLabStorageError::from(status),
        None => GitLabStorageError::Transport,
    };
    let printable = detail.to_string();
    Report::new(StorageError::GitLab(kind))
        .attach(detail)
        .attach_printable(printable)
}

fn file_not_found() -> Report<StorageError> {
    rejected(UpstreamDetail::new(
        StatusCode::NOT_FOUND,
        "404 File Not Found",
    ))
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[async_trait]
impl FileStore for MemoryStore {
    fn branch(&self) -> &str {
        &self.branch
    }

    fn raw_url(&self, project: &ProjectId, path: &str) -> String {
        format!(
            "{}/projects/{}/repository/files/{}/raw?ref={}",
            BASE_URL,
            project,
            escape_path(path),
            urlencoding::encode(&self.branch)
        )
    }

    async fn list_projects(&self, _credential: &Credential) -> StorageResult<Vec<Project>> {
        let state = self.enter(StoreCall::new(StoreOp::ListProjects))?;
        Ok(state.projects.clone())
    }

    async fn list_tree(
        &self,
        _credential: &Credential,
        project: &ProjectId,
        path: &str,
    ) -> StorageResult<Vec<TreeEntry>> {
        let state = self.enter(StoreCall::new(StoreOp::ListTree).at(project, path))?;

        let root = path.trim_end_matches('/');
        let prefix = if root.is_empty() {
            String::new()
        } else {
            format!("{}/", root)
        };
        let mut dirs = BTreeSet::new();
        let mut entries = Vec::new();
        for (key, _) in state.files.iter().filter(|(key, _)| &key.0 == project) {
            let Some(rest) = key.1.strip_prefix(prefix.as_str()) else {
                continue;
            };
            let mut parent = root.to_string();
            for segment in rest.split('/').take(rest.matches('/').count()) {
                parent = if parent.is_empty() {
                    segment.to_string()
                } else {
                    format!("{}/{}", parent, segment)
                };
                dirs.insert(parent.clone());
            }
            entries.push(TreeEntry {
                id: format!("blob:{}", key.1),
                name: file_name(&key.1).to_string(),
                kind: EntryKind::Blob,
                path: key.1.clone(),
                mode: "100644".into(),
            });
        }

        let trees = dirs.into_iter().map(|dir| TreeEntry {
            id: format!("tree:{}", dir),
            name: file_name(&dir).to_string(),
            kind: EntryKind::Tree,
            path: dir,
            mode: "040000".into(),
        });
        let mut all: Vec<TreeEntry> = trees.chain(entries).collect();
        all.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(all)
    }

    async fn read_raw(
        &self,
        _credential: &Credential,
        project: &ProjectId,
        path: &str,
    ) -> StorageResult<String> {
        ensure_path(path)?;
        let state = self.enter(StoreCall::new(StoreOp::ReadRaw).at(project, path))?;
        state
            .files
            .get(&(project.clone(), path.to_string()))
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .ok_or_else(file_not_found)
    }

    async fn probe(
        &self,
        _credential: &Credential,
        project: &ProjectId,
        path: &str,
    ) -> ProbeOutcome {
        let state = match self.enter(StoreCall::new(StoreOp::Probe).at(project, path)) {
            Ok(state) => state,
            Err(report) => return ProbeOutcome::Failed(report),
        };
        match state.files.get(&(project.clone(), path.to_string())) {
            Some(bytes) => ProbeOutcome::Found(FileRecord {
                file_name: file_name(path).to_string(),
                file_path: path.to_string(),
                size: bytes.len() as u64,
                blob_id: format!("blob:{}", path),
                last_commit_id: String::new(),
            }),
            None => ProbeOutcome::NotFound,
        }
    }

    async fn create_file(
        &self,
        _credential: &Credential,
        project: &ProjectId,
        write: &FileWrite,
    ) -> StorageResult<FileMeta> {
        self.write(StoreOp::Create, project, write)
    }

    async fn update_file(
        &self,
        _credential: &Credential,
        project: &ProjectId,
        write: &FileWrite,
    ) -> StorageResult<FileMeta> {
        self.write(StoreOp::Update, project, write)
    }

    async fn delete_file(
        &self,
        _credential: &Credential,
        project: &ProjectId,
        path: &str,
        commit_message: &str,
    ) -> StorageResult<()> {
        ensure_path(path)?;

        let mut call = StoreCall::new(StoreOp::Delete).at(project, path);
        call.commit_message = Some(commit_message.to_string());
        let mut state = self.enter(call)?;

        match state.files.remove(&(project.clone(), path.to_string())) {
            Some(_) => Ok(()),
            None => Err(rejected(UpstreamDetail::new(
                StatusCode::BAD_REQUEST,
                "A file with this name doesn't exist",
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential() -> Credential {
        Credential::new("token")
    }

    #[tokio::test]
    async fn test_calls_not_logged_unless_recording() {
        let store = MemoryStore::default();
        let project = ProjectId::new("1");
        let write = FileWrite::base64("static/img/a.bin", "AAEC", "Upload image: a.bin");

        store.create_file(&credential(), &project, &write).await.unwrap();
        store.probe(&credential(), &project, "static/img/a.bin").await;

        assert!(store.calls().is_empty());
        assert_eq!(store.count(StoreOp::Create), 0);
        assert_eq!(store.file(&project, "static/img/a.bin"), Some(vec![0, 1, 2]));
    }

    #[test]
    fn test_raw_url_escapes_branch() {
        let store = MemoryStore::new(Some("release/v1"));
        assert_eq!(
            store.raw_url(&ProjectId::new("42"), "static/img/logo.png"),
            "memory://gitlab/projects/42/repository/files/static%2Fimg%2Flogo.png/raw?ref=release%2Fv1"
        );
    }

    #[tokio::test]
    async fn test_create_then_read() {
        let store = MemoryStore::recording();
        let project = ProjectId::new("1");
        let write = FileWrite::text("docs/intro.md", "# Intro", "Add new markdown file");

        store.create_file(&credential(), &project, &write).await.unwrap();
        let content = store
            .read_raw(&credential(), &project, "docs/intro.md")
            .await
            .unwrap();
        assert_eq!(content, "# Intro");

        let err = store
            .create_file(&credential(), &project, &write)
            .await
            .unwrap_err();
        let detail = err.downcast_ref::<UpstreamDetail>().unwrap();
        assert_eq!(detail.status, Some(StatusCode::BAD_REQUEST));
    }

    #[tokio::test]
    async fn test_base64_write_is_decoded() {
        let store = MemoryStore::recording();
        let project = ProjectId::new("1");
        let write = FileWrite::base64("static/img/a.bin", "AAEC", "Upload image: a.bin");

        store.create_file(&credential(), &project, &write).await.unwrap();
        assert_eq!(store.file(&project, "static/img/a.bin"), Some(vec![0, 1, 2]));
    }

    #[tokio::test]
    async fn test_fault_fires_once() {
        let store = MemoryStore::recording();
        let project = ProjectId::new("1");
        store.fail_next(StoreOp::Probe, StatusCode::UNAUTHORIZED, "401 Unauthorized");

        assert!(matches!(
            store.probe(&credential(), &project, "a").await,
            ProbeOutcome::Failed(_)
        ));
        assert!(matches!(
            store.probe(&credential(), &project, "a").await,
            ProbeOutcome::NotFound
        ));
        assert_eq!(store.count(StoreOp::Probe), 2);
    }

    #[tokio::test]
    async fn test_list_tree_includes_directories() {
        let store = MemoryStore::recording();
        let project = ProjectId::new("1");
        store.insert_file(&project, "docs/intro.md", "a");
        store.insert_file(&project, "docs/guide/setup.mdx", "b");
        store.insert_file(&project, "README.md", "c");

        let entries = store.list_tree(&credential(), &project, "docs").await.unwrap();
        let paths: Vec<_> = entries.iter().map(|e| (e.kind, e.path.as_str())).collect();
        assert_eq!(
            paths,
            vec![
                (EntryKind::Tree, "docs/guide"),
                (EntryKind::Blob, "docs/guide/setup.mdx"),
                (EntryKind::Blob, "docs/intro.md"),
            ]
        );
    }

    #[tokio::test]
    async fn test_delete_missing_file() {
        let store = MemoryStore::recording();
        let project = ProjectId::new("1");
        let result = store
            .delete_file(&credential(), &project, "docs/none.md", "Delete file docs/none.md via CMS")
            .await;
        assert!(result.is_err());
        assert_eq!(store.count(StoreOp::Delete), 1);
    }
}
