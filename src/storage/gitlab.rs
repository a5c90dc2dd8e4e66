use crate::coder::escape_path;
use crate::error::{
    GitLabStorageError, GitLabStorageResult, StorageError, StorageResult, UpstreamDetail,
};

use super::{
    ensure_path, Credential, Encoding, FileMeta, FileRecord, FileStore, FileWrite, ProbeOutcome,
    Project, ProjectId, TreeEntry,
};
use async_trait::async_trait;
use error_stack::{Report, ResultExt};
use http::StatusCode;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use tracing::debug;

pub const DEFAULT_API_BASE: &str = "https://gitlab.com/api/v4";

const TOKEN_HEADER: &str = "PRIVATE-TOKEN";
const PAGE_SIZE: &str = "100";

impl fmt::Display for GitLabStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GitLabStorage(api_base={}, branch={})",
            self.api_base, self.branch
        )
    }
}

pub struct GitLabStorage {
    client: Client,
    api_base: String,
    branch: String,
}

#[derive(Serialize)]
struct WriteBody<'a> {
    branch: &'a str,
    content: &'a str,
    commit_message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    encoding: Option<Encoding>,
}

#[derive(Serialize)]
struct DeleteBody<'a> {
    branch: &'a str,
    commit_message: &'a str,
}

impl GitLabStorage {
    pub fn new(api_base: &str, branch: Option<&str>) -> GitLabStorageResult<Self> {
        let client = Client::builder()
            .user_agent(concat!("gitdocs/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                Report::new(GitLabStorageError::Transport).attach_printable(e.to_string())
            })?;

        Ok(Self::with_client(client, api_base, branch))
    }

    pub fn with_client(client: Client, api_base: &str, branch: Option<&str>) -> Self {
        GitLabStorage {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            branch: branch.unwrap_or(super::DEFAULT_BRANCH).to_string(),
        }
    }

    fn project_url(&self, project: &ProjectId) -> String {
        format!("{}/projects/{}", self.api_base, project)
    }

    fn file_url(&self, project: &ProjectId, path: &str) -> String {
        format!(
            "{}/repository/files/{}",
            self.project_url(project),
            escape_path(path)
        )
    }

    fn request(&self, method: Method, url: &str, credential: &Credential) -> RequestBuilder {
        self.client
            .request(method, url)
            .header(TOKEN_HEADER, credential.expose())
    }

    /// Send a request and turn every non-2xx status into a report.
    async fn send(&self, request: RequestBuilder, action: &str) -> StorageResult<Response> {
        let response = request.send().await.map_err(|e| {
            Report::new(StorageError::GitLab(GitLabStorageError::Transport))
                .attach(UpstreamDetail::transport(e.to_string()))
                .attach_printable(format!("Failed to {}: {}", action, e))
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        Err(failure(status, response, action).await)
    }

    async fn json<T: DeserializeOwned>(response: Response, action: &str) -> StorageResult<T> {
        response.json::<T>().await.map_err(|e| {
            Report::new(StorageError::GitLab(GitLabStorageError::MissingData(
                format!("Unexpected response body: {}", e),
            )))
            .attach_printable(format!("Failed to {}", action))
        })
    }

    async fn write_file(
        &self,
        method: Method,
        credential: &Credential,
        project: &ProjectId,
        write: &FileWrite,
        action: &str,
    ) -> StorageResult<FileMeta> {
        ensure_path(&write.path)?;

        let body = WriteBody {
            branch: &self.branch,
            content: &write.content,
            commit_message: &write.commit_message,
            encoding: match write.encoding {
                Encoding::Text => None,
                Encoding::Base64 => Some(Encoding::Base64),
            },
        };

        let request = self
            .request(method, &self.file_url(project, &write.path), credential)
            .json(&body);
        let response = self.send(request, action).await?;
        Self::json(response, action).await
    }
}

/// Build the failure report for a non-2xx response.
async fn failure(status: StatusCode, response: Response, action: &str) -> Report<StorageError> {
    let body = response.text().await.unwrap_or_default();
    let message = upstream_message(status, &body);

    Report::new(StorageError::GitLab(GitLabStorageError::from(status)))
        .attach(UpstreamDetail::new(status, message.clone()))
        .attach_printable(format!("Failed to {}: {}", action, message))
}

/// Pull the human readable part out of a GitLab error body.
///
/// GitLab answers with `{"message": ...}` or `{"error": ...}`; `message` may
/// also be an object of field errors.
fn upstream_message(status: StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        for key in ["message", "error"] {
            match value.get(key) {
                Some(Value::String(message)) => return message.clone(),
                Some(Value::Null) | None => {}
                Some(other) => return other.to_string(),
            }
        }
    }

    let body = body.trim();
    if body.is_empty() {
        format!("Request failed with status code {}", status.as_u16())
    } else {
        body.to_string()
    }
}

#[async_trait]
impl FileStore for GitLabStorage {
    fn branch(&self) -> &str {
        &self.branch
    }

    fn raw_url(&self, project: &ProjectId, path: &str) -> String {
        format!(
            "{}/raw?ref={}",
            self.file_url(project, path),
            urlencoding::encode(&self.branch)
        )
    }

    async fn list_projects(&self, credential: &Credential) -> StorageResult<Vec<Project>> {
        let action = "list projects";
        let request = self
            .request(
                Method::GET,
                &format!("{}/projects", self.api_base),
                credential,
            )
            .query(&[
                ("membership", "true"),
                ("simple", "true"),
                ("per_page", PAGE_SIZE),
            ]);
        let response = self.send(request, action).await?;
        Self::json(response, action).await
    }

    async fn list_tree(
        &self,
        credential: &Credential,
        project: &ProjectId,
        path: &str,
    ) -> StorageResult<Vec<TreeEntry>> {
        let action = "list repository tree";
        let request = self
            .request(
                Method::GET,
                &format!("{}/repository/tree", self.project_url(project)),
                credential,
            )
            .query(&[
                ("path", path),
                ("recursive", "true"),
                ("per_page", PAGE_SIZE),
            ]);
        let response = self.send(request, action).await?;
        Self::json(response, action).await
    }

    async fn read_raw(
        &self,
        credential: &Credential,
        project: &ProjectId,
        path: &str,
    ) -> StorageResult<String> {
        ensure_path(path)?;

        let action = "read file";
        let request = self
            .request(
                Method::GET,
                &format!("{}/raw", self.file_url(project, path)),
                credential,
            )
            .query(&[("ref", self.branch.as_str())]);
        let response = self.send(request, action).await?;

        response
            .text()
            .await
            .change_context(StorageError::GitLab(GitLabStorageError::Transport))
            .attach_printable_lazy(|| format!("Failed to read body of {}", path))
    }

    async fn probe(
        &self,
        credential: &Credential,
        project: &ProjectId,
        path: &str,
    ) -> ProbeOutcome {
        let action = "probe file";
        let request = self
            .request(Method::GET, &self.file_url(project, path), credential)
            .query(&[("ref", self.branch.as_str())]);

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                return ProbeOutcome::Failed(
                    Report::new(StorageError::GitLab(GitLabStorageError::Transport))
                        .attach(UpstreamDetail::transport(e.to_string()))
                        .attach_printable(format!("Failed to {}: {}", action, e)),
                )
            }
        };

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(project = %project, path, "probe: not found");
            return ProbeOutcome::NotFound;
        }
        if !status.is_success() {
            return ProbeOutcome::Failed(failure(status, response, action).await);
        }

        match Self::json::<FileRecord>(response, action).await {
            Ok(record) => ProbeOutcome::Found(record),
            Err(report) => ProbeOutcome::Failed(report),
        }
    }

    async fn create_file(
        &self,
        credential: &Credential,
        project: &ProjectId,
        write: &FileWrite,
    ) -> StorageResult<FileMeta> {
        self.write_file(Method::POST, credential, project, write, "create file")
            .await
    }

    async fn update_file(
        &self,
        credential: &Credential,
        project: &ProjectId,
        write: &FileWrite,
    ) -> StorageResult<FileMeta> {
        self.write_file(Method::PUT, credential, project, write, "update file")
            .await
    }

    async fn delete_file(
        &self,
        credential: &Credential,
        project: &ProjectId,
        path: &str,
        commit_message: &str,
    ) -> StorageResult<()> {
        ensure_path(path)?;

        let request = self
            .request(Method::DELETE, &self.file_url(project, path), credential)
            .json(&DeleteBody {
                branch: &self.branch,
                commit_message,
            });
        self.send(request, "delete file").await?;
        Ok(())
    }
}
