use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Multipart, Query, State};
use axum::Json;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use super::error::{required, required_path, ApiError};
use super::AppState;
use crate::docs::{markdown_files, DocFile, DEFAULT_DOCS_DIR};
use crate::error::UploadError;
use crate::storage::{Credential, FileWrite, Project, ProjectId};

const DEFAULT_UPDATE_MESSAGE: &str = "Update file via CMS";
const DEFAULT_CREATE_MESSAGE: &str = "Add new markdown file";

#[derive(Debug, Serialize)]
pub struct ProjectSummary {
    pub id: u64,
    pub name: String,
    pub path: String,
}

impl From<Project> for ProjectSummary {
    fn from(project: Project) -> Self {
        ProjectSummary {
            id: project.id,
            name: project.name,
            path: project.path_with_namespace,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReposQuery {
    token: Option<Credential>,
    /// Sent by the editor, not used upstream.
    owner: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FileQuery {
    token: Option<Credential>,
    repo: Option<ProjectId>,
    path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WriteRequest {
    token: Option<Credential>,
    repo: Option<ProjectId>,
    path: Option<String>,
    content: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub url: String,
}

fn success() -> Json<Value> {
    Json(json!({ "success": true }))
}

pub async fn list_repos(
    State(state): State<AppState>,
    query: Result<Query<ReposQuery>, QueryRejection>,
) -> Result<Json<Vec<ProjectSummary>>, ApiError> {
    let Query(query) = query?;
    let token = required(query.token, "token")?;
    debug!(owner = ?query.owner, "listing projects");

    let projects = state
        .store
        .list_projects(&token)
        .await
        .map_err(|e| ApiError::upstream("Failed to fetch repositories", e))?;

    Ok(Json(projects.into_iter().map(ProjectSummary::from).collect()))
}

pub async fn list_docs(
    State(state): State<AppState>,
    query: Result<Query<FileQuery>, QueryRejection>,
) -> Result<Json<Vec<DocFile>>, ApiError> {
    let Query(query) = query?;
    let token = required(query.token, "token")?;
    let repo = required(query.repo, "repo")?;
    let path = query
        .path
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| DEFAULT_DOCS_DIR.to_string());

    let entries = state
        .store
        .list_tree(&token, &repo, &path)
        .await
        .map_err(|e| ApiError::upstream("Failed to fetch markdown files", e))?;

    Ok(Json(markdown_files(entries)))
}

pub async fn read_file(
    State(state): State<AppState>,
    query: Result<Query<FileQuery>, QueryRejection>,
) -> Result<String, ApiError> {
    let Query(query) = query?;
    let token = required(query.token, "token")?;
    let repo = required(query.repo, "repo")?;
    let path = required_path(query.path)?;

    state
        .store
        .read_raw(&token, &repo, &path)
        .await
        .map_err(|e| ApiError::upstream("Failed to fetch file content", e))
}

/// Validated body of `POST /file` and `POST /new-file`.
fn file_write(
    body: Result<Json<WriteRequest>, JsonRejection>,
    default_message: &str,
) -> Result<(Credential, ProjectId, FileWrite), ApiError> {
    let Json(body) = body?;
    let token = required(body.token, "token")?;
    let repo = required(body.repo, "repo")?;
    let path = required_path(body.path)?;
    let content = required(body.content, "content")?;
    let message = body
        .message
        .unwrap_or_else(|| default_message.to_string());

    Ok((token, repo, FileWrite::text(path, content, message)))
}

pub async fn update_file(
    State(state): State<AppState>,
    body: Result<Json<WriteRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let (token, repo, write) = file_write(body, DEFAULT_UPDATE_MESSAGE)?;

    state
        .store
        .update_file(&token, &repo, &write)
        .await
        .map_err(|e| ApiError::upstream("Failed to commit file", e))?;

    info!(project = %repo, path = %write.path, "file updated");
    Ok(success())
}

pub async fn create_file(
    State(state): State<AppState>,
    body: Result<Json<WriteRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let (token, repo, write) = file_write(body, DEFAULT_CREATE_MESSAGE)?;

    state
        .store
        .create_file(&token, &repo, &write)
        .await
        .map_err(|e| ApiError::upstream("Failed to create new file", e))?;

    info!(project = %repo, path = %write.path, "file created");
    Ok(success())
}

pub async fn delete_file(
    State(state): State<AppState>,
    query: Result<Query<FileQuery>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(query) = query?;
    let token = required(query.token, "token")?;
    let repo = required(query.repo, "repo")?;
    let path = required_path(query.path)?;

    let message = format!("Delete file {} via CMS", path);
    state
        .store
        .delete_file(&token, &repo, &path, &message)
        .await
        .map_err(|e| ApiError::upstream("Failed to delete file", e))?;

    info!(project = %repo, path = %path, "file deleted");
    Ok(success())
}

pub async fn upload_image(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut multipart = multipart?;
    let mut file: Option<(String, Bytes)> = None;
    let mut repo = None;
    let mut token = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await?;
                file = Some((filename, bytes));
            }
            Some("repo") => {
                let text = field.text().await?;
                repo = Some(ProjectId::new(text));
            }
            Some("token") => {
                let text = field.text().await?;
                token = Some(Credential::new(text));
            }
            _ => {}
        }
    }

    let Some((filename, bytes)) = file.filter(|(_, bytes)| !bytes.is_empty()) else {
        return Err(ApiError::upload(UploadError::no_file()));
    };
    let repo = required(repo, "repo")?;
    let token = required(token, "token")?;

    let asset = state
        .uploader
        .upsert(&token, &repo, &filename, Some(bytes.as_ref()))
        .await
        .map_err(ApiError::upload)?;

    Ok(Json(UploadResponse { url: asset.url }))
}
