mod storage;
mod upload;

pub use storage::{GitLabStorageError, StorageError, UpstreamDetail};
pub use upload::UploadError;

pub type StorageResult<T> = error_stack::Result<T, StorageError>;
pub type GitLabStorageResult<T> = error_stack::Result<T, GitLabStorageError>;
pub type UploadResult<T> = Result<T, UploadError>;
