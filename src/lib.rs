pub mod coder;
pub mod config;
pub mod docs;
pub mod error;
pub mod server;
pub mod storage;
pub mod upload;

pub use config::Config;
pub use storage::{Credential, FileStore, ProjectId};
pub use upload::{AssetUploader, StoredAsset};
