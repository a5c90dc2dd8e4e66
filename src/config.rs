use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use clap::{Parser, ValueEnum};

use crate::coder::DEFAULT_ASSET_DIR;
use crate::storage::{DEFAULT_API_BASE, DEFAULT_BRANCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// GitLab REST API
    Gitlab,
    /// In-process store, nothing leaves the machine
    Memory,
}

/// Relay between a docs editor and GitLab repository files.
#[derive(Debug, Clone, Parser)]
#[command(name = "gitdocs", version, about)]
pub struct Config {
    /// Address to bind
    #[arg(long, env = "BIND_ADDRESS", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 3001)]
    pub port: u16,

    /// GitLab REST API base
    #[arg(long, env = "GITLAB_API", default_value = DEFAULT_API_BASE)]
    pub gitlab_api: String,

    /// Branch every read and commit targets
    #[arg(long, env = "GITLAB_BRANCH", default_value = DEFAULT_BRANCH)]
    pub branch: String,

    /// Repository directory for uploaded images
    #[arg(long, env = "ASSET_DIR", default_value = DEFAULT_ASSET_DIR)]
    pub asset_dir: String,

    /// Largest accepted request body, in bytes
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = 10 * 1024 * 1024)]
    pub max_upload_bytes: usize,

    #[arg(long, env = "STORAGE_BACKEND", value_enum, default_value_t = Backend::Gitlab)]
    pub backend: Backend,
}

impl Config {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::try_parse_from(["gitdocs"]).unwrap();
        assert_eq!(config.port, 3001);
        assert_eq!(config.gitlab_api, "https://gitlab.com/api/v4");
        assert_eq!(config.branch, "main");
        assert_eq!(config.asset_dir, "static/img");
        assert_eq!(config.backend, Backend::Gitlab);
    }

    #[test]
    fn test_flags_override() {
        let config = Config::try_parse_from([
            "gitdocs",
            "--port",
            "8080",
            "--branch",
            "docs",
            "--backend",
            "memory",
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.branch, "docs");
        assert_eq!(config.backend, Backend::Memory);
    }
}
