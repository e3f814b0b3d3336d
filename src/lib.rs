use thiserror::Error;

pub type Result<T> = std::result::Result<T, AdderError>;

#[derive(Error, Debug)]
pub enum AdderError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("MCP error: {0}")]
    Mcp(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod commands;
pub mod config;
pub mod mcp;
