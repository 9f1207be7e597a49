//! Azure DevOps gateway error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AzdoError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, AzdoError>;
