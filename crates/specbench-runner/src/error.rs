use std::path::PathBuf;

use thiserror::Error;

use crate::policy::PolicyKind;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("insufficient data: need {needed} `{kind}` records, dataset has {available}")]
    InsufficientData {
        kind: PolicyKind,
        needed: usize,
        available: usize,
    },

    #[error("dataset {path}:{line}: {message}")]
    Dataset {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("result file error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, HarnessError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvocationError {
    #[error("{0}")]
    Model(String),

    #[error("{message}")]
    Format { message: String, raw: String },
}
