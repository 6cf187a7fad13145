//! Error taxonomy for loading, validating and planning a job.
//!
//! Everything in [`JobError`] is fatal for the whole job and is raised before
//! any unit of work starts. Failures of a single unit are [`UnitError`]s and
//! are collected into the job summary instead.

use crate::diagnostics::FieldPath;
use crate::template::TemplateError;

use std::path::PathBuf;
use thiserror::Error;

pub type JobResult<T> = std::result::Result<T, JobError>;

#[derive(Debug, Error)]
pub enum JobError {
    /// Structural or type violation in the job document.
    #[error("schema error at {path}: {message}")]
    Schema { path: String, message: String },

    /// A product, measurement or flag is unknown to the catalog.
    #[error("catalog resolution error at {path}: {message}")]
    CatalogResolution { path: String, message: String },

    /// A path template is malformed or cannot be rendered.
    #[error("template error at {path}: {source}")]
    Template {
        path: String,
        #[source]
        source: TemplateError,
    },

    #[error("output already exists: {}", path.display())]
    OutputExists { path: PathBuf },

    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {origin}")]
    Parse {
        origin: String,
        #[source]
        source: serde_yaml::Error,
    },
}

impl JobError {
    pub fn schema(path: &FieldPath, message: impl Into<String>) -> Self {
        JobError::Schema {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn catalog(path: &FieldPath, message: impl Into<String>) -> Self {
        JobError::CatalogResolution {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn template(path: &FieldPath, source: TemplateError) -> Self {
        JobError::Template {
            path: path.into(),
            source,
        }
    }
}

/// Failure of a single (tile, window, product) unit. Never aborts siblings.
#[derive(Debug, Clone, Error)]
pub enum UnitError {
    #[error("computation failed: {0}")]
    Computation(String),

    #[error("storage write failed: {0}")]
    StorageWrite(String),
}

impl UnitError {
    pub fn kind(&self) -> &'static str {
        match self {
            UnitError::Computation(_) => "computation",
            UnitError::StorageWrite(_) => "storage_write",
        }
    }
}
