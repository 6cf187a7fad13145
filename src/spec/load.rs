//! Reading job documents from text or files.

use crate::diagnostics::FieldPath;
use crate::error::{JobError, JobResult};
use crate::spec::model::JobSpec;
use crate::spec::raw::{RawJobDoc, TOP_LEVEL_KEYS};
use crate::spec::validate::{Validated, ValidationContext};

use serde_yaml::Value;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Handling of top-level keys the schema does not know.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeyPolicy {
    /// Unknown keys are a schema error.
    #[default]
    Strict,
    /// Unknown keys are logged and dropped.
    Lenient,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    pub key_policy: KeyPolicy,
}

/// Parse a job document without validating it.
///
/// Returns the raw document plus the unknown keys dropped in lenient mode.
pub fn parse_document(text: &str, origin: &str, options: LoadOptions) -> JobResult<(RawJobDoc, Vec<String>)> {
    let value: Value = serde_yaml::from_str(text).map_err(|source| JobError::Parse {
        origin: origin.to_string(),
        source,
    })?;
    let Value::Mapping(mut map) = value else {
        return Err(JobError::schema(
            &FieldPath::root(),
            "job document must be a mapping",
        ));
    };

    let mut dropped = Vec::new();
    let unknown: Vec<Value> = map
        .keys()
        .filter(|k| !k.as_str().is_some_and(|s| TOP_LEVEL_KEYS.contains(&s)))
        .cloned()
        .collect();
    for key in unknown {
        let label = match &key {
            Value::String(s) => s.clone(),
            other => format!("{:?}", other),
        };
        match options.key_policy {
            KeyPolicy::Strict => {
                return Err(JobError::schema(
                    &FieldPath::root().key(label),
                    format!("unknown top-level key (known: {})", TOP_LEVEL_KEYS.join(", ")),
                ));
            }
            KeyPolicy::Lenient => {
                warn!(origin, key = %label, "ignoring unknown top-level key");
                map.remove(&key);
                dropped.push(label);
            }
        }
    }

    let raw: RawJobDoc = serde_path_to_error::deserialize(Value::Mapping(map)).map_err(|e| {
        // An empty path displays as ".".
        let path = match e.path().to_string() {
            p if p == "." => FieldPath::root().to_string(),
            p => p,
        };
        JobError::Schema {
            path,
            message: e.inner().to_string(),
        }
    })?;
    Ok((raw, dropped))
}

/// Parse and validate a job document.
pub fn load_str(
    text: &str,
    origin: &str,
    options: LoadOptions,
    ctx: ValidationContext<'_>,
) -> JobResult<Validated> {
    let (raw, dropped) = parse_document(text, origin, options)?;
    let mut validated = raw.validate_and_build(ctx)?;
    validated
        .warnings
        .extend(dropped.into_iter().map(|k| format!("{}: unknown top-level key ignored", k)));
    info!(
        origin,
        sources = validated.job.sources.len(),
        products = validated.job.output_products.len(),
        warnings = validated.warnings.len(),
        "job document validated"
    );
    Ok(validated)
}

pub fn load_file(path: &Path, options: LoadOptions, ctx: ValidationContext<'_>) -> JobResult<Validated> {
    let text = fs::read_to_string(path).map_err(|source| JobError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_str(&text, &path.display().to_string(), options, ctx)
}

impl JobSpec {
    /// Serialize with every default explicit. Loading the result again
    /// yields an equal `JobSpec`.
    pub fn to_yaml(&self) -> JobResult<String> {
        serde_yaml::to_string(&self.to_document()).map_err(|source| JobError::Parse {
            origin: "serialized job".to_string(),
            source,
        })
    }
}
