//! Job files.
//!
//! A job bundles everything needed to run one transformer over a dataset:
//! - Transformer: kind, input columns, script and variant options
//! - Engine: interpreter limits
//! - Source: where rows come from (CSV file or inline rows)
//! - Sink: where output rows go
//!
//! Jobs are read from JSON, YAML or TOML; the format follows the file extension.

use crate::column::Row;
use crate::transformer::{EngineOptions, TransformerConfig};
use crate::value::ValueMap;
use serde::{Deserialize, Serialize};

/// A job definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// The transformer to run.
    pub transformer: TransformerConfig,

    /// Interpreter limits; the runner's defaults apply when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<EngineOptions>,

    /// Where input rows come from.
    #[serde(default)]
    pub source: Option<Source>,

    /// Where output rows go.
    #[serde(default)]
    pub sink: Option<Sink>,
}

/// Source specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Source {
    /// CSV file with a header row.
    File { path: String },
    /// Rows written into the job itself.
    Inline { rows: Vec<ValueMap> },
}

impl Source {
    /// Inline rows, if the source carries any.
    pub fn rows(&self) -> Option<Vec<Row>> {
        match self {
            Source::File { .. } => None,
            Source::Inline { rows } => Some(rows.iter().cloned().map(Row::from).collect()),
        }
    }
}

/// Sink specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Sink {
    /// CSV file, written with the output-column header.
    File { path: String },
}

impl Job {
    pub fn new(transformer: impl Into<TransformerConfig>) -> Self {
        Self {
            transformer: transformer.into(),
            engine: None,
            source: None,
            sink: None,
        }
    }

    pub fn engine(mut self, engine: EngineOptions) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Read input from a CSV file.
    pub fn source_file(mut self, path: impl Into<String>) -> Self {
        self.source = Some(Source::File { path: path.into() });
        self
    }

    /// Use rows embedded in the job.
    pub fn source_rows(mut self, rows: Vec<ValueMap>) -> Self {
        self.source = Some(Source::Inline { rows });
        self
    }

    /// Write output to a CSV file.
    pub fn sink_file(mut self, path: impl Into<String>) -> Self {
        self.sink = Some(Sink::File { path: path.into() });
        self
    }

    /// Parse a job from bytes, detecting the format from `path`.
    ///
    /// Falls back to YAML when the path is absent or has no known extension.
    pub fn from_bytes(data: &[u8], path: Option<&str>) -> Result<Self, JobError> {
        let format = path.and_then(detect_format).unwrap_or("yaml");
        Self::from_bytes_format(data, format)
    }

    /// Parse a job from bytes with an explicit format.
    pub fn from_bytes_format(data: &[u8], format: &str) -> Result<Self, JobError> {
        match format {
            "json" => serde_json::from_slice(data).map_err(|e| JobError::Parse(e.to_string())),
            "yaml" | "yml" => {
                serde_yaml::from_slice(data).map_err(|e| JobError::Parse(e.to_string()))
            }
            "toml" => {
                let s = std::str::from_utf8(data)
                    .map_err(|e| JobError::Parse(format!("invalid UTF-8: {e}")))?;
                toml::from_str(s).map_err(|e| JobError::Parse(e.to_string()))
            }
            _ => Err(JobError::UnsupportedFormat(format.to_string())),
        }
    }

    /// Serialize the job.
    pub fn to_bytes(&self, format: &str) -> Result<Vec<u8>, JobError> {
        match format {
            "json" => serde_json::to_vec_pretty(self).map_err(|e| JobError::Parse(e.to_string())),
            "yaml" | "yml" => serde_yaml::to_string(self)
                .map(String::into_bytes)
                .map_err(|e| JobError::Parse(e.to_string())),
            "toml" => toml::to_string_pretty(self)
                .map(String::into_bytes)
                .map_err(|e| JobError::Parse(e.to_string())),
            _ => Err(JobError::UnsupportedFormat(format.to_string())),
        }
    }
}

/// Errors related to job files.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("failed to parse job: {0}")]
    Parse(String),

    #[error("unsupported job format: {0}")]
    UnsupportedFormat(String),
}

/// Detect a job format from a file extension.
fn detect_format(path: &str) -> Option<&'static str> {
    let (_, ext) = path.rsplit_once('.')?;
    match ext.to_lowercase().as_str() {
        "json" => Some("json"),
        "yaml" | "yml" => Some("yaml"),
        "toml" => Some("toml"),
        _ => None,
    }
}
