//! Project files: a pretty-printed flat JSON array of shape records.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;

use crate::Shape;

/// Errors that can occur while reading or writing a project file.
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    /// The document is valid JSON but not an array of shapes.
    #[error("Invalid project file")]
    InvalidProject,
    /// JSON parse or shape decode failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// An I/O error occurred.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Encode shapes as a project document.
///
/// # Errors
///
/// Returns [`ProjectError::Serialization`] if a shape fails to serialize.
pub fn serialize_project(shapes: &[Shape]) -> Result<String, ProjectError> {
    Ok(serde_json::to_string_pretty(shapes)?)
}

/// Decode a project document.
///
/// # Errors
///
/// Returns [`ProjectError::InvalidProject`] if the top-level value is not an
/// array, or [`ProjectError::Serialization`] if the JSON or a record is malformed.
pub fn parse_project(contents: &str) -> Result<Vec<Shape>, ProjectError> {
    let value: Value = serde_json::from_str(contents)?;
    let Value::Array(records) = value else {
        return Err(ProjectError::InvalidProject);
    };
    records
        .into_iter()
        .map(|record| serde_json::from_value(record).map_err(ProjectError::from))
        .collect()
}

/// Write shapes to `path`.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub fn save_project(path: impl AsRef<Path>, shapes: &[Shape]) -> Result<(), ProjectError> {
    let path = path.as_ref();
    let json = serialize_project(shapes)?;
    std::fs::write(path, json)?;
    tracing::debug!("Saved {} shapes to {}", shapes.len(), path.display());
    Ok(())
}

/// Read shapes from `path`.
///
/// # Errors
///
/// Returns an error if the file can't be read or isn't a valid project.
pub fn load_project(path: impl AsRef<Path>) -> Result<Vec<Shape>, ProjectError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)?;
    let shapes = parse_project(&contents)?;
    tracing::debug!("Loaded {} shapes from {}", shapes.len(), path.display());
    Ok(shapes)
}

/// Platform default project directory, e.g. `~/.local/share/easel/projects`.
///
/// Returns `None` if no home directory can be determined.
#[must_use]
pub fn default_projects_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "easel").map(|dirs| dirs.data_dir().join("projects"))
}

/// Suggested file name for a new project, e.g. `project-1700000000000.json`.
#[must_use]
pub fn default_project_filename() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    format!("project-{millis}.json")
}
