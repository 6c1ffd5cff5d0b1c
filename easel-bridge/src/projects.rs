//! Project files kept in one directory, addressed by bare file name.

use std::path::{Path, PathBuf};

use easel_core::{default_project_filename, load_project, save_project, ProjectError, Shape};

const PROJECT_EXTENSION: &str = ".json";

/// Errors from the project directory.
#[derive(Debug, thiserror::Error)]
pub enum ProjectDirError {
    /// The name is empty or contains a path component.
    #[error("Invalid project name: {0}")]
    InvalidName(String),
    /// Reading or writing the file failed.
    #[error(transparent)]
    Project(#[from] ProjectError),
    /// Listing the directory failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Directory holding project files.
#[derive(Debug, Clone)]
pub struct ProjectDir {
    root: PathBuf,
}

impl ProjectDir {
    /// Use `root` as the project directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory path.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a bare name, adding `.json` when missing.
    fn resolve(&self, name: &str) -> Result<(String, PathBuf), ProjectDirError> {
        let trimmed = name.trim();
        let is_plain = !trimmed.is_empty()
            && !trimmed.starts_with('.')
            && !trimmed.contains(['/', '\\', '\0']);
        if !is_plain {
            return Err(ProjectDirError::InvalidName(name.to_string()));
        }
        let file_name = if trimmed.ends_with(PROJECT_EXTENSION) {
            trimmed.to_string()
        } else {
            format!("{trimmed}{PROJECT_EXTENSION}")
        };
        let path = self.root.join(&file_name);
        Ok((file_name, path))
    }

    /// Save shapes, returning the file name used.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid name or a failed write.
    pub fn save(&self, name: Option<&str>, shapes: &[Shape]) -> Result<String, ProjectDirError> {
        let name = name.map_or_else(default_project_filename, str::to_string);
        let (file_name, path) = self.resolve(&name)?;
        std::fs::create_dir_all(&self.root)?;
        save_project(&path, shapes)?;
        Ok(file_name)
    }

    /// Load shapes by name.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid name, a missing file or a file that
    /// is not a project.
    pub fn load(&self, name: &str) -> Result<Vec<Shape>, ProjectDirError> {
        let (_, path) = self.resolve(name)?;
        Ok(load_project(path)?)
    }

    /// Project file names, sorted. A missing directory lists as empty.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectDirError::Io`] if the directory cannot be read.
    pub fn list(&self) -> Result<Vec<String>, ProjectDirError> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if name.ends_with(PROJECT_EXTENSION) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}
