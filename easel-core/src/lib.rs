//! # Easel Core
//!
//! Editor model shared by the Easel host and its bridge.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                 easel-core                  │
//! ├─────────────────────────────────────────────┤
//! │  Document        │  Settings                │
//! │  - Shapes        │  - Service credentials   │
//! │  - Selection     │  - JSON settings store   │
//! │  - Stage         │  - Redacted secrets      │
//! ├─────────────────────────────────────────────┤
//! │  Project files (flat JSON array of shapes)  │
//! └─────────────────────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod document;
pub mod error;
pub mod project;
pub mod secret;
pub mod settings;
pub mod shape;

pub use document::{Document, StageConfig};
pub use error::{CoreError, CoreResult};
pub use project::{
    default_project_filename, default_projects_dir, load_project, parse_project, save_project,
    serialize_project, ProjectError,
};
pub use secret::Secret;
pub use settings::{Settings, SettingsError, SettingsStore, SETTINGS_FILE};
pub use shape::{ImageSource, Shape, ShapeId, ShapeKind, ShapePatch};
