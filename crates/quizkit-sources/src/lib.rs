//! quizkit-sources — Collaborators for the quiz engine.
//!
//! Content sources (file, HTTP), manual-grade stores (memory, HTTP), a
//! file-backed draft store, the markup typesetter, and the configuration
//! that wires them together.

pub mod config;
pub mod error;
pub mod file;
pub mod http;
pub mod memory;
pub mod mock;
pub mod typeset;

pub use config::{load_config, load_config_from, ContentConfig, GradesConfig, QuizkitConfig};
pub use error::{CollaboratorError, SetupError};
pub use file::{FileContentSource, FileDraftStore};
pub use http::{HttpContentSource, HttpGradeStore};
pub use memory::MemoryGradeStore;
pub use typeset::MarkupTypesetter;
