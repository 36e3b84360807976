//! Retake Core — error taxonomy and configuration.

pub mod config;
pub mod error;

pub use config::{EmbeddingBackendKind, RetakeConfig};
pub use error::{Error, Result};
