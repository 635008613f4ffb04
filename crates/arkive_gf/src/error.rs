//! Errors come from the archive engine so textures share its taxonomy
pub use arkive_core::error::{ConversionError, Error, Result};
