//! Errors emitted by the DAT driver are the engine's errors

pub use arkive_core::error::{ConversionError, Error, FileNotFoundError, Result};
