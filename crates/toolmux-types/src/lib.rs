//! Shared tool contract and error hierarchy for toolmux.

pub mod error;
pub mod tool;

pub use error::{ConfigError, ToolError};
pub use tool::*;
