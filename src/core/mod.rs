pub mod error;
pub mod names;

pub use error::{AnalyzerError, Result};
pub use names::ServerRole;
