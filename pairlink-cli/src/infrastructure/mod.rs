pub mod error;
pub mod observability;
pub mod session_runtime;

pub use error::{CliError, Result};
pub use observability::{LogConfig, LogGuard};
pub use session_runtime::SessionRuntime;
