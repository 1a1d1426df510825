mod config;
mod environment;
mod error;

pub(crate) use config::{optional_var, required_var};
pub use config::{AppConfig, ConfigError, DEFAULT_PORT};
pub use environment::Environment;
pub use error::{ApiErrorResponse, AppError};
