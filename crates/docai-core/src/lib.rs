pub mod config;
pub mod error;

pub use config::{ApiConfig, DocAiConfig, GeneralConfig, RetryConfig};
pub use error::{DocAiError, Result};
