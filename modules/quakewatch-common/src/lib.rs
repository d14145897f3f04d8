pub mod config;
pub mod error;
pub mod file_config;
pub mod types;

pub use config::{Config, SmtpConfig};
pub use error::{QuakeError, QuakeResult};
pub use file_config::FileConfig;
pub use types::*;
