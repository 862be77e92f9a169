pub mod config;
pub mod error;
pub mod types;

pub use config::{AppConfig, FileConfig, ProviderConfig, ProviderKind};
pub use error::{OnsideError, OnsideResult};
pub use types::*;
