pub mod completion;
pub mod config;
pub mod error;
pub mod types;

pub use completion::{CompletionReply, CompletionRequest, CompletionService, MockCompletionService};
pub use config::{ApiKey, ParlanceConfig};
pub use error::{ParlanceError, Result};
pub use types::*;
