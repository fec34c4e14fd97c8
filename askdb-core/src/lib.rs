pub mod config;
pub mod error;
pub mod extract;
pub mod models;

pub use config::AskdbConfig;
pub use error::AskdbError;
pub use models::conversation::{ConversationEntry, ConversationLog};
pub use models::provider::Provider;
