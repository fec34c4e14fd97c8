pub mod conversation;
pub mod provider;
