pub mod exec;
pub mod http;
