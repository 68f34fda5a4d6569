// Public modules
pub mod chat;
pub mod client;
pub mod client_logger;
pub mod config;
pub mod error;
pub mod registry;
pub mod session;
pub mod sse;
pub mod store;
pub mod types;
pub mod utils;

mod observability;

// Re-exports
pub use client::{Completion, CompletionClient};
pub use client_logger::ClientLogger;
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use observability::register_biometrics;
pub use registry::{ModeRegistry, ModelRegistry};
pub use session::Session;
pub use store::SessionStore;
pub use types::*;
