// Public modules
pub mod chat_request;
pub mod chat_response;
pub mod message;
pub mod stream_chunk;

// Re-exports
pub use chat_request::ChatRequest;
pub use chat_response::{ChatResponse, Choice, ChoiceMessage};
pub use message::{Message, Role};
pub use stream_chunk::{Delta, StreamChoice, StreamChunk};
