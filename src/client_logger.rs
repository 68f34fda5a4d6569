//! Logging trait for completion client operations.
//!
//! This module provides the [`ClientLogger`] trait that allows users to capture
//! and log all traffic passing through the [`CompletionClient`](crate::CompletionClient).

use crate::types::ChatRequest;

/// A trait for observing completion client traffic.
///
/// Implement this trait to capture and record all exchanges, including the
/// outgoing request, blocking reply bodies and individual streamed fragments.
///
/// # Example
///
/// ```rust,ignore
/// use modechat::{ChatRequest, ClientLogger};
/// use std::io::Write;
/// use std::sync::Mutex;
///
/// struct FileLogger {
///     file: Mutex<std::fs::File>,
/// }
///
/// impl ClientLogger for FileLogger {
///     fn log_request(&self, request: &ChatRequest) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "Request: {}", serde_json::to_string(request).unwrap()).unwrap();
///     }
///
///     fn log_response(&self, body: &str) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "Response: {body}").unwrap();
///     }
///
///     fn log_stream_fragment(&self, fragment: &str) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "Fragment: {fragment}").unwrap();
///     }
/// }
/// ```
pub trait ClientLogger: Send + Sync {
    /// Log a request just before it is sent.
    fn log_request(&self, request: &ChatRequest);

    /// Log the raw body of a successful blocking response.
    ///
    /// Called before the body is parsed, so malformed bodies are logged too.
    fn log_response(&self, body: &str);

    /// Log one content fragment received during a stream.
    fn log_stream_fragment(&self, fragment: &str);
}
