//! Output rendering for the chat application.
//!
//! This module provides a trait-based rendering abstraction that allows
//! for different output styles. The default implementation uses ANSI
//! escape codes and `[+]`/`[-]`/`[!]` status prefixes.

use std::io::{self, Stdout, Write};
use std::time::Duration;

use crate::types::{Message, Role};

/// Longest message body shown by the history listing.
pub const HISTORY_PREVIEW_CHARS: usize = 200;

/// ANSI escape code for dim text (used for timings).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for cyan text (used for the assistant label).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for yellow text (used for warnings).
const ANSI_YELLOW: &str = "\x1b[33m";

/// ANSI escape code for green text (used for confirmations).
const ANSI_GREEN: &str = "\x1b[32m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// ANSI escape code for magenta text (used for the user label).
const ANSI_MAGENTA: &str = "\x1b[35m";

/// Trait for rendering chat output.
///
/// This abstraction allows for different rendering strategies:
/// - Plain text with ANSI styling
/// - Plain text without styling (for piping/redirecting)
pub trait Renderer: Send {
    /// Called before the first fragment of a reply.
    fn start_response(&mut self, model: &str);

    /// Print a chunk of reply text.
    ///
    /// This is called incrementally as fragments are streamed.
    fn print_text(&mut self, text: &str);

    /// Called when a response is complete.
    ///
    /// Used to ensure proper newlines and cleanup after streaming.
    fn finish_response(&mut self, elapsed: Duration);

    /// Print a complete reply from a blocking exchange.
    fn print_reply(&mut self, model: &str, text: &str, elapsed: Duration) {
        self.start_response(model);
        self.print_text(text);
        self.finish_response(elapsed);
    }

    /// Print one history entry.
    fn print_message(&mut self, message: &Message);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print a warning that does not stop the session.
    fn print_warning(&mut self, warning: &str);

    /// Print a confirmation of a completed action.
    fn print_success(&mut self, message: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);

    /// Clear the terminal.
    fn clear_screen(&mut self);

    /// Called when the stream is interrupted by the user.
    fn print_interrupted(&mut self);
}

/// Plain text renderer with optional ANSI styling.
///
/// This renderer outputs text directly to stdout with optional
/// ANSI escape codes for labels and status lines.
pub struct PlainTextRenderer {
    stdout: Stdout,
    use_color: bool,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self {
            stdout: io::stdout(),
            use_color,
        }
    }

    /// Flushes stdout to ensure immediate display of streamed content.
    fn flush(&mut self) {
        let _ = self.stdout.flush();
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if self.use_color {
            format!("{color}{text}{ANSI_RESET}")
        } else {
            text.to_string()
        }
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for PlainTextRenderer {
    fn start_response(&mut self, model: &str) {
        print!("\n{} ", self.paint(ANSI_CYAN, &format!("[{model}]")));
        self.flush();
    }

    fn print_text(&mut self, text: &str) {
        print!("{text}");
        self.flush();
    }

    fn finish_response(&mut self, elapsed: Duration) {
        println!();
        let timing = format!("[response time: {:.2}s]", elapsed.as_secs_f64());
        println!("{}", self.paint(ANSI_DIM, &timing));
        self.flush();
    }

    fn print_message(&mut self, message: &Message) {
        let label = match message.role {
            Role::User => self.paint(ANSI_MAGENTA, "user"),
            Role::Assistant => self.paint(ANSI_CYAN, "assistant"),
            Role::System => self.paint(ANSI_DIM, "system"),
        };
        println!(
            "{label}: {}",
            truncate_for_display(&message.content, HISTORY_PREVIEW_CHARS)
        );
    }

    fn print_error(&mut self, error: &str) {
        eprintln!("{}", self.paint(ANSI_RED, &format!("[-] {error}")));
    }

    fn print_warning(&mut self, warning: &str) {
        eprintln!("{}", self.paint(ANSI_YELLOW, &format!("[!] {warning}")));
    }

    fn print_success(&mut self, message: &str) {
        println!("{}", self.paint(ANSI_GREEN, &format!("[+] {message}")));
    }

    fn print_info(&mut self, info: &str) {
        println!("{info}");
    }

    fn clear_screen(&mut self) {
        if self.use_color {
            print!("\x1b[2J\x1b[H");
        } else {
            println!();
        }
        self.flush();
    }

    fn print_interrupted(&mut self) {
        println!("\n{}", self.paint(ANSI_YELLOW, "[interrupted]"));
        self.flush();
    }
}

/// Shortens `content` to at most `max_chars` characters, marking the cut with `...`.
pub fn truncate_for_display(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renderer_default_has_color() {
        let renderer = PlainTextRenderer::new();
        assert!(renderer.use_color);
        assert_eq!(renderer.paint(ANSI_RED, "x"), "\x1b[31mx\x1b[0m");
    }

    #[test]
    fn renderer_without_color() {
        let renderer = PlainTextRenderer::with_color(false);
        assert!(!renderer.use_color);
        assert_eq!(renderer.paint(ANSI_RED, "x"), "x");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_for_display("short", 200), "short");
        assert_eq!(truncate_for_display("abcdef", 3), "abc...");
        assert_eq!(truncate_for_display("héllo", 2), "hé...");
        let long = "x".repeat(250);
        assert_eq!(truncate_for_display(&long, HISTORY_PREVIEW_CHARS).len(), 203);
    }
}
