//! Chat application module for interactive conversations.
//!
//! This module provides the REPL layer built on top of the completion client
//! and the session store. It supports:
//!
//! - Blocking or streaming replies
//! - Mode and model switching
//! - Session persistence with resume, save, load and new
//!
//! # Architecture
//!
//! The module is organized into several components:
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`conversation`]: The conversation controller
//! - [`commands`]: Shell command parsing and completion
//! - [`render`]: Terminal output

mod commands;
mod config;
mod conversation;
mod render;

pub use commands::{
    COMMANDS, ChatCommand, CommandCompleter, complete_command, help_text, parse_command,
};
pub use config::{ChatArgs, ChatArgsError, ChatConfig, DEFAULT_SESSIONS_DIR};
pub use conversation::{Conversation, Persistence, SessionInfo, StreamHandle, TurnReport};
pub use render::{HISTORY_PREVIEW_CHARS, PlainTextRenderer, Renderer, truncate_for_display};
