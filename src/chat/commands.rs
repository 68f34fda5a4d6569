//! Command parsing for the chat shell.
//!
//! Commands are recognized with or without a leading `/`.  Without the slash,
//! a word only counts as a command when it could not plausibly be the start of
//! a chat message: commands that take no argument must stand alone, so that
//! "clear the cache for me" is still sent to the model.

use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Helper};

use crate::registry::{CUSTOM_MODEL_ALIAS, CUSTOM_MODEL_KEY};

/// A parsed chat command.
///
/// These commands control the shell and are not sent to the endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    /// Display help information.
    Help,

    /// Clear the screen.
    Clear,

    /// Exit the chat application.
    Quit,

    /// Change the model; `None` lists the registry.
    Model(Option<String>),

    /// Change the mode; `None` lists the registered modes.
    Mode(Option<String>),

    /// Show the last `n` messages, or the whole history.
    History(Option<usize>),

    /// Save the session immediately.
    Save,

    /// Load a stored session; `None` loads the latest.
    Load(Option<String>),

    /// Start a new session.
    New,

    /// Toggle streaming responses.
    Stream,

    /// Set the sampling temperature.
    Temperature(f32),

    /// Display session information.
    Info,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Command words offered for completion, in help order.
pub const COMMANDS: &[&str] = &[
    "help",
    "clear",
    "exit",
    "quit",
    "model",
    "mode",
    "history",
    "save",
    "load",
    "new",
    "stream",
    "temperature",
    "info",
];

/// Parses user input for commands.
///
/// Returns `Some(ChatCommand)` if the input is a command, or `None` if it
/// should be sent as a chat message.
///
/// # Examples
///
/// ```
/// # use modechat::chat::parse_command;
/// assert!(parse_command("/quit").is_some());
/// assert!(parse_command("exit").is_some());
/// assert!(parse_command("mode coder").is_some());
/// assert!(parse_command("exit the loop early in this function").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();
    let (slashed, body) = match input.strip_prefix('/') {
        Some(body) => (true, body),
        None => (false, input),
    };

    let mut parts = body.splitn(2, char::is_whitespace);
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "help" | "?" if argument.is_none() => ChatCommand::Help,
        "clear" | "cls" if argument.is_none() => ChatCommand::Clear,
        "exit" | "quit" | "q" if argument.is_none() => ChatCommand::Quit,
        "save" if argument.is_none() => ChatCommand::Save,
        "new" | "reset" if argument.is_none() => ChatCommand::New,
        "stream" if argument.is_none() => ChatCommand::Stream,
        "info" | "status" if argument.is_none() => ChatCommand::Info,
        "model" => match argument {
            Some(arg) if !slashed && !is_model_argument(arg) => return None,
            arg => ChatCommand::Model(arg.map(str::to_string)),
        },
        "mode" => match argument {
            Some(arg) if !slashed && arg.contains(char::is_whitespace) => return None,
            arg => ChatCommand::Mode(arg.map(|s| s.to_lowercase())),
        },
        "history" => match argument {
            None => ChatCommand::History(None),
            Some(arg) => match arg.parse::<usize>() {
                Ok(n) => ChatCommand::History(Some(n)),
                Err(_) if !slashed => return None,
                Err(_) => ChatCommand::Invalid("history expects a message count".to_string()),
            },
        },
        "load" => match argument {
            Some(arg) if !slashed && arg.contains(char::is_whitespace) => return None,
            arg => ChatCommand::Load(arg.map(str::to_string)),
        },
        "temperature" | "temp" => match argument {
            Some(arg) => match parse_f32_in_range(arg, 0.0, 1.0) {
                Ok(value) => ChatCommand::Temperature(value),
                Err(_) if !slashed => return None,
                Err(err) => ChatCommand::Invalid(format!("temperature {err}")),
            },
            None => ChatCommand::Invalid("temperature requires a value".to_string()),
        },
        _ if slashed => ChatCommand::Invalid(format!("Unknown command: /{command}")),
        _ => return None,
    };

    Some(result)
}

// A single word, or the custom sentinel followed by one identifier.
fn is_model_argument(arg: &str) -> bool {
    let words: Vec<&str> = arg.split_whitespace().collect();
    match words.as_slice() {
        [_] => true,
        [sentinel, _] => {
            *sentinel == CUSTOM_MODEL_KEY || sentinel.eq_ignore_ascii_case(CUSTOM_MODEL_ALIAS)
        }
        _ => false,
    }
}

fn parse_f32_in_range(value: &str, min: f32, max: f32) -> Result<f32, String> {
    let parsed: f32 = value
        .parse()
        .map_err(|_| format!("expects a value between {min} and {max}"))?;
    if parsed.is_finite() && parsed >= min && parsed <= max {
        Ok(parsed)
    } else {
        Err(format!("expects a value between {min} and {max}"))
    }
}

/// Command words starting with `prefix`, ignoring a leading `/`.
pub fn complete_command(prefix: &str) -> Vec<&'static str> {
    let prefix = prefix.strip_prefix('/').unwrap_or(prefix).to_lowercase();
    COMMANDS
        .iter()
        .copied()
        .filter(|command| command.starts_with(&prefix))
        .collect()
}

/// Rustyline helper completing command words at the start of the line.
#[derive(Debug, Default)]
pub struct CommandCompleter;

impl Completer for CommandCompleter {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let head = &line[..pos];
        if head.contains(char::is_whitespace) {
            return Ok((pos, Vec::new()));
        }
        let slash = if head.starts_with('/') { "/" } else { "" };
        let candidates = complete_command(head)
            .into_iter()
            .map(|command| Pair {
                display: command.to_string(),
                replacement: format!("{slash}{command}"),
            })
            .collect();
        Ok((0, candidates))
    }
}

impl Hinter for CommandCompleter {
    type Hint = String;
}

impl Highlighter for CommandCompleter {}

impl Validator for CommandCompleter {}

impl Helper for CommandCompleter {}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands (a leading / is optional):
  help                   Show this help message
  clear                  Clear the screen
  exit, quit             Exit the chat
  model [key|id]         List models, or switch (e.g. model 2, model custom vendor/name)
  mode [name]            List modes, or switch (hacker, coder, general)
  history [n]            Show the conversation, or its last n messages
  save                   Save the session now
  load [id]              Load a saved session (default: the latest)
  new                    Start a new session
  stream                 Toggle streaming responses
  temperature <v>        Set temperature 0.0-1.0
  info                   Show session information"#
}
