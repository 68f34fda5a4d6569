//! Interactive terminal chat against an OpenAI-compatible completions endpoint.
//!
//! # Usage
//!
//! ```bash
//! # The credential comes from the environment
//! export MODECHAT_API_KEY=sk-or-...
//!
//! # Resume the latest session with default settings
//! modechat
//!
//! # Start fresh in coder mode with GPT-4, streaming replies
//! modechat --fresh --mode coder --model 2 --stream
//!
//! # Talk to a local server and keep sessions elsewhere
//! modechat --endpoint http://localhost:8080/v1/chat/completions --sessions-dir ~/.modechat
//! ```
//!
//! # Commands
//!
//! Type `help` while chatting for the full list; `mode`, `model`, `history`,
//! `new`, `save`, `load`, `stream` and `exit` are the common ones.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use arrrg::CommandLine;
use rustyline::Editor;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use modechat::chat::{
    ChatArgs, ChatCommand, ChatConfig, CommandCompleter, Conversation, Persistence,
    PlainTextRenderer, Renderer, TurnReport, help_text, parse_command,
};
use modechat::registry::{CUSTOM_MODEL_KEY, DEFAULT_MODEL};
use modechat::{ClientConfig, CompletionClient, Session, SessionStore};

/// Environment variable holding the tracing filter.
const LOG_ENV: &str = "MODECHAT_LOG";

/// Main entry point for the modechat application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let (args, _) = ChatArgs::from_command_line_relaxed("modechat [OPTIONS]");
    let config = match ChatConfig::try_from(args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("[-] {err}");
            std::process::exit(2);
        }
    };
    let mut renderer = PlainTextRenderer::with_color(config.use_color);

    let client = match client_config(&config).and_then(CompletionClient::new) {
        Ok(client) => client,
        Err(err) => {
            renderer.print_error(&err.to_string());
            std::process::exit(1);
        }
    };

    let store = SessionStore::new(&config.sessions_dir);
    let resumed = if config.resume {
        store.load_latest()
    } else {
        None
    };
    let is_resumed = resumed.is_some();
    let session = resumed.unwrap_or_else(|| Session::new(DEFAULT_MODEL, config.initial_mode()));
    let mut conversation = Conversation::new(client, store, session);
    conversation.set_temperature(config.temperature)?;
    if let Some(model) = &config.model {
        report_change(&mut renderer, conversation.set_model(model), "model");
    }
    if let Some(mode) = &config.mode {
        report_change(&mut renderer, conversation.set_mode(mode), "mode");
    }
    let mut streaming = config.streaming;

    let mut rl: Editor<CommandCompleter, DefaultHistory> = Editor::new()?;
    rl.set_helper(Some(CommandCompleter));

    // Flag for interrupt handling during streaming
    let interrupted = Arc::new(AtomicBool::new(false));

    // Set up Ctrl+C handler
    let interrupted_clone = interrupted.clone();
    ctrlc::set_handler(move || {
        interrupted_clone.store(true, Ordering::Relaxed);
    })?;

    let info = conversation.info();
    println!("modechat (model: {}, mode: {})", info.model, info.mode);
    if is_resumed {
        renderer.print_success(&format!(
            "Resumed session {} ({} messages)",
            info.id, info.message_count
        ));
    }
    println!("Type help for commands, exit to quit\n");

    loop {
        // Reset interrupt flag before each input
        interrupted.store(false, Ordering::Relaxed);

        let readline = rl.readline(&format!("[{}] > ", conversation.mode()));

        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                if let Some(cmd) = parse_command(line) {
                    match cmd {
                        ChatCommand::Quit => {
                            println!("Goodbye!");
                            break;
                        }
                        ChatCommand::Help => {
                            for line in help_text().lines() {
                                println!("    {line}");
                            }
                        }
                        ChatCommand::Clear => renderer.clear_screen(),
                        ChatCommand::Model(None) => print_models(&conversation),
                        ChatCommand::Model(Some(model)) => {
                            let result = conversation.set_model(&model);
                            if report_change(&mut renderer, result, "model") {
                                let model = conversation.model();
                                renderer.print_success(&format!("Model set to {model}"));
                            }
                        }
                        ChatCommand::Mode(None) => print_modes(&conversation),
                        ChatCommand::Mode(Some(mode)) => {
                            let result = conversation.set_mode(&mode);
                            if report_change(&mut renderer, result, "mode") {
                                renderer.print_success(&format!("Mode set to {mode}"));
                            }
                        }
                        ChatCommand::History(last_n) => {
                            let messages = conversation.history_window(last_n);
                            if messages.is_empty() {
                                renderer.print_info("No messages yet.");
                            }
                            for message in &messages {
                                renderer.print_message(message);
                            }
                        }
                        ChatCommand::Save => match conversation.save() {
                            Ok(path) => renderer
                                .print_success(&format!("Session saved to {}", path.display())),
                            Err(err) => {
                                renderer.print_error(&format!("Failed to save session: {err}"))
                            }
                        },
                        ChatCommand::Load(id) => match conversation.load(id.as_deref()) {
                            Ok(()) => {
                                let info = conversation.info();
                                renderer.print_success(&format!(
                                    "Loaded session {} ({} messages, model {}, mode {})",
                                    info.id, info.message_count, info.model, info.mode
                                ));
                            }
                            Err(err) => {
                                renderer.print_error(&format!("Failed to load session: {err}"))
                            }
                        },
                        ChatCommand::New => {
                            let result = conversation.reset();
                            if report_change(&mut renderer, result, "session") {
                                renderer.print_success(&format!(
                                    "Started new session {}",
                                    conversation.info().id
                                ));
                            }
                        }
                        ChatCommand::Stream => {
                            streaming = !streaming;
                            renderer.print_info(&format!(
                                "Streaming {}",
                                if streaming { "enabled" } else { "disabled" }
                            ));
                        }
                        ChatCommand::Temperature(value) => {
                            match conversation.set_temperature(value) {
                                Ok(()) => renderer
                                    .print_success(&format!("Temperature set to {value:.2}")),
                                Err(err) => renderer.print_error(&err.to_string()),
                            }
                        }
                        ChatCommand::Info => print_info(&conversation, streaming),
                        ChatCommand::Invalid(message) => renderer.print_error(&message),
                    }
                    continue;
                }

                let report = if streaming {
                    stream_turn(&mut conversation, &mut renderer, line, &interrupted).await
                } else {
                    let model = conversation.model();
                    conversation.ask(line).await.inspect(|report| {
                        renderer.print_reply(&model, &report.reply, report.elapsed);
                    })
                };
                match report {
                    Ok(report) => {
                        if let Some(err) = report.persistence.error() {
                            renderer.print_warning(&format!("Could not save session: {err}"));
                        }
                    }
                    Err(err) => renderer.print_error(&err.to_string()),
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at prompt - soft interrupt
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                // Ctrl+D - exit
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {err}"));
                break;
            }
        }
    }

    conversation.cancel_stream();
    Ok(())
}

fn client_config(config: &ChatConfig) -> modechat::Result<ClientConfig> {
    let client_config = ClientConfig::from_env()?;
    match &config.endpoint {
        Some(endpoint) => client_config.with_endpoint(endpoint),
        None => Ok(client_config),
    }
}

/// Streams one exchange, printing fragments as they arrive; Ctrl+C cancels it.
async fn stream_turn(
    conversation: &mut Conversation,
    renderer: &mut PlainTextRenderer,
    line: &str,
    interrupted: &AtomicBool,
) -> modechat::Result<TurnReport> {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let mut handle = conversation.ask_streaming(line, move |fragment| {
        let _ = tx.send(fragment.to_string());
    })?;
    renderer.start_response(&conversation.model());

    let mut tick = tokio::time::interval(Duration::from_millis(50));
    let mut was_interrupted = false;
    let report = loop {
        tokio::select! {
            report = &mut handle => break report?,
            Some(fragment) = rx.recv() => renderer.print_text(&fragment),
            _ = tick.tick() => {
                if !was_interrupted && interrupted.swap(false, Ordering::Relaxed) {
                    handle.cancel();
                    was_interrupted = true;
                }
            }
        }
    };
    while let Ok(fragment) = rx.try_recv() {
        renderer.print_text(&fragment);
    }
    if was_interrupted {
        renderer.print_interrupted();
    }
    renderer.finish_response(report.elapsed);
    Ok(report)
}

/// Prints the outcome of a mutating command; returns true if the change applied.
fn report_change(
    renderer: &mut PlainTextRenderer,
    result: modechat::Result<Persistence>,
    what: &str,
) -> bool {
    match result {
        Ok(persistence) => {
            if let Some(err) = persistence.error() {
                renderer.print_warning(&format!("Could not save session: {err}"));
            }
            true
        }
        Err(err) => {
            renderer.print_error(&format!("Could not change {what}: {err}"));
            false
        }
    }
}

fn print_models(conversation: &Conversation) {
    let current = conversation.model();
    println!("    Models:");
    for (key, model) in conversation.models().entries() {
        let marker = if model == current { "*" } else { " " };
        println!("    {marker} {key}. {model}");
    }
    println!("      {CUSTOM_MODEL_KEY}. custom <identifier>");
    if conversation.models().entries().all(|(_, model)| model != current) {
        println!("    * {current}");
    }
}

fn print_modes(conversation: &Conversation) {
    let current = conversation.mode();
    println!("    Modes:");
    for name in conversation.modes().names() {
        let marker = if name == current { "*" } else { " " };
        println!("    {marker} {name}");
    }
}

fn print_info(conversation: &Conversation, streaming: bool) {
    let info = conversation.info();
    println!("    Session Information:");
    println!("      Session: {}", info.id);
    println!("      Model: {}", info.model);
    println!("      Mode: {}", info.mode);
    println!("      Messages: {}", info.message_count);
    println!("      Temperature: {:.2}", info.temperature);
    println!(
        "      Streaming: {}",
        if streaming { "enabled" } else { "disabled" }
    );
    println!("      File: {}", info.path.display());
}
