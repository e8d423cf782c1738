use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use hamro_core::models::AVAILABLE_MODELS;
use hamro_core::{load_attachments, resolve_api_key, ChatSession, Config};
use tracing::{info, warn};

mod app;
mod handler;
mod logging;
mod markdown;
mod tui;
mod ui;

use app::App;
use tui::EventHandler;

#[derive(Parser)]
#[command(name = "hamro")]
#[command(version, about = "Chat with Gemini from your terminal, Notion style")]
struct Cli {
    /// Model id to use instead of the configured default
    #[arg(short, long, global = true, env = "HAMRO_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a single question and print the reply
    Ask {
        /// Your question
        prompt: String,
        /// Files or folders to attach
        #[arg(short, long = "file")]
        files: Vec<PathBuf>,
    },
    /// List available models
    Models,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None => run_tui(cli.model).await,
        Some(Commands::Ask { prompt, files }) => ask(&prompt, &files, cli.model).await,
        Some(Commands::Models) => list_models(),
    }
}

fn load_config() -> (Config, Option<PathBuf>) {
    let path = match Config::get_config_path() {
        Ok(path) => path,
        Err(e) => {
            warn!(error = %e, "no config directory, using defaults");
            return (Config::new(), None);
        }
    };

    match Config::load_from(&path) {
        Ok(config) => (config, Some(path)),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not read config, using defaults");
            (Config::new(), Some(path))
        }
    }
}

async fn run_tui(model: Option<String>) -> Result<()> {
    match logging::init_file_logging() {
        Ok(path) => info!(path = %path.display(), "logging to file"),
        Err(e) => eprintln!("Logging disabled: {}", e),
    }

    let (config, config_path) = load_config();
    let mut app = App::new(config, config_path)?;
    if let Some(model) = model {
        app.selected_model = model;
    }

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();

    let result = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;

            match events.next().await {
                Some(event) => handler::handle_event(&mut app, event),
                None => break,
            }
            app.poll_tasks().await;
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    tui::restore()?;
    result
}

async fn ask(prompt: &str, files: &[PathBuf], model: Option<String>) -> Result<()> {
    logging::init_stderr_logging();

    let (config, _) = load_config();
    let Some((api_key, source)) = resolve_api_key(&config) else {
        bail!("No Gemini API key found. Set GEMINI_API_KEY or run `hamro` and press K to enter one.");
    };
    info!(source = source.as_str(), "using API key");

    let mut session = ChatSession::from_config(&config, &api_key)?;
    let model = model.unwrap_or_else(|| config.model());

    let report = load_attachments(files).await;
    for skipped in &report.skipped {
        eprintln!("Skipped {}: {}", skipped.name, skipped.reason);
    }

    match session.send_message(prompt, &model, &report.attachments).await {
        Ok(reply) => {
            println!("{}", reply);
            Ok(())
        }
        Err(e) => bail!("{} ({})", e.user_message(), e),
    }
}

fn list_models() -> Result<()> {
    let (config, _) = load_config();
    let current = config.model();

    println!("Available models:\n");
    for model in AVAILABLE_MODELS {
        let marker = if model.id == current { "*" } else { " " };
        println!("{} {:<24} {:<18} {}", marker, model.id, model.display_name, model.description);
    }

    println!();
    println!("API key: {}", key_status(&config));

    Ok(())
}

fn key_status(config: &Config) -> &'static str {
    match resolve_api_key(config) {
        Some(_) => "found",
        None => "missing (set GEMINI_API_KEY)",
    }
}
