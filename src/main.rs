use clap::{Parser, Subcommand};
use colored::*;
use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod app;
mod client;
mod config;
mod handler;
mod tui;
mod ui;

use app::App;
use client::ChatClient;
use config::Config;

#[derive(Parser)]
#[command(name = "medbot")]
#[command(about = "Terminal chat client for the medicine chatbot server")]
struct Cli {
    /// Chatbot server URL (overrides the config file)
    #[arg(short, long)]
    server: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a single question and print the reply
    Ask {
        /// Your question
        question: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load().unwrap_or_default();
    if let Some(server) = cli.server {
        config.server_url = Some(server);
    }

    match cli.command {
        Some(Commands::Ask { question }) => ask(&config, &question).await,
        None => run_tui(config).await,
    }
}

async fn ask(config: &Config, question: &str) -> Result<()> {
    let client = ChatClient::new(&config.endpoint());

    match client.send(question).await {
        Ok(reply) => {
            println!("{}", reply);
            Ok(())
        }
        Err(e) => {
            eprintln!("{}: {:#}", "Error querying the chatbot server".red(), e);
            eprintln!(
                "Make sure the server is running at {}",
                config.endpoint().bold()
            );
            std::process::exit(1);
        }
    }
}

async fn run_tui(config: Config) -> Result<()> {
    init_logging();

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new();
    let mut app = App::new(&config);

    let result = run_loop(&mut terminal, &mut events, &mut app).await;

    // Abort any in-flight request before handing the terminal back
    if let Some(task) = app.pending_reply.take() {
        task.abort();
    }
    tui::restore()?;
    result
}

async fn run_loop(
    terminal: &mut tui::Tui,
    events: &mut tui::EventHandler,
    app: &mut App,
) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        if let Some(event) = events.next().await {
            handler::handle_event(app, event)?;
        }

        // Complete the exchange once the spawned reply task has resolved
        if app.pending_reply.as_ref().is_some_and(|task| task.is_finished()) {
            if let Some(task) = app.pending_reply.take() {
                let outcome = match task.await {
                    Ok(result) => result,
                    Err(join_err) => Err(anyhow::anyhow!("reply task failed: {join_err}")),
                };
                app.finish_request(outcome);
            }
        }
    }
    Ok(())
}

/// Log to a file under the config dir; stdout and stderr belong to the TUI.
/// Logging is best-effort: failure to set it up never blocks the chat.
fn init_logging() {
    let Some(dir) = dirs::config_dir().map(|d| d.join("medbot")) else {
        return;
    };
    if std::fs::create_dir_all(&dir).is_err() {
        return;
    }
    let Ok(file) = std::fs::File::create(dir.join("medbot.log")) else {
        return;
    };

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "medbot=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false),
        )
        .try_init();
}
