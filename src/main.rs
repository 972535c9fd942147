//! V3Di Slicer
//!
//! Terminal client for the V3Di segmentation service. Without a subcommand
//! it opens the terminal UI; subcommands call the service directly and
//! print JSON.

use std::error::Error;
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::{Parser, Subcommand};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use serde::Serialize;
use tokio::runtime::Runtime;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use v3di_slicer::application::{App, AppEvent, AppMode, Command, Dispatcher};
use v3di_slicer::domain::{ModelType, ROUTES};
use v3di_slicer::infrastructure::{ApiClient, ClientConfig, JobPoller};
use v3di_slicer::presentation::{render_ui, InputHandler};

/// How long the UI waits for a key before picking up background events.
const TICK: Duration = Duration::from_millis(100);

#[derive(Debug, Parser)]
#[command(name = "v3di-slicer", version, about = "Client for the V3Di segmentation service")]
struct Cli {
    /// Backend address, overriding configuration and environment
    #[arg(long, global = true)]
    backend_url: Option<String>,

    /// TOML or JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Check the backend health
    Health,
    /// Upload a DICOM file or zip archive
    Upload { file: PathBuf },
    /// Start a segmentation job for an uploaded study
    Segment {
        study_id: String,
        #[arg(long, default_value_t = ModelType::Teeth)]
        model: ModelType,
    },
    /// Show the status of a job
    Status { job_id: String },
    /// List jobs known to the backend
    Jobs,
    /// Poll a job until it completes or fails (Ctrl-C stops)
    Poll {
        job_id: String,
        #[arg(long)]
        interval_ms: Option<u64>,
    },
    /// Print the download URL of a job artifact
    Url { job_id: String, filename: String },
    /// Download a job artifact
    Download {
        job_id: String,
        filename: String,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// List the navigation routes of the terminal UI
    Routes,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ClientConfig::from_file(path)?,
        None => ClientConfig::from_env(),
    };
    if let Some(url) = cli.backend_url {
        config.base_url = url;
    }

    let runtime = Runtime::new()?;

    match cli.command {
        None => {
            init_logging(Some(config.log_file.as_path()))?;
            run_tui(config, &runtime)
        }
        Some(command) => {
            init_logging(None)?;
            runtime.block_on(run_command(command, config))
        }
    }
}

/// Logs go to stderr for one-shot commands and to a file under the terminal UI.
fn init_logging(log_file: Option<&Path>) -> io::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::stderr)
                .init();
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run_command(command: CliCommand, config: ClientConfig) -> Result<(), Box<dyn Error>> {
    let client = ApiClient::new(config)?;

    match command {
        CliCommand::Health => print_json(&client.health().await?),
        CliCommand::Upload { file } => {
            let result = client
                .upload_dicom_with_progress(&file, |percent| eprint!("\ruploading {percent:>3}%"))
                .await;
            eprintln!();
            print_json(&result?)
        }
        CliCommand::Segment { study_id, model } => print_json(&client.start_segmentation(&study_id, model).await?),
        CliCommand::Status { job_id } => print_json(&client.job_status(&job_id).await?),
        CliCommand::Jobs => print_json(&client.list_jobs().await?),
        CliCommand::Poll { job_id, interval_ms } => {
            let interval = interval_ms.map_or(client.config().poll_interval, Duration::from_millis);
            let cancel = CancellationToken::new();
            let trigger = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    trigger.cancel();
                }
            });

            let poller = JobPoller::new(Arc::new(client)).with_interval(interval);
            let record = poller
                .poll_until(&job_id, &cancel, |status| {
                    eprintln!(
                        "{:<11} {:>3}%  {}",
                        status.status,
                        status.progress,
                        status.message.as_deref().unwrap_or("")
                    );
                })
                .await?;
            print_json(&record)
        }
        CliCommand::Url { job_id, filename } => {
            println!("{}", client.stl_download_url(&job_id, &filename));
            Ok(())
        }
        CliCommand::Download { job_id, filename, output } => {
            let dest = output.unwrap_or_else(|| PathBuf::from(&filename));
            let bytes = client.download_stl(&job_id, &filename, &dest).await?;
            eprintln!("saved {} bytes to {}", bytes, dest.display());
            Ok(())
        }
        CliCommand::Routes => {
            for route in &ROUTES {
                println!("{:<15} {:<13} {:?}", route.path, route.name, route.view);
            }
            Ok(())
        }
    }
}

/// Sets up the terminal, runs the UI loop, and restores the terminal.
fn run_tui(config: ClientConfig, runtime: &Runtime) -> Result<(), Box<dyn Error>> {
    let client = ApiClient::new(config.clone())?;
    let (tx, rx) = mpsc::unbounded_channel();
    let dispatcher = Dispatcher::new(client, tx, runtime.handle().clone());

    info!(backend = config.base_str(), "Starting terminal UI");
    let mut app = App::new(config);
    dispatcher.dispatch(Command::CheckHealth);
    dispatcher.dispatch(Command::RefreshJobs);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app, &dispatcher, rx);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("{err:?}");
    }

    Ok(())
}

/// Main UI loop.
///
/// Redraws, applies events from background tasks, then waits up to one
/// tick for a key. Quits on `q` in normal mode or Ctrl-C.
fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    dispatcher: &Dispatcher,
    mut events: UnboundedReceiver<AppEvent>,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| render_ui(f, app))?;

        while let Ok(event) = events.try_recv() {
            if let Some(command) = app.handle_event(event) {
                dispatcher.dispatch(command);
            }
        }

        if !event::poll(TICK)? {
            continue;
        }

        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press {
                match key.code {
                    KeyCode::Char('q') if app.mode == AppMode::Normal => return Ok(()),
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return Ok(()),
                    _ => {
                        if let Some(command) = InputHandler::handle_key_event(app, key.code, key.modifiers) {
                            dispatcher.dispatch(command);
                        }
                    }
                }
            }
        }
    }
}
