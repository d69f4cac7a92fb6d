/// Clipdrop terminal client.
///
/// Reads links and commands from stdin, drives the lifecycle state machine
/// against the Clipdrop API and keeps a local download history.
mod api_client;
mod commands;
mod lifecycle;
mod progress;
mod view;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{error, info, warn};

use clipdrop_shared::history::HistoryLedger;
use clipdrop_shared::locator;

use api_client::ApiClient;
use commands::Command;
use lifecycle::{Effect, Event, Session, Status};
use progress::ProgressTicker;

/// Owns the session and runs the effects the state machine asks for.
///
/// All transitions and ledger writes happen on the main loop; spawned tasks
/// only report back through the event channel.
struct Driver {
    session: Session,
    ledger: HistoryLedger,
    api: Arc<ApiClient>,
    events: UnboundedSender<Event>,
    ticker: Option<ProgressTicker>,
    download_dir: PathBuf,
    progress_interval: Duration,
}

impl Driver {
    /// Apply one event and run its effects. Returns true when the state changed.
    async fn dispatch(&mut self, event: Event) -> bool {
        let before = self.session.clone();
        let (next, effects) = lifecycle::step(std::mem::take(&mut self.session), event);
        self.session = next;
        for effect in effects {
            self.run(effect).await;
        }
        self.session != before
    }

    async fn run(&mut self, effect: Effect) {
        match effect {
            Effect::Resolve {
                ticket,
                url,
                collection_id,
            } => {
                let api = self.api.clone();
                let events = self.events.clone();
                tokio::spawn(async move {
                    let result = api
                        .video_info(&url, collection_id)
                        .await
                        .map_err(|e| e.to_string());
                    if let Err(message) = &result {
                        warn!("Resolution of {} failed: {}", url, message);
                    }
                    let _ = events.send(Event::Resolved { ticket, result });
                });
            }

            Effect::BeginTransfer {
                ticket,
                url,
                title,
                request,
            } => {
                let api = self.api.clone();
                let events = self.events.clone();
                let dir = self.download_dir.clone();
                tokio::spawn(async move {
                    let response = match api.open_download(&url, &request).await {
                        Ok(response) => response,
                        Err(e) => {
                            warn!("Download of {} refused: {}", url, e);
                            let _ = events.send(Event::TransferFailed { ticket, message: e.to_string() });
                            return;
                        }
                    };
                    let _ = events.send(Event::TransferAccepted { ticket });

                    let event = match api_client::save_download(response, &dir, &title, request.audio_only).await {
                        Ok(saved_to) => Event::TransferFinished { ticket, saved_to },
                        Err(e) => {
                            error!("Download of {} interrupted: {}", url, e);
                            Event::TransferFailed { ticket, message: e.to_string() }
                        }
                    };
                    let _ = events.send(event);
                });
            }

            Effect::StartProgress { ticket } => {
                self.ticker = Some(ProgressTicker::start(
                    ticket,
                    self.progress_interval,
                    self.events.clone(),
                ));
            }

            Effect::StopProgress => {
                self.ticker.take();
            }

            Effect::RecordHistory { info, format } => {
                let entry = self.ledger.record_completed(&info, format).await;
                info!("Recorded {} ({}) in history", entry.item_id, entry.format);
            }
        }
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Input(text) => self.show(Event::Input(text)).await,
            Command::Submit => {
                let waiting = self.session.transfer_in_flight()
                    && matches!(self.session.status, Status::Ready | Status::Complete);
                if waiting {
                    println!("Previous download still running, try again when it finishes");
                    return;
                }
                self.show(Event::Submit).await
            }
            Command::Format(format) => self.show(Event::SetFormat(format)).await,
            Command::Quality(choice) => {
                let wanted = choice.clone();
                self.show(Event::SelectQuality(choice)).await;
                if let (Some(wanted), None) = (wanted, &self.session.quality) {
                    println!("No quality option matches {}", wanted);
                }
            }
            Command::Clear => self.show(Event::Clear).await,
            Command::History => {
                for line in view::render_history(self.ledger.all(), Utc::now()) {
                    println!("{}", line);
                }
            }
            Command::ClearHistory => {
                self.ledger.clear().await;
                println!("History cleared");
            }
            Command::Open(position) => {
                if !self.session.status.accepts_submit() {
                    println!("Busy, try again when the current request finishes");
                    return;
                }
                let Some(url) = self.ledger.nth(position).map(|e| locator::canonical_url(&e.item_id)) else {
                    println!("No history entry {}", position);
                    return;
                };
                self.dispatch(Event::Clear).await;
                self.dispatch(Event::Input(url)).await;
                self.show(Event::Submit).await;
            }
            Command::Help => println!("{}", commands::HELP),
            Command::Quit => {}
        }
    }

    /// Dispatch and print the resulting screen.
    async fn show(&mut self, event: Event) {
        self.dispatch(event).await;
        self.print();
    }

    fn print(&self) {
        println!();
        for line in view::render(&self.session) {
            println!("{}", line);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env
    dotenvy::dotenv().ok();

    // Logs go to stderr, the screen owns stdout
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clipdrop_client=info,clipdrop_shared=info".into()),
        )
        .init();

    // Config
    let api_url = std::env::var("CLIPDROP_API_URL").unwrap_or_else(|_| "http://127.0.0.1:5000".to_string());
    let download_dir = std::env::var("DOWNLOAD_DIR").unwrap_or_else(|_| "./downloads".to_string());
    let progress_ms: u64 = std::env::var("PROGRESS_INTERVAL_MS")
        .unwrap_or_else(|_| "300".to_string())
        .parse()
        .unwrap_or(300);

    std::fs::create_dir_all(&download_dir)?;

    // Local store
    let database_path = std::env::var("DATABASE_PATH").unwrap_or_else(|_| "./clipdrop.db".to_string());
    let database_url = format!("sqlite://{}?mode=rwc", database_path);
    let pool = match clipdrop_shared::db::create_pool(&database_url).await {
        Ok(pool) => {
            if let Err(e) = clipdrop_shared::db::run_migrations(&pool).await {
                error!("DB migration error: {}", e);
            }
            pool
        }
        Err(e) => {
            warn!("Failed to open {} (history will not persist): {}", database_path, e);
            let pool = clipdrop_shared::db::create_memory_pool().await?;
            clipdrop_shared::db::run_migrations(&pool).await?;
            pool
        }
    };
    let ledger = HistoryLedger::open(pool).await;

    info!("API: {} | downloads: {}", api_url, download_dir);

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let mut driver = Driver {
        session: Session::new(),
        ledger,
        api: Arc::new(ApiClient::new(api_url)?),
        events: events_tx,
        ticker: None,
        download_dir: PathBuf::from(download_dir),
        progress_interval: Duration::from_millis(progress_ms),
    };

    // Stdin reader
    let (lines_tx, mut lines_rx) = mpsc::unbounded_channel::<String>();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if lines_tx.send(line).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    error!("Failed to read stdin: {}", e);
                    break;
                }
            }
        }
    });

    println!("{}", commands::HELP);
    driver.print();

    loop {
        tokio::select! {
            line = lines_rx.recv() => {
                let Some(line) = line else { break };
                match commands::parse(&line) {
                    Ok(Command::Quit) => break,
                    Ok(command) => driver.handle(command).await,
                    Err(message) => println!("{}", message),
                }
            }
            Some(event) = events_rx.recv() => {
                let tick = matches!(event, Event::ProgressTick { .. });
                if driver.dispatch(event).await {
                    match view::progress_line(&driver.session) {
                        Some(line) if tick => println!("{}", line),
                        _ => driver.print(),
                    }
                }
            }
        }
    }

    info!("Bye");
    Ok(())
}
