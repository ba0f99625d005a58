use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use tde::controller::Controller;
use tde::domain::{TdeConfig, TdeError};
use tde::model::{Model, Status};
use tde::persist::{FileStore, Persistence, ROWS_KEY};
use tde::seed::spawn_seed_fetch;
use tde::ui;

/// tde - a terminal tabular data editor
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Directory for data snapshots and the log file
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// CSV file to import on startup
    #[arg(long)]
    import: Option<PathBuf>,

    /// Fetch seed data even if a local snapshot exists
    #[arg(long)]
    seed: bool,

    /// URL of the seed collection
    #[arg(long)]
    seed_url: Option<String>,

    /// Event poll time in milliseconds
    #[arg(long)]
    poll: Option<u64>,
}

fn main() -> ExitCode {
    match run() {
        Err(e) => {
            ratatui::restore();
            eprintln!("Error: {:?}", e);
            ExitCode::FAILURE
        }
        Ok(_) => {
            ratatui::restore();
            ExitCode::SUCCESS
        }
    }
}

// Logs go to a file, the terminal belongs to the ui. TDE_LOG overrides
// RUST_LOG, without either everything at info and up is kept.
fn init_logging(data_dir: &Path) -> Result<(), TdeError> {
    let log_file = File::create(data_dir.join("tde.log"))?;
    let filter = EnvFilter::try_from_env("TDE_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(ErrorLayer::default())
        .with(
            fmt::layer()
                .with_writer(Arc::new(log_file))
                .with_ansi(false)
                .with_target(true)
                .with_filter(filter),
        )
        .init();
    Ok(())
}

fn run() -> Result<(), TdeError> {
    let cli = Cli::parse();

    let mut config = TdeConfig::default();
    if let Some(dir) = cli.data_dir {
        config = config.data_dir(dir);
    }
    if let Some(url) = cli.seed_url {
        config = config.seed_url(url);
    }
    if let Some(poll) = cli.poll {
        config = config.event_poll_time(poll);
    }

    let data_dir = PathBuf::from(
        shellexpand::full(&config.data_dir.to_string_lossy())
            .map_err(|e| TdeError::LoadingFailed(e.to_string()))?
            .into_owned(),
    );
    fs::create_dir_all(&data_dir)?;
    init_logging(&data_dir)?;
    info!("Starting tde, data dir {}", data_dir.display());

    let row_store = FileStore::new(data_dir.clone())?;
    let column_store = FileStore::new(data_dir)?;
    // Decided before the model takes ownership of the store.
    let needs_seed = cli.seed || row_store.get(ROWS_KEY).is_none();

    let mut terminal = ratatui::init();
    let size = terminal.size()?;

    let mut model = Model::init(
        &config,
        Box::new(row_store),
        Box::new(column_store),
        size.width as usize,
        size.height as usize,
    )?;

    if let Some(path) = &cli.import {
        model.import_csv(&path.to_string_lossy())?;
    } else if needs_seed {
        model.attach_seed(spawn_seed_fetch(config.seed_url.clone()));
    }

    let controller = Controller::new(&config);
    while model.status != Status::QUITTING {
        terminal.draw(|frame| ui::draw(model.get_uidata(), frame))?;
        let message = controller.handle_event(&model)?;
        model.update(message)?;
    }

    Ok(())
}
