//! WireGuard configuration viewer
//! Shows one tunnel's interface and peers, kept current from a background poller.

use std::{fs::OpenOptions, path::PathBuf, sync::Mutex, time::Duration};

use clap::Parser;
use color_eyre::{Result, eyre::bail};
use nix::unistd::Uid;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use wg_confview::{App, CONFIG_DIR, Message, discover_tunnels};

#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Tunnel to show; defaults to the first configuration found.
    tunnel: Option<String>,

    /// Directory holding `<tunnel>.conf` files.
    #[arg(long, default_value = CONFIG_DIR)]
    config_dir: String,

    /// Seconds between background reloads.
    #[arg(long, default_value_t = 1)]
    interval: u64,

    /// Write logs here; the terminal belongs to the UI.
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn init_logging(path: Option<&PathBuf>) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_logging(cli.log_file.as_ref())?;

    let config_dir = PathBuf::from(shellexpand::tilde(&cli.config_dir).into_owned());
    let tunnel = match cli.tunnel {
        Some(t) => t,
        None => match discover_tunnels(&config_dir).into_iter().next() {
            Some(t) => t,
            None => bail!("no tunnel configurations in {}", config_dir.display()),
        },
    };
    info!(%tunnel, dir = %config_dir.display(), "starting");

    let mut app = App::new(config_dir, tunnel)?;
    app.refresh();
    if matches!(app.message(), Some(Message::Error(_))) {
        warn!("initial load failed");
    } else if which::which("wg").is_err() {
        warn!("wg not found, showing file contents only");
        app.set_message(Message::Info("wg not installed: live peer state unavailable".into()));
    } else if !Uid::effective().is_root() {
        app.set_message(Message::Info("Not root: live peer state may be unavailable".into()));
    }

    app.spawn_input_reader();
    app.spawn_poller(Duration::from_secs(cli.interval.max(1)));

    let mut terminal = ratatui::init();
    let result = (|| -> Result<()> {
        while !app.should_quit {
            terminal.draw(|frame| app.draw(frame))?;
            app.pump(Duration::from_millis(100));
        }
        Ok(())
    })();
    ratatui::restore();
    result
}
