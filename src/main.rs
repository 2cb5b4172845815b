//! homedash - a home dashboard in the terminal
//!
//! Weather, calendar and meal plan, energy usage, the air purifier and a row
//! of device lights, each card served from a stale-while-revalidate cache.

use std::io;
use std::panic;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use homedash::app::App;
use homedash::cache::{FileStorage, MemoryStorage, SwrCache};
use homedash::cli::{Cli, StartupConfig, StorageChoice};
use homedash::config::Config;
use homedash::refresh::{self, RefreshHandle, RefreshMessage};
use homedash::{logging, ui};

/// Sets up a panic hook that restores the terminal before printing the panic message.
/// This ensures the terminal is usable even if the application panics.
fn setup_panic_hook() {
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        // Attempt to restore the terminal
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        // Call the original panic hook
        original_hook(panic_info);
    }));
}

fn build_cache(storage: &StorageChoice) -> SwrCache {
    match storage {
        StorageChoice::Dir(dir) => {
            tracing::info!(dir = %dir.display(), "using file cache");
            SwrCache::new(Arc::new(FileStorage::with_dir(dir.clone())))
        }
        StorageChoice::Memory => {
            tracing::info!("using in-memory cache");
            SwrCache::new(Arc::new(MemoryStorage::new()))
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let startup = match StartupConfig::from_cli(&cli) {
        Ok(startup) => startup,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let _log_guard = startup
        .log_file
        .as_deref()
        .and_then(|path| logging::init_tracing(startup.verbose, path));

    let config = match Config::load(startup.config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(&startup, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "dashboard exited with an error");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(startup: &StartupConfig, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    // Set up panic hook to restore terminal on crash
    setup_panic_hook();

    // Create app instance; cards start loading immediately
    let mut app = App::new(build_cache(&startup.storage), config);

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut refresh_handle = RefreshHandle::spawn(config.refresh.tick());
    let location = config.weather.location.as_str();

    let result = event_loop(&mut terminal, &mut app, &mut refresh_handle, location);

    refresh_handle.shutdown().await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    refresh_handle: &mut RefreshHandle,
    location: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        // Render UI
        terminal.draw(|f| ui::render(f, app, location))?;

        // Poll for keyboard events with 100ms timeout
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key);
                }
            }
        }

        while let Some(RefreshMessage::Tick) = refresh::try_recv(refresh_handle) {
            app.revalidate_all();
        }

        // Check if we should quit
        if app.should_quit {
            return Ok(());
        }
    }
}
