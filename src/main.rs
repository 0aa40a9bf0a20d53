use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use dotenv::dotenv;
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    io,
    panic::AssertUnwindSafe,
    sync::Arc,
    time::{Duration, Instant},
};
use cli_log::*;
use clap::Parser;

use crystalball::{App, Cli, FileStorage, HttpMarketApi, WorkspaceStore, render_ui};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    init_cli_log!();
    info!("Starting CrystalBall...");

    let cli = Cli::parse();

    let result = AssertUnwindSafe(run_tui_app(cli)).await;

    // Restore terminal state even when the app bailed out early
    disable_raw_mode().ok();
    execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture).ok();

    if let Err(err) = &result {
        eprintln!("\n\nCrystalBall stopped: {err:?}\n\n");
    }

    result
}

async fn run_tui_app(cli: Cli) -> Result<()> {
    let api = HttpMarketApi::new(&cli.api_url)?;
    let state_path = cli.state_path();
    info!("Workspace file: {}", state_path.display());
    let storage = FileStorage::new(state_path);
    let store = if cli.reset {
        WorkspaceStore::fresh(Box::new(storage))
    } else {
        WorkspaceStore::load(Box::new(storage))
    };

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(store, Arc::new(api), &cli.fallback_symbol);

    // Main loop
    let res = run_app(&mut terminal, &mut app).await;

    // Restore terminal before returning
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = &res {
        info!("App error: {err:?}");
    }

    res
}

async fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> Result<()> {
    let tick_rate = Duration::from_millis(crystalball::config::TICK_RATE_MS);
    let mut last_ui_update = Instant::now();
    let ui_update_rate = Duration::from_millis(crystalball::config::UI_UPDATE_RATE_MS);

    loop {
        // Start, stop and drain widget feeds
        app.update();

        // Clock and market status tick even without new data
        let force_redraw = last_ui_update.elapsed() >= ui_update_rate;

        if app.needs_redraw || force_redraw {
            terminal.draw(|f| render_ui(f, app))?;
            app.needs_redraw = false;
            if force_redraw {
                last_ui_update = Instant::now();
            }
        }

        if event::poll(tick_rate)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if !app.handle_key_input(key)? {
                        info!("Quit requested");
                        return Ok(());
                    }
                }
                Event::Resize(..) => app.needs_redraw = true,
                _ => {}
            }
        }
    }
}
