// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing_subscriber::EnvFilter;

mod app;
mod config;
mod error;
mod gridengine;
mod ui;
mod units;

use app::App;
use config::{Config, Mode, DEFAULT_BIN_DIR, DEFAULT_TIMEOUT_SECS};
use gridengine::command::{CommandRunner, SystemRunner};
use ui::render_ui;

#[derive(Parser, Debug)]
#[command(name = "gridstat")]
#[command(about = "Grid Engine status - hosts, their load and the jobs running on them")]
#[command(version)]
struct Args {
    /// Print one JSON snapshot to stdout and exit
    #[arg(long)]
    json: bool,

    /// Directory containing the qstat and qhost binaries
    #[arg(long, env = "GRIDSTAT_BIN_DIR", default_value = DEFAULT_BIN_DIR)]
    bin_dir: PathBuf,

    /// Timeout for each qstat/qhost invocation in seconds
    #[arg(long, env = "GRIDSTAT_TIMEOUT", default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout: u64,

    /// Write logs to this file while the terminal view is open
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::new(args.bin_dir, args.timeout, args.json, args.log_file)?;
    init_logging(&config)?;
    if !config.bin_dir.is_dir() {
        tracing::warn!(bin_dir = %config.bin_dir.display(), "bin dir does not exist");
    }

    let runner = SystemRunner::new(&config);
    match config.mode {
        Mode::Json => run_json(runner),
        Mode::Terminal => run_tui(runner),
    }
}

/// stderr for JSON mode; the terminal view only logs when given a file
fn init_logging(config: &Config) -> Result<()> {
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match (config.mode, &config.log_file) {
        (Mode::Json, _) => {
            tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_writer(io::stderr)
                .init();
        }
        (Mode::Terminal, Some(path)) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        (Mode::Terminal, None) => {}
    }
    Ok(())
}

fn run_json<R: CommandRunner>(runner: R) -> Result<()> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    let mut stdout = io::stdout().lock();
    match rt.block_on(gridengine::collect_status(&runner)) {
        Ok(snapshot) => {
            serde_json::to_writer_pretty(&mut stdout, &snapshot).context("Failed to write snapshot")?;
            writeln!(stdout)?;
            Ok(())
        }
        Err(e) => {
            let id = error::report(&e);
            let payload = serde_json::json!({
                "error": "could not query the grid scheduler",
                "error_id": id.as_str(),
            });
            writeln!(stdout, "{}", payload)?;
            stdout.flush()?;
            std::process::exit(1);
        }
    }
}

fn run_tui<R: CommandRunner>(runner: R) -> Result<()> {
    let mut app = App::new(runner)?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Initial data load
    terminal.draw(|f| render_ui(f, &app))?;
    app.refresh();

    let result = run_event_loop(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

fn run_event_loop<R: CommandRunner>(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App<R>,
) -> Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut needs_redraw = true;

    loop {
        if needs_redraw {
            terminal.draw(|f| render_ui(f, app))?;
            needs_redraw = false;
        }

        if event::poll(tick_rate)? {
            match event::read()? {
                Event::Key(key) => {
                    needs_redraw = true;
                    match (key.code, key.modifiers) {
                        // Quit
                        (KeyCode::Char('q'), _) | (KeyCode::Char('c'), KeyModifiers::CONTROL) => {
                            app.should_quit = true;
                        }
                        // Navigation
                        (KeyCode::Up, _) | (KeyCode::Char('k'), _) => app.select_prev(),
                        (KeyCode::Down, _) | (KeyCode::Char('j'), _) => app.select_next(),
                        (KeyCode::PageUp, _) | (KeyCode::Char('u'), KeyModifiers::CONTROL) => {
                            let height = terminal.size()?.height as usize;
                            app.page_up(height.saturating_sub(3));
                        }
                        (KeyCode::PageDown, _) | (KeyCode::Char('d'), KeyModifiers::CONTROL) => {
                            let height = terminal.size()?.height as usize;
                            app.page_down(height.saturating_sub(3));
                        }
                        (KeyCode::Home, _) | (KeyCode::Char('g'), _) => app.select_first(),
                        (KeyCode::End, _) | (KeyCode::Char('G'), _) => app.select_last(),
                        // Refresh only on request
                        (KeyCode::Char('r'), _) => app.refresh(),
                        // Sorting
                        (KeyCode::Char('>'), _) | (KeyCode::Char('.'), _) => {
                            app.sort_next_column();
                        }
                        (KeyCode::Char('<'), _) | (KeyCode::Char(','), _) => {
                            app.sort_prev_column();
                        }
                        (KeyCode::Char('I'), _) => {
                            app.toggle_sort_direction();
                        }
                        _ => {}
                    }
                }
                Event::Resize(_, _) => {
                    needs_redraw = true;
                }
                _ => {}
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}
