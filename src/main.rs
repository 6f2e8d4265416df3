/*
 * This file is part of Legionfan.
 *
 * Copyright (C) 2025 Legionfan contributors
 *
 * Legionfan is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Legionfan is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Legionfan. If not, see <https://www.gnu.org/licenses/>.
 */

use std::io::stdout;

use clap::Parser;
use crossterm::event::{self, DisableMouseCapture, EnableMouseCapture, Event};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::Terminal;

use legionfan::app::App;
use legionfan::cli::{self, Cli, Launch};
use legionfan::events::{handle_key_event, handle_mouse_event};
use legionfan::logger;
use legionfan::service;
use legionfan::ui::ui;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.logging {
        logger::init_logging();
        if !logger::is_enabled() {
            eprintln!("Warning: cannot open log file {}", logger::log_path().display());
        }
        logger::log_event(
            "startup",
            serde_json::json!({
                "args": std::env::args().collect::<Vec<_>>(),
            }),
        );
    }

    let settings = cli::load_settings();
    match cli.launch(&settings) {
        Launch::Service => {
            if unsafe { libc::geteuid() } != 0 {
                eprintln!("Warning: not running as root; power mode and sensors may be unavailable.");
            }
            if let Err(err) = service::run_service() {
                eprintln!("error: {err:#}");
                logger::log_event("fatal_error", serde_json::json!({ "error": format!("{err:#}") }));
                std::process::exit(1);
            }
            return Ok(());
        }
        Launch::Command(cmd) => {
            if let Err(err) = cli::run_command(&cmd, &settings) {
                eprintln!("error: {err:#}");
                std::process::exit(1);
            }
            return Ok(());
        }
        Launch::Tui => {}
    }

    let app = App::from_system();

    // Terminal init
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    logger::log_event("tui_start", serde_json::json!({}));
    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("error: {err}");
        logger::log_event("fatal_error", serde_json::json!({ "error": err.to_string() }));
        std::process::exit(1);
    }

    Ok(())
}

fn run_app(
    terminal: &mut Terminal<ratatui::backend::CrosstermBackend<std::io::Stdout>>,
    mut app: App,
) -> anyhow::Result<()> {
    app.refresh();

    loop {
        let frame = terminal.draw(|f| ui(f, &app))?;
        app.screen = frame.area;

        let timeout = app
            .refresh_interval
            .saturating_sub(app.last_refresh.elapsed());
        if event::poll(timeout).unwrap_or(false) {
            match event::read()? {
                Event::Key(key_event) => {
                    if handle_key_event(&mut app, key_event)? {
                        return Ok(());
                    }
                }
                Event::Mouse(mouse_event) => handle_mouse_event(&mut app, mouse_event),
                _ => {}
            }
        }

        if app.last_refresh.elapsed() >= app.refresh_interval {
            app.refresh();
        }
    }
}
