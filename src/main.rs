//! Typing Stats - keyboard usage dashboard
//!
//! Watches the desktop keyboard, counts every key on a virtual split matrix
//! and keeps the counters in a checksummed image file between runs.

use std::fs::OpenOptions;
use std::io::{stdout, Stdout};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode as CtKeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::Style,
    symbols::border,
    widgets::{Block, Borders},
    Terminal,
};

use typing_stats::{
    config::{self, Config},
    engine::Engine,
    keyboard::{layout, KeyboardListener, MonotonicClock, RawKeyEvent, SystemHost},
    stats::MAX_LAYERS,
    storage::Persistence,
    ui::{App, AppState, AppView, BarRow, HelpPanel, KeyboardVisual, StatsPanel, StatusBar, TabBar},
};

type Tui = Terminal<CrosstermBackend<Stdout>>;

/// Send log output to a file; the terminal belongs to the dashboard
fn init_logging() -> Result<PathBuf> {
    let path = config::app_dir()?.join("typing-stats.log");
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening log file {}", path.display()))?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(path)
}

fn main() -> Result<()> {
    let log_path = init_logging()?;

    let config = Config::load().unwrap_or_else(|e| {
        log::warn!("using default config: {e}");
        Config::default()
    });

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = Arc::clone(&interrupted);
        ctrlc::set_handler(move || interrupted.store(true, Ordering::SeqCst))
            .context("installing signal handler")?;
    }

    let clock = MonotonicClock::new();
    let host = SystemHost::new(clock);

    #[cfg(feature = "persistent-storage")]
    let persistence = {
        use typing_stats::storage::{codec, BlockStore, FileStorage};

        let path = config.data_file()?;
        let offset = config.storage.offset;
        let capacity = offset as usize + codec::encoded_len::<{ layout::ROWS }, { layout::COLS }>();
        let storage = FileStorage::open(&path, capacity)
            .with_context(|| format!("opening counter image {}", path.display()))?;
        log::info!("counter image at {} (offset {offset:#x})", path.display());
        BlockStore::new(storage, offset, config.flush_policy())
    };
    #[cfg(not(feature = "persistent-storage"))]
    let persistence = typing_stats::storage::Volatile::default();

    let engine = Engine::new(host, persistence, config.engine_config());
    let mut app = App::new(config, engine);

    let mut terminal = setup_terminal()?;
    let result = run(&mut terminal, &mut app, clock, &interrupted);
    restore_terminal(&mut terminal)?;
    result?;

    let counters = app.engine.counters();
    println!("\nTyping Stats session complete.");
    println!("Session presses:  {}", counters.session_presses);
    println!("Lifetime presses: {}", counters.total_presses);
    println!("Session duration: {}", app.session_formatted());
    println!("Log: {}", log_path.display());

    Ok(())
}

fn setup_terminal() -> Result<Tui> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    Ok(Terminal::new(CrosstermBackend::new(stdout))?)
}

fn restore_terminal(terminal: &mut Tui) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn run<P: Persistence>(
    terminal: &mut Tui,
    app: &mut App<P>,
    clock: MonotonicClock,
    interrupted: &AtomicBool,
) -> Result<()> {
    let (event_tx, event_rx) = mpsc::channel::<RawKeyEvent>();
    let mut listener = KeyboardListener::new(clock, event_tx);
    let tick_rate = app.config.refresh_interval();

    loop {
        listener.poll();
        while let Ok(key_event) = event_rx.try_recv() {
            app.process_event(&key_event);
        }
        app.tick();

        terminal.draw(|frame| draw(frame, app))?;

        if event::poll(tick_rate)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    handle_key(app, key.code, key.modifiers);
                }
            }
        }

        if interrupted.load(Ordering::SeqCst) && app.state == AppState::Running {
            log::info!("interrupted, saving counters");
            app.quit();
        }
        if app.state == AppState::Quitting {
            break;
        }
    }

    Ok(())
}

fn handle_key<P: Persistence>(app: &mut App<P>, code: CtKeyCode, modifiers: KeyModifiers) {
    match code {
        CtKeyCode::Char('q') | CtKeyCode::Esc => app.quit(),
        CtKeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => app.quit(),
        CtKeyCode::BackTab => app.prev_view(),
        CtKeyCode::Tab if modifiers.contains(KeyModifiers::SHIFT) => app.prev_view(),
        CtKeyCode::Tab => app.next_view(),
        CtKeyCode::Char(c @ '1'..='5') => {
            app.view = AppView::from_index(c as usize - '1' as usize);
        }
        CtKeyCode::Char('?') => app.view = AppView::Help,
        CtKeyCode::Char('n') => app.new_session(),
        CtKeyCode::Char('R') => app.reset_all(),
        CtKeyCode::Char('s') => app.save_now(),
        CtKeyCode::Char('e') => {
            let filename = format!(
                "typing_report_{}.json",
                chrono::Local::now().format("%Y%m%d_%H%M%S")
            );
            if let Err(e) = app.export_report(PathBuf::from(&filename).as_path()) {
                log::warn!("report export failed: {e}");
                app.set_status(format!("Export failed: {e}"));
            }
        }
        _ => {}
    }
}

fn draw<P: Persistence>(frame: &mut ratatui::Frame, app: &App<P>) {
    let colors = app.colors;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(layout::ROWS as u16 + 2),
            Constraint::Min(10),
            Constraint::Length(1),
        ])
        .split(frame.area());

    let tab_names: Vec<&str> = AppView::all().iter().map(|v| v.name()).collect();
    frame.render_widget(TabBar::new(&tab_names, app.view.index(), colors), chunks[0]);

    let kb_block = Block::default()
        .title(" ⌨ Key heatmap ")
        .borders(Borders::ALL)
        .border_set(border::ROUNDED)
        .border_style(Style::default().fg(colors.dim));
    let kb_inner = kb_block.inner(chunks[1]);
    frame.render_widget(kb_block, chunks[1]);
    let heatmap = KeyboardVisual::new(&app.engine.counters().positions, layout::label, colors)
        .highlight(app.last_press);
    frame.render_widget(heatmap, kb_inner);

    match app.view {
        AppView::Help => frame.render_widget(HelpPanel::new(colors), chunks[2]),
        AppView::Layers => {
            let halves = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
                .split(chunks[2]);
            let lines = app.current_lines();
            frame.render_widget(StatsPanel::new(&lines, app.view.name(), colors), halves[0]);

            let bars_block = Block::default()
                .title(" Presses per layer ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(colors.dim));
            let inner = bars_block.inner(halves[1]);
            frame.render_widget(bars_block, halves[1]);

            let layers = &app.engine.counters().layers;
            let max = layers.iter().copied().max().unwrap_or(0);
            let names: Vec<String> = (0..MAX_LAYERS).map(|l| format!("L{l}")).collect();
            for (i, (name, &presses)) in names.iter().zip(layers.iter()).enumerate() {
                if i as u16 >= inner.height {
                    break;
                }
                let mut row = inner;
                row.y += i as u16;
                row.height = 1;
                frame.render_widget(
                    BarRow::new(name, u64::from(presses), u64::from(max), colors),
                    row,
                );
            }
        }
        _ => {
            let lines = app.current_lines();
            frame.render_widget(StatsPanel::new(&lines, app.view.name(), colors), chunks[2]);
        }
    }

    let session = app.session_formatted();
    let status = StatusBar::new(
        app.storage_label(),
        app.view.name(),
        &session,
        app.engine.counters().session_presses,
        colors,
    )
    .message(app.status());
    frame.render_widget(status, chunks[3]);
}
