//! ---
//! jm_section: "05-operator-tooling"
//! jm_subsection: "binary"
//! jm_type: "source"
//! jm_scope: "code"
//! jm_description: "Terminal trace viewer rendering live power charts."
//! jm_version: "v1.2.0"
//! jm_owner: "tbd"
//! ---
use std::io;
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use clap::{ArgAction, Parser};
use crossterm::cursor::{Hide, Show};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use joulemetry_common::version::VersionInfo;
use joulemetry_trace::{stream_path, Dataset, Series, TraceEvent};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols;
use ratatui::text::Span;
use ratatui::widgets::{
    Axis, Block, Borders, Chart, Dataset as ChartDataset, GraphType, List, ListItem, ListState,
    Paragraph,
};
use ratatui::{Frame, Terminal};

#[derive(Parser, Debug)]
#[command(
    author,
    disable_version_flag = true,
    about = "Watch a Joulemetry trace in a terminal UI",
    propagate_version = false
)]
struct Cli {
    /// Trace file to watch (a live sampler output or a recorded session)
    #[arg(value_name = "TRACE")]
    trace: PathBuf,

    /// Refresh interval in milliseconds
    #[arg(long, default_value_t = 500)]
    refresh: u64,

    /// Read the file once instead of tailing it
    #[arg(long)]
    no_follow: bool,

    /// Print extended version information and exit
    #[arg(short = 'V', long = "version", action = ArgAction::SetTrue)]
    version: bool,
}

/// Updates handed from the reader thread to the draw loop.
enum ReaderUpdate {
    Event(TraceEvent),
    Finished,
    Failed(String),
}

struct App {
    dataset: Dataset,
    selected: usize,
    follow: bool,
    /// Chart end frozen at this timestamp while follow is off.
    frozen_end_ns: Option<i64>,
    window_ns: i64,
    status: Option<String>,
}

impl App {
    fn new(follow: bool) -> Self {
        Self {
            dataset: Dataset::new(),
            selected: 0,
            follow,
            frozen_end_ns: None,
            window_ns: 60 * 1_000_000_000,
            status: None,
        }
    }

    fn drain(&mut self, rx: &mpsc::Receiver<ReaderUpdate>) {
        for update in rx.try_iter() {
            match update {
                ReaderUpdate::Event(event) => {
                    // Overlapping rows are rejected by the series itself;
                    // nothing useful to surface per event.
                    let _ = self.dataset.apply(&event);
                }
                ReaderUpdate::Finished => {
                    self.status = Some("end of trace".to_owned());
                }
                ReaderUpdate::Failed(error) => {
                    self.status = Some(error);
                }
            }
        }
        if self.selected >= self.dataset.len() {
            self.selected = self.dataset.len().saturating_sub(1);
        }
    }

    fn select_next(&mut self) {
        if self.selected + 1 < self.dataset.len() {
            self.selected += 1;
        }
    }

    fn select_previous(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    fn toggle_follow(&mut self) {
        self.follow = !self.follow;
        self.frozen_end_ns = if self.follow {
            None
        } else {
            self.selected_series().and_then(|series| series.domain()).map(|(_, end)| end)
        };
    }

    fn selected_series(&self) -> Option<std::sync::Arc<Series>> {
        self.dataset.snapshot().into_iter().nth(self.selected)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.version {
        println!("{}", VersionInfo::current().extended());
        return Ok(());
    }

    let (tx, rx) = mpsc::channel();
    let trace = cli.trace.clone();
    let follow = !cli.no_follow;
    thread::spawn(move || {
        let result = stream_path(&trace, follow, |event| {
            let _ = tx.send(ReaderUpdate::Event(event));
        });
        let _ = match result {
            Ok(()) => tx.send(ReaderUpdate::Finished),
            Err(error) => tx.send(ReaderUpdate::Failed(error.to_string())),
        };
    });

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, EnterAlternateScreen, Hide)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    let result = run_app(&mut terminal, cli, rx);
    cleanup_terminal(&mut terminal)?;
    if let Err(err) = result {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
    Ok(())
}

fn cleanup_terminal(terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(terminal.backend_mut(), LeaveAlternateScreen, Show)?;
    terminal.show_cursor()?;
    Ok(())
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    cli: Cli,
    rx: mpsc::Receiver<ReaderUpdate>,
) -> Result<()> {
    let mut app = App::new(!cli.no_follow);
    let tick_rate = Duration::from_millis(cli.refresh.max(50));
    loop {
        app.drain(&rx);
        terminal.draw(|frame| draw_ui(frame, &mut app))?;
        if event::poll(tick_rate)? {
            match event::read()? {
                Event::Key(key) => {
                    if handle_input(&mut app, key)? {
                        break;
                    }
                }
                Event::Resize(_, _) => {
                    // redraw with new geometry
                }
                _ => {}
            }
        }
    }
    Ok(())
}

fn handle_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Ok(true);
    }
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => return Ok(true),
        KeyCode::Char('f') | KeyCode::Char('F') => app.toggle_follow(),
        KeyCode::Char('j') | KeyCode::Down => app.select_next(),
        KeyCode::Char('k') | KeyCode::Up => app.select_previous(),
        _ => {}
    };
    Ok(false)
}

/// Mean wattage per bucket over the trailing chart window, x in seconds
/// relative to the window end.
fn chart_points(series: &Series, window_ns: i64, end_override: Option<i64>) -> Vec<(f64, f64)> {
    const BUCKETS: i64 = 120;
    let (domain_start, domain_end) = match series.domain() {
        Some(domain) => domain,
        None => return Vec::new(),
    };
    let end = end_override.unwrap_or(domain_end).min(domain_end);
    let start = (end - window_ns).max(domain_start);
    let span = end - start;
    if span <= 0 {
        return Vec::new();
    }
    let dt = (span / BUCKETS).max(1);
    let mut points = Vec::new();
    let mut cursor = start;
    while cursor + dt <= end {
        if let Some(window) = series.rates_between(cursor, cursor + dt) {
            let x = (cursor + dt / 2 - end) as f64 / 1_000_000_000.0;
            points.push((x, window.mean_watts));
        }
        cursor += dt;
    }
    points
}

fn draw_ui(frame: &mut Frame, app: &mut App) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(2)])
        .split(frame.size());

    let main = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(38), Constraint::Percentage(62)])
        .split(layout[0]);

    draw_series_list(frame, app, main[0]);
    draw_chart(frame, app, main[1]);

    let mut footer = String::from("↑/↓ or j/k select series  f follow  q quit");
    if let Some(status) = &app.status {
        footer.push_str("  |  ");
        footer.push_str(status);
    }
    let help = Paragraph::new(footer).style(Style::default().fg(Color::Gray));
    frame.render_widget(help, layout[1]);
}

fn draw_series_list(frame: &mut Frame, app: &App, area: ratatui::layout::Rect) {
    let snapshot = app.dataset.snapshot();
    let items: Vec<ListItem> = if snapshot.is_empty() {
        vec![ListItem::new("(waiting for trace header)")]
    } else {
        snapshot
            .iter()
            .map(|series| {
                let (min, max) = series.rate_range();
                let mean = series
                    .domain()
                    .and_then(|(start, end)| series.rates_between(start, end))
                    .map(|window| window.mean_watts)
                    .unwrap_or_default();
                ListItem::new(format!(
                    "{:<24} {:>6.2}/{:>6.2}/{:>6.2} W {:>9.2} J",
                    truncate(series.name(), 24),
                    min,
                    mean,
                    max,
                    series.sum_joules()
                ))
            })
            .collect()
    };
    let mut state = ListState::default();
    if !snapshot.is_empty() {
        state.select(Some(app.selected));
    }
    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Series (min/mean/max)"),
        )
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▶ ");
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_chart(frame: &mut Frame, app: &App, area: ratatui::layout::Rect) {
    let series = match app.selected_series() {
        Some(series) => series,
        None => {
            let placeholder = Paragraph::new("(no samples yet)")
                .block(Block::default().borders(Borders::ALL).title("Power"));
            frame.render_widget(placeholder, area);
            return;
        }
    };
    let points = chart_points(&series, app.window_ns, app.frozen_end_ns);
    let window_secs = app.window_ns as f64 / 1_000_000_000.0;
    let y_max = points
        .iter()
        .map(|&(_, w)| w)
        .fold(f64::MIN, f64::max)
        .max(0.001)
        * 1.1;

    let title = if app.follow {
        format!("Power: {} (live)", series.name())
    } else {
        format!("Power: {} (paused)", series.name())
    };
    let datasets = vec![ChartDataset::default()
        .name(series.name().to_owned())
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(Color::Cyan))
        .data(&points)];
    let chart = Chart::new(datasets)
        .block(Block::default().borders(Borders::ALL).title(title))
        .x_axis(
            Axis::default()
                .title("seconds ago")
                .style(Style::default().fg(Color::Gray))
                .bounds([-window_secs, 0.0])
                .labels(vec![
                    Span::raw(format!("-{window_secs:.0}")),
                    Span::raw(format!("-{:.0}", window_secs / 2.0)),
                    Span::raw("0"),
                ]),
        )
        .y_axis(
            Axis::default()
                .title("W")
                .style(Style::default().fg(Color::Gray))
                .bounds([0.0, y_max])
                .labels(vec![
                    Span::raw("0"),
                    Span::raw(format!("{:.1}", y_max / 2.0)),
                    Span::raw(format!("{y_max:.1}")),
                ]),
        );
    frame.render_widget(chart, area);
}

fn truncate(name: &str, width: usize) -> String {
    if name.chars().count() <= width {
        name.to_owned()
    } else {
        let kept: String = name.chars().take(width.saturating_sub(1)).collect();
        format!("{kept}…")
    }
}
