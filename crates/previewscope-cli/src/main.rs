//! Previewscope CLI — terminal preview player with live spectrum display

use std::io;
use std::os::unix::io::AsRawFd;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Parser;

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use ratatui::widgets::*;

use previewscope::audio::types::{EngineEvent, Snapshot, TrackInfo};
use previewscope::config::SessionConfig;
use previewscope::session::Session;

#[derive(Parser)]
#[command(name = "previewscope", about = "Terminal preview player", version)]
struct Cli {
    /// Preview URL (http/https) or local audio file
    input: String,

    /// Load the preview paused instead of autoplaying
    #[arg(long)]
    paused: bool,

    /// Initial volume, 0.0 to 2.0
    #[arg(long, default_value_t = 1.0)]
    volume: f32,
}

struct App {
    input: String,
    track: Option<TrackInfo>,
    spectrum: Vec<u64>,
    position: f64,
    duration: f64,
    volume: f32,
    muted: bool,
    status: String,
    running: bool,
}

impl App {
    fn new(input: &str, volume: f32) -> Self {
        Self {
            input: input.to_string(),
            track: None,
            spectrum: Vec::new(),
            position: 0.0,
            duration: 0.0,
            volume,
            muted: false,
            status: "Loading...".to_string(),
            running: true,
        }
    }
}

fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let session = match Session::new(SessionConfig::default()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Audio error: {}", e);
            std::process::exit(1);
        }
    };
    session.set_volume(cli.volume);

    if is_url(&cli.input) {
        session.load_with_autoplay(&cli.input, !cli.paused);
    } else if cli.paused {
        session.load_file_with_autoplay(PathBuf::from(&cli.input), false);
    } else {
        session.load_file(PathBuf::from(&cli.input));
    }

    let mut app = App::new(&cli.input, cli.volume);

    // Suppress stderr during TUI — ALSA/PulseAudio and other libs write
    // diagnostic messages to stderr which corrupt the ratatui display.
    let saved_stderr = unsafe { libc::dup(2) };
    {
        let devnull = std::fs::File::open("/dev/null")?;
        unsafe { libc::dup2(devnull.as_raw_fd(), 2) };
    }

    // Enter TUI
    terminal::enable_raw_mode()?;
    io::stdout().execute(EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)?;

    let tick_rate = Duration::from_millis(33); // ~30fps
    let mut last_tick = Instant::now();
    let mut saved_volume: f32 = cli.volume.max(0.05);

    while app.running {
        // Draw
        terminal.draw(|f| draw_ui(f, &app))?;

        // Poll input
        let timeout = tick_rate.saturating_sub(last_tick.elapsed());
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Esc => {
                            app.running = false;
                        }
                        KeyCode::Char(' ') => {
                            session.toggle();
                        }
                        KeyCode::Right => {
                            session.skip_forward();
                        }
                        KeyCode::Left => {
                            session.skip_backward();
                        }
                        KeyCode::Char('s') => {
                            session.stop();
                        }
                        KeyCode::Char('m') => {
                            if app.muted {
                                app.muted = false;
                                app.volume = saved_volume;
                            } else {
                                saved_volume = app.volume;
                                app.muted = true;
                                app.volume = 0.0;
                            }
                            session.set_volume(app.volume);
                        }
                        KeyCode::Char('+') | KeyCode::Char('=') => {
                            app.volume = (app.volume + 0.05).min(2.0);
                            app.muted = false;
                            session.set_volume(app.volume);
                        }
                        KeyCode::Char('-') => {
                            app.volume = (app.volume - 0.05).max(0.0);
                            if app.volume == 0.0 {
                                app.muted = true;
                            }
                            session.set_volume(app.volume);
                        }
                        _ => {}
                    }
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();

            // Poll engine events
            while let Some(event) = session.try_recv_event() {
                match event {
                    EngineEvent::Loaded(info) => {
                        app.track = Some(info);
                        app.status = "Ready".to_string();
                    }
                    EngineEvent::Playing => {
                        app.status = "Playing".to_string();
                    }
                    EngineEvent::Paused => {
                        app.status = "Paused".to_string();
                    }
                    EngineEvent::Stopped => {
                        app.status = "Stopped".to_string();
                        app.track = None;
                    }
                    EngineEvent::Finished => {
                        app.status = "Finished".to_string();
                    }
                    EngineEvent::Failed(msg) => {
                        app.status = format!("Error: {}", msg);
                    }
                    EngineEvent::SeekedTo(_) | EngineEvent::Rejected(_) => {}
                }
            }

            update_snapshot(session.snapshot(), &mut app);
        }
    }

    // Shut the session down while still in alternate screen
    // (rodio prints to stderr when the output stream drops)
    session.shutdown();

    // Restore terminal
    terminal::disable_raw_mode()?;
    io::stdout().execute(LeaveAlternateScreen)?;

    // Restore stderr
    if saved_stderr >= 0 {
        unsafe {
            libc::dup2(saved_stderr, 2);
            libc::close(saved_stderr);
        }
    }

    Ok(())
}

fn update_snapshot(snap: Snapshot, app: &mut App) {
    app.position = snap.position;
    app.duration = snap.duration;
    app.spectrum = snap
        .magnitudes
        .iter()
        .map(|&band| (band * 100.0).clamp(0.0, 100.0) as u64)
        .collect();
}

fn draw_ui(f: &mut Frame, app: &App) {
    let area = f.area();

    let outer = Block::default()
        .title(format!(" Previewscope v{} ", env!("CARGO_PKG_VERSION")))
        .title_alignment(Alignment::Center)
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded);
    let inner = outer.inner(area);
    f.render_widget(outer, area);

    let chunks = Layout::vertical([
        Constraint::Length(5), // track metadata
        Constraint::Min(6),    // spectrum
        Constraint::Length(3), // position gauge
        Constraint::Length(3), // help bar
    ])
    .split(inner);

    draw_metadata(f, app, chunks[0]);
    draw_spectrum(f, app, chunks[1]);
    draw_position(f, app, chunks[2]);
    draw_help(f, app, chunks[3]);
}

fn draw_metadata(f: &mut Frame, app: &App, area: Rect) {
    let track_line = match &app.track {
        Some(info) => info.to_string(),
        None => "---".to_string(),
    };
    let status_color = match app.status.as_str() {
        "Playing" => Color::Green,
        "Paused" | "Ready" => Color::Yellow,
        "Finished" | "Stopped" => Color::DarkGray,
        s if s.starts_with("Error") => Color::Red,
        _ => Color::Yellow,
    };
    let max_src_len = area.width.saturating_sub(12) as usize;
    let src_display = truncate_str(&app.input, max_src_len);
    let text = vec![
        Line::from(vec![
            Span::styled("  Source: ", Style::default().fg(Color::DarkGray)),
            Span::styled(src_display, Style::default().fg(Color::White).bold()),
        ]),
        Line::from(vec![
            Span::styled("  Track: ", Style::default().fg(Color::DarkGray)),
            Span::styled(track_line, Style::default().fg(Color::Yellow)),
        ]),
        Line::from(vec![
            Span::styled("  Status: ", Style::default().fg(Color::DarkGray)),
            Span::styled(&app.status, Style::default().fg(status_color)),
        ]),
    ];
    f.render_widget(Paragraph::new(text), area);
}

fn truncate_str(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    // Cut on a char boundary; byte indices can land mid-codepoint
    let budget = if max > 3 { max - 3 } else { max };
    let cut = s
        .char_indices()
        .map(|(i, _)| i)
        .take_while(|&i| i <= budget)
        .last()
        .unwrap_or(0);
    if max > 3 {
        format!("{}...", &s[..cut])
    } else {
        s[..cut].to_string()
    }
}

fn draw_spectrum(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(" Spectrum ")
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::DarkGray));

    let sparkline = Sparkline::default()
        .block(block)
        .data(&app.spectrum)
        .max(100)
        .style(Style::default().fg(Color::Cyan));

    f.render_widget(sparkline, area);
}

fn draw_position(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(" Position ")
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::DarkGray));

    let ratio = if app.duration > 0.0 {
        (app.position / app.duration).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let label = format!(
        "{} / {}",
        format_time(app.position),
        format_time(app.duration)
    );

    let gauge = Gauge::default()
        .block(block)
        .gauge_style(Style::default().fg(Color::Cyan).bg(Color::Black))
        .ratio(ratio)
        .label(label);

    f.render_widget(gauge, area);
}

fn draw_help(f: &mut Frame, app: &App, area: Rect) {
    let vol_display = if app.muted {
        "MUTE".to_string()
    } else {
        format!("{}%", (app.volume * 100.0).round() as u32)
    };

    let help = Line::from(vec![
        Span::styled("  Space ", Style::default().fg(Color::Yellow)),
        Span::raw("play/pause  |  "),
        Span::styled("←/→ ", Style::default().fg(Color::Yellow)),
        Span::raw("skip 10s  |  "),
        Span::styled("'s' ", Style::default().fg(Color::Yellow)),
        Span::raw("stop  |  "),
        Span::styled("'m' ", Style::default().fg(Color::Yellow)),
        Span::raw("mute  |  "),
        Span::styled("'+'/'-' ", Style::default().fg(Color::Yellow)),
        Span::raw("volume  |  "),
        Span::styled("'q' ", Style::default().fg(Color::Yellow)),
        Span::raw("quit  |  "),
        Span::styled(
            format!("Vol: {}", vol_display),
            Style::default().fg(Color::Cyan).bold(),
        ),
    ]);

    f.render_widget(Paragraph::new(help).alignment(Alignment::Left), area);
}

fn format_time(secs: f64) -> String {
    let total = secs.max(0.0) as u64;
    let m = total / 60;
    let s = total % 60;
    format!("{:02}:{:02}", m, s)
}
