use anyhow::{Context, Result};
use clap::Parser;
use labyrinth_core::{
    AgentStatus, ExploreOutcome, Labyrinth, Position, SharedMap, Team, TeamConfig, TeamReport,
    labyrinth::TRAINING_LAYOUT, tile::Tile,
};
use ratatui::{
    crossterm::{
        self,
        event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
        execute,
        terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
    },
    prelude::*,
    widgets::*,
};
use std::{
    io::{self, Stdout},
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::{runtime::Runtime, task::JoinHandle};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "Explore a labyrinth with a team of crawlers", long_about = None)]
struct Args {
    /// Layout file to load (built-in training maze if omitted)
    #[arg(short, long, value_name = "LAYOUT_FILE")]
    map: Option<PathBuf>,

    /// JSON team configuration
    #[arg(short, long, value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Number of crawlers
    #[arg(long)]
    crawlers: Option<usize>,

    /// Action budget per crawler
    #[arg(long)]
    max_actions: Option<u32>,

    /// Start delay between crawlers, in milliseconds
    #[arg(long)]
    stagger_ms: Option<u64>,

    /// Where to write the merged map
    #[arg(short, long, default_value = "map.txt")]
    export: PathBuf,

    /// Run without the terminal UI and print the map
    #[arg(long)]
    headless: bool,

    /// Log file used while the terminal UI is active
    #[arg(long, default_value = "labyrinth.log")]
    log_file: PathBuf,
}

impl Args {
    fn team_config(&self) -> Result<TeamConfig> {
        let mut config = match &self.config {
            Some(path) => TeamConfig::from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => TeamConfig::default(),
        };
        if let Some(crawlers) = self.crawlers {
            config.crawlers = crawlers;
        }
        if let Some(max_actions) = self.max_actions {
            config.max_actions = max_actions;
        }
        if let Some(stagger_ms) = self.stagger_ms {
            config.stagger_ms = stagger_ms;
        }
        config.validate()?;
        Ok(config)
    }
}

struct App {
    labyrinth: Arc<Labyrinth>,
    /// The map the team is filling in.
    map: Arc<SharedMap>,
    /// The running team, until its report has been collected.
    run: Option<JoinHandle<TeamReport>>,
    report: Option<TeamReport>,
    /// Flag to control the main loop.
    should_quit: bool,
}

impl App {
    fn new(labyrinth: Arc<Labyrinth>, config: TeamConfig, runtime: &Runtime) -> Result<Self> {
        let team = Team::on_labyrinth(&labyrinth, config)?;
        let map = team.map();
        let run = runtime.spawn(team.run());
        Ok(App {
            labyrinth,
            map,
            run: Some(run),
            report: None,
            should_quit: false,
        })
    }

    /// Collects the team report once every explorer is done.
    fn tick(&mut self, runtime: &Runtime) -> Result<()> {
        if let Some(run) = self.run.take_if(|run| run.is_finished()) {
            self.report = Some(runtime.block_on(run).context("Team task failed")?);
        }
        Ok(())
    }

    fn quit(&mut self) {
        self.should_quit = true;
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.team_config()?;

    let layout = match &args.map {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read layout file {}", path.display()))?,
        None => TRAINING_LAYOUT.to_string(),
    };
    let labyrinth = Arc::new(Labyrinth::from_ascii(&layout).context("Failed to build labyrinth")?);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start runtime")?;

    if args.headless {
        init_tracing(None)?;
        let team = Team::on_labyrinth(&labyrinth, config)?;
        let report = runtime.block_on(team.run());
        println!("{}", report.map().export_ascii());
        print_summary(&report);
        report.write_map(&args.export)?;
        return Ok(());
    }

    init_tracing(Some(&args.log_file))?;

    // Set up the terminal
    let mut terminal = setup_terminal()?;

    // Run the main application loop, restoring the terminal even on error
    let result = App::new(labyrinth, config, &runtime)
        .and_then(|mut app| run_app(&mut terminal, &mut app, &runtime).map(|()| app));

    restore_terminal(&mut terminal)?;

    let app = result?;
    match &app.report {
        Some(report) => {
            print_summary(report);
            report.write_map(&args.export)?;
        }
        None => {
            std::fs::write(&args.export, app.map.export_ascii())
                .with_context(|| format!("Failed to write {}", args.export.display()))?;
            warn!(path = %args.export.display(), "exploration interrupted, partial map exported");
            println!("Exploration interrupted; partial map written to {}", args.export.display());
        }
    }
    Ok(())
}

/// Logs to stderr, or to `log_file` while the alternate screen is in use.
fn init_tracing(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match log_file {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            builder
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        None => builder.with_writer(io::stderr).init(),
    }
    Ok(())
}

fn print_summary(report: &TeamReport) {
    for agent in &report.agents {
        let status = describe(&agent.status);
        info!(explorer = agent.id, %status, "explorer summary");
        println!("Explorer {}: {status}", agent.id);
    }
    println!(
        "{} of {} explorers found an exit, {} tiles discovered",
        report.exits_found(),
        report.agents.len(),
        report.map().tile_count()
    );
}

fn describe(status: &AgentStatus) -> String {
    match status {
        AgentStatus::Finished(ExploreOutcome::ExitFound { position, ticks }) => {
            format!("exit found at {position} after {ticks} ticks")
        }
        AgentStatus::Finished(ExploreOutcome::Exhausted { ticks }) => {
            format!("no exit within {ticks} ticks")
        }
        AgentStatus::Failed(reason) => format!("failed: {reason}"),
    }
}

/// Configures the terminal for TUI interaction.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    let mut stdout = io::stdout();
    enable_raw_mode()?; // Put terminal in raw mode
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).map_err(Into::into)
}

/// Restores the terminal to its original state.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

/// Runs the main loop of the TUI application.
fn run_app(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
    runtime: &Runtime,
) -> Result<()> {
    let tick_rate = Duration::from_millis(100); // Redraw rate
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if crossterm::event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => app.quit(),
                    _ => {}
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            app.tick(runtime)?;
            last_tick = Instant::now();
        }

        if app.should_quit {
            break;
        }
    }
    Ok(())
}

/// Renders the user interface.
fn ui(frame: &mut Frame, app: &App) {
    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(70), // Maze and shared map
            Constraint::Percentage(20), // Explorer status
            Constraint::Percentage(10), // Help
        ])
        .split(frame.area());
    let maps = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(main_layout[0]);

    render_labyrinth(frame, maps[0], &app.labyrinth);
    render_shared_map(frame, maps[1], &app.map);
    render_explorers(frame, main_layout[1], app);

    let help = if app.report.is_some() {
        "Exploration complete. Press 'q' or 'Esc' to quit."
    } else {
        "Exploring... Press 'q' or 'Esc' to quit."
    };
    let help_text = Paragraph::new(help)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(help_text, main_layout[2]);
}

/// Renders each explorer's live position or final outcome.
fn render_explorers(frame: &mut Frame, area: Rect, app: &App) {
    let items: Vec<ListItem> = match &app.report {
        Some(report) => report
            .agents
            .iter()
            .map(|agent| {
                let style = match &agent.status {
                    AgentStatus::Finished(outcome) if outcome.found_exit() => {
                        Style::default().fg(Color::Green)
                    }
                    AgentStatus::Finished(_) => Style::default().fg(Color::Yellow),
                    AgentStatus::Failed(_) => Style::default().fg(Color::Red),
                };
                ListItem::new(Span::styled(
                    format!("Explorer {}: {}", agent.id, describe(&agent.status)),
                    style,
                ))
            })
            .collect(),
        None => app
            .labyrinth
            .crawler_positions()
            .into_iter()
            .enumerate()
            .map(|(id, position)| ListItem::new(format!("Explorer {id}: at {position}")))
            .collect(),
    };

    let title = format!(
        "Explorers ({} locked doors known)",
        app.map.locked_doors().len()
    );
    let list = List::new(items).block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(list, area);
}

/// Renders the true labyrinth with crawler positions.
fn render_labyrinth(frame: &mut Frame, area: Rect, labyrinth: &Labyrinth) {
    let crawlers = labyrinth.crawler_positions();

    let lines: Vec<Line> = labyrinth.with_tiles(|tiles| {
        tiles
            .rows()
            .enumerate()
            .map(|(y, row)| {
                let spans: Vec<Span> = row
                    .iter()
                    .enumerate()
                    .map(|(x, tile)| {
                        let position = Position::new(x as i32, y as i32);
                        if crawlers.contains(&position) {
                            return Span::styled("@", Style::default().fg(Color::Red).bold());
                        }
                        match tile {
                            Tile::Wall => Span::styled("#", Style::default().fg(Color::DarkGray)),
                            Tile::Door(door) if door.is_locked() => {
                                Span::styled("/", Style::default().fg(Color::Yellow))
                            }
                            Tile::Door(_) => Span::styled("+", Style::default().fg(Color::Green)),
                            Tile::Room(items) if !items.is_empty() => {
                                Span::styled("k", Style::default().fg(Color::Yellow))
                            }
                            Tile::Room(_) => Span::raw(" "),
                        }
                    })
                    .collect();
                Line::from(spans)
            })
            .collect()
    });

    let paragraph = Paragraph::new(lines)
        .block(Block::default().title("Labyrinth").borders(Borders::ALL))
        .alignment(Alignment::Center);
    frame.render_widget(paragraph, area);
}

/// Renders the team's merged knowledge.
fn render_shared_map(frame: &mut Frame, area: Rect, map: &SharedMap) {
    let export = map.export_ascii();
    let mut rows = export.lines();
    let title = rows.next().unwrap_or("Shared map").to_string();

    let lines: Vec<Line> = rows
        .skip_while(|line| line.is_empty())
        .map(|row| {
            let spans: Vec<Span> = row
                .chars()
                .map(|glyph| {
                    let style = match glyph {
                        '#' => Style::default().fg(Color::DarkGray),
                        '/' => Style::default().fg(Color::Yellow),
                        'X' => Style::default().fg(Color::Green).bold(),
                        '?' => Style::default().fg(Color::Blue),
                        _ => Style::default(),
                    };
                    Span::styled(glyph.to_string(), style)
                })
                .collect();
            Line::from(spans)
        })
        .collect();

    let paragraph = Paragraph::new(lines)
        .block(Block::default().title(title).borders(Borders::ALL))
        .alignment(Alignment::Center);
    frame.render_widget(paragraph, area);
}
