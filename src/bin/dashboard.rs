//! Ticket dashboard - check-in desk terminal UI
//!
//! Two views, toggled with Tab:
//! - Participants: stats, filter box and the participant table (auto-refresh)
//! - Verify: ticket id / QR payload input and the verification banner
//!
//! Network calls run on background tasks and report back over a channel;
//! the UI loop owns all view state. Logs go to a file since the UI owns the
//! terminal.

use anyhow::Context;
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Row, Table, Tabs},
    Frame, Terminal,
};
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use ticket_desk::domain::{EventInfo, Participant};
use ticket_desk::infra::{logging, ApiMetricsSummary, Config};
use ticket_desk::io::{ApiClient, RegistrarApi};
use ticket_desk::services::{Directory, DirectoryReader, TicketVerifier, VerificationOutcome};
use tokio::sync::mpsc;
use tracing::info;

const TICK_RATE: Duration = Duration::from_millis(100);

#[derive(Parser, Debug)]
#[command(name = "ticket-dashboard", version, about = "Check-in desk dashboard")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Registrar base URL (overrides api.base_url)
    #[arg(long)]
    base_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum View {
    Participants,
    Verify,
}

/// What the UI loop must do after a key press
#[derive(Debug, Clone, PartialEq, Eq)]
enum Action {
    None,
    Quit,
    Refresh,
    Verify(String),
}

/// Results reported by background tasks
#[derive(Debug)]
enum Update {
    Directory(Result<Directory, String>),
    Verified(VerificationOutcome),
}

struct DashboardState {
    event: EventInfo,
    view: View,
    /// Typing into the participant filter
    filtering: bool,
    search: String,
    verify_input: String,
    directory: Option<Directory>,
    load_error: Option<String>,
    loading: bool,
    verifying: bool,
    outcome: Option<VerificationOutcome>,
    metrics: ApiMetricsSummary,
}

impl DashboardState {
    fn new(event: EventInfo) -> Self {
        Self {
            event,
            view: View::Participants,
            filtering: false,
            search: String::new(),
            verify_input: String::new(),
            directory: None,
            load_error: None,
            loading: false,
            verifying: false,
            outcome: None,
            metrics: ApiMetricsSummary::default(),
        }
    }

    fn is_typing(&self) -> bool {
        self.view == View::Verify || self.filtering
    }

    /// Start a directory load unless one is already in flight
    fn request_refresh(&mut self) -> Action {
        if self.loading {
            return Action::None;
        }
        self.loading = true;
        Action::Refresh
    }

    fn handle_key(&mut self, key: KeyEvent) -> Action {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Action::Quit;
        }

        match key.code {
            KeyCode::Esc if self.filtering => {
                self.filtering = false;
                Action::None
            }
            KeyCode::Esc => Action::Quit,
            KeyCode::Tab => {
                self.filtering = false;
                self.view = match self.view {
                    View::Participants => View::Verify,
                    View::Verify => View::Participants,
                };
                Action::None
            }
            KeyCode::F(5) => self.request_refresh(),
            _ if self.view == View::Verify => self.handle_verify_key(key),
            _ if self.filtering => self.handle_filter_key(key),
            KeyCode::Char('q') => Action::Quit,
            KeyCode::Char('r') => self.request_refresh(),
            KeyCode::Char('/') => {
                self.filtering = true;
                Action::None
            }
            KeyCode::Backspace => {
                self.search.clear();
                Action::None
            }
            _ => Action::None,
        }
    }

    fn handle_filter_key(&mut self, key: KeyEvent) -> Action {
        match key.code {
            KeyCode::Enter => self.filtering = false,
            KeyCode::Backspace => {
                self.search.pop();
            }
            KeyCode::Char(c) => self.search.push(c),
            _ => {}
        }
        Action::None
    }

    fn handle_verify_key(&mut self, key: KeyEvent) -> Action {
        match key.code {
            KeyCode::Enter if !self.verifying => {
                self.verifying = true;
                Action::Verify(self.verify_input.clone())
            }
            KeyCode::Backspace => {
                self.verify_input.pop();
                Action::None
            }
            KeyCode::Char(c) => {
                self.verify_input.push(c);
                Action::None
            }
            _ => Action::None,
        }
    }

    fn apply(&mut self, update: Update) {
        match update {
            Update::Directory(Ok(directory)) => {
                self.loading = false;
                self.load_error = None;
                self.directory = Some(directory);
            }
            // Keep the last good snapshot on screen
            Update::Directory(Err(message)) => {
                self.loading = false;
                self.load_error = Some(message);
            }
            Update::Verified(outcome) => {
                self.verifying = false;
                if outcome.is_valid() {
                    self.verify_input.clear();
                }
                self.outcome = Some(outcome);
            }
        }
    }

    fn visible(&self) -> Vec<&Participant> {
        self.directory.as_ref().map(|d| d.filter(&self.search)).unwrap_or_default()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config_path = Config::resolve_config_path(args.config.as_deref());
    let mut config = Config::load_from_path(&config_path);
    if let Some(base_url) = &args.base_url {
        config = config.with_base_url(base_url.clone());
    }
    logging::init_file(Path::new(config.dashboard_log_file()))?;

    info!(
        config_file = %config.config_file(),
        base_url = %config.base_url(),
        refresh_secs = %config.refresh_secs(),
        "dashboard_starting"
    );

    let client = Arc::new(ApiClient::from_config(&config).context("Failed to create registrar client")?);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let state = DashboardState::new(config.event().clone());
    let refresh_every = (config.refresh_secs() > 0).then(|| Duration::from_secs(config.refresh_secs()));
    let result = run_ui(&mut terminal, state, client.clone(), refresh_every).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    client.metrics().report().log();
    info!("dashboard_stopped");
    result
}

fn spawn_refresh(api: Arc<dyn RegistrarApi>, tx: mpsc::UnboundedSender<Update>) {
    tokio::spawn(async move {
        let result = DirectoryReader::new(api).load().await.map_err(|e| e.user_message());
        let _ = tx.send(Update::Directory(result));
    });
}

fn spawn_verify(api: Arc<dyn RegistrarApi>, input: String, tx: mpsc::UnboundedSender<Update>) {
    tokio::spawn(async move {
        let outcome = TicketVerifier::new(api).verify(&input).await;
        let _ = tx.send(Update::Verified(outcome));
    });
}

async fn run_ui(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    mut state: DashboardState,
    client: Arc<ApiClient>,
    refresh_every: Option<Duration>,
) -> anyhow::Result<()> {
    let api: Arc<dyn RegistrarApi> = client.clone();
    let (tx, mut rx) = mpsc::unbounded_channel();

    state.request_refresh();
    spawn_refresh(api.clone(), tx.clone());
    let mut last_refresh = Instant::now();

    loop {
        while let Ok(update) = rx.try_recv() {
            state.apply(update);
        }
        state.metrics = client.metrics().report();

        terminal.draw(|f| draw_ui(f, &state))?;

        if event::poll(TICK_RATE)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match state.handle_key(key) {
                        Action::Quit => return Ok(()),
                        Action::Refresh => {
                            spawn_refresh(api.clone(), tx.clone());
                            last_refresh = Instant::now();
                        }
                        Action::Verify(input) => spawn_verify(api.clone(), input, tx.clone()),
                        Action::None => {}
                    }
                }
            }
        }

        if let Some(every) = refresh_every {
            if last_refresh.elapsed() >= every && state.request_refresh() == Action::Refresh {
                spawn_refresh(api.clone(), tx.clone());
                last_refresh = Instant::now();
            }
        }
    }
}

fn draw_ui(f: &mut Frame, state: &DashboardState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // View
            Constraint::Length(3), // Footer
        ])
        .split(f.area());

    draw_header(f, chunks[0], state);
    match state.view {
        View::Participants => draw_participants(f, chunks[1], state),
        View::Verify => draw_verify(f, chunks[1], state),
    }
    draw_footer(f, chunks[2], state);
}

fn draw_header(f: &mut Frame, area: Rect, state: &DashboardState) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(0), Constraint::Length(30)])
        .split(area);

    let (status_text, status_color) = if state.loading {
        ("LOADING", Color::Yellow)
    } else if state.load_error.is_some() {
        ("OFFLINE", Color::Red)
    } else if state.directory.is_some() {
        ("ONLINE", Color::Green)
    } else {
        ("-", Color::DarkGray)
    };

    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            format!("{} ", state.event.name),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!("| {} | {} | ", state.event.date, state.event.location)),
        Span::styled(status_text, Style::default().fg(status_color)),
    ]))
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(header, chunks[0]);

    let selected = match state.view {
        View::Participants => 0,
        View::Verify => 1,
    };
    let tabs = Tabs::new(vec!["Participants", "Verify"])
        .select(selected)
        .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(tabs, chunks[1]);
}

fn draw_participants(f: &mut Frame, area: Rect, state: &DashboardState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Stats
            Constraint::Length(3), // Filter
            Constraint::Min(0),    // Table
        ])
        .split(area);

    let stats_line = match (&state.directory, &state.load_error) {
        (_, Some(error)) => Line::from(Span::styled(error.clone(), Style::default().fg(Color::Red))),
        (Some(directory), None) => {
            let mut spans = vec![
                Span::raw("Total: "),
                Span::styled(
                    directory.stats.total_participants.to_string(),
                    Style::default().fg(Color::Yellow),
                ),
                Span::raw("   Today: "),
                Span::styled(
                    directory.stats.today_registrations.to_string(),
                    Style::default().fg(Color::Yellow),
                ),
                Span::raw(format!("   Updated: {}", directory.loaded_at.format("%H:%M:%S"))),
            ];
            if directory.truncated {
                spans.push(Span::styled("   (partial list)", Style::default().fg(Color::Red)));
            }
            Line::from(spans)
        }
        (None, None) => Line::from("Loading..."),
    };
    let stats = Paragraph::new(stats_line)
        .block(Block::default().title(" Registrations ").borders(Borders::ALL));
    f.render_widget(stats, chunks[0]);

    let filter_style =
        if state.filtering { Style::default().fg(Color::Yellow) } else { Style::default() };
    let cursor = if state.filtering { "_" } else { "" };
    let filter = Paragraph::new(format!("{}{}", state.search, cursor)).block(
        Block::default()
            .title(" Filter (/) ")
            .borders(Borders::ALL)
            .border_style(filter_style),
    );
    f.render_widget(filter, chunks[1]);

    let visible = state.visible();
    let rows: Vec<Row> = visible
        .iter()
        .map(|p| {
            let registered =
                p.registration_date.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default();
            Row::new(vec![
                format!("#{}", p.ticket_id),
                p.full_name.clone(),
                p.email.clone(),
                p.handle(),
                registered,
            ])
        })
        .collect();

    let total = state.directory.as_ref().map(Directory::len).unwrap_or(0);
    let table = Table::new(
        rows,
        [
            Constraint::Length(10), // Ticket
            Constraint::Percentage(25),
            Constraint::Percentage(30),
            Constraint::Percentage(20),
            Constraint::Length(10), // Registered
        ],
    )
    .header(
        Row::new(vec!["Ticket", "Name", "Email", "GitHub", "Registered"])
            .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
    )
    .block(
        Block::default()
            .title(format!(" Participants {}/{} ", visible.len(), total))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Blue)),
    );
    f.render_widget(table, chunks[2]);
}

fn draw_verify(f: &mut Frame, area: Rect, state: &DashboardState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(area);

    let input = Paragraph::new(format!("{}_", state.verify_input)).block(
        Block::default()
            .title(" Ticket ID or QR payload (Enter) ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow)),
    );
    f.render_widget(input, chunks[0]);

    let (lines, color) = match (&state.outcome, state.verifying) {
        (_, true) => (vec![Line::from("Verifying...")], Color::Yellow),
        (None, false) => (vec![Line::from("Scan or type a ticket id")], Color::DarkGray),
        (Some(outcome), false) => outcome_lines(outcome),
    };
    let result = Paragraph::new(lines).block(
        Block::default()
            .title(" Result ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(color)),
    );
    f.render_widget(result, chunks[1]);
}

fn outcome_lines(outcome: &VerificationOutcome) -> (Vec<Line<'static>>, Color) {
    let color = match outcome {
        VerificationOutcome::Valid { .. } => Color::Green,
        VerificationOutcome::Unavailable { .. } => Color::Yellow,
        _ => Color::Red,
    };
    let mut lines = vec![Line::from(Span::styled(
        outcome.label(),
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    ))];

    match outcome {
        VerificationOutcome::Valid { participant } => {
            lines.push(Line::from(""));
            lines.push(Line::from(format!("Name     {}", participant.full_name)));
            lines.push(Line::from(format!("Email    {}", participant.email)));
            lines.push(Line::from(format!("GitHub   {}", participant.handle())));
            lines.push(Line::from(format!("Ticket   #{}", participant.ticket_id)));
        }
        VerificationOutcome::NotFound { ticket, .. }
        | VerificationOutcome::Unavailable { ticket, .. } => {
            lines.push(Line::from(ticket.marked()));
        }
        VerificationOutcome::Malformed { .. } => {}
    }
    if let Some(message) = outcome.message() {
        lines.push(Line::from(message.to_string()));
    }
    (lines, color)
}

fn draw_footer(f: &mut Frame, area: Rect, state: &DashboardState) {
    let help = match state.view {
        View::Participants if state.filtering => "type to filter | Enter done | Esc cancel",
        View::Participants => "/ filter | r refresh | Tab verify | q quit",
        View::Verify => "Enter verify | Tab participants | Esc quit",
    };
    let m = &state.metrics;
    let footer = Paragraph::new(Line::from(vec![
        Span::raw(help),
        Span::styled(
            format!(
                "   req {} fail {} avg {}ms p95 {}ms",
                m.requests_total,
                m.failures_total,
                m.avg_latency_us / 1000,
                m.p95_us / 1000
            ),
            Style::default().fg(Color::DarkGray),
        ),
    ]))
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(footer, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ticket_desk::domain::{Stats, TicketId};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn typed(state: &mut DashboardState, text: &str) {
        for c in text.chars() {
            state.handle_key(key(KeyCode::Char(c)));
        }
    }

    fn participant(ticket_id: &str, name: &str, email: &str) -> Participant {
        Participant {
            id: 1,
            ticket_id: ticket_id.to_string(),
            full_name: name.to_string(),
            email: email.to_string(),
            github_username: name.to_lowercase(),
            avatar_filename: None,
            qr_code_filename: None,
            registration_date: None,
        }
    }

    fn loaded() -> DashboardState {
        let mut state = DashboardState::new(EventInfo::default());
        state.apply(Update::Directory(Ok(Directory {
            participants: vec![
                participant("TC000001", "Ada", "ada@example.com"),
                participant("TC000002", "Grace", "grace@navy.mil"),
            ],
            stats: Stats { total_participants: 2, today_registrations: 1, ..Default::default() },
            truncated: false,
            loaded_at: Utc::now(),
        })));
        state
    }

    #[test]
    fn test_q_quits_only_when_not_typing() {
        let mut state = DashboardState::new(EventInfo::default());
        assert_eq!(state.handle_key(key(KeyCode::Char('q'))), Action::Quit);

        state.handle_key(key(KeyCode::Tab));
        assert_eq!(state.view, View::Verify);
        assert_eq!(state.handle_key(key(KeyCode::Char('q'))), Action::None);
        assert_eq!(state.verify_input, "q");
        assert_eq!(state.handle_key(key(KeyCode::Esc)), Action::Quit);
    }

    #[test]
    fn test_filtering_narrows_table() {
        let mut state = loaded();
        assert_eq!(state.visible().len(), 2);

        state.handle_key(key(KeyCode::Char('/')));
        assert!(state.is_typing());
        typed(&mut state, "navy");
        assert_eq!(state.visible().len(), 1);
        assert_eq!(state.visible()[0].ticket_id, "TC000002");

        // Esc leaves filter mode without quitting and keeps the filter
        assert_eq!(state.handle_key(key(KeyCode::Esc)), Action::None);
        assert!(!state.filtering);
        assert_eq!(state.visible().len(), 1);

        state.handle_key(key(KeyCode::Backspace));
        assert_eq!(state.visible().len(), 2);
    }

    #[test]
    fn test_refresh_not_reissued_while_loading() {
        let mut state = DashboardState::new(EventInfo::default());
        assert_eq!(state.handle_key(key(KeyCode::Char('r'))), Action::Refresh);
        assert_eq!(state.handle_key(key(KeyCode::F(5))), Action::None);

        state.apply(Update::Directory(Err("Something went wrong. Please try again.".into())));
        assert!(!state.loading);
        assert!(state.load_error.is_some());
        assert_eq!(state.handle_key(key(KeyCode::F(5))), Action::Refresh);
    }

    #[test]
    fn test_failed_refresh_keeps_last_snapshot() {
        let mut state = loaded();
        state.request_refresh();
        state.apply(Update::Directory(Err("offline".into())));
        assert_eq!(state.visible().len(), 2);
    }

    #[test]
    fn test_verify_enter_issues_single_request() {
        let mut state = DashboardState::new(EventInfo::default());
        state.handle_key(key(KeyCode::Tab));
        typed(&mut state, "#TC000001");

        assert_eq!(state.handle_key(key(KeyCode::Enter)), Action::Verify("#TC000001".into()));
        assert_eq!(state.handle_key(key(KeyCode::Enter)), Action::None);

        state.apply(Update::Verified(VerificationOutcome::Valid {
            participant: participant("TC000001", "Ada", "ada@example.com"),
        }));
        assert!(!state.verifying);
        assert!(state.verify_input.is_empty());
        assert_eq!(state.outcome.as_ref().map(|o| o.label()), Some("VALID"));
    }

    #[test]
    fn test_not_found_keeps_input() {
        let mut state = DashboardState::new(EventInfo::default());
        state.handle_key(key(KeyCode::Tab));
        typed(&mut state, "TC999999");
        state.handle_key(key(KeyCode::Enter));

        let ticket = TicketId::parse("TC999999").unwrap();
        state.apply(Update::Verified(VerificationOutcome::NotFound {
            ticket,
            message: "Ticket not found".into(),
        }));
        assert_eq!(state.verify_input, "TC999999");

        let (lines, color) = outcome_lines(state.outcome.as_ref().unwrap());
        assert_eq!(color, Color::Red);
        assert_eq!(lines.len(), 3);
    }
}
