use crate::client::{search_schemes, MfApi, SchemeListing};
use crate::nav::SchemeHistory;
use crate::report::format_nav;
use crate::series::{ChartSeries, ChartStyle, Trend};
use crate::view::{RequestTicket, RequestTracker, SchemeView, WindowView};
use crate::window::TimeWindow;
use chrono::{Local, NaiveDate};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{
        Axis, Bar, BarChart, BarGroup, Block, Borders, Cell, Chart, Clear, Dataset, GraphType,
        List, ListItem, ListState, Paragraph, Row, Table, Tabs, Wrap,
    },
    Frame, Terminal,
};
use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use tui_big_text::{BigText, PixelSize};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tab {
    Schemes,
    Chart,
    History,
    Yearly,
}

impl Tab {
    fn title(self) -> &'static str {
        match self {
            Tab::Schemes => "Schemes",
            Tab::Chart => "Chart",
            Tab::History => "NAV History",
            Tab::Yearly => "Yearly Summary",
        }
    }

    fn all() -> &'static [Tab] {
        &[Tab::Schemes, Tab::Chart, Tab::History, Tab::Yearly]
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppMode {
    Normal,
    Search,
}

pub enum SchemeState {
    Idle,
    Loading { scheme_code: u64 },
    /// `scheme_code` is the code that was requested, whatever the payload says.
    Ready {
        scheme_code: u64,
        view: Box<SchemeView>,
    },
    /// The fetch failed or the scheme has no NAV rows.
    NoData {
        scheme_code: u64,
        reason: Option<String>,
    },
}

pub enum FetchMessage {
    Listing(Result<Vec<SchemeListing>, String>),
    Scheme {
        ticket: RequestTicket,
        result: Result<SchemeHistory, String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    None,
    Quit,
    Load(u64),
}

pub struct App {
    pub current_tab: Tab,
    pub mode: AppMode,
    pub should_quit: bool,
    pub schemes: Vec<SchemeListing>,
    pub listing_loading: bool,
    pub listing_error: Option<String>,
    pub search: String,
    pub selected: usize,
    pub scroll: usize,
    pub scheme: SchemeState,
    pub window: TimeWindow,
    pub chart_style: ChartStyle,
    pub default_chart_style: ChartStyle,
    pub requests: RequestTracker,
    /// Read each time a view is built, so a long-running session follows the
    /// calendar.
    pub clock: Box<dyn Fn() -> NaiveDate>,
    pub error_message: Option<String>,
}

impl App {
    pub fn new(clock: impl Fn() -> NaiveDate + 'static, chart_style: ChartStyle) -> App {
        App {
            current_tab: Tab::Schemes,
            mode: AppMode::Normal,
            should_quit: false,
            schemes: Vec::new(),
            listing_loading: true,
            listing_error: None,
            search: String::new(),
            selected: 0,
            scroll: 0,
            scheme: SchemeState::Idle,
            window: TimeWindow::OneMonth,
            chart_style,
            default_chart_style: chart_style,
            requests: RequestTracker::default(),
            clock: Box::new(clock),
            error_message: None,
        }
    }

    pub fn filtered_schemes(&self) -> Vec<&SchemeListing> {
        search_schemes(&self.schemes, &self.search)
    }

    pub fn selected_scheme_code(&self) -> Option<u64> {
        self.filtered_schemes()
            .get(self.selected)
            .map(|s| s.scheme_code)
    }

    pub fn view(&self) -> Option<&SchemeView> {
        match &self.scheme {
            SchemeState::Ready { view, .. } => Some(view.as_ref()),
            _ => None,
        }
    }

    pub fn current_scheme_code(&self) -> Option<u64> {
        match &self.scheme {
            SchemeState::Idle => None,
            SchemeState::Loading { scheme_code }
            | SchemeState::NoData { scheme_code, .. }
            | SchemeState::Ready { scheme_code, .. } => Some(*scheme_code),
        }
    }

    pub fn next_tab(&mut self) {
        let tabs = Tab::all();
        let current_index = tabs
            .iter()
            .position(|&t| t == self.current_tab)
            .unwrap_or(0);
        self.current_tab = tabs[(current_index + 1) % tabs.len()];
        self.scroll = 0;
    }

    pub fn previous_tab(&mut self) {
        let tabs = Tab::all();
        let current_index = tabs
            .iter()
            .position(|&t| t == self.current_tab)
            .unwrap_or(0);
        self.current_tab = tabs[(current_index + tabs.len() - 1) % tabs.len()];
        self.scroll = 0;
    }

    pub fn select_next(&mut self) {
        let len = self.filtered_schemes().len();
        if self.selected < len.saturating_sub(1) {
            self.selected += 1;
        }
    }

    pub fn select_previous(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    fn scrollable_rows(&self) -> usize {
        match (self.current_tab, self.view()) {
            (Tab::History, Some(view)) => view.window(self.window).records.len(),
            (Tab::Yearly, Some(view)) => view.yearly().len(),
            _ => 0,
        }
    }

    pub fn scroll_down(&mut self) {
        if self.scroll < self.scrollable_rows().saturating_sub(1) {
            self.scroll += 1;
        }
    }

    pub fn scroll_up(&mut self) {
        self.scroll = self.scroll.saturating_sub(1);
    }

    /// Marks `scheme_code` as loading and returns the ticket its response must
    /// carry. Any earlier in-flight request becomes stale.
    pub fn begin_scheme_load(&mut self, scheme_code: u64) -> RequestTicket {
        self.scheme = SchemeState::Loading { scheme_code };
        self.current_tab = Tab::Chart;
        self.scroll = 0;
        self.requests.begin(scheme_code)
    }

    /// Applies a background result. Returns `false` for stale scheme
    /// responses, which are dropped.
    pub fn apply(&mut self, message: FetchMessage) -> bool {
        match message {
            FetchMessage::Listing(Ok(schemes)) => {
                self.schemes = schemes;
                self.listing_loading = false;
                self.listing_error = None;
                self.selected = 0;
                true
            }
            FetchMessage::Listing(Err(e)) => {
                warn!(error = %e, "Scheme listing fetch failed");
                self.listing_loading = false;
                self.listing_error = Some(e);
                true
            }
            FetchMessage::Scheme { ticket, result } => {
                if !self.requests.complete(&ticket) {
                    debug!(scheme_code = ticket.scheme_code, "Discarding stale scheme response");
                    return false;
                }
                self.scheme = match result {
                    Ok(history) if !history.is_empty() => {
                        let view = SchemeView::new(history, (self.clock)());
                        self.window = view.default_window().unwrap_or(TimeWindow::MaxPeriod);
                        self.chart_style = self.default_chart_style;
                        SchemeState::Ready {
                            scheme_code: ticket.scheme_code,
                            view: Box::new(view),
                        }
                    }
                    Ok(_) => SchemeState::NoData {
                        scheme_code: ticket.scheme_code,
                        reason: None,
                    },
                    Err(e) => {
                        warn!(scheme_code = ticket.scheme_code, error = %e, "Scheme fetch failed");
                        self.error_message =
                            Some(format!("Failed to load scheme {}: {e}", ticket.scheme_code));
                        SchemeState::NoData {
                            scheme_code: ticket.scheme_code,
                            reason: Some(e),
                        }
                    }
                };
                self.scroll = 0;
                true
            }
        }
    }

    /// Unavailable windows cannot be selected.
    pub fn select_window(&mut self, window: TimeWindow) -> bool {
        let available = self
            .view()
            .is_some_and(|view| view.availability().is_available(window));
        if available {
            self.window = window;
            self.scroll = 0;
        }
        available
    }

    pub fn toggle_chart_style(&mut self) {
        self.chart_style = self.chart_style.toggled();
    }

    pub fn on_key(&mut self, code: KeyCode) -> Action {
        match self.mode {
            AppMode::Normal => match code {
                KeyCode::Char('q') | KeyCode::Esc => {
                    self.should_quit = true;
                    return Action::Quit;
                }
                KeyCode::Char('h') | KeyCode::Left | KeyCode::BackTab => self.previous_tab(),
                KeyCode::Char('l') | KeyCode::Right | KeyCode::Tab => self.next_tab(),
                KeyCode::Char('j') | KeyCode::Down => match self.current_tab {
                    Tab::Schemes => self.select_next(),
                    _ => self.scroll_down(),
                },
                KeyCode::Char('k') | KeyCode::Up => match self.current_tab {
                    Tab::Schemes => self.select_previous(),
                    _ => self.scroll_up(),
                },
                KeyCode::Char('/') => {
                    self.current_tab = Tab::Schemes;
                    self.mode = AppMode::Search;
                }
                KeyCode::Enter if self.current_tab == Tab::Schemes => {
                    if let Some(code) = self.selected_scheme_code() {
                        return Action::Load(code);
                    }
                }
                KeyCode::Char('r') => {
                    if let Some(code) = self.current_scheme_code() {
                        return Action::Load(code);
                    }
                }
                KeyCode::Char('c') => self.toggle_chart_style(),
                KeyCode::Char(c @ '1'..='7') => {
                    let index = c as usize - '1' as usize;
                    self.select_window(TimeWindow::all()[index]);
                }
                _ => {}
            },
            AppMode::Search => match code {
                KeyCode::Esc | KeyCode::Enter => self.mode = AppMode::Normal,
                KeyCode::Backspace => {
                    self.search.pop();
                    self.selected = 0;
                }
                KeyCode::Down => self.select_next(),
                KeyCode::Up => self.select_previous(),
                KeyCode::Char(c) => {
                    self.search.push(c);
                    self.selected = 0;
                }
                _ => {}
            },
        }
        Action::None
    }
}

fn spawn_listing_fetch(api: Arc<MfApi>, sender: mpsc::UnboundedSender<FetchMessage>) {
    tokio::spawn(async move {
        let result = api.list_schemes().await.map_err(|e| e.to_string());
        if sender.send(FetchMessage::Listing(result)).is_err() {
            debug!("Dashboard closed before scheme listing arrived");
        }
    });
}

fn spawn_scheme_fetch(
    api: Arc<MfApi>,
    ticket: RequestTicket,
    sender: mpsc::UnboundedSender<FetchMessage>,
) {
    tokio::spawn(async move {
        let result = api
            .scheme_history(ticket.scheme_code)
            .await
            .map_err(|e| e.to_string());
        if sender.send(FetchMessage::Scheme { ticket, result }).is_err() {
            debug!(scheme_code = ticket.scheme_code, "Dashboard closed before scheme arrived");
        }
    });
}

pub async fn run_tui(
    api: MfApi,
    chart_style: ChartStyle,
    initial_scheme: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let api = Arc::new(api);
    let mut app = App::new(|| Local::now().date_naive(), chart_style);

    // Background fetches report back over this channel
    let (sender, mut receiver) = mpsc::unbounded_channel();
    spawn_listing_fetch(api.clone(), sender.clone());
    if let Some(code) = initial_scheme {
        let ticket = app.begin_scheme_load(code);
        spawn_scheme_fetch(api.clone(), ticket, sender.clone());
    }

    let res = run_app(&mut terminal, &mut app, &api, &sender, &mut receiver).await;

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("{err:?}");
    }

    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
    api: &Arc<MfApi>,
    sender: &mpsc::UnboundedSender<FetchMessage>,
    receiver: &mut mpsc::UnboundedReceiver<FetchMessage>,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        while let Ok(message) = receiver.try_recv() {
            app.apply(message);
        }

        if crossterm::event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.error_message = None;
                    match app.on_key(key.code) {
                        Action::Load(code) => {
                            let ticket = app.begin_scheme_load(code);
                            spawn_scheme_fetch(api.clone(), ticket, sender.clone());
                        }
                        Action::Quit | Action::None => {}
                    }
                }
            }
        }

        if app.should_quit {
            break;
        }
    }
    Ok(())
}

fn ui(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(f.area());

    let tab_titles: Vec<Line> = Tab::all()
        .iter()
        .map(|t| {
            let style = if *t == app.current_tab {
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };
            Line::from(Span::styled(t.title(), style))
        })
        .collect();

    let title = match app.requests.pending() {
        Some(code) => format!("Mutual Funds - fetching {code}..."),
        None => "Mutual Funds".to_string(),
    };
    let tabs = Tabs::new(tab_titles)
        .block(Block::default().borders(Borders::ALL).title(title))
        .style(Style::default().fg(Color::White))
        .highlight_style(Style::default().fg(Color::Yellow))
        .select(
            Tab::all()
                .iter()
                .position(|&t| t == app.current_tab)
                .unwrap_or(0),
        );
    f.render_widget(tabs, chunks[0]);

    match app.current_tab {
        Tab::Schemes => render_schemes(f, chunks[1], app),
        Tab::Chart => render_chart_tab(f, chunks[1], app),
        Tab::History => render_history(f, chunks[1], app),
        Tab::Yearly => render_yearly(f, chunks[1], app),
    }

    let help = match app.mode {
        AppMode::Normal => {
            "h/l (tabs) | j/k (move) | / (search) | Enter (open) | 1-7 (period) | c (line/bar) | r (reload) | q (quit)"
        }
        AppMode::Search => "Type to search | Up/Down (move) | Enter/Esc (done)",
    };
    let help_text = Paragraph::new(help)
        .block(Block::default().borders(Borders::ALL).title("Help"))
        .style(Style::default().fg(Color::Gray))
        .alignment(Alignment::Center);
    f.render_widget(help_text, chunks[2]);

    if let Some(error) = &app.error_message {
        render_error_popup(f, error);
    }
}

fn render_schemes(f: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(area);

    let (search_text, search_style) = match app.mode {
        AppMode::Search => (format!("{}▌", app.search), Style::default().fg(Color::Yellow)),
        AppMode::Normal if app.search.is_empty() => (
            "Press / to search schemes...".to_string(),
            Style::default().fg(Color::DarkGray),
        ),
        AppMode::Normal => (app.search.clone(), Style::default().fg(Color::White)),
    };
    let search = Paragraph::new(search_text)
        .style(search_style)
        .block(Block::default().borders(Borders::ALL).title("Search"));
    f.render_widget(search, chunks[0]);

    if app.listing_loading {
        render_message(f, chunks[1], "Loading", "Loading mutual fund schemes...", Color::Yellow);
        return;
    }
    if let Some(error) = &app.listing_error {
        let text = format!("Failed to fetch mutual fund data: {error}");
        render_message(f, chunks[1], "Schemes", &text, Color::Red);
        return;
    }

    let filtered = app.filtered_schemes();
    if filtered.is_empty() {
        render_message(f, chunks[1], "Schemes", "No schemes found", Color::Gray);
        return;
    }

    // Only materialise the rows that fit, the listing has tens of thousands
    let visible = usize::from(chunks[1].height.saturating_sub(2)).max(1);
    let start = app.selected.saturating_sub(visible / 2);
    let items: Vec<ListItem> = filtered
        .iter()
        .skip(start)
        .take(visible)
        .map(|s| {
            ListItem::new(Line::from(vec![
                Span::styled(format!("{:>7}  ", s.scheme_code), Style::default().fg(Color::Cyan)),
                Span::raw(s.scheme_name.clone()),
            ]))
        })
        .collect();

    let title = format!("Schemes ({} of {})", filtered.len(), app.schemes.len());
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD));
    let mut state = ListState::default().with_selected(Some(app.selected - start));
    f.render_stateful_widget(list, chunks[1], &mut state);
}

/// Renders the placeholder for anything but a loaded scheme. Returns the
/// view when there is one to draw.
fn scheme_or_placeholder<'a>(f: &mut Frame, area: Rect, app: &'a App) -> Option<&'a SchemeView> {
    match &app.scheme {
        SchemeState::Ready { view, .. } => Some(view.as_ref()),
        SchemeState::Idle => {
            render_message(
                f,
                area,
                "Scheme",
                "Select a scheme on the Schemes tab and press Enter",
                Color::Gray,
            );
            None
        }
        SchemeState::Loading { scheme_code } => {
            let text = format!("Loading scheme details for {scheme_code}...");
            render_message(f, area, "Loading", &text, Color::Yellow);
            None
        }
        SchemeState::NoData {
            scheme_code,
            reason,
        } => {
            let text = match reason {
                Some(reason) => format!("No scheme data found for {scheme_code}\n{reason}"),
                None => format!("No scheme data found for {scheme_code}"),
            };
            render_message(f, area, "Scheme", &text, Color::Gray);
            None
        }
    }
}

fn change_span(window: &WindowView) -> Span<'static> {
    match window.change {
        Some(change) => {
            let color = if change.is_positive { Color::Green } else { Color::Red };
            Span::styled(
                format!("{} ({})", change.absolute_text(), change.percent_text()),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            )
        }
        None => Span::styled("—", Style::default().fg(Color::Gray)),
    }
}

fn render_chart_tab(f: &mut Frame, area: Rect, app: &App) {
    let Some(view) = scheme_or_placeholder(f, area, app) else {
        return;
    };
    let current = view.window(app.window);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(7),
            Constraint::Length(4),
            Constraint::Min(0),
        ])
        .split(area);

    // Scheme header: details left, latest NAV in big text right
    let header_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(chunks[0]);

    let meta = &view.history().meta;
    let latest = view.history().latest();
    let details = vec![
        Line::from(Span::styled(
            meta.scheme_name.clone(),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(meta.fund_house.clone(), Style::default().fg(Color::Cyan))),
        Line::from(format!("{} | {}", meta.scheme_type, meta.scheme_category)),
        Line::from(format!(
            "As of {}",
            latest.map(|r| r.label()).unwrap_or_default()
        )),
    ];
    let details = Paragraph::new(details)
        .block(Block::default().borders(Borders::ALL).title("Scheme"))
        .wrap(Wrap { trim: true });
    f.render_widget(details, header_chunks[0]);

    let nav_block = Block::default()
        .borders(Borders::ALL)
        .title("Latest NAV")
        .title_alignment(Alignment::Center);
    let inner = nav_block.inner(header_chunks[1]);
    f.render_widget(nav_block, header_chunks[1]);
    let big_text = BigText::builder()
        .pixel_size(PixelSize::Quadrant)
        .style(
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        )
        .lines(vec![format_nav(latest.and_then(|r| r.nav)).into()])
        .build();
    f.render_widget(big_text, inner);

    // Period buttons and performance
    let availability = view.availability();
    let mut buttons = Vec::new();
    for (i, &window) in TimeWindow::all().iter().enumerate() {
        let style = if !availability.is_available(window) {
            Style::default().fg(Color::DarkGray)
        } else if window == app.window {
            Style::default()
                .fg(Color::Black)
                .bg(Color::Yellow)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::White)
        };
        buttons.push(Span::styled(format!(" {}:{} ", i + 1, window), style));
        buttons.push(Span::raw(" "));
    }
    buttons.push(Span::styled(
        format!("  [{}]", app.chart_style),
        Style::default().fg(Color::Cyan),
    ));

    let performance = Paragraph::new(vec![
        Line::from(buttons),
        Line::from(vec![
            Span::raw(format!("{}  ", current.caption)),
            change_span(current),
        ]),
    ])
    .block(Block::default().borders(Borders::ALL).title("Period"));
    f.render_widget(performance, chunks[1]);

    if current.is_empty() {
        render_message(f, chunks[2], "NAV", "No data for this period", Color::Gray);
        return;
    }
    match app.chart_style {
        ChartStyle::Line => render_line_chart(f, chunks[2], &current.series),
        ChartStyle::Bar => render_bar_chart(f, chunks[2], &current.series),
    }
}

fn trend_color(trend: Trend) -> Color {
    match trend {
        Trend::UpOrFlat => Color::Green,
        Trend::Down => Color::Red,
    }
}

/// Splits the series into polylines of one trend each. Consecutive segments
/// with the same trend share a polyline; unknown values break the line.
fn trend_runs(series: &ChartSeries) -> Vec<(Trend, Vec<(f64, f64)>)> {
    let mut runs: Vec<(Trend, Vec<(f64, f64)>)> = Vec::new();
    let mut previous: Option<(f64, f64)> = None;

    for (i, value) in series.values.iter().enumerate() {
        let Some(v) = value else {
            previous = None;
            continue;
        };
        let point = (i as f64, *v);
        let trend = series.trends[i];

        let extends_last = previous.is_some()
            && matches!(runs.last(), Some((t, points)) if *t == trend && points.last() == previous.as_ref());
        if extends_last {
            if let Some((_, points)) = runs.last_mut() {
                points.push(point);
            }
        } else {
            let mut points: Vec<(f64, f64)> = previous.into_iter().collect();
            points.push(point);
            runs.push((trend, points));
        }
        previous = Some(point);
    }
    runs
}

fn render_line_chart(f: &mut Frame, area: Rect, series: &ChartSeries) {
    let Some(max) = series.max_value() else {
        render_message(f, area, "NAV", "No NAV values for this period", Color::Gray);
        return;
    };
    let floor = series.y_axis_floor();
    let ceiling = if max > floor { max } else { floor + 1.0 };

    let runs = trend_runs(series);
    let datasets: Vec<Dataset> = runs
        .iter()
        .map(|(trend, points)| {
            Dataset::default()
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(trend_color(*trend)))
                .data(points)
        })
        .collect();

    let x_labels = vec![
        series.labels.first().cloned().unwrap_or_default(),
        series.labels.last().cloned().unwrap_or_default(),
    ];
    let chart = Chart::new(datasets)
        .block(Block::default().borders(Borders::ALL).title("NAV (₹)"))
        .x_axis(
            Axis::default()
                .style(Style::default().fg(Color::Gray))
                .bounds([0.0, (series.len().saturating_sub(1)).max(1) as f64])
                .labels(x_labels),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(Color::Gray))
                .bounds([floor, ceiling])
                .labels(vec![format!("{floor:.2}"), format!("{ceiling:.2}")]),
        );
    f.render_widget(chart, area);
}

/// Evenly spaced indices into a series of `len` points, at most `max` of
/// them, always ending on the newest point.
fn sample_indices(len: usize, max: usize) -> Vec<usize> {
    if len <= max || max == 0 {
        return (0..len).collect();
    }
    let step = len as f64 / max as f64;
    (1..=max)
        .map(|k| ((k as f64 * step).ceil() as usize).min(len) - 1)
        .collect()
}

fn render_bar_chart(f: &mut Frame, area: Rect, series: &ChartSeries) {
    let floor = series.y_axis_floor();
    let max_bars = usize::from(area.width.saturating_sub(2) / 4).max(1);

    let bars: Vec<Bar> = sample_indices(series.len(), max_bars)
        .into_iter()
        .filter_map(|i| {
            let v = series.values[i]?;
            Some(
                Bar::default()
                    .value(((v - floor) * 100.0).round().max(0.0) as u64)
                    .text_value(String::new())
                    .style(Style::default().fg(Color::Blue)),
            )
        })
        .collect();

    let title = match (series.labels.first(), series.labels.last()) {
        (Some(first), Some(last)) => format!("NAV (₹) {first} to {last}"),
        _ => "NAV (₹)".to_string(),
    };
    let chart = BarChart::default()
        .block(Block::default().borders(Borders::ALL).title(title))
        .data(BarGroup::default().bars(&bars))
        .bar_width(3)
        .bar_gap(1);
    f.render_widget(chart, area);
}

fn change_cells(change: Option<crate::change::ChangeMetric>) -> [Cell<'static>; 2] {
    match change {
        Some(c) => {
            let style = Style::default().fg(if c.is_positive { Color::Green } else { Color::Red });
            [
                Cell::from(c.absolute_text()).style(style),
                Cell::from(c.percent_text()).style(style),
            ]
        }
        None => [Cell::from("—"), Cell::from("—")],
    }
}

fn header_row(names: &[&'static str]) -> Row<'static> {
    let cells = names.iter().map(|h| {
        Cell::from(*h).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    });
    Row::new(cells).height(1).bottom_margin(1)
}

fn render_history(f: &mut Frame, area: Rect, app: &App) {
    let Some(view) = scheme_or_placeholder(f, area, app) else {
        return;
    };
    let current = view.window(app.window);
    if current.is_empty() {
        render_message(f, area, &current.caption, "No data for this period", Color::Gray);
        return;
    }

    let rows = current
        .records
        .iter()
        .zip(&current.row_changes)
        .skip(app.scroll)
        .map(|(record, change)| {
            let [abs, pct] = change_cells(*change);
            Row::new(vec![
                Cell::from(record.label()),
                Cell::from(format_nav(record.nav)),
                abs,
                pct,
            ])
        });

    let title = format!("{} - {} rows", current.caption, current.records.len());
    let table = Table::new(
        rows,
        [
            Constraint::Percentage(25),
            Constraint::Percentage(25),
            Constraint::Percentage(25),
            Constraint::Percentage(25),
        ],
    )
    .header(header_row(&["Date", "NAV", "Change", "Change %"]))
    .block(Block::default().borders(Borders::ALL).title(title))
    .style(Style::default().fg(Color::White));
    f.render_widget(table, area);
}

fn render_yearly(f: &mut Frame, area: Rect, app: &App) {
    let Some(view) = scheme_or_placeholder(f, area, app) else {
        return;
    };
    if view.yearly().is_empty() {
        render_message(f, area, "Yearly Summary", "No yearly summary available.", Color::Gray);
        return;
    }

    let rows = view
        .yearly()
        .iter()
        .zip(view.yearly_changes())
        .skip(app.scroll)
        .map(|(row, change)| {
            let [abs, pct] = change_cells(*change);
            Row::new(vec![
                Cell::from(row.year.to_string()),
                Cell::from(format_nav(row.nav)),
                Cell::from(row.source_date.format(crate::nav::DATE_FORMAT).to_string()),
                abs,
                pct,
            ])
        });

    let title = format!(
        "Latest NAV per year, full history - Total years: {}",
        view.yearly().len()
    );
    let table = Table::new(
        rows,
        [
            Constraint::Percentage(15),
            Constraint::Percentage(25),
            Constraint::Percentage(20),
            Constraint::Percentage(20),
            Constraint::Percentage(20),
        ],
    )
    .header(header_row(&["Year", "NAV", "As of", "YoY", "YoY %"]))
    .block(Block::default().borders(Borders::ALL).title(title))
    .style(Style::default().fg(Color::White));
    f.render_widget(table, area);
}

fn render_message(f: &mut Frame, area: Rect, title: &str, text: &str, color: Color) {
    let paragraph = Paragraph::new(text.to_string())
        .block(Block::default().borders(Borders::ALL).title(title.to_string()))
        .style(Style::default().fg(color))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });

    f.render_widget(paragraph, area);
}

fn render_error_popup(f: &mut Frame, error: &str) {
    let popup_area = centered_rect(60, 20, f.area());
    f.render_widget(Clear, popup_area);

    let error_paragraph = Paragraph::new(error.to_string())
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Error")
                .style(Style::default().fg(Color::Red)),
        )
        .style(Style::default().fg(Color::White))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });

    f.render_widget(error_paragraph, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
