use crate::config::Config;
use crate::pipeline::{self, Dashboard};
use crate::report::format_amount;
use crate::table::Value;
use anyhow::Result;
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
    widgets::{BarChart, Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap},
    Frame, Terminal,
};
use std::io;
use tracing::warn;

const PAGE_STEP: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Overview,
    Sellers,
    Records,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Overview => Page::Sellers,
            Page::Sellers => Page::Records,
            Page::Records => Page::Overview,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Page::Overview => Page::Records,
            Page::Sellers => Page::Overview,
            Page::Records => Page::Sellers,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Overview => "Overview",
            Page::Sellers => "Sellers",
            Page::Records => "Records",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterType {
    None,
    ByBranch(String),
}

/// What the last pipeline run left to say
#[derive(Debug, Clone, PartialEq)]
pub enum Banner {
    Waiting(String),
    Error(String),
}

pub struct App {
    pub config: Config,
    /// None until a run succeeds, and again after any failed run
    pub dashboard: Option<Dashboard>,
    /// Indices into the global table's rows
    pub filtered_rows: Vec<usize>,
    pub state: TableState,
    pub sellers_state: TableState,
    pub current_page: Page,
    pub show_detail: bool,
    pub active_filter: FilterType,
    pub banner: Option<Banner>,
}

impl App {
    pub fn new(config: Config) -> Self {
        let mut app = Self {
            config,
            dashboard: None,
            filtered_rows: Vec::new(),
            state: TableState::default(),
            sellers_state: TableState::default(),
            current_page: Page::Overview,
            show_detail: false,
            active_filter: FilterType::None,
            banner: None,
        };
        app.reload();
        app
    }

    /// Re-run the pipeline from the configured paths
    pub fn reload(&mut self) {
        match pipeline::run(&self.config) {
            Ok(dashboard) => {
                self.dashboard = Some(dashboard);
                self.banner = None;
                self.apply_filter(self.active_filter.clone());
                let len = self.sellers_len();
                select_first(&mut self.sellers_state, len);
            }
            Err(e) => {
                // Either the full dashboard or the notice, never stale data
                self.dashboard = None;
                self.filtered_rows.clear();
                self.state.select(None);
                self.sellers_state.select(None);

                if e.is_waiting() {
                    self.banner = Some(Banner::Waiting(e.to_string()));
                } else {
                    warn!("Reload failed: {}", e);
                    self.banner = Some(Banner::Error(e.to_string()));
                }
            }
        }
    }

    pub fn branch_labels(&self) -> Vec<&str> {
        self.config.branches.iter().map(|b| b.label.as_str()).collect()
    }

    pub fn apply_filter(&mut self, filter: FilterType) {
        self.active_filter = filter;

        self.filtered_rows = match &self.dashboard {
            None => Vec::new(),
            Some(dashboard) => {
                let table = &dashboard.table;
                match &self.active_filter {
                    FilterType::None => (0..table.len()).collect(),
                    FilterType::ByBranch(label) => (0..table.len())
                        .filter(|&i| {
                            table
                                .get(i, &self.config.columns.origin)
                                .and_then(Value::key)
                                .as_deref()
                                == Some(label.as_str())
                        })
                        .collect(),
                }
            }
        };

        select_first(&mut self.state, self.filtered_rows.len());
    }

    /// Keys 1-9 map to the configured branches in order
    pub fn filter_by_branch_index(&mut self, index: usize) {
        if let Some(label) = self.config.branches.get(index).map(|b| b.label.clone()) {
            self.apply_filter(FilterType::ByBranch(label));
            self.current_page = Page::Records;
        }
    }

    pub fn clear_filter(&mut self) {
        self.apply_filter(FilterType::None);
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
    }

    pub fn previous_page(&mut self) {
        self.current_page = self.current_page.previous();
    }

    fn sellers_len(&self) -> usize {
        self.dashboard
            .as_ref()
            .map_or(0, |d| d.summary.by_seller.len())
    }

    /// Table state and length of the list on the current page
    fn current_list(&mut self) -> Option<(&mut TableState, usize)> {
        match self.current_page {
            Page::Overview => None,
            Page::Sellers => {
                let len = self.sellers_len();
                Some((&mut self.sellers_state, len))
            }
            Page::Records => Some((&mut self.state, self.filtered_rows.len())),
        }
    }

    pub fn next(&mut self) {
        if let Some((state, len)) = self.current_list() {
            if len == 0 {
                return;
            }
            let i = match state.selected() {
                Some(i) if i + 1 < len => i + 1,
                _ => 0,
            };
            state.select(Some(i));
        }
    }

    pub fn previous(&mut self) {
        if let Some((state, len)) = self.current_list() {
            if len == 0 {
                return;
            }
            let i = match state.selected() {
                Some(0) | None => len - 1,
                Some(i) => i - 1,
            };
            state.select(Some(i));
        }
    }

    pub fn page_down(&mut self) {
        if let Some((state, len)) = self.current_list() {
            if len == 0 {
                return;
            }
            let i = state.selected().map_or(0, |i| (i + PAGE_STEP).min(len - 1));
            state.select(Some(i));
        }
    }

    pub fn page_up(&mut self) {
        if let Some((state, _)) = self.current_list() {
            let i = state.selected().map_or(0, |i| i.saturating_sub(PAGE_STEP));
            state.select(Some(i));
        }
    }

    pub fn home(&mut self) {
        if let Some((state, len)) = self.current_list() {
            select_first(state, len);
        }
    }

    pub fn end(&mut self) {
        if let Some((state, len)) = self.current_list() {
            if len > 0 {
                state.select(Some(len - 1));
            }
        }
    }

    /// Column/value pairs of the highlighted record
    pub fn selected_record(&self) -> Option<Vec<(&str, &Value)>> {
        let dashboard = self.dashboard.as_ref()?;
        let row = *self.filtered_rows.get(self.state.selected()?)?;
        dashboard.table.record(row)
    }

    /// Returns true when the app should quit
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Enter => self.toggle_detail(),
            KeyCode::Tab => self.next_page(),
            KeyCode::BackTab => self.previous_page(),
            KeyCode::Char('r') => self.reload(),
            KeyCode::Char('c') => self.clear_filter(),
            KeyCode::Char(ch @ '1'..='9') => {
                if let Some(digit) = ch.to_digit(10) {
                    self.filter_by_branch_index(digit as usize - 1);
                }
            }
            KeyCode::Down | KeyCode::Char('j') => self.next(),
            KeyCode::Up | KeyCode::Char('k') => self.previous(),
            KeyCode::PageDown => self.page_down(),
            KeyCode::PageUp => self.page_up(),
            KeyCode::Home => self.home(),
            KeyCode::End => self.end(),
            _ => {}
        }
        false
    }
}

fn select_first(state: &mut TableState, len: usize) {
    if len > 0 {
        state.select(Some(0));
    } else {
        state.select(None);
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res?;
    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            // Some terminals report Shift-Tab as Tab + SHIFT
            let key = if key.code == KeyCode::Tab && key.modifiers.contains(KeyModifiers::SHIFT) {
                KeyEvent::new(KeyCode::BackTab, key.modifiers)
            } else {
                key
            };
            if app.handle_key(key) {
                return Ok(());
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let banner_height = if app.banner.is_some() { 3 } else { 0 };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),             // Header with navigation
            Constraint::Length(banner_height), // Waiting / error banner
            Constraint::Min(0),                // Content area
            Constraint::Length(3),             // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);
    render_banner(f, chunks[1], app);

    if app.dashboard.is_none() {
        render_empty(f, chunks[2]);
    } else if app.show_detail && app.current_page == Page::Records {
        let content_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(chunks[2]);

        render_records(f, content_chunks[0], app);
        render_detail_panel(f, content_chunks[1], app);
    } else {
        match app.current_page {
            Page::Overview => render_overview(f, chunks[2], app),
            Page::Sellers => render_sellers(f, chunks[2], app),
            Page::Records => render_records(f, chunks[2], app),
        }
    }

    render_status_bar(f, chunks[3], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let pages = [Page::Overview, Page::Sellers, Page::Records];

    let mut tab_spans = vec![];
    for (i, page) in pages.iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }
        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        tab_spans.push(Span::styled(page.title().to_string(), style));
    }

    if let Some(dashboard) = &app.dashboard {
        tab_spans.push(Span::raw("  |  "));
        tab_spans.push(Span::styled(
            format!(
                "Total: {}",
                format_amount(dashboard.summary.total_amount, &app.config.currency)
            ),
            Style::default().fg(Color::Green),
        ));
        tab_spans.push(Span::raw("  |  "));
        tab_spans.push(Span::styled(
            format!("{} sales", dashboard.summary.row_count),
            Style::default().fg(Color::White),
        ));
    }

    let header = Paragraph::new(Line::from(tab_spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(" Sales Dashboard "),
    );
    f.render_widget(header, area);
}

fn render_banner(f: &mut Frame, area: Rect, app: &App) {
    let (text, color) = match &app.banner {
        Some(Banner::Waiting(message)) => (format!("⏳ {}", message), Color::Yellow),
        Some(Banner::Error(message)) => (format!("Error: {}", message), Color::Red),
        None => return,
    };

    let banner = Paragraph::new(text)
        .style(Style::default().fg(color))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(color)),
        );
    f.render_widget(banner, area);
}

fn render_empty(f: &mut Frame, area: Rect) {
    let content = Paragraph::new(vec![
        Line::from(""),
        Line::from("  No data loaded yet."),
        Line::from("  Provide a file for every branch, then press r to reload."),
    ])
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(content, area);
}

fn render_overview(f: &mut Frame, area: Rect, app: &App) {
    let Some(dashboard) = &app.dashboard else {
        return;
    };
    let summary = &dashboard.summary;
    let currency = &app.config.currency;

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Min(0)])
        .split(area);

    let cards = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 4); 4])
        .split(rows[0]);

    let period = summary
        .date_range
        .map(|r| r.display())
        .unwrap_or_else(|| "n/a".to_string());
    let card_data = [
        ("Total sales", format_amount(summary.total_amount, currency), Color::Green),
        ("Sales", summary.row_count.to_string(), Color::White),
        ("Salespeople", summary.seller_count.to_string(), Color::White),
        ("Period", period, Color::Cyan),
    ];
    for (chunk, (title, value, color)) in cards.iter().zip(card_data) {
        let card = Paragraph::new(Span::styled(
            value,
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" {} ", title)),
        );
        f.render_widget(card, *chunk);
    }

    let charts = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(rows[1]);

    let branch_data: Vec<(&str, u64)> = summary
        .by_branch
        .iter()
        .map(|s| (s.branch.as_str(), bar_value(s.amount)))
        .collect();
    let branch_chart = BarChart::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Sales by branch "),
        )
        .data(branch_data.as_slice())
        .bar_width(10)
        .bar_gap(2)
        .bar_style(Style::default().fg(Color::Cyan))
        .value_style(Style::default().fg(Color::Black).bg(Color::Cyan));
    f.render_widget(branch_chart, charts[0]);

    let month_data: Vec<(&str, u64)> = summary
        .by_month
        .iter()
        .map(|m| (short_label(&m.month_name), bar_value(m.amount)))
        .collect();
    let month_chart = BarChart::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Sales by month "),
        )
        .data(month_data.as_slice())
        .bar_width(5)
        .bar_gap(1)
        .bar_style(Style::default().fg(Color::Green))
        .value_style(Style::default().fg(Color::Black).bg(Color::Green));
    f.render_widget(month_chart, charts[1]);
}

fn render_sellers(f: &mut Frame, area: Rect, app: &mut App) {
    let Some(dashboard) = &app.dashboard else {
        return;
    };
    let summary = &dashboard.summary;
    let currency = &app.config.currency;

    let header_cells = ["Branch", "Salesperson", "Amount", "Share"].iter().map(|h| {
        Cell::from(*h).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    });
    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows = summary.by_seller.iter().map(|stat| {
        let share = if summary.total_amount != 0.0 {
            stat.amount / summary.total_amount * 100.0
        } else {
            0.0
        };
        Row::new(vec![
            Cell::from(stat.branch.clone()),
            Cell::from(truncate(&stat.salesperson, 28)),
            Cell::from(format_amount(stat.amount, currency))
                .style(Style::default().fg(Color::Green)),
            Cell::from(format!("{:.1}%", share)),
        ])
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(18),
            Constraint::Length(30),
            Constraint::Length(22),
            Constraint::Length(8),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Sales by salesperson "),
    )
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.sellers_state);
}

fn render_records(f: &mut Frame, area: Rect, app: &mut App) {
    let Some(dashboard) = &app.dashboard else {
        return;
    };
    let table_data = &dashboard.table;
    let amount_column = table_data.column_index(&app.config.columns.amount);

    let header_cells = table_data.columns().iter().map(|h| {
        Cell::from(truncate(h, 16)).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    });
    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows = app.filtered_rows.iter().filter_map(|&i| {
        let row = table_data.rows().get(i)?;
        let cells = row.iter().enumerate().map(|(col, value)| {
            let cell = Cell::from(truncate(&value.to_string(), 16));
            if Some(col) == amount_column {
                cell.style(Style::default().fg(Color::Green))
            } else if value.is_null() {
                cell.style(Style::default().fg(Color::DarkGray))
            } else {
                cell
            }
        });
        Some(Row::new(cells))
    });

    let widths = vec![Constraint::Length(17); table_data.columns().len()];
    let title = match &app.active_filter {
        FilterType::None => " Records ".to_string(),
        FilterType::ByBranch(label) => format!(" Records - {} ", label),
    };

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White))
                .title(title),
        )
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_detail_panel(f: &mut Frame, area: Rect, app: &App) {
    let lines: Vec<Line> = match app.selected_record() {
        Some(record) => record
            .into_iter()
            .map(|(column, value)| {
                Line::from(vec![
                    Span::styled(
                        format!("{}: ", column),
                        Style::default()
                            .fg(Color::Cyan)
                            .add_modifier(Modifier::BOLD),
                    ),
                    Span::raw(value.to_string()),
                ])
            })
            .collect(),
        None => vec![Line::from("No record selected")],
    };

    let detail = Paragraph::new(lines).wrap(Wrap { trim: true }).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(" Record Detail "),
    );
    f.render_widget(detail, area);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let mut status_spans = vec![];

    if app.current_page == Page::Records {
        let selected = app.state.selected().map(|i| i + 1).unwrap_or(0);
        status_spans.push(Span::styled(
            format!(" Row: {}/{} ", selected, app.filtered_rows.len()),
            Style::default().fg(Color::Cyan),
        ));
        status_spans.push(Span::raw(" | "));
    }

    if let FilterType::ByBranch(label) = &app.active_filter {
        status_spans.push(Span::styled(
            format!("Filter: {}", label),
            Style::default().fg(Color::Green),
        ));
        status_spans.push(Span::raw(" ("));
        status_spans.push(Span::styled("c", Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(" clear) | "));
    }

    let branch_count = app.branch_labels().len().min(9);
    if branch_count > 0 {
        status_spans.push(Span::styled(
            format!("1-{}", branch_count),
            Style::default().fg(Color::Yellow),
        ));
        status_spans.push(Span::raw(" Branch | "));
    }
    status_spans.push(Span::styled("Enter", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Details | "));
    status_spans.push(Span::styled("Tab", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Page | "));
    status_spans.push(Span::styled("↑/↓", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Nav | "));
    status_spans.push(Span::styled("r", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Reload | "));
    status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(Line::from(status_spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );
    f.render_widget(status_bar, area);
}

/// Bars cannot go negative
fn bar_value(amount: f64) -> u64 {
    if amount.is_finite() && amount > 0.0 {
        amount.round() as u64
    } else {
        0
    }
}

/// First three letters of a month name
fn short_label(name: &str) -> &str {
    match name.char_indices().nth(3) {
        Some((idx, _)) => &name[..idx],
        None => name,
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
