use std::io;
use std::time::{Duration, Instant};

use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::*;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState};

use power_terminal::export::{export_csv, export_xlsx, timestamped_file_name};
use power_terminal::heatmap::{text_color, ColumnScale, Rgb};
use power_terminal::rankings::RankedTable;
use power_terminal::scoring::{explain, FormulaShape, BaseValue};
use power_terminal::settings::{load_dotenv, Settings};
use power_terminal::state::{
    limit_label, role_label, scope_label, AppState, Attribute, Focus,
};
use power_terminal::table_fetch::load_table;
use power_terminal::telemetry;

#[derive(Debug, Clone, Copy)]
enum ExportKind {
    Csv,
    Xlsx,
}

struct App {
    state: AppState,
    settings: Settings,
    should_quit: bool,
}

impl App {
    fn new(settings: Settings) -> Self {
        let mut state = AppState::new(settings.preset.config(), settings.preset, settings.limit);
        state.source = settings.source.clone();
        match settings.scoring_config() {
            Ok(config) => {
                if let Some(path) = &settings.config_path {
                    state.push_log(format!("[INFO] Scoring config loaded from {}", path.display()));
                }
                state.set_config(config, settings.config_path.is_some());
            }
            Err(err) => {
                tracing::warn!("scoring config rejected: {err:#}");
                state.push_log(format!("[WARN] {err:#}; using preset {}", settings.preset.key()));
            }
        }
        Self {
            state,
            settings,
            should_quit: false,
        }
    }

    fn reload(&mut self) {
        let load = load_table(&self.settings.source, self.settings.cache_ttl);
        match &load.error {
            None => {
                let origin = if load.from_cache { "cache" } else { "source" };
                self.state
                    .push_log(format!("[INFO] Loaded {} players from {origin}", load.records.len()));
                if !load.report.synthesized_columns.is_empty() {
                    let cols: Vec<&str> = load
                        .report
                        .synthesized_columns
                        .iter()
                        .map(|a| a.column())
                        .collect();
                    self.state
                        .push_log(format!("[WARN] Missing columns set to 0: {}", cols.join(", ")));
                }
                if load.report.coerced_cells > 0 {
                    self.state.push_log(format!(
                        "[WARN] {} non-numeric cells set to 0",
                        load.report.coerced_cells
                    ));
                }
            }
            Some(err) => self.state.push_log(format!("[WARN] Failed to load player table: {err}")),
        }
        self.state.load_error = load.error;
        self.state.loaded_at = load.fetched_at;
        self.state.set_records(load.records);
    }

    fn export(&mut self, kind: ExportKind) {
        if self.state.records.is_empty() {
            self.state.push_log("[INFO] Nothing to export");
            return;
        }
        let table = self.state.full_table();
        let (ext, result) = match kind {
            ExportKind::Csv => {
                let path = self.settings.export_dir.join(timestamped_file_name("csv"));
                ("csv", export_csv(&path, &table))
            }
            ExportKind::Xlsx => {
                let path = self.settings.export_dir.join(timestamped_file_name("xlsx"));
                ("xlsx", export_xlsx(&path, &table))
            }
        };
        match result {
            Ok(report) => {
                tracing::info!(path = %report.path.display(), rows = report.rows, "export written");
                self.state.push_log(format!(
                    "[INFO] Exported {} rows to {}",
                    report.rows,
                    report.path.display()
                ));
            }
            Err(err) => {
                tracing::warn!("{ext} export failed: {err:#}");
                self.state.push_log(format!("[WARN] Export failed: {err:#}"));
            }
        }
    }

    fn on_key(&mut self, key: KeyEvent) {
        if self.state.search_active {
            match key.code {
                KeyCode::Esc | KeyCode::Enter => self.state.search_active = false,
                KeyCode::Backspace => self.state.pop_search_char(),
                KeyCode::Char(ch) => self.state.push_search_char(ch),
                _ => {}
            }
            return;
        }

        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('?') => self.state.help_overlay = !self.state.help_overlay,
            KeyCode::Esc => self.state.help_overlay = false,
            KeyCode::Tab => self.state.cycle_focus(),
            KeyCode::Char('j') | KeyCode::Down => self.state.move_down(),
            KeyCode::Char('k') | KeyCode::Up => self.state.move_up(),
            KeyCode::Char(' ') | KeyCode::Enter => self.state.toggle_current_choice(),
            KeyCode::Char('h') | KeyCode::Left => self.nudge_weight(-1),
            KeyCode::Char('l') | KeyCode::Right => self.nudge_weight(1),
            KeyCode::Char('H') => self.nudge_weight(-10),
            KeyCode::Char('L') => self.nudge_weight(10),
            KeyCode::Char('g') => self.state.cycle_weight_role(),
            KeyCode::Char('f') => {
                self.state.cycle_preset();
                self.state
                    .push_log(format!("[INFO] Formula preset: {}", self.state.preset.key()));
            }
            KeyCode::Char('s') => self.state.toggle_scope(),
            KeyCode::Char('t') => self.state.cycle_limit(),
            KeyCode::Char('c') => self.state.clear_filters(),
            KeyCode::Char('/') => {
                self.state.search_active = true;
                self.state.focus = Focus::Table;
            }
            KeyCode::Char('r') => {
                self.state.push_log("[INFO] Reloading player table");
                self.reload();
            }
            KeyCode::Char('e') => self.export(ExportKind::Csv),
            KeyCode::Char('x') => self.export(ExportKind::Xlsx),
            _ => {}
        }
    }

    fn nudge_weight(&mut self, steps: i32) {
        if self.state.focus == Focus::Weights {
            self.state.adjust_weight(steps);
        }
    }
}

fn main() -> anyhow::Result<()> {
    load_dotenv();
    let settings = Settings::from_env();
    let log_path = telemetry::default_log_path();
    let log_ready = telemetry::init_file(&settings.log_filter, &log_path);

    let mut app = App::new(settings);
    if let Err(err) = log_ready {
        app.state.push_log(format!("[WARN] File logging disabled: {err:#}"));
    }
    app.reload();

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("error: {err}");
    }
    Ok(())
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.on_key(key);
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn ui(frame: &mut Frame, app: &App) {
    let area = frame.size();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(5),
            Constraint::Length(1),
        ])
        .split(area);

    let header = Paragraph::new(header_text(&app.state))
        .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, chunks[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(26),
            Constraint::Min(40),
            Constraint::Length(34),
        ])
        .split(chunks[1]);

    render_sidebar(frame, body[0], &app.state);
    render_ranking_table(frame, body[1], &app.state);
    render_detail(frame, body[2], &app.state);

    let console = Paragraph::new(console_text(&app.state))
        .block(Block::default().title("Console").borders(Borders::ALL));
    frame.render_widget(console, chunks[2]);

    let footer = Paragraph::new(footer_text(&app.state)).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(footer, chunks[3]);

    if app.state.help_overlay {
        render_help_overlay(frame, area);
    }
}

fn header_text(state: &AppState) -> String {
    let formula = if state.config_from_file {
        format!("file:{}", state.config.name)
    } else {
        state.config.name.clone()
    };
    let loaded = match (&state.load_error, state.loaded_at) {
        (Some(_), _) => "load failed".to_string(),
        (None, Some(at)) => format!("loaded {}", at.format("%H:%M:%S")),
        (None, None) => "not loaded".to_string(),
    };
    let line1 = format!(
        "  .-.  POWER RANKING | Formula: {formula} | Rank: {} | {} | {} of {} players | {loaded}",
        scope_label(state.filters.scope),
        limit_label(state.limit),
        state.table.len(),
        state.table.population,
    );
    let search = if state.search_active || !state.filters.query.is_empty() {
        format!("  Search: {}{}", state.filters.query, if state.search_active { "_" } else { "" })
    } else {
        String::new()
    };
    let line2 = format!(" /___\\ {}{search}", state.source);
    let line3 = "  |_|".to_string();
    format!("{line1}\n{line2}\n{line3}")
}

fn footer_text(state: &AppState) -> String {
    if state.search_active {
        return "Type to search | Backspace Delete | Enter/Esc Done".to_string();
    }
    match state.focus {
        Focus::Weights => {
            "Tab Focus | j/k Attr | h/l -/+0.01 | H/L -/+0.10 | g Role | f Preset | ? Help | q Quit"
                .to_string()
        }
        Focus::Positions | Focus::Rarities => {
            "Tab Focus | j/k Move | Space Toggle | c Clear | ? Help | q Quit".to_string()
        }
        Focus::Table => {
            "Tab Focus | j/k Move | / Search | f Preset | s Scope | t Top-N | r Reload | e CSV | x XLSX | ? Help | q Quit"
                .to_string()
        }
    }
}

fn pane_block(title: &str, focused: bool) -> Block<'_> {
    let style = if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(style)
}

fn render_sidebar(frame: &mut Frame, area: Rect, state: &AppState) {
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(30),
            Constraint::Percentage(30),
            Constraint::Min(12),
        ])
        .split(area);

    let positions = choice_lines(
        &state.position_choices,
        &state.filters.positions,
        state.position_cursor,
        state.focus == Focus::Positions,
    );
    frame.render_widget(
        Paragraph::new(positions).block(pane_block("Position", state.focus == Focus::Positions)),
        sections[0],
    );

    let rarities = choice_lines(
        &state.rarity_choices,
        &state.filters.rarities,
        state.rarity_cursor,
        state.focus == Focus::Rarities,
    );
    frame.render_widget(
        Paragraph::new(rarities).block(pane_block("Rarity", state.focus == Focus::Rarities)),
        sections[1],
    );

    frame.render_widget(
        Paragraph::new(weights_text(state)).block(pane_block("Weights", state.focus == Focus::Weights)),
        sections[2],
    );
}

fn choice_lines(
    choices: &[String],
    selected: &std::collections::BTreeSet<String>,
    cursor: usize,
    focused: bool,
) -> String {
    if choices.is_empty() {
        return "No values".to_string();
    }
    choices
        .iter()
        .enumerate()
        .map(|(idx, choice)| {
            let pointer = if focused && idx == cursor { ">" } else { " " };
            let mark = if selected.contains(choice) { "x" } else { " " };
            format!("{pointer}[{mark}] {choice}")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn weights_text(state: &AppState) -> String {
    let formula = state.config.formula(state.weight_role);
    let shape = match formula.shape {
        FormulaShape::WeightedSum => "weighted sum".to_string(),
        FormulaShape::BaselineBonus { base } => match base {
            BaseValue::Pwr => "bonus vs PWR".to_string(),
            BaseValue::Fixed { value } => format!("bonus vs {value}"),
            BaseValue::RoleMean => "bonus vs mean".to_string(),
        },
    };
    let mut lines = vec![
        format!("{} ({shape})", role_label(state.weight_role)),
        format!("Sum of weights: {:.2}", formula.weight_total()),
    ];
    if formula.baseline_offset != 0.0 || formula.scale_factor != 1.0 {
        lines.push(format!(
            "Offset {:.2} x{:.2}",
            formula.baseline_offset, formula.scale_factor
        ));
    }
    for (idx, attr) in Attribute::ALL.iter().enumerate() {
        let pointer = if state.focus == Focus::Weights && idx == state.weight_cursor {
            ">"
        } else {
            " "
        };
        lines.push(format!("{pointer} {:<13} {:.2}", attr.column(), formula.weight(*attr)));
    }
    lines.join("\n")
}

fn heat_style(scale: Option<ColumnScale>, value: f64) -> Style {
    let Some(scale) = scale else {
        return Style::default();
    };
    let bg = scale.color(value);
    let fg = text_color(bg);
    Style::default().bg(to_color(bg)).fg(to_color(fg))
}

fn to_color(rgb: Rgb) -> Color {
    Color::Rgb(rgb.0, rgb.1, rgb.2)
}

fn render_ranking_table(frame: &mut Frame, area: Rect, state: &AppState) {
    let block = pane_block("Power Ranking", state.focus == Focus::Table);
    let table: &RankedTable = &state.table;
    if table.is_empty() {
        let message = match (&state.load_error, state.records.is_empty()) {
            (Some(_), _) => "Player table unavailable (see console)",
            (None, true) => "No players loaded",
            (None, false) => "No players match the current filters",
        };
        let empty = Paragraph::new(message)
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(empty, area);
        return;
    }

    let score_scale = ColumnScale::from_values(table.rows.iter().map(|r| r.score));
    let attr_scales: Vec<Option<ColumnScale>> = Attribute::ALL
        .iter()
        .map(|attr| ColumnScale::from_values(table.rows.iter().map(|r| r.record.attr(*attr))))
        .collect();

    let bold = Style::default().add_modifier(Modifier::BOLD);
    let mut header_cells = vec![
        Cell::from("Rank"),
        Cell::from("Score"),
        Cell::from("Name"),
        Cell::from("Pos"),
        Cell::from("Nation"),
        Cell::from("Rarity"),
        Cell::from("Season"),
    ];
    header_cells.extend(Attribute::ALL.iter().map(|a| Cell::from(a.short_label())));
    let header = Row::new(header_cells).style(bold);

    let rows: Vec<Row> = table
        .rows
        .iter()
        .map(|row| {
            let mut cells = vec![
                Cell::from(row.rank.to_string()),
                Cell::from(format!("{:.2}", row.score)).style(heat_style(score_scale, row.score)),
                Cell::from(row.record.name.clone()),
                Cell::from(row.record.pos.clone()),
                Cell::from(row.record.nationality.clone()),
                Cell::from(row.record.rarity.clone()),
                Cell::from(row.record.season.clone()),
            ];
            for (attr, scale) in Attribute::ALL.iter().zip(&attr_scales) {
                let value = row.record.attr(*attr);
                cells.push(Cell::from(format!("{value:.0}")).style(heat_style(*scale, value)));
            }
            Row::new(cells)
        })
        .collect();

    let mut widths = vec![
        Constraint::Length(5),
        Constraint::Length(7),
        Constraint::Min(14),
        Constraint::Length(4),
        Constraint::Length(11),
        Constraint::Length(9),
        Constraint::Length(7),
    ];
    widths.extend(Attribute::ALL.iter().map(|_| Constraint::Length(4)));

    let ranking = Table::new(rows, widths)
        .header(header)
        .block(block)
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol(">");

    let mut table_state = TableState::default();
    table_state.select(Some(state.selected));
    frame.render_stateful_widget(ranking, area, &mut table_state);
}

fn render_detail(frame: &mut Frame, area: Rect, state: &AppState) {
    let block = Block::default().title("Breakdown").borders(Borders::ALL);
    let Some(row) = state.selected_row() else {
        frame.render_widget(Paragraph::new("No player selected").block(block), area);
        return;
    };

    let explained = explain(&row.record, &state.config);
    let mut lines = vec![
        row.record.name.clone(),
        format!(
            "{} | {} | {}",
            if row.record.pos.is_empty() { "-" } else { row.record.pos.as_str() },
            role_label(explained.role),
            if row.record.rarity.is_empty() { "-" } else { row.record.rarity.as_str() },
        ),
        format!("Rank {}  Score {:.2}", row.rank, row.score),
        String::new(),
    ];
    if let Some(base) = explained.base {
        lines.push(format!("Base            {base:>7.2}"));
    }
    for part in &explained.contributions {
        lines.push(format!(
            "{:<4} {:>5.0} x{:.2} {:>+7.2}",
            part.attribute.short_label(),
            part.value,
            part.weight,
            part.amount
        ));
    }
    lines.push(format!("Raw             {:>7.2}", explained.raw));

    frame.render_widget(Paragraph::new(lines.join("\n")).block(block), area);
}

fn console_text(state: &AppState) -> String {
    if state.logs.is_empty() {
        return "No alerts yet".to_string();
    }
    state
        .logs
        .iter()
        .rev()
        .take(3)
        .cloned()
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(60, 70, area);
    frame.render_widget(Clear, popup_area);

    let text = [
        "Power Ranking - Help",
        "",
        "Global:",
        "  Tab          Cycle focus (table, position, rarity, weights)",
        "  j/k or ↑/↓   Move",
        "  /            Search name or nationality",
        "  f            Next formula preset",
        "  s            Rank over all players / filtered players",
        "  t            Cycle display budget",
        "  c            Clear filters",
        "  r            Reload player table",
        "  e / x        Export full ranking as CSV / XLSX",
        "  ?            Toggle help",
        "  q            Quit",
        "",
        "Filters:",
        "  Space/Enter  Toggle value",
        "",
        "Weights:",
        "  h/l or ←/→   -/+ 0.01",
        "  H/L          -/+ 0.10",
        "  g            Switch goalkeeper / outfield",
    ]
    .join("\n");

    let help = Paragraph::new(text)
        .block(Block::default().title("Help").borders(Borders::ALL))
        .style(Style::default());
    frame.render_widget(help, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}
