// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
    Frame,
};

use crate::app::{App, FlatHost, FlatJob, SortColumn, SortDirection, TableItem};
use crate::gridengine::types::JobState;
use crate::gridengine::StatusSnapshot;
use crate::units::{human_mem, human_time};

/// Colors for the host/job tree
const JOB_BRANCH_COLOR: Color = Color::Yellow;
const SELECTED_BG: Color = Color::DarkGray;
const HOST_NAME_COLOR: Color = Color::White;
const JOB_NAME_COLOR: Color = Color::Green;
const HEADER_BG: Color = Color::Blue;
const HEADER_FG: Color = Color::White;
const DIM: Color = Color::DarkGray;

/// Column widths
const COL_LOAD: u16 = 6;
const COL_MEM: u16 = 6;
const COL_VMEM: u16 = 8;
const COL_JOBS: u16 = 9;
const COL_STATE: u16 = 10;
const COL_QUEUE: u16 = 12;
const COL_TOOL: u16 = 14;
const COL_TIME: u16 = 12;
const FIXED_WIDTH: u16 =
    COL_LOAD + COL_MEM + COL_VMEM + COL_JOBS + COL_STATE + COL_QUEUE + COL_TOOL + COL_TIME + 8;

/// Render the entire UI
pub fn render_ui<R>(frame: &mut Frame, app: &App<R>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Title bar
            Constraint::Length(1), // Column headers
            Constraint::Min(0),    // Host/job table
            Constraint::Length(1), // Footer/status
        ])
        .split(frame.area());

    render_title(frame, chunks[0], app);
    render_column_headers(frame, chunks[1], app);
    render_table(frame, chunks[2], app);
    render_footer(frame, chunks[3], app);
}

fn constraints(name_width: u16) -> [Constraint; 9] {
    [
        Constraint::Length(COL_LOAD),
        Constraint::Length(COL_MEM),
        Constraint::Length(COL_VMEM),
        Constraint::Length(COL_JOBS),
        Constraint::Length(COL_STATE),
        Constraint::Length(COL_QUEUE),
        Constraint::Length(COL_TOOL),
        Constraint::Length(COL_TIME),
        Constraint::Min(name_width),
    ]
}

fn render_title<R>(frame: &mut Frame, area: Rect, app: &App<R>) {
    let title = " gridstat - Grid Engine status ";

    let status = match app.snapshot {
        Some(ref snapshot) => format!(
            "{} hosts {} jobs  updated {} ago  #{} {:.1}ms ",
            snapshot.hosts.len(),
            snapshot.job_count(),
            human_time(StatusSnapshot::now().saturating_sub(snapshot.generated_at)),
            app.stats.refreshes,
            app.stats.refresh_time_ms,
        ),
        None => "no data ".to_string(),
    };

    let padding = (area.width as usize).saturating_sub(title.len() + status.len());

    let header_line = Line::from(vec![
        Span::styled(title, Style::default().fg(Color::White).add_modifier(Modifier::BOLD)),
        Span::raw(" ".repeat(padding)),
        Span::styled(status, Style::default().fg(Color::Gray)),
    ]);

    let header = Paragraph::new(header_line).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_column_headers<R>(frame: &mut Frame, area: Rect, app: &App<R>) {
    let header_style = Style::default().fg(HEADER_FG).bg(HEADER_BG).add_modifier(Modifier::BOLD);
    let sorted_style = Style::default().fg(Color::LightRed).bg(HEADER_BG).add_modifier(Modifier::BOLD);

    let indicator = match app.sort_direction {
        SortDirection::Ascending => "▲",
        SortDirection::Descending => "▼",
    };

    let name_width = area.width.saturating_sub(FIXED_WIDTH);

    let fmt_header = |name: &str, col: Option<SortColumn>, width: usize, right_align: bool| {
        let is_sorted = col == Some(app.sort_column);
        let text = if is_sorted {
            if right_align {
                format!("{}{:>width$}", indicator, name, width = width - 1)
            } else {
                format!("{}{:<width$}", indicator, name, width = width - 1)
            }
        } else if right_align {
            format!("{:>width$}", name, width = width)
        } else {
            format!("{:<width$}", name, width = width)
        };
        let style = if is_sorted { sorted_style } else { header_style };
        Cell::from(text).style(style)
    };

    let headers = Row::new(vec![
        fmt_header("LOAD%", Some(SortColumn::Load), COL_LOAD as usize, true),
        fmt_header("MEM%", Some(SortColumn::Mem), COL_MEM as usize, true),
        fmt_header("VMEM", Some(SortColumn::Vmem), COL_VMEM as usize, true),
        fmt_header("JOBS", Some(SortColumn::Jobs), COL_JOBS as usize, true),
        fmt_header("STATE", None, COL_STATE as usize, false),
        fmt_header("QUEUE", None, COL_QUEUE as usize, false),
        fmt_header("TOOL", None, COL_TOOL as usize, false),
        fmt_header("RUNTIME", None, COL_TIME as usize, true),
        fmt_header("NAME", Some(SortColumn::Name), name_width.max(1) as usize, false),
    ])
    .style(header_style);

    frame.render_widget(Table::new(vec![headers], constraints(name_width)), area);
}

fn render_table<R>(frame: &mut Frame, area: Rect, app: &App<R>) {
    let visible_height = area.height as usize;

    let scroll = app.scroll_to_selection(visible_height);

    let rows: Vec<Row> = app
        .items
        .iter()
        .enumerate()
        .skip(scroll)
        .take(visible_height)
        .map(|(idx, item)| render_row(item, idx == app.selected))
        .collect();

    let name_width = area.width.saturating_sub(FIXED_WIDTH);
    let table = Table::new(rows, constraints(name_width)).block(Block::default().borders(Borders::NONE));

    frame.render_widget(table, area);
}

fn render_row(item: &TableItem, selected: bool) -> Row<'static> {
    let row_style = if selected {
        Style::default().bg(SELECTED_BG)
    } else {
        Style::default()
    };

    let row = match item {
        TableItem::Host(host) => host_row(host),
        TableItem::Job { data, is_last } => job_row(data, *is_last),
    };
    row.style(row_style)
}

fn dash(width: u16, right_align: bool) -> Cell<'static> {
    let text = if right_align {
        format!("{:>width$}", "-", width = width as usize)
    } else {
        format!("{:<width$}", "-", width = width as usize)
    };
    Cell::from(text).style(Style::default().fg(DIM))
}

/// Color for a percentage: green, yellow above 70, red above 90
fn level_color(percent: i64) -> Color {
    match percent {
        p if p > 90 => Color::Red,
        p if p > 70 => Color::Yellow,
        _ => Color::Green,
    }
}

fn host_row(host: &FlatHost) -> Row<'static> {
    let name_cell = Line::from(Span::styled(
        host.name.clone(),
        Style::default().fg(HOST_NAME_COLOR).add_modifier(Modifier::BOLD),
    ));

    Row::new(vec![
        Cell::from(format!("{:>width$}", host.load, width = COL_LOAD as usize))
            .style(Style::default().fg(level_color(host.load))),
        Cell::from(format!("{:>width$}", host.mem, width = COL_MEM as usize))
            .style(Style::default().fg(level_color(host.mem))),
        Cell::from(format!("{:>width$}", human_mem(host.vmem as f64), width = COL_VMEM as usize))
            .style(Style::default().fg(Color::Cyan)),
        Cell::from(format!("{:>width$}", host.jobs, width = COL_JOBS as usize))
            .style(Style::default().fg(Color::Blue)),
        dash(COL_STATE, false),
        dash(COL_QUEUE, false),
        dash(COL_TOOL, false),
        dash(COL_TIME, true),
        Cell::from(name_cell),
    ])
}

fn job_row(job: &FlatJob, is_last: bool) -> Row<'static> {
    let branch = if is_last { "└─ " } else { "├─ " };
    let name_cell = Line::from(vec![
        Span::styled(branch, Style::default().fg(JOB_BRANCH_COLOR)),
        Span::styled(job.name.clone(), Style::default().fg(JOB_NAME_COLOR)),
    ]);

    let state_color = match job.state {
        JobState::Running => Color::Green,
        JobState::Suspended => Color::Yellow,
        JobState::Deleting => Color::Red,
        JobState::Other(_) => Color::Gray,
    };

    let vmem = match job.h_vmem_mb {
        Some(megs) => Cell::from(format!("{:>width$}", human_mem(megs), width = COL_VMEM as usize))
            .style(Style::default().fg(Color::Cyan)),
        None => dash(COL_VMEM, true),
    };
    let runtime = match job.runtime {
        Some(secs) => Cell::from(format!("{:>width$}", human_time(secs), width = COL_TIME as usize))
            .style(Style::default().fg(Color::Gray)),
        None => dash(COL_TIME, true),
    };

    Row::new(vec![
        dash(COL_LOAD, true),
        dash(COL_MEM, true),
        vmem,
        Cell::from(format!("{:>width$}", job.num, width = COL_JOBS as usize))
            .style(Style::default().fg(Color::Yellow)),
        Cell::from(truncate(job.state.as_str(), COL_STATE)).style(Style::default().fg(state_color)),
        Cell::from(truncate(&job.queue, COL_QUEUE)).style(Style::default().fg(Color::Blue)),
        Cell::from(truncate(&job.tool, COL_TOOL)).style(Style::default().fg(Color::Magenta)),
        runtime,
        Cell::from(name_cell),
    ])
}

/// Cut `s` to fit a column, marking the cut with `+`
fn truncate(s: &str, width: u16) -> String {
    let width = width as usize;
    if s.chars().count() <= width {
        return s.to_string();
    }
    let mut out: String = s.chars().take(width.saturating_sub(1)).collect();
    out.push('+');
    out
}

fn render_footer<R>(frame: &mut Frame, area: Rect, app: &App<R>) {
    let text = if let Some(ref id) = app.error {
        Span::styled(
            format!(" Error: could not query the grid scheduler (error id {}) | r:retry q:quit ", id),
            Style::default().fg(Color::Red),
        )
    } else {
        let count = app.items.len();
        let pos = if count > 0 { app.selected + 1 } else { 0 };
        Span::styled(
            format!(" {}/{} | q:quit  j/k:nav  </> :sort  I:reverse  r:refresh ", pos, count),
            Style::default().fg(Color::Gray),
        )
    };

    frame.render_widget(Paragraph::new(Line::from(text)), area);
}
