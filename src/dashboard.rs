//! Interactive terminal dashboard: filter pickers on the left, pivot or data table on the right.
//!
//! Every interaction recomputes cascading options, the filtered table and the pivot from the
//! prepared dataset; nothing is carried over between interactions except the workbook cache.

use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent};
use polars::prelude::DataFrame;
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, StatefulWidget, Widget},
};
use std::collections::BTreeMap;
use std::sync::mpsc::Sender;
use tracing::{debug, info};

use crate::chart_export::{bar_color, write_chart, BarChart};
use crate::config::{AppConfig, Theme};
use crate::dataset::{Analysis, Dataset, DatasetKind};
use crate::error::user_message_from_report;
use crate::export::{export_csv, export_file_name, ExportOptions};
use crate::filter::{CascadeOptions, DateRange, FilterSelection};
use crate::pivot::{Measure, PivotSpec};
use crate::roles::SemanticRole;
use crate::session::{Session, SessionOptions};
use crate::table_text::frame_cells;
use crate::widgets::controls::Controls;
use crate::widgets::picker::{FilterPicker, PickerState};
use crate::widgets::summary::{ResultTable, TableView};

/// Rows rendered in the data view; the caption still reports the full count.
const DATA_VIEW_LIMIT: usize = 2000;
const TOP_N_STEP: usize = 5;
const PICKERS: usize = SemanticRole::FILTER_ORDER.len();
const TABLE_FOCUS: usize = PICKERS;

static NO_SELECTION: FilterSelection = FilterSelection {
    values: BTreeMap::new(),
    date_range: None,
};

#[derive(Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Resize(u16, u16),
    Recompute,
    Reload,
    ExportCsv,
    ExportChart,
    Exit,
    Crash(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Pivot,
    Data,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Info(String),
    Error(String),
}

pub struct Dashboard {
    session: Session,
    options: SessionOptions,
    config: AppConfig,
    theme: Theme,
    events: Sender<AppEvent>,
    pub active: DatasetKind,
    selections: BTreeMap<DatasetKind, FilterSelection>,
    pub spec: PivotSpec,
    pub view: View,
    pub focus: usize,
    pickers: [PickerState; PICKERS],
    pub cascade: CascadeOptions,
    pub date_bounds: Option<DateRange>,
    pub analysis: Option<Analysis>,
    table: TableView,
    pub status: Option<Status>,
}

/// Options with selections pruned until they are stable, then the date bounds.
fn refresh_options(
    dataset: &Dataset,
    selection: &mut FilterSelection,
) -> Result<(CascadeOptions, Option<DateRange>)> {
    let mut options = dataset.options(selection)?;
    while selection.prune(&options) {
        debug!("pruned selections no longer offered");
        options = dataset.options(selection)?;
    }
    Ok((options, dataset.date_bounds()?))
}

impl Dashboard {
    pub fn new(
        session: Session,
        options: SessionOptions,
        config: AppConfig,
        theme: Theme,
        events: Sender<AppEvent>,
    ) -> Result<Self> {
        let active = options.active;
        let selection = options.initial_selection(session.dataset(active)?)?;
        let mut dashboard = Self {
            spec: options.pivot.clone(),
            session,
            options,
            config,
            theme,
            events,
            active,
            selections: BTreeMap::from([(active, selection)]),
            view: View::Pivot,
            focus: 0,
            pickers: Default::default(),
            cascade: CascadeOptions::default(),
            date_bounds: None,
            analysis: None,
            table: TableView::default(),
            status: None,
        };
        dashboard.recompute();
        Ok(dashboard)
    }

    pub fn send_event(&mut self, event: AppEvent) -> Result<()> {
        self.events.send(event)?;
        Ok(())
    }

    fn color(&self, name: &str) -> Color {
        self.theme.get(name)
    }

    pub fn selection(&self) -> &FilterSelection {
        self.selections
            .get(&self.active)
            .unwrap_or(&NO_SELECTION)
    }

    fn selection_mut(&mut self) -> &mut FilterSelection {
        self.selections.entry(self.active).or_default()
    }

    fn fail(&mut self, report: &color_eyre::eyre::Report) {
        self.status = Some(Status::Error(user_message_from_report(report, None)));
    }

    /// Recompute options, filtered table and pivot for the active dataset.
    pub fn recompute(&mut self) {
        let selection = self.selections.entry(self.active).or_default();
        let dataset = match self.session.dataset(self.active) {
            Ok(d) => d,
            Err(e) => {
                self.analysis = None;
                self.fail(&e);
                self.rebuild_table();
                return;
            }
        };
        let refreshed = refresh_options(dataset, selection);
        let analysis = dataset.analyze(selection, &self.spec);

        match refreshed {
            Ok((cascade, bounds)) => {
                self.cascade = cascade;
                self.date_bounds = bounds;
            }
            Err(e) => {
                self.fail(&e);
                return;
            }
        }
        for (state, role) in self.pickers.iter_mut().zip(SemanticRole::FILTER_ORDER) {
            state.clamp(self.cascade.get(role).len());
        }
        match analysis {
            Ok(analysis) => {
                debug!(
                    rows = analysis.filtered.height(),
                    groups = analysis.pivot.height(),
                    "recomputed"
                );
                self.analysis = Some(analysis);
                if matches!(self.status, Some(Status::Error(_))) {
                    self.status = None;
                }
            }
            Err(e) => {
                self.analysis = None;
                self.fail(&e);
            }
        }
        self.rebuild_table();
    }

    fn displayed_frame(&self) -> Option<&DataFrame> {
        self.analysis.as_ref().map(|a| match self.view {
            View::Pivot => &a.pivot.frame,
            View::Data => &a.filtered,
        })
    }

    fn rebuild_table(&mut self) {
        let offset = self.table.offset;
        let cells = self.displayed_frame().map(|frame| {
            let frame = match self.view {
                View::Pivot => frame.clone(),
                View::Data => frame.head(Some(DATA_VIEW_LIMIT)),
            };
            frame_cells(&frame)
        });
        self.table = match cells {
            Some(Ok((header, rows))) => TableView::new(header, rows),
            Some(Err(e)) => {
                self.status = Some(Status::Error(e.to_string()));
                TableView::default()
            }
            None => TableView::default(),
        };
        self.table.scroll(offset as isize);
    }

    fn focused_role(&self) -> Option<SemanticRole> {
        SemanticRole::FILTER_ORDER.get(self.focus).copied()
    }

    fn toggle_at_cursor(&mut self) {
        let Some(role) = self.focused_role() else {
            return;
        };
        let cursor = self.pickers[self.focus].cursor();
        let Some(value) = self.cascade.get(role).get(cursor).cloned() else {
            return;
        };
        self.selection_mut().toggle(role, &value);
        self.recompute();
    }

    fn move_cursor(&mut self, delta: isize) {
        match self.focused_role() {
            Some(role) => {
                let len = self.cascade.get(role).len();
                self.pickers[self.focus].move_by(delta, len);
            }
            None => self.table.scroll(delta),
        }
    }

    fn toggle_date_filter(&mut self) {
        let bounds = self.date_bounds;
        let selection = self.selection_mut();
        if selection.date_range.is_some() {
            selection.date_range = None;
        } else if let Some(bounds) = bounds {
            selection.date_range = Some(bounds);
        } else {
            self.status = Some(Status::Info(
                "The active dataset has no date column".to_string(),
            ));
            return;
        }
        self.recompute();
    }

    fn shift_date(&mut self, start: bool, days: i64) {
        let Some(bounds) = self.date_bounds else {
            return;
        };
        let selection = self.selection_mut();
        let range = selection.date_range.get_or_insert(bounds);
        if start {
            range.shift_start(days, &bounds);
        } else {
            range.shift_end(days, &bounds);
        }
        self.recompute();
    }

    fn change_top_n(&mut self, grow: bool) {
        let top_n = if grow {
            self.spec.top_n.saturating_add(TOP_N_STEP)
        } else {
            self.spec.top_n.saturating_sub(TOP_N_STEP)
        };
        self.spec.top_n = self.config.pivot.clamp_top_n(top_n);
        self.recompute();
    }

    fn switch_dataset(&mut self) {
        let next = self.session.next_loaded(self.active);
        if next == self.active {
            self.status = Some(Status::Info(
                "No other dataset is loaded".to_string(),
            ));
            return;
        }
        if !self.selections.contains_key(&next) {
            let initial = self
                .session
                .dataset(next)
                .and_then(|d| self.options.initial_selection(d));
            match initial {
                Ok(selection) => {
                    self.selections.insert(next, selection);
                }
                Err(e) => {
                    self.fail(&e);
                    return;
                }
            }
        }
        info!(dataset = %next, "switched dataset");
        self.active = next;
        self.pickers = Default::default();
        self.table.offset = 0;
        self.status = None;
        self.recompute();
    }

    fn view_name(&self) -> String {
        match self.view {
            View::Pivot => format!("pivot_{}", self.spec.row.label().to_lowercase()),
            View::Data => "data".to_string(),
        }
    }

    fn export_table(&mut self) {
        let Some(frame) = self.displayed_frame() else {
            self.status = Some(Status::Info("Nothing to export".to_string()));
            return;
        };
        let path = export_file_name(
            self.config.export.directory.as_deref(),
            self.active.as_str(),
            &self.view_name(),
            "csv",
        );
        match export_csv(frame, &path, &ExportOptions::from(&self.config.export)) {
            Ok(()) => {
                self.status = Some(Status::Info(format!("Wrote {}", path.display())));
            }
            Err(e) => self.fail(&e),
        }
    }

    fn export_chart(&mut self) {
        let Some(analysis) = &self.analysis else {
            self.status = Some(Status::Info("Nothing to chart".to_string()));
            return;
        };
        let path = export_file_name(
            self.config.export.directory.as_deref(),
            self.active.as_str(),
            &format!("pivot_{}", self.spec.row.label().to_lowercase()),
            "png",
        );
        let color = bar_color(&self.config.theme.colors.chart_bar);
        let written =
            BarChart::from_pivot(&analysis.pivot).and_then(|chart| write_chart(&path, &chart, color));
        match written {
            Ok(()) => {
                self.status = Some(Status::Info(format!("Wrote {}", path.display())));
            }
            Err(e) => self.fail(&e),
        }
    }

    fn reload(&mut self) {
        match self.session.reload() {
            Ok(()) => {
                let stats = self.session.cache_stats();
                self.status = Some(Status::Info(format!(
                    "Reloaded (cache hits {}, misses {})",
                    stats.hits, stats.misses
                )));
            }
            Err(e) => self.fail(&e),
        }
        // receiver gone outside the event loop
        if self.send_event(AppEvent::Recompute).is_err() {
            self.recompute();
        }
    }

    fn key(&mut self, event: &KeyEvent) -> Option<AppEvent> {
        match event.code {
            KeyCode::Char('q') | KeyCode::Esc => return Some(AppEvent::Exit),
            KeyCode::Tab => self.focus = (self.focus + 1) % (PICKERS + 1),
            KeyCode::BackTab => self.focus = (self.focus + PICKERS) % (PICKERS + 1),
            KeyCode::Down | KeyCode::Char('j') => self.move_cursor(1),
            KeyCode::Up | KeyCode::Char('k') => self.move_cursor(-1),
            KeyCode::PageDown => self.move_cursor(10),
            KeyCode::PageUp => self.move_cursor(-10),
            KeyCode::Char(' ') | KeyCode::Enter => self.toggle_at_cursor(),
            KeyCode::Char('c') => {
                if let Some(role) = self.focused_role() {
                    self.selection_mut().clear(role);
                    self.recompute();
                }
            }
            KeyCode::Char('C') => {
                self.selection_mut().clear_all();
                self.recompute();
            }
            KeyCode::Char('d') => self.toggle_date_filter(),
            KeyCode::Char('[') => self.shift_date(true, -1),
            KeyCode::Char(']') => self.shift_date(true, 1),
            KeyCode::Char('{') => self.shift_date(false, -1),
            KeyCode::Char('}') => self.shift_date(false, 1),
            KeyCode::Char('r') => {
                self.spec.row = self.spec.row.next_pivot_row();
                self.table.offset = 0;
                self.recompute();
            }
            KeyCode::Char(c @ '1'..='4') => {
                let idx = c as usize - '1' as usize;
                self.spec.toggle_measure(Measure::ALL[idx]);
                self.recompute();
            }
            KeyCode::Char('+') | KeyCode::Char('=') => self.change_top_n(true),
            KeyCode::Char('-') => self.change_top_n(false),
            KeyCode::Char('v') => self.switch_dataset(),
            KeyCode::Char('t') => {
                self.view = match self.view {
                    View::Pivot => View::Data,
                    View::Data => View::Pivot,
                };
                self.table.offset = 0;
                self.rebuild_table();
            }
            KeyCode::Char('e') => return Some(AppEvent::ExportCsv),
            KeyCode::Char('g') => return Some(AppEvent::ExportChart),
            KeyCode::Char('R') => return Some(AppEvent::Reload),
            _ => {}
        }
        None
    }

    pub fn event(&mut self, event: &AppEvent) -> Option<AppEvent> {
        match event {
            AppEvent::Key(key) => self.key(key),
            AppEvent::Recompute => {
                self.recompute();
                None
            }
            AppEvent::Reload => {
                self.reload();
                None
            }
            AppEvent::ExportCsv => {
                self.export_table();
                None
            }
            AppEvent::ExportChart => {
                self.export_chart();
                None
            }
            AppEvent::Resize(..) | AppEvent::Exit | AppEvent::Crash(_) => None,
        }
    }

    fn header_line(&self) -> Line<'static> {
        let primary = self.color("primary");
        let secondary = self.color("text_secondary");
        let mut spans = vec![Span::styled(
            format!(" {} ", self.active.title()),
            Style::default().fg(primary).add_modifier(Modifier::BOLD),
        )];
        if let Ok(dataset) = self.session.dataset(self.active) {
            spans.push(Span::styled(
                format!("{} [{}]", dataset.source_name, dataset.sheet),
                Style::default().fg(secondary),
            ));
        }
        if let Some(analysis) = &self.analysis {
            spans.push(Span::raw(format!(
                "  {} rows after filters",
                analysis.filtered.height()
            )));
        }
        let dates = match (self.selection().date_range, self.date_bounds) {
            (Some(r), _) => format!("  dates {} .. {}", r.start, r.end),
            (None, Some(_)) => "  all dates".to_string(),
            (None, None) => String::new(),
        };
        spans.push(Span::raw(dates));
        Line::from(spans)
    }

    fn table_title(&self) -> String {
        match (&self.analysis, self.view) {
            (Some(a), View::Pivot) => format!(
                " By {} ({}) | top {} | sorted by {} ",
                self.spec.row, a.pivot.row_column, self.spec.top_n, a.pivot.sort_by
            ),
            (Some(a), View::Data) => format!(" Filtered rows ({}) ", a.filtered.height()),
            (None, _) => " No result ".to_string(),
        }
    }

    fn status_line(&self) -> Line<'static> {
        match &self.status {
            Some(Status::Error(msg)) => {
                Line::from(Span::styled(msg.clone(), Style::default().fg(self.color("error"))))
            }
            Some(Status::Info(msg)) => {
                Line::from(Span::styled(msg.clone(), Style::default().fg(self.color("success"))))
            }
            None => {
                let measures: Vec<&str> = self.spec.measures.iter().map(|m| m.label()).collect();
                Line::from(Span::styled(
                    format!("Measures: {}", measures.join(", ")),
                    Style::default().fg(self.color("dimmed")),
                ))
            }
        }
    }
}

impl Widget for &mut Dashboard {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Fill(1),
                Constraint::Length(1),
                Constraint::Length(1),
            ])
            .split(area);

        Paragraph::new(self.header_line()).render(layout[0], buf);

        let main = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(34), Constraint::Fill(1)])
            .split(layout[1]);
        let picker_areas = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Fill(1); PICKERS])
            .split(main[0]);

        let border = self.color("panel_border");
        let border_active = self.color("panel_border_active");
        let dimmed = self.color("dimmed");
        let selection = self.selection().clone();
        for (i, role) in SemanticRole::FILTER_ORDER.iter().enumerate() {
            let picker = FilterPicker {
                role: *role,
                options: &self.cascade,
                selection: &selection,
                focused: self.focus == i,
                border,
                border_active,
                dimmed,
            };
            picker.render(picker_areas[i], buf, &mut self.pickers[i]);
        }

        ResultTable {
            view: &self.table,
            title: self.table_title(),
            focused: self.focus == TABLE_FOCUS,
            header_color: self.color("table_header"),
            border: self.color("table_border"),
            border_active,
        }
        .render(main[1], buf);

        Paragraph::new(self.status_line()).render(layout[2], buf);

        let rows = self
            .analysis
            .as_ref()
            .map(|a| a.filtered.height())
            .unwrap_or(0);
        let controls = Controls::new().with_row_count(rows).with_colors(
            self.color("controls_bg"),
            self.color("primary"),
            self.color("text_primary"),
        );
        (&controls).render(layout[3], buf);
    }
}
