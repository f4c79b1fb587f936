use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Cell, Row, Table, Widget},
};

/// Header and pre-formatted cells of the table on the right of the dashboard.
#[derive(Debug, Clone, Default)]
pub struct TableView {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub offset: usize,
}

impl TableView {
    pub fn new(header: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            header,
            rows,
            offset: 0,
        }
    }

    pub fn scroll(&mut self, delta: isize) {
        let max = self.rows.len().saturating_sub(1) as isize;
        self.offset = (self.offset as isize + delta).clamp(0, max.max(0)) as usize;
    }

    fn widths(&self, max_width: u16) -> Vec<Constraint> {
        self.header
            .iter()
            .enumerate()
            .map(|(i, h)| {
                let longest = self
                    .rows
                    .iter()
                    .skip(self.offset)
                    .take(200)
                    .filter_map(|r| r.get(i))
                    .map(|c| c.chars().count())
                    .chain(std::iter::once(h.chars().count()))
                    .max()
                    .unwrap_or(1);
                Constraint::Length((longest as u16).min(max_width))
            })
            .collect()
    }
}

pub struct ResultTable<'a> {
    pub view: &'a TableView,
    pub title: String,
    pub focused: bool,
    pub header_color: Color,
    pub border: Color,
    pub border_active: Color,
}

impl Widget for ResultTable<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let border = if self.focused {
            self.border_active
        } else {
            self.border
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .title(self.title)
            .border_style(Style::default().fg(border));

        let header = Row::new(
            self.view
                .header
                .iter()
                .map(|h| Cell::from(h.as_str())),
        )
        .style(
            Style::default()
                .fg(self.header_color)
                .add_modifier(Modifier::BOLD),
        );
        let visible = area.height.saturating_sub(3) as usize;
        let rows = self
            .view
            .rows
            .iter()
            .skip(self.view.offset)
            .take(visible)
            .map(|r| Row::new(r.iter().map(|c| Cell::from(c.as_str()))));

        Table::new(rows, self.view.widths(40))
            .header(header)
            .block(block)
            .column_spacing(2)
            .render(area, buf);
    }
}
