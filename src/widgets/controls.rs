use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style, Stylize},
    widgets::{Paragraph, Widget},
};

/// Key hints shown in the dashboard footer.
pub const DASHBOARD_CONTROLS: [(&str, &str); 10] = [
    ("Tab", "Focus"),
    ("Spc", "Toggle"),
    ("c/C", "Clear"),
    ("d", "Dates"),
    ("r", "Row"),
    ("1-4", "Measures"),
    ("+/-", "Top"),
    ("v", "Dataset"),
    ("e/g", "Export"),
    ("q", "Quit"),
];

pub struct Controls {
    pub pairs: Vec<(&'static str, &'static str)>,
    pub row_count: Option<usize>,
    pub dimmed: bool,
    pub bg: Color,
    pub key_fg: Color,
    pub text_fg: Color,
}

impl Default for Controls {
    fn default() -> Self {
        Self {
            pairs: DASHBOARD_CONTROLS.to_vec(),
            row_count: None,
            dimmed: false,
            bg: Color::DarkGray,
            key_fg: Color::Reset,
            text_fg: Color::White,
        }
    }
}

impl Controls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_row_count(mut self, row_count: usize) -> Self {
        self.row_count = Some(row_count);
        self
    }

    pub fn with_dimmed(mut self, dimmed: bool) -> Self {
        self.dimmed = dimmed;
        self
    }

    pub fn with_colors(mut self, bg: Color, key_fg: Color, text_fg: Color) -> Self {
        self.bg = bg;
        self.key_fg = key_fg;
        self.text_fg = text_fg;
        self
    }
}

impl Widget for &Controls {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let mut constraints = self.pairs.iter().fold(vec![], |mut acc, (key, action)| {
            acc.push(Constraint::Length(key.chars().count() as u16 + 2));
            acc.push(Constraint::Length(action.chars().count() as u16 + 1));
            acc
        });

        if self.row_count.is_some() {
            constraints.push(Constraint::Length(15)); // "Rows: 12345"
        }
        constraints.push(Constraint::Fill(1));

        let layout = Layout::new(Direction::Horizontal, constraints).split(area);

        let base_style = if self.dimmed {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default()
        };

        for (i, (key, action)) in self.pairs.iter().enumerate() {
            let j = i * 2;
            Paragraph::new(*key)
                .style(base_style.fg(self.key_fg).bold())
                .centered()
                .render(layout[j], buf);
            Paragraph::new(*action)
                .style(base_style.bg(self.bg))
                .render(layout[j + 1], buf);
        }

        let mut fill_start_idx = self.pairs.len() * 2;
        if let Some(count) = self.row_count {
            Paragraph::new(format!("Rows: {}", count))
                .style(base_style.bg(self.bg).fg(if self.dimmed {
                    Color::DarkGray
                } else {
                    self.text_fg
                }))
                .right_aligned()
                .render(layout[fill_start_idx], buf);
            fill_start_idx += 1;
        }

        Paragraph::new("")
            .style(base_style.bg(self.bg))
            .render(layout[fill_start_idx], buf);
    }
}
