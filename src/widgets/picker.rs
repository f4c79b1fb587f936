//! Multi-select list of the options offered for one filter role.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, StatefulWidget},
};

use crate::filter::{CascadeOptions, FilterSelection};
use crate::roles::SemanticRole;

/// Cursor over one role's offered options.
#[derive(Debug, Default, Clone)]
pub struct PickerState {
    pub list: ListState,
}

impl PickerState {
    pub fn cursor(&self) -> usize {
        self.list.selected().unwrap_or(0)
    }

    /// Keep the cursor on an existing row after the options changed.
    pub fn clamp(&mut self, len: usize) {
        if len == 0 {
            self.list.select(None);
        } else {
            self.list.select(Some(self.cursor().min(len - 1)));
        }
    }

    pub fn move_by(&mut self, delta: isize, len: usize) {
        if len == 0 {
            return;
        }
        let next = (self.cursor() as isize + delta).clamp(0, len as isize - 1);
        self.list.select(Some(next as usize));
    }
}

pub struct FilterPicker<'a> {
    pub role: SemanticRole,
    pub options: &'a CascadeOptions,
    pub selection: &'a FilterSelection,
    pub focused: bool,
    pub border: Color,
    pub border_active: Color,
    pub dimmed: Color,
}

impl FilterPicker<'_> {
    fn title(&self) -> String {
        let chosen = self
            .selection
            .active(self.role)
            .map(|s| s.len())
            .unwrap_or(0);
        if chosen == 0 {
            format!(" {} (all) ", self.role)
        } else {
            format!(" {} ({}) ", self.role, chosen)
        }
    }
}

impl StatefulWidget for FilterPicker<'_> {
    type State = PickerState;

    fn render(self, area: Rect, buf: &mut Buffer, state: &mut PickerState) {
        let border = if self.focused {
            self.border_active
        } else {
            self.border
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .title(self.title())
            .border_style(Style::default().fg(border));

        if !self.options.has_role(self.role) {
            let empty = List::new([ListItem::new(Line::from(Span::styled(
                "no matching column",
                Style::default().fg(self.dimmed),
            )))])
            .block(block);
            StatefulWidget::render(empty, area, buf, &mut ListState::default());
            return;
        }

        let items: Vec<ListItem> = self
            .options
            .get(self.role)
            .iter()
            .map(|value| {
                let mark = if self.selection.is_selected(self.role, value) {
                    "[x] "
                } else {
                    "[ ] "
                };
                ListItem::new(format!("{}{}", mark, value))
            })
            .collect();
        let highlight = if self.focused {
            Style::default().add_modifier(Modifier::REVERSED)
        } else {
            Style::default()
        };
        let list = List::new(items).block(block).highlight_style(highlight);
        StatefulWidget::render(list, area, buf, &mut state.list);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_moves_within_bounds() {
        let mut state = PickerState::default();
        state.move_by(1, 3);
        state.move_by(5, 3);
        assert_eq!(state.cursor(), 2);
        state.move_by(-10, 3);
        assert_eq!(state.cursor(), 0);
    }

    #[test]
    fn test_clamp_after_options_shrink() {
        let mut state = PickerState::default();
        state.list.select(Some(7));
        state.clamp(3);
        assert_eq!(state.cursor(), 2);
        state.clamp(0);
        assert_eq!(state.list.selected(), None);
    }

    #[test]
    fn test_renders_checked_values() {
        let mut options = CascadeOptions::default();
        options.options.insert(
            SemanticRole::Location,
            vec!["Ankara".to_string(), "İzmir".to_string()],
        );
        let mut selection = FilterSelection::default();
        selection.set(SemanticRole::Location, ["İzmir"]);
        let picker = FilterPicker {
            role: SemanticRole::Location,
            options: &options,
            selection: &selection,
            focused: true,
            border: Color::Cyan,
            border_active: Color::Yellow,
            dimmed: Color::DarkGray,
        };
        let area = Rect::new(0, 0, 24, 4);
        let mut buf = Buffer::empty(area);
        let mut state = PickerState::default();
        picker.render(area, &mut buf, &mut state);
        let text: String = (0..area.height)
            .map(|y| {
                (0..area.width)
                    .map(|x| buf[(x, y)].symbol().to_string())
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("\n");
        assert!(text.contains("Location (1)"));
        assert!(text.contains("[ ] Ankara"));
        assert!(text.contains("[x] İzmir"));
    }
}
