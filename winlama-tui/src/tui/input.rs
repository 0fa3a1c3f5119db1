use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Paragraph, Wrap},
    Frame,
};

use super::event::{Action, InputMode};

/// The prompt line: text being typed and a cursor counted in chars.
#[derive(Default, Debug, Clone)]
pub struct TextInputViewModel {
    pub input: String,
    pub cursor_position: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TextInputEvent {
    InputMode(InputMode),
    Submit(String),
}

impl TextInputViewModel {
    pub fn handle_action(&mut self, action: Action) -> Option<TextInputEvent> {
        match action {
            Action::Edit => return Some(TextInputEvent::InputMode(InputMode::Edit)),
            Action::Escape => return Some(TextInputEvent::InputMode(InputMode::Normal)),
            Action::Enter => return self.submit_message(),
            Action::Right => self.move_cursor_right(),
            Action::Left => self.move_cursor_left(),
            Action::Beginning => self.move_cursor_to(0),
            Action::End => self.move_cursor_to(self.char_count()),
            Action::RightWord => self.move_cursor_to(next_word(&self.input, self.cursor_position)),
            Action::LeftWord => {
                self.move_cursor_to(previous_word(&self.input, self.cursor_position))
            }
            Action::Backspace => self.delete_char(),
            Action::Unhandled(to_insert) => self.enter_char(to_insert),
            _ => {}
        }
        None
    }

    /// Hand the typed text over and reset the line.
    /// A blank line is not submitted.
    fn submit_message(&mut self) -> Option<TextInputEvent> {
        if self.input.trim().is_empty() {
            return None;
        }
        let message = std::mem::take(&mut self.input);
        self.cursor_position = 0;
        Some(TextInputEvent::Submit(message))
    }

    fn char_count(&self) -> usize {
        self.input.chars().count()
    }

    fn move_cursor_left(&mut self) {
        self.move_cursor_to(self.cursor_position.saturating_sub(1));
    }

    fn move_cursor_right(&mut self) {
        self.move_cursor_to(self.cursor_position.saturating_add(1));
    }

    fn move_cursor_to(&mut self, new_position: usize) {
        self.cursor_position = new_position.clamp(0, self.char_count());
    }

    fn byte_index(&self) -> usize {
        self.input
            .char_indices()
            .map(|(i, _)| i)
            .nth(self.cursor_position)
            .unwrap_or(self.input.len())
    }

    fn enter_char(&mut self, new_char: char) {
        let index = self.byte_index();
        self.input.insert(index, new_char);
        self.move_cursor_right();
    }

    fn delete_char(&mut self) {
        if self.cursor_position == 0 {
            return;
        }
        let before = self.input.chars().take(self.cursor_position - 1);
        let after = self.input.chars().skip(self.cursor_position);
        self.input = before.chain(after).collect();
        self.move_cursor_left();
    }
}

/// Char position just past the next space, or the end of the line.
fn next_word(input: &str, cursor_position: usize) -> usize {
    let chars: Vec<char> = input.chars().collect();
    chars
        .iter()
        .enumerate()
        .skip(cursor_position)
        .find(|(_, c)| **c == ' ')
        .map(|(index, _)| index + 1)
        .unwrap_or(chars.len())
}

/// Char position at the start of the previous word.
fn previous_word(input: &str, cursor_position: usize) -> usize {
    let chars: Vec<char> = input.chars().take(cursor_position).collect();
    let trimmed = chars
        .iter()
        .rposition(|c| *c != ' ')
        .map(|index| index + 1)
        .unwrap_or(0);
    chars[..trimmed]
        .iter()
        .rposition(|c| *c == ' ')
        .map(|index| index + 1)
        .unwrap_or(0)
}

#[derive(Debug, PartialEq, Clone)]
struct CursorLine {
    left: String,
    cursor_char: char,
    right: String,
}

#[extend::ext]
impl<T: AsRef<str>> T {
    /// Split a line around the char under the cursor for highlighting.
    fn single_out(&self, cursor_position: usize) -> CursorLine {
        let mut chars = self.as_ref().chars();
        let left: String = chars.by_ref().take(cursor_position).collect();
        let cursor_char = chars.next().unwrap_or(' ');
        CursorLine {
            left,
            cursor_char,
            right: chars.collect(),
        }
    }
}

#[extend::ext(name = InputView)]
pub impl<'a> Frame<'a> {
    fn input_view(
        &mut self,
        parent: Rect,
        style: Style,
        view_model: &TextInputViewModel,
        input_mode: InputMode,
        title: &str,
    ) {
        let line = if input_mode == InputMode::Edit {
            let cursor_style = Style::default().bg(Color::White).fg(Color::Black);
            let cursor_line = view_model.input.single_out(view_model.cursor_position);
            Line::from(vec![
                Span::from(cursor_line.left),
                Span::from(cursor_line.cursor_char.to_string()).style(cursor_style),
                Span::from(cursor_line.right),
            ])
        } else {
            Line::from(view_model.input.as_str())
        };

        let input = Paragraph::new(line)
            .wrap(Wrap { trim: false })
            .style(style)
            .block(Block::bordered().title(title.to_string()));

        self.render_widget(input, parent);
    }
}
