use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Text},
    widgets::{Block, Paragraph},
    Frame,
};
use winlama_core::{Entry, Role, Transcript};

use super::{event::Action, widgets_ext::RectExt as _};

/// Scroll position of the transcript, counted in lines up from the bottom.
#[derive(Clone, Debug, Default)]
pub struct TranscriptViewModel {
    scroll_back: u16,
}

impl TranscriptViewModel {
    pub fn handle_action(&mut self, action: Action) {
        match action {
            Action::Up => self.scroll_back = self.scroll_back.saturating_add(1),
            Action::Down => self.scroll_back = self.scroll_back.saturating_sub(1),
            Action::Beginning => self.scroll_back = u16::MAX,
            Action::End => self.follow(),
            _ => {}
        }
    }

    /// Stick to the newest line.
    pub fn follow(&mut self) {
        self.scroll_back = 0;
    }
}

fn role_style(role: Role) -> Style {
    match role {
        Role::User => Style::default()
            .fg(Color::Rgb(0x70, 0xae, 0xef))
            .add_modifier(Modifier::BOLD),
        Role::Model => Style::default().fg(Color::Rgb(0xa0, 0xd9, 0xa1)),
        Role::ModelPending => Style::default()
            .fg(Color::Rgb(0xaa, 0xaa, 0xaa))
            .add_modifier(Modifier::ITALIC),
        Role::System => Style::default()
            .fg(Color::Rgb(0xff, 0x8c, 0x69))
            .add_modifier(Modifier::ITALIC),
        Role::Error => Style::default()
            .fg(Color::Rgb(0xff, 0x6b, 0x6b))
            .add_modifier(Modifier::BOLD),
    }
}

fn role_alignment(role: Role) -> Alignment {
    match role {
        Role::User => Alignment::Right,
        Role::Model | Role::ModelPending | Role::System | Role::Error => Alignment::Left,
    }
}

/// Lay out every entry as wrapped, styled lines with a blank line between entries.
fn transcript_lines<'a>(entries: &'a [Entry], area: Rect) -> Vec<Line<'a>> {
    entries
        .iter()
        .enumerate()
        .flat_map(|(index, entry)| {
            let style = role_style(entry.role);
            let alignment = role_alignment(entry.role);
            let separator = (index > 0).then(Line::default);
            let body = entry
                .text
                .lines()
                .flat_map(move |paragraph| area.wrap_inside(paragraph))
                .map(move |line| Line::styled(line, style).alignment(alignment));
            separator.into_iter().chain(body)
        })
        .collect()
}

#[extend::ext(name = TranscriptView)]
pub impl<'a> Frame<'a> {
    fn transcript_view(
        &mut self,
        parent: Rect,
        style: Style,
        transcript: &Transcript,
        view_model: &mut TranscriptViewModel,
    ) {
        let lines = transcript_lines(transcript.entries(), parent);

        let visible = parent.height.saturating_sub(2);
        let total: u16 = lines.len().try_into().unwrap_or(u16::MAX);
        let bottom = total.saturating_sub(visible);
        view_model.scroll_back = view_model.scroll_back.min(bottom);
        let top = bottom - view_model.scroll_back;

        let paragraph = Paragraph::new(Text::from(lines))
            .scroll((top, 0))
            .block(Block::bordered().style(style).title("Chat"));

        self.render_widget(paragraph, parent);
    }
}
