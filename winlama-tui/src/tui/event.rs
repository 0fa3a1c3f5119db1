use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

#[derive(Default, Debug, PartialEq)]
pub struct EventProcessor {
    pub input_mode: InputMode,
}

impl EventProcessor {
    pub fn input_mode(&mut self, input_mode: InputMode) {
        self.input_mode = input_mode;
    }

    pub fn process(&self, event: Event) -> Action {
        match event {
            Event::FocusGained
            | Event::FocusLost
            | Event::Mouse(_)
            | Event::Paste(_)
            | Event::Resize(_, _) => Action::Nop,
            Event::Key(key_event) => self.process_key_event(key_event),
        }
    }

    pub fn process_key_event(&self, event: KeyEvent) -> Action {
        if event.kind == KeyEventKind::Release {
            return Action::Nop;
        }

        let ctrl = event.modifiers.contains(KeyModifiers::CONTROL);
        match (self.input_mode, event.code) {
            (_, KeyCode::Char('c')) if ctrl => Action::Quit,
            (_, KeyCode::Char('l')) if ctrl => Action::Clear,
            (_, KeyCode::Tab) => Action::NextPane,
            (_, KeyCode::Enter) => Action::Enter,
            (_, KeyCode::Esc) => Action::Escape,
            (_, KeyCode::Up) => Action::Up,
            (_, KeyCode::Down) => Action::Down,
            (_, KeyCode::Home) => Action::Beginning,
            (_, KeyCode::End) => Action::End,
            (InputMode::Edit, KeyCode::Left) if ctrl => Action::LeftWord,
            (InputMode::Edit, KeyCode::Right) if ctrl => Action::RightWord,
            (_, KeyCode::Left) => Action::Left,
            (_, KeyCode::Right) => Action::Right,
            (InputMode::Edit, KeyCode::Backspace) => Action::Backspace,
            (InputMode::Edit, KeyCode::Char(c)) => Action::Unhandled(c),
            (InputMode::Normal, KeyCode::Char(c)) => match c {
                'q' => Action::Quit,
                'e' | 'i' => Action::Edit,
                'r' => Action::Refresh,
                'k' => Action::Up,
                'j' => Action::Down,
                'g' => Action::Beginning,
                'G' => Action::End,
                c => Action::Unhandled(c),
            },
            _ => Action::Nop,
        }
    }
}

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum InputMode {
    #[default]
    Normal,
    Edit,
}

#[derive(Debug, Clone, Copy, PartialEq, strum::Display)]
pub enum Action {
    Beginning,
    End,
    Left,
    Right,
    Up,
    Down,
    Edit,
    LeftWord,
    RightWord,
    Refresh,
    Clear,
    NextPane,
    Enter,
    Escape,
    Backspace,
    Quit,
    Unhandled(char),
    Nop,
}
