use std::time::Duration;

use event::{Action, EventProcessor, InputMode};
use futures::StreamExt as _;
use input::{InputView as _, TextInputEvent, TextInputViewModel};
use models::{ModelSelector, ModelsView as _};
use ratatui::{
    crossterm::event::EventStream,
    layout::{Constraint, Layout},
    style::{Color, Modifier, Style},
    text::Line,
    DefaultTerminal, Frame,
};
use tokio::sync::mpsc;
use transcript::{TranscriptView as _, TranscriptViewModel};
use winlama_core::{ChatSession, Client, ModelName, Role};

pub mod event;
pub mod input;
pub mod models;
pub mod transcript;
mod widgets_ext;

const DRAW_PERIOD: Duration = Duration::from_millis(1000 / 15);
/// How often worker updates are drained into the transcript.
const POLL_PERIOD: Duration = Duration::from_millis(100);

const HELP: &str =
    "Tab: focus | Enter: select/send | e: edit | Esc: stop editing | r: refresh | Ctrl-l: clear | q: quit";

type ModelListing = winlama_core::Result<Vec<ModelName>>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum Pane {
    #[default]
    Models,
    Input,
    Transcript,
}

impl Pane {
    fn next(&self) -> Pane {
        match self {
            Pane::Models => Pane::Input,
            Pane::Input => Pane::Transcript,
            Pane::Transcript => Pane::Models,
        }
    }
}

#[extend::ext]
impl Style {
    fn focused() -> Self {
        Style::default().fg(Color::Green)
    }

    fn active() -> Self {
        Style::default().fg(Color::Cyan)
    }

    fn disabled() -> Self {
        Style::default().fg(Color::DarkGray)
    }
}

pub struct AppContext {
    session: ChatSession,
    models: ModelSelector,
    input: TextInputViewModel,
    transcript: TranscriptViewModel,
    event_processor: EventProcessor,
    focus: Pane,
    default_model: Option<ModelName>,
    listing_sender: mpsc::UnboundedSender<ModelListing>,
    listing_receiver: mpsc::UnboundedReceiver<ModelListing>,
}

impl AppContext {
    pub fn new(client: Client, default_model: Option<ModelName>) -> Self {
        let (listing_sender, listing_receiver) = mpsc::unbounded_channel();
        Self {
            session: ChatSession::new(client),
            models: Default::default(),
            input: Default::default(),
            transcript: Default::default(),
            event_processor: Default::default(),
            focus: Default::default(),
            default_model,
            listing_sender,
            listing_receiver,
        }
    }

    pub async fn run(mut self, mut terminal: DefaultTerminal) -> anyhow::Result<()> {
        let mut draw_interval = tokio::time::interval(DRAW_PERIOD);
        let mut poll_interval = tokio::time::interval(POLL_PERIOD);
        let mut events = EventStream::new();
        self.refresh_models();

        loop {
            tokio::select! {
                _ = draw_interval.tick() => { terminal.draw(|frame| self.draw(frame))?; },
                _ = poll_interval.tick() => self.poll(),
                Some(Ok(event)) = events.next() => {
                    let action = self.event_processor.process(event);
                    if !self.handle_action(action) {
                        tracing::info!("quitting");
                        return Ok(());
                    }
                },
                Some(listing) = self.listing_receiver.recv() => self.handle_listing(listing),
            }
        }
    }

    /// List models on a separate task so a slow server never blocks drawing.
    fn refresh_models(&mut self) {
        self.models.set_loading();
        let client = self.session.client().clone();
        let sender = self.listing_sender.clone();
        tokio::spawn(async move {
            let listing = client.list_models().await;
            if sender.send(listing).is_err() {
                tracing::debug!("app closed before the model listing arrived");
            }
        });
    }

    fn handle_listing(&mut self, listing: ModelListing) {
        match listing {
            Ok(models) => {
                let picked = self.models.set_models(
                    models,
                    self.session.model(),
                    self.default_model.as_ref(),
                );
                if let Some(model) = picked {
                    self.session.select_model(model);
                }
            }
            Err(error) => {
                tracing::error!(%error, "unable to load models");
                self.models.set_error(&error);
                self.session
                    .notify(Role::Error, models::listing_notice(&error));
                self.transcript.follow();
            }
        }
    }

    fn poll(&mut self) {
        if self.session.poll() > 0 {
            self.transcript.follow();
        }
        if self.session.take_focus_request() {
            self.focus_input();
        }
    }

    fn focus_input(&mut self) {
        self.focus = Pane::Input;
        self.event_processor.input_mode(InputMode::Edit);
    }

    /// Returns false when the app should quit.
    fn handle_action(&mut self, action: Action) -> bool {
        match action {
            Action::Quit => return false,
            Action::Nop => {}
            Action::NextPane => {
                self.focus = self.focus.next();
                let mode = if self.focus == Pane::Input {
                    InputMode::Edit
                } else {
                    InputMode::Normal
                };
                self.event_processor.input_mode(mode);
            }
            Action::Clear => {
                self.session.clear();
                self.transcript.follow();
            }
            Action::Refresh => self.refresh_models(),
            Action::Edit if self.focus != Pane::Input => self.focus_input(),
            action => match self.focus {
                Pane::Models => {
                    if let Some(model) = self.models.handle_action(action) {
                        if self.session.model() != Some(&model) {
                            self.session.select_model(model);
                        }
                        self.focus_input();
                    }
                }
                Pane::Input => self.handle_input_action(action),
                Pane::Transcript => self.transcript.handle_action(action),
            },
        }
        true
    }

    fn handle_input_action(&mut self, action: Action) {
        if !self.session.is_input_enabled() && action != Action::Escape {
            return;
        }
        match self.input.handle_action(action) {
            Some(TextInputEvent::InputMode(mode)) => self.event_processor.input_mode(mode),
            Some(TextInputEvent::Submit(prompt)) => {
                let submitted = self.session.submit(&prompt);
                tracing::debug!(?submitted, "prompt submitted");
                self.transcript.follow();
            }
            None => {}
        }
    }

    fn pane_style(&self, pane: Pane) -> Style {
        if self.focus != pane {
            Style::default()
        } else if self.event_processor.input_mode == InputMode::Edit {
            Style::active()
        } else {
            Style::focused()
        }
    }

    fn header(&self) -> String {
        match (self.session.model(), self.models.label()) {
            (Some(model), _) => format!("Chatting with: {model}"),
            (None, Some(label)) => label.to_string(),
            (None, None) => "Select a model".to_string(),
        }
    }

    fn draw(&mut self, frame: &mut Frame) {
        let horizontal = Layout::horizontal([Constraint::Length(28), Constraint::Min(1)]);
        let [sidebar_area, main_area] = horizontal.areas(frame.area());
        let vertical = Layout::vertical([
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(3),
            Constraint::Length(1),
        ]);
        let [header_area, transcript_area, input_area, help_area] = vertical.areas(main_area);

        frame.models_view(
            sidebar_area,
            self.pane_style(Pane::Models),
            &mut self.models,
        );

        let header = Line::styled(self.header(), Style::default().add_modifier(Modifier::BOLD));
        frame.render_widget(header, header_area);

        frame.transcript_view(
            transcript_area,
            self.pane_style(Pane::Transcript),
            self.session.transcript(),
            &mut self.transcript,
        );

        let (input_style, input_title) = match self.session.model() {
            Some(model) if !self.session.is_input_enabled() => {
                (Style::disabled(), format!("Waiting for {model}..."))
            }
            _ => (self.pane_style(Pane::Input), "Message".to_string()),
        };
        let input_mode = if self.focus == Pane::Input {
            self.event_processor.input_mode
        } else {
            InputMode::Normal
        };
        frame.input_view(input_area, input_style, &self.input, input_mode, &input_title);

        frame.render_widget(Line::styled(HELP, Style::disabled()), help_area);
    }
}
