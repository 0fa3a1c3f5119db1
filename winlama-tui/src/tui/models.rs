use ratatui::{
    layout::Rect,
    style::{Color, Style},
    widgets::{Block, List, ListState},
    Frame,
};
use winlama_core::{Error, ErrorKind, ModelName};

use super::event::Action;

/// Where the model listing stands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum Listing {
    #[default]
    Loading,
    Ready,
    Empty,
    Failed(ErrorKind),
}

/// The sidebar list of installed models.
#[derive(Clone, Debug, Default)]
pub struct ModelSelector {
    models: Vec<ModelName>,
    listing: Listing,
    widget_state: ListState,
}

impl ModelSelector {
    pub fn set_loading(&mut self) {
        self.listing = Listing::Loading;
    }

    /// Replace the listing.
    ///
    /// Returns the model to switch to when `active` is no longer listed:
    /// `preferred` if the server has it, otherwise the first model.
    pub fn set_models(
        &mut self,
        models: Vec<ModelName>,
        active: Option<&ModelName>,
        preferred: Option<&ModelName>,
    ) -> Option<ModelName> {
        self.models = models;
        if self.models.is_empty() {
            self.listing = Listing::Empty;
            self.widget_state.select(None);
            return None;
        }
        self.listing = Listing::Ready;

        if let Some(index) = active.and_then(|active| self.position(active)) {
            self.widget_state.select(Some(index));
            return None;
        }

        let index = preferred
            .and_then(|preferred| self.position(preferred))
            .unwrap_or(0);
        self.widget_state.select(Some(index));
        self.models.get(index).cloned()
    }

    pub fn set_error(&mut self, error: &Error) {
        self.models.clear();
        self.widget_state.select(None);
        self.listing = Listing::Failed(error.kind());
    }

    /// Text shown in place of a model name when there is nothing to choose.
    pub fn label(&self) -> Option<&'static str> {
        match self.listing {
            Listing::Loading => Some("Loading models..."),
            Listing::Ready => None,
            Listing::Empty => Some("[No models found]"),
            Listing::Failed(kind) => Some(error_label(kind)),
        }
    }

    /// Move the highlight, or pick the highlighted model on `Enter`.
    pub fn handle_action(&mut self, action: Action) -> Option<ModelName> {
        match action {
            Action::Down => self.widget_state.select_next(),
            Action::Up => self.widget_state.select_previous(),
            Action::Enter => {
                return self
                    .widget_state
                    .selected()
                    .and_then(|index| self.models.get(index))
                    .cloned();
            }
            _ => {}
        }
        None
    }

    fn position(&self, model: &ModelName) -> Option<usize> {
        self.models.iter().position(|listed| listed == model)
    }
}

pub fn error_label(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Connection | ErrorKind::Timeout => "[Connection Error]",
        ErrorKind::Configuration | ErrorKind::Protocol | ErrorKind::Decode => "[Data Error]",
        ErrorKind::Unexpected => "[Unexpected Error]",
    }
}

/// Transcript notice for a failed listing.
pub fn listing_notice(error: &Error) -> String {
    match error.kind() {
        ErrorKind::Connection | ErrorKind::Timeout => {
            "Could not connect to Ollama server. Please make sure Ollama is running.".into()
        }
        ErrorKind::Configuration | ErrorKind::Protocol | ErrorKind::Decode => {
            format!("Error loading models: {error}")
        }
        ErrorKind::Unexpected => format!("An unexpected error occurred: {error}"),
    }
}

#[extend::ext(name = ModelsView)]
pub impl<'a> Frame<'a> {
    fn models_view(&mut self, parent: Rect, style: Style, selector: &mut ModelSelector) {
        let block = Block::bordered().title("Models");

        let Some(label) = selector.label() else {
            let list = List::new(selector.models.iter().map(ModelName::as_str))
                .block(block)
                .style(style)
                .highlight_style(
                    style
                        .fg(style.bg.unwrap_or(Color::Black))
                        .bg(style.fg.unwrap_or(Color::White)),
                )
                .highlight_symbol(">>");
            self.render_stateful_widget(list, parent, &mut selector.widget_state);
            return;
        };

        let list = List::new([label]).block(block).style(style);
        self.render_widget(list, parent);
    }
}
