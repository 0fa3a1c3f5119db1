use serde::Serialize;

/// Presentation role of a transcript entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, strum::AsRefStr, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    User,
    Model,
    /// Placeholder shown until the first token arrives.
    ModelPending,
    System,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub role: Role,
    pub text: String,
}

impl Entry {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }
}

/// The rendered chat, oldest entry first.
#[derive(Clone, Debug, Default)]
pub struct Transcript {
    entries: Vec<Entry>,
    /// Index of the model entry currently receiving tokens.
    open: Option<usize>,
}

impl Transcript {
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push(&mut self, role: Role, text: impl Into<String>) {
        self.entries.push(Entry::new(role, text));
    }

    /// Start the model's answer, replacing the pending placeholder.
    pub fn open_response(&mut self, text: &str) {
        self.remove_pending();
        self.entries.push(Entry::new(Role::Model, text));
        self.open = Some(self.entries.len() - 1);
    }

    /// Append to the open answer, or start one if none is open.
    pub fn append_response(&mut self, text: &str) {
        match self.open.and_then(|index| self.entries.get_mut(index)) {
            Some(entry) => entry.text.push_str(text),
            None => self.open_response(text),
        }
    }

    /// End the open answer. The next response starts a new paragraph.
    pub fn close_response(&mut self) {
        self.open = None;
    }

    /// Drop the most recent pending placeholder, if any.
    pub fn remove_pending(&mut self) -> bool {
        let Some(index) = self
            .entries
            .iter()
            .rposition(|entry| entry.role == Role::ModelPending)
        else {
            return false;
        };

        self.entries.remove(index);
        self.open = match self.open {
            Some(open) if open > index => Some(open - 1),
            open => open,
        };
        true
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.open = None;
    }
}
