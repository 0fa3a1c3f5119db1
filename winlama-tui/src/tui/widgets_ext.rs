use std::borrow::Cow;

use ratatui::layout::Rect;

#[extend::ext]
pub impl Rect {
    /// Wrap `text` to fit inside this area once a border is drawn around it.
    fn wrap_inside<'a>(&self, text: &'a str) -> Vec<Cow<'a, str>> {
        let max_width = self.width.saturating_sub(2).max(1);
        textwrap::wrap(text, usize::from(max_width))
    }
}
