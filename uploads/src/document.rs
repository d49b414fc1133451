use std::borrow::Cow;

/// The text surface uploads are spliced into. The coordinator only inserts
/// at the cursor and replaces literal spans it inserted earlier.
pub trait DocumentBuffer: Send {
    fn text(&self) -> Cow<'_, str>;

    /// True when the cursor sits at the start of a line.
    fn cursor_on_empty_line(&self) -> bool;

    fn insert_text_at_cursor(&mut self, text: &str);

    /// Replace the first verbatim occurrence of `old`. Returns false, leaving
    /// the buffer untouched, when `old` is not present.
    fn replace_text(&mut self, old: &str, new: &str) -> bool;
}

/// In-memory document with a byte-offset cursor.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TextBuffer {
    text: String,
    cursor: usize,
}

impl TextBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer holding `text` with the cursor at the end.
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        let cursor = text.len();
        Self { text, cursor }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Move the cursor, clamped to the text and snapped back to a char boundary.
    pub fn set_cursor(&mut self, pos: usize) {
        let mut pos = pos.min(self.text.len());
        while !self.text.is_char_boundary(pos) {
            pos -= 1;
        }
        self.cursor = pos;
    }
}

impl DocumentBuffer for TextBuffer {
    fn text(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.text)
    }

    fn cursor_on_empty_line(&self) -> bool {
        self.cursor == 0 || self.text[..self.cursor].ends_with('\n')
    }

    fn insert_text_at_cursor(&mut self, text: &str) {
        self.text.insert_str(self.cursor, text);
        self.cursor += text.len();
    }

    fn replace_text(&mut self, old: &str, new: &str) -> bool {
        if old.is_empty() {
            return false;
        }
        let Some(start) = self.text.find(old) else {
            return false;
        };
        let end = start + old.len();
        self.text.replace_range(start..end, new);
        if self.cursor >= end {
            self.cursor = self.cursor - old.len() + new.len();
        } else if self.cursor > start {
            self.cursor = start + new.len();
        }
        true
    }
}
