use regex_lite::Regex;

use crate::config::Labels;
use crate::error::UploadError;

/// Upper bound on suffix probing before a file is given up on.
const MAX_SUFFIX_PROBES: u32 = 1_000;

/// Characters browsers leave in pasted filenames that would make a
/// placeholder impossible to find again by eye.
const ZERO_WIDTH: &[char] = &['\u{200B}', '\u{200C}', '\u{200D}', '\u{FEFF}'];

/// A placeholder claimed for one task.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReservedPlaceholder {
    /// `filename` or `filename(n)`; identical at insert and completion time.
    pub label: String,
    /// `[Uploading: <label>...]()`, the literal replaced on commit.
    pub token: String,
    /// What actually went into the document, token plus line breaks.
    pub inserted_text: String,
    pub order: Option<u32>,
}

#[derive(Clone, Debug)]
pub struct PlaceholderNamer {
    uploading: String,
    clipboard: String,
}

impl Default for PlaceholderNamer {
    fn default() -> Self {
        Self::new(&Labels::default())
    }
}

impl PlaceholderNamer {
    pub fn new(labels: &Labels) -> Self {
        Self {
            uploading: labels.uploading.clone(),
            clipboard: labels.clipboard.clone(),
        }
    }

    /// Drop zero-width characters; nameless files (clipboard images) get the
    /// clipboard label.
    pub fn display_name(&self, filename: &str) -> String {
        let cleaned: String = filename.chars().filter(|c| !ZERO_WIDTH.contains(c)).collect();
        let cleaned = cleaned.trim();
        if cleaned.is_empty() {
            self.clipboard.clone()
        } else {
            cleaned.to_string()
        }
    }

    fn token_for(&self, label: &str) -> String {
        format!("[{}: {label}...]()", self.uploading)
    }

    /// Claim a token for `filename` that does not yet occur in
    /// `document_text`. Duplicate names get `(n)` with `n` one past the
    /// highest suffix already present.
    pub fn reserve(
        &self,
        filename: &str,
        document_text: &str,
        cursor_on_empty_line: bool,
    ) -> Result<ReservedPlaceholder, UploadError> {
        let name = self.display_name(filename);
        let exhausted = || UploadError::NamingCollisionExhausted {
            file: name.clone(),
        };

        let pattern = format!(
            r"\[{}: {}(?:\(([0-9]+)\))?\.\.\.\]\(\)",
            regex_lite::escape(&self.uploading),
            regex_lite::escape(&name)
        );
        let re = Regex::new(&pattern).map_err(|_| exhausted())?;

        let mut matched = false;
        let mut highest: u32 = 0;
        for caps in re.captures_iter(document_text) {
            matched = true;
            if let Some(n) = caps.get(1) {
                // Suffixes too large for u32 can never be reached by counting up.
                let n = n.as_str().parse::<u32>().map_err(|_| exhausted())?;
                highest = highest.max(n);
            }
        }

        let mut order = if matched {
            Some(highest.checked_add(1).ok_or_else(exhausted)?)
        } else {
            None
        };
        let mut probes = 0;
        let (label, token) = loop {
            let label = match order {
                Some(n) => format!("{name}({n})"),
                None => name.clone(),
            };
            let token = self.token_for(&label);
            if !document_text.contains(&token) {
                break (label, token);
            }
            probes += 1;
            if probes >= MAX_SUFFIX_PROBES {
                return Err(exhausted());
            }
            let next = order.unwrap_or(0).checked_add(1).ok_or_else(exhausted)?;
            order = Some(next);
        };

        let mut inserted_text = format!("{token}\n");
        if !cursor_on_empty_line {
            inserted_text.insert(0, '\n');
        }
        Ok(ReservedPlaceholder {
            label,
            token,
            inserted_text,
            order,
        })
    }

    /// Display label for a finished upload: `"<label> (<size>)"`.
    pub fn finalize(&self, placeholder: &ReservedPlaceholder, size_label: &str) -> String {
        format!("{} ({size_label})", placeholder.label)
    }
}
