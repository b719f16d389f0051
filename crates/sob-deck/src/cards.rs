//! Fixed-width card formatting shared by keyword and block-format decks.

use std::fmt::Write;

/// Right-align `value` in `width` columns.
pub fn field(value: impl std::fmt::Display, width: usize) -> String {
    format!("{value:>width$}")
}

/// Shortest decimal or scientific rendering of `v` that fits in `width`.
pub fn real(v: f64, width: usize) -> String {
    let plain = format!("{v}");
    if plain.len() <= width {
        return format!("{plain:>width$}");
    }
    for precision in (0..=12).rev() {
        let sci = format!("{v:.precision$e}");
        if sci.len() <= width {
            return format!("{sci:>width$}");
        }
    }
    // width too small for any rendering; the solver will reject the card
    format!("{v:e}")
}

/// Accumulates lines of a deck.
#[derive(Debug, Default)]
pub struct CardBuffer {
    text: String,
}

impl CardBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(&mut self, line: impl AsRef<str>) -> &mut Self {
        self.text.push_str(line.as_ref());
        self.text.push('\n');
        self
    }

    /// Row of right-aligned fields of equal width.
    pub fn row<I, T>(&mut self, width: usize, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = T>,
        T: std::fmt::Display,
    {
        for f in fields {
            let _ = write!(self.text, "{f:>width$}");
        }
        self.text.push('\n');
        self
    }

    /// Keyword comment line (`$`) or block comment line (`#`).
    pub fn comment(&mut self, marker: char, text: &str) -> &mut Self {
        self.text.push(marker);
        self.text.push_str(text);
        self.text.push('\n');
        self
    }

    pub fn into_string(self) -> String {
        self.text
    }
}
