use std::sync::LazyLock;

use regex::Regex;

/// Leading-token test used everywhere a vertex row has to be told apart from
/// a metadata or sentinel line. Matches signed integers and decimals,
/// including a bare leading dot (".5").
static LEADING_NUM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?([0-9]*[.])?[0-9]+").unwrap());

/// True when the first whitespace-delimited token of `line` starts with a
/// number. Empty lines are not numeric.
pub fn starts_numeric(line: &str) -> bool {
    match line.split_whitespace().next() {
        Some(tok) => LEADING_NUM_RE.is_match(tok),
        None => false,
    }
}

/// Forward-only cursor over an immutable sequence of lines with one line of
/// lookahead. All the stage readers in this crate consume their input through
/// this, so end-of-input mid-block is always an `Option`, never a panic.
pub struct LineCursor {
    lines: Vec<String>,
    pos: usize,
}

impl LineCursor {
    pub fn new(text: &str) -> Self {
        Self {
            lines: text.lines().map(str::to_string).collect(),
            pos: 0,
        }
    }

    pub fn peek(&self) -> Option<&str> {
        self.lines.get(self.pos).map(String::as_str)
    }

    pub fn advance(&mut self) -> Option<&str> {
        if self.pos >= self.lines.len() {
            return None;
        }
        self.pos += 1;
        Some(&self.lines[self.pos - 1])
    }

    /// Discard up to `n` lines.
    pub fn skip(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.lines.len());
    }

    pub fn is_done(&self) -> bool {
        self.pos >= self.lines.len()
    }
}
