//! Structural completeness checks for streamed JSON arguments.
//!
//! These helpers never build a value tree. They only track bracket depth,
//! string state and escapes, which is enough to decide when streamed arguments
//! can be finalized without waiting for an explicit end marker.

/// Incremental bracket/quote/escape tracker for a JSON container.
///
/// Feed it consecutive pieces of the same text; the answer is the same as
/// scanning the concatenation in one go.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JsonCompleteness {
    /// Bracket/brace depth
    depth: usize,
    /// Whether currently inside a string literal
    in_string: bool,
    /// Whether next character is escaped
    escape_next: bool,
    /// At least one `{` or `[` was seen
    seen_open: bool,
    /// A closer appeared with nothing open; the text can never become valid
    unbalanced: bool,
}

impl JsonCompleteness {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan the next piece of text
    pub fn feed(&mut self, text: &str) -> &mut Self {
        for ch in text.chars() {
            self.process_char(ch);
        }
        self
    }

    /// Process a single character
    pub fn process_char(&mut self, ch: char) {
        if self.escape_next {
            self.escape_next = false;
            return;
        }

        if self.in_string {
            match ch {
                '\\' => self.escape_next = true,
                '"' => self.in_string = false,
                _ => {}
            }
            return;
        }

        match ch {
            '"' => self.in_string = true,
            '{' | '[' => {
                self.depth += 1;
                self.seen_open = true;
            }
            '}' | ']' => {
                if self.depth == 0 {
                    self.unbalanced = true;
                } else {
                    self.depth -= 1;
                }
            }
            _ => {}
        }
    }

    /// True iff every opened container was closed and the scan ended outside a string
    pub fn is_complete(&self) -> bool {
        self.seen_open && !self.unbalanced && self.depth == 0 && !self.in_string
    }

    /// Current nesting depth
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Whether the scan currently sits inside a string literal
    pub fn in_string(&self) -> bool {
        self.in_string
    }
}

/// Check whether `text` is a structurally complete JSON object or array.
///
/// Scalars and truncated containers report `false`; a balanced container
/// never does.
pub fn is_complete_json(text: &str) -> bool {
    JsonCompleteness::new().feed(text).is_complete()
}

/// Compute the part of `observed` that has not been streamed yet.
///
/// Returns `None` when `observed` does not extend `streamed`, i.e. the
/// argument text regressed.
pub fn argument_diff<'a>(streamed: &str, observed: &'a str) -> Option<&'a str> {
    observed.strip_prefix(streamed)
}
