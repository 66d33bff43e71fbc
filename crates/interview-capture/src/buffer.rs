/// Running accumulator for one assistant turn.
#[derive(Debug, Default, Clone)]
pub struct TokenStreamBuffer {
    text: String,
    fragments: usize,
}

impl TokenStreamBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Concatenate `fragment` and return the accumulated text. Empty
    /// fragments leave the buffer untouched.
    pub fn append(&mut self, fragment: &str) -> &str {
        if !fragment.is_empty() {
            self.text.push_str(fragment);
            self.fragments += 1;
        }
        &self.text
    }

    pub fn reset(&mut self) {
        self.text.clear();
        self.fragments = 0;
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Number of non-empty fragments appended since the last reset.
    pub fn fragment_count(&self) -> usize {
        self.fragments
    }

    /// Final view: the accumulated text with surrounding whitespace removed.
    pub fn finish(&self) -> String {
        self.text.trim().to_string()
    }
}
