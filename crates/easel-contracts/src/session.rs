/// The retained result of the most recent successful generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastGeneration {
    /// PNG-encoded image bytes, ready for export.
    pub png: Vec<u8>,
    /// The final composed prompt the image was generated from.
    pub prompt: String,
}

/// Holds at most one (image, prompt) pair across form redraws.
///
/// Single-writer: only a successful generation replaces the pair, and it is
/// replaced whole. Failed attempts and warnings leave it untouched.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    last: Option<LastGeneration>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, png: Vec<u8>, prompt: impl Into<String>) {
        self.last = Some(LastGeneration {
            png,
            prompt: prompt.into(),
        });
    }

    pub fn last(&self) -> Option<&LastGeneration> {
        self.last.as_ref()
    }

    pub fn has_result(&self) -> bool {
        self.last.is_some()
    }
}
