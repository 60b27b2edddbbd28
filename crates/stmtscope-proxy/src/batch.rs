//! Batch text bookkeeping.

/// Ordered record of SQL queued with `add_batch`.
///
/// The accumulator only describes the batch for telemetry. It is emptied by
/// [`clear`](Self::clear) and otherwise survives batch execution, matching
/// what the caller sees if they never clear.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchAccumulator {
    fragments: Vec<String>,
    separator: String,
}

impl BatchAccumulator {
    /// Create an empty accumulator.
    pub fn new(separator: impl Into<String>) -> Self {
        Self {
            fragments: Vec::new(),
            separator: separator.into(),
        }
    }

    /// Append a fragment.
    pub fn push(&mut self, sql: &str) {
        self.fragments.push(sql.to_string());
    }

    /// Forget every fragment.
    pub fn clear(&mut self) {
        self.fragments.clear();
    }

    /// Fragments in append order.
    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    /// Number of fragments.
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    /// Whether no fragment has been appended since the last clear.
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Each fragment followed by the separator, concatenated.
    pub fn text(&self) -> String {
        let capacity = self
            .fragments
            .iter()
            .map(|fragment| fragment.len() + self.separator.len())
            .sum();
        let mut text = String::with_capacity(capacity);
        for fragment in &self.fragments {
            text.push_str(fragment);
            text.push_str(&self.separator);
        }
        text
    }
}
