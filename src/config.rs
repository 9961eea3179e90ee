//! Optimizer configuration.

/// Tuning knobs for one optimizer run.
#[derive(Debug, Clone)]
pub struct Options {
    /// Aggregate names to leave alone, on top of the built-in deny list.
    pub deny: Vec<String>,
    /// Minimum field count for a candidate aggregate. Values below 2 are
    /// treated as 2; reordering fewer fields is meaningless.
    pub min_fields: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            deny: Vec::new(),
            min_fields: 2,
        }
    }
}

impl Options {
    pub fn effective_min_fields(&self) -> usize {
        self.min_fields.max(2)
    }
}
