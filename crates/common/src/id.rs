//! ID generation utilities.

use ulid::Ulid;

/// ID generator for polls and comments.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    _private: (),
}

impl IdGenerator {
    /// Create a new ID generator.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }

    /// Generate a new ULID-based ID.
    ///
    /// ULIDs sort by creation time, which keeps "newest first" listings cheap.
    #[must_use]
    pub fn generate(&self) -> String {
        Ulid::new().to_string().to_lowercase()
    }

    /// Option IDs are positional and only unique within their poll.
    #[must_use]
    pub fn option_id(&self, index: usize) -> String {
        format!("option_{index}")
    }
}
