//! Redis key layout.

/// Builds the keys and channel used for votes under a common prefix.
///
/// - `{prefix}:votes:{poll}:opt:{option}`: hash of user id → JSON vote record
/// - `{prefix}:votes:{poll}:options`: set of option ids with votes
/// - `{prefix}:votes:polls`: set of poll ids with votes
/// - `{prefix}:votes:changed`: Pub/Sub channel carrying changed poll ids
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteKeys {
    prefix: String,
}

impl VoteKeys {
    /// Create a key builder.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Hash holding one option's votes.
    #[must_use]
    pub fn option(&self, poll_id: &str, option_id: &str) -> String {
        format!("{}:votes:{poll_id}:opt:{option_id}", self.prefix)
    }

    /// Set of a poll's voted options.
    #[must_use]
    pub fn options(&self, poll_id: &str) -> String {
        format!("{}:votes:{poll_id}:options", self.prefix)
    }

    /// Set of polls with votes.
    #[must_use]
    pub fn polls(&self) -> String {
        format!("{}:votes:polls", self.prefix)
    }

    /// Change notification channel.
    #[must_use]
    pub fn channel(&self) -> String {
        format!("{}:votes:changed", self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        let keys = VoteKeys::new("pc");

        assert_eq!(keys.option("p1", "option_0"), "pc:votes:p1:opt:option_0");
        assert_eq!(keys.options("p1"), "pc:votes:p1:options");
        assert_eq!(keys.polls(), "pc:votes:polls");
        assert_eq!(keys.channel(), "pc:votes:changed");
    }

    #[test]
    fn test_option_ids_cannot_shadow_index_keys() {
        let keys = VoteKeys::new("pc");

        assert_ne!(keys.option("p1", "options"), keys.options("p1"));
        assert_ne!(keys.option("votes", "polls"), keys.polls());
        assert_ne!(keys.options("changed"), keys.channel());
    }

    #[test]
    fn test_prefixes_do_not_collide() {
        let a = VoteKeys::new("a");
        let b = VoteKeys::new("b");
        assert_ne!(a.option("p1", "option_0"), b.option("p1", "option_0"));
        assert_ne!(a.channel(), b.channel());
    }
}
