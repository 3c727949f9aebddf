//! Leader display name used in discovery announcements.

/// Name announced when no source knows the leader's character.
pub const UNKNOWN_LEADER: &str = "Unknown";

/// Supplies the leader's current display name.
///
/// The game-state reader implements this in the embedding application; the
/// name may be unavailable while the game is loading.
pub trait LeaderIdentity: Send + Sync {
    /// Current character name, if known.
    fn leader_name(&self) -> Option<String>;

    /// Current name, or [`UNKNOWN_LEADER`].
    fn display_name(&self) -> String {
        self.leader_name()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_LEADER.to_owned())
    }
}

/// Identity fixed at startup, typically from `leader_name` in the config.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredIdentity {
    name: Option<String>,
}

impl ConfiguredIdentity {
    /// Identity announcing `name`, or [`UNKNOWN_LEADER`] when `None`.
    #[must_use]
    pub fn new(name: Option<String>) -> Self {
        Self { name }
    }
}

impl LeaderIdentity for ConfiguredIdentity {
    fn leader_name(&self) -> Option<String> {
        self.name.clone()
    }
}
