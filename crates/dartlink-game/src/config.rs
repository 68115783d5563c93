//! Game configuration.

use serde::{Deserialize, Serialize};

/// Configuration for one darts session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    /// Starting score for every leg (classically 501; defaults to 101
    /// for short games).
    pub initial_score: u16,

    /// Whether the leg leader alternates between legs.
    ///
    /// When `true` (default), the first mover starts leg one and the
    /// start alternates every leg after that. When `false`, the first
    /// mover starts every leg.
    pub alternate_leg_start: bool,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            initial_score: 101,
            alternate_leg_start: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GameConfig::default();
        assert_eq!(config.initial_score, 101);
        assert!(config.alternate_leg_start);
    }
}
