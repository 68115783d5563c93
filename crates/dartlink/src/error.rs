//! Unified error type for the Dartlink session layer.

use dartlink_channel::ChannelError;

/// Top-level error for the `dartlink` meta-crate.
///
/// The `#[from]` variants let `?` convert sub-crate errors directly.
#[derive(Debug, thiserror::Error)]
pub enum DartlinkError {
    /// Joining or announcing in the lobby failed. Without the lobby no
    /// pairing can happen, so this aborts the session.
    #[error("lobby setup failed: {0}")]
    Setup(#[source] ChannelError),

    /// A channel-service error after setup (subscribe to the game
    /// channel, connection loss).
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use dartlink_protocol::ChannelId;

    #[test]
    fn test_from_channel_error() {
        let err = ChannelError::NotSubscribed(ChannelId::lobby());
        let top: DartlinkError = err.into();
        assert!(matches!(top, DartlinkError::Channel(_)));
        assert!(top.to_string().contains("darts-lobby"));
    }

    #[test]
    fn test_setup_error_names_the_cause() {
        let err = DartlinkError::Setup(ChannelError::ConnectionClosed("gone".into()));
        assert!(err.to_string().contains("lobby setup failed"));
    }
}
