use dartlink_protocol::ChannelId;

/// Errors that can occur in the channel service layer.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The client is not subscribed to the named channel.
    #[error("not subscribed to channel {0}")]
    NotSubscribed(ChannelId),

    /// The connection to the relay (or the hub) is gone.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Connecting or binding failed.
    #[error("connect failed: {0}")]
    ConnectFailed(#[source] std::io::Error),

    /// Sending a frame failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// A frame could not be encoded or decoded.
    #[error("codec failed: {0}")]
    Codec(#[from] dartlink_protocol::ProtocolError),
}
