//! In-process channel hub.
//!
//! One [`MemoryHub`] plays the part of the whole pub/sub service for
//! every participant in the same process. Used by the integration
//! tests and the local demo; the session layer cannot tell it apart
//! from the relay.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use dartlink_protocol::{ChannelId, GameMessage, PlayerIdentity};
use tokio::sync::mpsc;

use crate::{ChannelError, ChannelEvent, ChannelService, PresenceAction, Subscription};

struct Subscriber {
    identity: PlayerIdentity,
    tx: mpsc::UnboundedSender<ChannelEvent>,
}

#[derive(Default)]
struct HubState {
    channels: HashMap<ChannelId, Vec<Subscriber>>,
}

impl HubState {
    /// Sends an event to every subscriber of a channel, dropping the
    /// ones whose receiving side is gone.
    fn fan_out(&mut self, channel: &ChannelId, event: ChannelEvent) {
        if let Some(subs) = self.channels.get_mut(channel) {
            subs.retain(|sub| sub.tx.send(event.clone()).is_ok());
        }
    }

    /// Same, but skipping one identity.
    fn fan_out_except(
        &mut self,
        channel: &ChannelId,
        skip: &PlayerIdentity,
        event: ChannelEvent,
    ) {
        if let Some(subs) = self.channels.get_mut(channel) {
            subs.retain(|sub| {
                sub.identity == *skip || sub.tx.send(event.clone()).is_ok()
            });
        }
    }
}

/// A shared, in-process pub/sub hub.
///
/// Cloning is cheap; all clones refer to the same hub. Create one
/// [`MemoryClient`] per participant with [`MemoryHub::client`].
#[derive(Clone, Default)]
pub struct MemoryHub {
    state: Arc<Mutex<HubState>>,
}

impl MemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// A service handle for one participant.
    pub fn client(&self, identity: PlayerIdentity) -> MemoryClient {
        MemoryClient {
            hub: self.clone(),
            identity,
        }
    }
}

/// One participant's handle onto a [`MemoryHub`].
#[derive(Clone)]
pub struct MemoryClient {
    hub: MemoryHub,
    identity: PlayerIdentity,
}

impl MemoryClient {
    fn lock(&self) -> std::sync::MutexGuard<'_, HubState> {
        // A poisoned hub lock means a panicking test; propagating the
        // panic is the right outcome there.
        self.hub.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ChannelService for MemoryClient {
    fn identity(&self) -> &PlayerIdentity {
        &self.identity
    }

    async fn subscribe(&self, channel: &ChannelId) -> Result<Subscription, ChannelError> {
        let (tx, rx) = mpsc::unbounded_channel();
        {
            let mut state = self.lock();
            let subs = state.channels.entry(channel.clone()).or_default();
            // Re-subscribing replaces the old stream for this identity.
            subs.retain(|sub| sub.identity != self.identity);
            subs.push(Subscriber {
                identity: self.identity.clone(),
                tx,
            });
            state.fan_out_except(
                channel,
                &self.identity,
                ChannelEvent::Presence {
                    channel: channel.clone(),
                    action: PresenceAction::Join,
                    identity: self.identity.clone(),
                },
            );
        }
        tracing::debug!(identity = %self.identity, %channel, "subscribed");
        Ok(Subscription::new(channel.clone(), rx))
    }

    async fn unsubscribe(&self, channel: &ChannelId) -> Result<(), ChannelError> {
        let mut state = self.lock();
        let Some(subs) = state.channels.get_mut(channel) else {
            return Err(ChannelError::NotSubscribed(channel.clone()));
        };
        let before = subs.len();
        subs.retain(|sub| sub.identity != self.identity);
        if subs.len() == before {
            return Err(ChannelError::NotSubscribed(channel.clone()));
        }
        state.fan_out(
            channel,
            ChannelEvent::Presence {
                channel: channel.clone(),
                action: PresenceAction::Leave,
                identity: self.identity.clone(),
            },
        );
        tracing::debug!(identity = %self.identity, %channel, "unsubscribed");
        Ok(())
    }

    async fn publish(
        &self,
        channel: &ChannelId,
        message: &GameMessage,
    ) -> Result<(), ChannelError> {
        self.lock().fan_out(
            channel,
            ChannelEvent::Message {
                channel: channel.clone(),
                message: message.clone(),
            },
        );
        Ok(())
    }

    async fn here_now(&self, channel: &ChannelId) -> Result<usize, ChannelError> {
        Ok(self
            .lock()
            .channels
            .get(channel)
            .map(Vec::len)
            .unwrap_or(0))
    }
}

// =========================================================================
// Tests
// =========================================================================
