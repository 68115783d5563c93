//! Pairing protocol: opponent discovery and role assignment.
//!
//! Each client runs one [`Pairing`] state machine over the shared lobby
//! channel:
//!
//! ```text
//! Idle → Announced → RoleAssigned → Paired
//! ```
//!
//! On entering the lobby a client announces itself with a HELLO and
//! checks occupancy. A client that finds the lobby empty — or that
//! receives a HELLO while still unassigned — claims the first-mover
//! role; it replies with a WELCOME naming the newcomer the second
//! mover. Both sides then derive the same dedicated game channel from
//! the sorted pair of identities and move to `Paired`.
//!
//! The machine is pure: every input returns the [`PairingEffect`]s the
//! session should carry out (publish, subscribe, role assignment). It
//! never touches the transport.
//!
//! Known race: with exactly two participants, both can observe an empty
//! lobby at the same moment and both claim first mover. There is no
//! tie-break — this is documented best-effort behavior (see
//! DESIGN.md).

use dartlink_game::Role;
use dartlink_protocol::{
    ChannelId, GameMessage, PlayerIdentity, PlayerSlot, game_channel_id, now_ms,
};

/// Progress of the pairing handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingPhase {
    /// Not yet announced in the lobby.
    Idle,
    /// HELLO published, waiting to learn the role.
    Announced,
    /// Role claimed, opponent not yet confirmed.
    RoleAssigned,
    /// Opponent known, game channel derived. Terminal.
    Paired,
}

/// What we know about the opponent once discovered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    pub identity: PlayerIdentity,
    pub name: String,
}

/// An action the session must carry out on behalf of the pairing
/// machine.
#[derive(Debug, Clone, PartialEq)]
pub enum PairingEffect {
    /// Publish a message on the lobby channel.
    PublishLobby(GameMessage),
    /// The local role has been fixed; feed it to the turn machine.
    RoleAssigned(Role),
    /// Subscribe to the derived two-party game channel.
    JoinGameChannel(ChannelId),
    /// Pairing is complete. `bootstrap` is true for the first mover,
    /// who must start the game and publish the initial snapshot.
    Paired { channel: ChannelId, bootstrap: bool },
}

/// The per-client pairing state machine.
#[derive(Debug, Clone)]
pub struct Pairing {
    identity: PlayerIdentity,
    name: String,
    phase: PairingPhase,
    role: Role,
    opponent: Option<PeerInfo>,
}

impl Pairing {
    pub fn new(identity: PlayerIdentity, name: impl Into<String>) -> Self {
        Self {
            identity,
            name: name.into(),
            phase: PairingPhase::Idle,
            role: Role::Unassigned,
            opponent: None,
        }
    }

    pub fn phase(&self) -> PairingPhase {
        self.phase
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn opponent(&self) -> Option<&PeerInfo> {
        self.opponent.as_ref()
    }

    /// The derived game channel, once an opponent is known.
    pub fn game_channel(&self) -> Option<ChannelId> {
        self.opponent
            .as_ref()
            .map(|peer| game_channel_id(&self.identity, &peer.identity))
    }

    /// Announces this client in the lobby. Idempotent.
    pub fn announce(&mut self) -> Vec<PairingEffect> {
        if self.phase != PairingPhase::Idle {
            return Vec::new();
        }
        self.phase = PairingPhase::Announced;
        tracing::info!(identity = %self.identity, "announcing in lobby");
        vec![PairingEffect::PublishLobby(GameMessage::Hello {
            player_id: self.identity.clone(),
            player_name: self.name.clone(),
            timestamp: now_ms(),
        })]
    }

    /// Feeds in the lobby occupancy observed right after announcing.
    ///
    /// An occupancy of one (just us) or zero claims the first-mover
    /// role. The check races with a concurrent join on the other side;
    /// see the module docs.
    pub fn observe_occupancy(&mut self, occupancy: usize) -> Vec<PairingEffect> {
        if self.role.is_assigned() {
            return Vec::new();
        }
        if occupancy <= 1 {
            tracing::info!(occupancy, "lobby empty: claiming first mover");
            self.claim_role(Role::FirstMover)
        } else {
            tracing::info!(occupancy, "lobby occupied: waiting for welcome");
            Vec::new()
        }
    }

    /// Handles a HELLO from the lobby.
    ///
    /// The receiver of a first HELLO is (or becomes) the first mover
    /// and replies with a WELCOME, then pairs. Duplicate HELLOs after
    /// pairing are no-ops.
    pub fn on_hello(&mut self, peer: PeerInfo) -> Vec<PairingEffect> {
        if peer.identity == self.identity {
            return Vec::new();
        }
        if self.phase == PairingPhase::Paired {
            tracing::debug!(from = %peer.identity, "duplicate HELLO after pairing, ignoring");
            return Vec::new();
        }
        if let Some(existing) = &self.opponent {
            if existing.identity != peer.identity {
                // Two-player game: a third announcer is not our opponent.
                tracing::warn!(from = %peer.identity, "HELLO from third party, ignoring");
                return Vec::new();
            }
        }
        tracing::info!(from = %peer.identity, name = %peer.name, "opponent discovered");
        self.opponent = Some(peer.clone());

        let mut effects = Vec::new();
        if !self.role.is_assigned() {
            effects.extend(self.claim_role(Role::FirstMover));
        }
        match self.role {
            Role::FirstMover => {
                effects.push(PairingEffect::PublishLobby(GameMessage::Welcome {
                    player_id: self.identity.clone(),
                    player_name: self.name.clone(),
                    new_player_role: PlayerSlot::Player2,
                    timestamp: now_ms(),
                }));
                effects.extend(self.complete(true));
            }
            // A second mover just records the name; its pairing
            // completed when the WELCOME arrived.
            Role::SecondMover | Role::Unassigned => {}
        }
        effects
    }

    /// Handles a WELCOME from the lobby.
    ///
    /// The addressed newcomer claims the second-mover role and pairs.
    /// A WELCOME arriving after the role is already fixed (duplicate
    /// delivery, or the dual-first-mover race) never re-assigns.
    pub fn on_welcome(
        &mut self,
        peer: PeerInfo,
        new_player_role: PlayerSlot,
    ) -> Vec<PairingEffect> {
        if peer.identity == self.identity {
            return Vec::new();
        }
        if self.phase == PairingPhase::Paired || self.role.is_assigned() {
            tracing::debug!(from = %peer.identity, "WELCOME with role already fixed, ignoring");
            return Vec::new();
        }
        if new_player_role != PlayerSlot::Player2 {
            tracing::warn!(role = %new_player_role, "WELCOME names an unexpected role, ignoring");
            return Vec::new();
        }
        tracing::info!(from = %peer.identity, "welcomed as second mover");
        self.opponent = Some(peer);
        let mut effects = self.claim_role(Role::SecondMover);
        effects.extend(self.complete(false));
        effects
    }

    fn claim_role(&mut self, role: Role) -> Vec<PairingEffect> {
        self.role = role;
        self.phase = PairingPhase::RoleAssigned;
        vec![PairingEffect::RoleAssigned(role)]
    }

    fn complete(&mut self, bootstrap: bool) -> Vec<PairingEffect> {
        let Some(channel) = self.game_channel() else {
            return Vec::new();
        };
        self.phase = PairingPhase::Paired;
        tracing::info!(channel = %channel, bootstrap, "paired");
        vec![
            PairingEffect::JoinGameChannel(channel.clone()),
            PairingEffect::Paired { channel, bootstrap },
        ]
    }
}
