//! The turn state machine proper.

use dartlink_protocol::{
    DartValue, GameMessage, GameStateSnapshot, PlayerIdentity, PlayerSlot, now_ms,
};
use dartlink_scoring::{
    ButtonInput, DartToken, Multiplier, ThrowOutcome, classify_throw, turn_total,
};

use crate::{GameConfig, Role};

/// Lifecycle phase of the local game view.
///
/// ```text
/// AwaitingOpponent → InProgress → (leg reset) → InProgress …
/// ```
///
/// A leg win is transient: the winning throw increments the leg count
/// and resets both scores within the same transition, so the machine
/// re-enters `InProgress` immediately (the winner of the last leg is
/// kept in [`TurnState::last_leg_winner`] for display). A terminal
/// `MatchOver` phase is a documented extension point — the GAME_OVER
/// wire message exists but no client-side handling is required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    /// Pairing has not completed; no throws are accepted.
    AwaitingOpponent,
    /// Both players known, legs underway.
    InProgress,
}

/// The authoritative-per-client game state.
///
/// One instance per session, mutated in place by local input and by
/// remote snapshots. The "shared" game is an eventually-consistent
/// replica: there is no lock, only full-snapshot reconciliation.
#[derive(Debug, Clone)]
pub struct TurnState {
    identity: PlayerIdentity,
    config: GameConfig,
    phase: GamePhase,
    local_role: Role,
    /// Whose turn it is. Always FirstMover or SecondMover once play
    /// has begun.
    active_role: Role,
    /// Derived from `active_role == local_role`; recomputed on every
    /// change to either, never set independently.
    is_local_turn: bool,
    score_self: u16,
    score_opponent: u16,
    legs_self: u32,
    legs_opponent: u32,
    /// The current turn's input buffer, at most 3 darts.
    pending: Vec<DartToken>,
    multiplier: Multiplier,
    /// Who leads the current leg. Alternates per leg when configured.
    leg_leader: Role,
    last_leg_winner: Option<Role>,
    /// The snapshot that last triggered a leg-change reset. Delivery is
    /// at-least-once, so a replayed copy of that snapshot must not be
    /// mistaken for fresh scores in the new leg.
    last_reset_snapshot: Option<GameStateSnapshot>,
}

impl TurnState {
    /// Creates the state for a fresh session: both scores at the
    /// initial value, no legs, no role, first mover to lead leg one.
    pub fn new(identity: PlayerIdentity, config: GameConfig) -> Self {
        let initial = config.initial_score;
        Self {
            identity,
            config,
            phase: GamePhase::AwaitingOpponent,
            local_role: Role::Unassigned,
            active_role: Role::FirstMover,
            is_local_turn: false,
            score_self: initial,
            score_opponent: initial,
            legs_self: 0,
            legs_opponent: 0,
            pending: Vec::with_capacity(3),
            multiplier: Multiplier::Single,
            leg_leader: Role::FirstMover,
            last_leg_winner: None,
            last_reset_snapshot: None,
        }
    }

    // -- accessors ---------------------------------------------------------

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn local_role(&self) -> Role {
        self.local_role
    }

    pub fn active_role(&self) -> Role {
        self.active_role
    }

    pub fn is_local_turn(&self) -> bool {
        self.is_local_turn
    }

    pub fn score_self(&self) -> u16 {
        self.score_self
    }

    pub fn score_opponent(&self) -> u16 {
        self.score_opponent
    }

    pub fn legs_self(&self) -> u32 {
        self.legs_self
    }

    pub fn legs_opponent(&self) -> u32 {
        self.legs_opponent
    }

    pub fn pending_throws(&self) -> &[DartToken] {
        &self.pending
    }

    pub fn multiplier(&self) -> Multiplier {
        self.multiplier
    }

    pub fn last_leg_winner(&self) -> Option<Role> {
        self.last_leg_winner
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    // -- role / lifecycle --------------------------------------------------

    /// Fixes the local role. A role is assigned exactly once per
    /// session; repeated assignment (duplicate handshake messages) is
    /// ignored.
    pub fn assign_role(&mut self, role: Role) {
        if self.local_role.is_assigned() {
            if self.local_role != role {
                tracing::warn!(
                    current = ?self.local_role,
                    requested = ?role,
                    "ignoring conflicting role re-assignment"
                );
            }
            return;
        }
        if !role.is_assigned() {
            return;
        }
        self.local_role = role;
        self.recompute_turn();
        tracing::info!(role = ?role, "role assigned");
    }

    /// Marks the game as started.
    ///
    /// The first mover calls this once pairing completes and publishes
    /// the returned initial snapshot to bootstrap the second mover's
    /// view; the second mover starts implicitly when a welcome or
    /// snapshot arrives.
    pub fn start(&mut self) -> Vec<GameMessage> {
        if self.phase == GamePhase::InProgress {
            return Vec::new();
        }
        self.phase = GamePhase::InProgress;
        self.recompute_turn();
        tracing::info!(role = ?self.local_role, "game started");
        vec![self.snapshot_message()]
    }

    /// Marks the game as started without broadcasting (second mover).
    pub fn mark_started(&mut self) {
        if self.phase != GamePhase::InProgress {
            self.phase = GamePhase::InProgress;
            self.recompute_turn();
            tracing::info!(role = ?self.local_role, "game started by peer");
        }
    }

    // -- local input -------------------------------------------------------

    /// Selects the multiplier applied to the next throw.
    pub fn select_multiplier(&mut self, multiplier: Multiplier) {
        self.multiplier = multiplier;
    }

    /// Records a local throw.
    ///
    /// Preconditions: game in progress, local turn, fewer than 3 darts
    /// in the buffer. Violations are silent no-ops (an empty return),
    /// not errors — out-of-turn clicks are expected UI noise.
    ///
    /// Returns the messages to publish: an advisory DART_THROWN notice
    /// followed by the authoritative snapshot reflecting the outcome.
    pub fn submit_throw(&mut self, button: ButtonInput) -> Vec<GameMessage> {
        if self.phase != GamePhase::InProgress
            || !self.is_local_turn
            || self.pending.len() >= 3
        {
            tracing::debug!(
                phase = ?self.phase,
                local_turn = self.is_local_turn,
                darts = self.pending.len(),
                "throw ignored: precondition not met"
            );
            return Vec::new();
        }

        let token = DartToken::from_button(button, self.multiplier);
        self.multiplier = Multiplier::Single;
        self.pending.push(token);

        let score_before = self.score_self;
        let outcome = classify_throw(score_before, &token);

        let mut out = vec![GameMessage::DartThrown {
            player_id: self.identity.clone(),
            dart_value: DartValue::Token(token.to_string()),
            timestamp: now_ms(),
        }];

        match outcome {
            ThrowOutcome::Win => {
                tracing::info!(dart = %token, "leg won");
                self.legs_self += 1;
                self.last_leg_winner = Some(self.local_role);
                self.reset_for_new_leg();
            }
            ThrowOutcome::Bust => {
                // A bust discards the entire turn: darts applied earlier
                // in this turn are handed back, restoring the score to
                // its value when the turn began. The busting dart itself
                // was never deducted.
                let applied = turn_total(&self.pending) - token.value();
                self.score_self = score_before + applied;
                tracing::info!(dart = %token, restored = self.score_self, "bust");
                self.pending.clear();
                self.pass_turn();
            }
            ThrowOutcome::Continue { remaining } => {
                self.score_self = remaining;
                if self.pending.len() == 3 {
                    self.pending.clear();
                    self.pass_turn();
                }
            }
        }

        out.push(self.snapshot_message());
        out
    }

    /// Removes the last dart from the buffer and restores its value to
    /// the local score. Never flips the turn.
    ///
    /// Preconditions: game in progress, local turn, non-empty buffer;
    /// violations are silent no-ops.
    pub fn backspace(&mut self) -> Vec<GameMessage> {
        if self.phase != GamePhase::InProgress || !self.is_local_turn {
            return Vec::new();
        }
        let Some(token) = self.pending.pop() else {
            return Vec::new();
        };
        self.score_self += token.value();
        tracing::debug!(dart = %token, "throw retracted");
        vec![self.snapshot_message()]
    }

    // -- remote reconciliation ---------------------------------------------

    /// Ingests an authoritative snapshot from the peer.
    ///
    /// Wire player1/player2 fields are mapped onto local/opponent using
    /// the local role. Leg counts merge monotonically (they never
    /// decrease within a session), and whenever the received leg tuple
    /// differs from the last known one, both scores reset to the
    /// initial value instead of trusting the transmitted scores — a
    /// stale mid-leg snapshot arriving after a leg reset must not
    /// resurrect dead scores. Applying the same snapshot twice is a
    /// no-op.
    pub fn apply_remote_state(&mut self, snapshot: &GameStateSnapshot) {
        let Some(local_slot) = self.local_role.slot() else {
            tracing::warn!("snapshot received before role assignment, ignoring");
            return;
        };

        let (rx_score_self, rx_score_opp, rx_legs_self, rx_legs_opp) = match local_slot {
            PlayerSlot::Player1 => (
                snapshot.player1_score,
                snapshot.player2_score,
                snapshot.player1_legs,
                snapshot.player2_legs,
            ),
            PlayerSlot::Player2 => (
                snapshot.player2_score,
                snapshot.player1_score,
                snapshot.player2_legs,
                snapshot.player1_legs,
            ),
        };

        let leg_change =
            (rx_legs_self, rx_legs_opp) != (self.legs_self, self.legs_opponent);
        if leg_change {
            if rx_legs_self > self.legs_self || rx_legs_opp > self.legs_opponent {
                self.last_leg_winner = Some(if rx_legs_self > self.legs_self {
                    self.local_role
                } else {
                    self.local_role.other()
                });
                // Adopt the leg leader the peer's reset implies so both
                // sides agree on who starts subsequent legs.
                self.leg_leader = Role::from_slot(snapshot.current_player);
            }
            self.legs_self = self.legs_self.max(rx_legs_self);
            self.legs_opponent = self.legs_opponent.max(rx_legs_opp);
            self.score_self = self.config.initial_score;
            self.score_opponent = self.config.initial_score;
            self.pending.clear();
            self.last_reset_snapshot = Some(snapshot.clone());
            tracing::debug!(
                legs_self = self.legs_self,
                legs_opponent = self.legs_opponent,
                "leg change in snapshot: scores reset to initial"
            );
        } else if self.last_reset_snapshot.as_ref() == Some(snapshot) {
            // Redelivery of the snapshot that reset the leg. Its leg
            // tuple now matches ours (the merge made it so), but its
            // scores belong to the finished leg.
            tracing::debug!("replayed leg-change snapshot, keeping reset scores");
        } else {
            self.score_self = rx_score_self;
            self.score_opponent = rx_score_opp;
        }

        self.active_role = Role::from_slot(snapshot.current_player);
        self.phase = GamePhase::InProgress;
        self.recompute_turn();
        tracing::debug!(
            score_self = self.score_self,
            score_opponent = self.score_opponent,
            local_turn = self.is_local_turn,
            "remote snapshot applied"
        );
    }

    // -- wire encoding -----------------------------------------------------

    /// Encodes the current state as a wire snapshot, mapping the
    /// local/opponent fields onto player1/player2 by role.
    pub fn snapshot_message(&self) -> GameMessage {
        // Unassigned only occurs before play begins; map it like the
        // first mover so the encoding is total.
        let local_slot = self.local_role.slot().unwrap_or(PlayerSlot::Player1);
        let (p1_score, p2_score, p1_legs, p2_legs) = match local_slot {
            PlayerSlot::Player1 => (
                self.score_self,
                self.score_opponent,
                self.legs_self,
                self.legs_opponent,
            ),
            PlayerSlot::Player2 => (
                self.score_opponent,
                self.score_self,
                self.legs_opponent,
                self.legs_self,
            ),
        };
        GameMessage::GameState(GameStateSnapshot {
            player_id: self.identity.clone(),
            player1_score: p1_score,
            player2_score: p2_score,
            player1_legs: p1_legs,
            player2_legs: p2_legs,
            current_player: self
                .active_role
                .slot()
                .unwrap_or(PlayerSlot::Player1),
            timestamp: now_ms(),
        })
    }

    // -- internals ---------------------------------------------------------

    fn recompute_turn(&mut self) {
        self.is_local_turn = self.phase == GamePhase::InProgress
            && self.local_role.is_assigned()
            && self.active_role == self.local_role;
    }

    fn pass_turn(&mut self) {
        self.active_role = self.active_role.other();
        self.recompute_turn();
    }

    fn reset_for_new_leg(&mut self) {
        self.score_self = self.config.initial_score;
        self.score_opponent = self.config.initial_score;
        self.pending.clear();
        self.multiplier = Multiplier::Single;
        self.leg_leader = if self.config.alternate_leg_start {
            self.leg_leader.other()
        } else {
            Role::FirstMover
        };
        self.active_role = self.leg_leader;
        self.recompute_turn();
    }
}
