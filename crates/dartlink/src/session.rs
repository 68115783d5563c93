//! The game session: one player's event loop.
//!
//! A [`Session`] owns everything one participant needs: the channel
//! service, the pairing machine, and the turn state. It runs a single
//! `select!` loop over lobby events, game-channel events, and local
//! commands, and publishes a [`GameView`] on a watch channel for the
//! UI (or a test) to observe.
//!
//! Two deliberate behaviors worth calling out:
//!
//! - the service echoes our own publishes back; the session discards
//!   any message whose sender is the local identity before it reaches
//!   pairing or the turn machine
//! - publish failures after setup are logged and swallowed — the next
//!   full snapshot resynchronizes the peer, so retrying individual
//!   messages buys nothing

use dartlink_channel::{ChannelEvent, ChannelService, PresenceAction, Subscription};
use dartlink_game::{GameConfig, GamePhase, Role, TurnState};
use dartlink_pairing::{Pairing, PairingEffect, PairingPhase, PeerInfo};
use dartlink_protocol::{ChannelId, GameMessage, PlayerIdentity};
use dartlink_scoring::{ButtonInput, DartToken, Multiplier};
use tokio::sync::{mpsc, watch};

use crate::DartlinkError;

/// Configuration for one session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// The display name announced to the opponent.
    pub player_name: String,
    /// The discovery channel. All sessions looking for an opponent
    /// share this.
    pub lobby_channel: ChannelId,
    /// Rules for the game itself.
    pub game: GameConfig,
}

impl SessionConfig {
    pub fn new(player_name: impl Into<String>) -> Self {
        Self {
            player_name: player_name.into(),
            lobby_channel: ChannelId::lobby(),
            game: GameConfig::default(),
        }
    }
}

/// A local player action fed into the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Arm the multiplier for the next throw.
    SelectMultiplier(Multiplier),
    /// Record a dart.
    Throw(ButtonInput),
    /// Retract the most recent dart of the current turn.
    Backspace,
    /// End the session.
    Quit,
}

/// A read-only snapshot of the session for display.
#[derive(Debug, Clone, PartialEq)]
pub struct GameView {
    pub phase: GamePhase,
    pub pairing: PairingPhase,
    pub role: Role,
    pub score_self: u16,
    pub score_opponent: u16,
    pub legs_self: u32,
    pub legs_opponent: u32,
    pub is_my_turn: bool,
    pub pending: Vec<DartToken>,
    pub multiplier: Multiplier,
    pub last_leg_winner: Option<Role>,
    pub opponent_name: Option<String>,
}

/// Control handle returned by [`Session::connect`].
///
/// Cheap to use from a UI task: commands go in through a bounded
/// channel, state comes out through a watch channel.
pub struct SessionHandle {
    identity: PlayerIdentity,
    commands: mpsc::Sender<Command>,
    view: watch::Receiver<GameView>,
}

impl SessionHandle {
    pub fn identity(&self) -> &PlayerIdentity {
        &self.identity
    }

    /// Sends a command. Returns `false` once the session has ended.
    pub async fn command(&self, command: Command) -> bool {
        self.commands.send(command).await.is_ok()
    }

    /// The current view.
    pub fn view(&self) -> GameView {
        self.view.borrow().clone()
    }

    /// A watch receiver for awaiting view changes.
    pub fn watch(&self) -> watch::Receiver<GameView> {
        self.view.clone()
    }
}

enum Input {
    Lobby(Option<ChannelEvent>),
    Game(Option<ChannelEvent>),
    Command(Option<Command>),
}

/// One player's running game session.
pub struct Session<C: ChannelService> {
    service: C,
    config: SessionConfig,
    state: TurnState,
    pairing: Pairing,
    lobby: Subscription,
    game_sub: Option<Subscription>,
    game_channel: Option<ChannelId>,
    commands: mpsc::Receiver<Command>,
    view_tx: watch::Sender<GameView>,
}

impl<C: ChannelService> Session<C> {
    /// Joins the lobby, announces, and claims the first-mover role if
    /// the lobby is empty.
    ///
    /// Subscribe, occupancy, and the announcement itself are the
    /// non-negotiable part of startup: any failure here is returned as
    /// [`DartlinkError::Setup`] and the session never starts.
    pub async fn connect(
        service: C,
        config: SessionConfig,
    ) -> Result<(Self, SessionHandle), DartlinkError> {
        let identity = service.identity().clone();
        let state = TurnState::new(identity.clone(), config.game.clone());
        let pairing = Pairing::new(identity.clone(), config.player_name.clone());

        let lobby = service
            .subscribe(&config.lobby_channel)
            .await
            .map_err(DartlinkError::Setup)?;

        let (command_tx, command_rx) = mpsc::channel(16);
        let mut session = Self {
            service,
            config,
            state,
            pairing,
            lobby,
            game_sub: None,
            game_channel: None,
            commands: command_rx,
            view_tx: watch::Sender::new(GameView {
                phase: GamePhase::AwaitingOpponent,
                pairing: PairingPhase::Idle,
                role: Role::Unassigned,
                score_self: 0,
                score_opponent: 0,
                legs_self: 0,
                legs_opponent: 0,
                is_my_turn: false,
                pending: Vec::new(),
                multiplier: Multiplier::Single,
                last_leg_winner: None,
                opponent_name: None,
            }),
        };

        for effect in session.pairing.announce() {
            if let PairingEffect::PublishLobby(message) = effect {
                session
                    .service
                    .publish(&session.config.lobby_channel, &message)
                    .await
                    .map_err(DartlinkError::Setup)?;
            }
        }
        let occupancy = session
            .service
            .here_now(&session.config.lobby_channel)
            .await
            .map_err(DartlinkError::Setup)?;
        let effects = session.pairing.observe_occupancy(occupancy);
        session.apply_effects(effects).await?;
        session.publish_view();

        let view = session.view_tx.subscribe();
        let handle = SessionHandle {
            identity,
            commands: command_tx,
            view,
        };
        Ok((session, handle))
    }

    /// Runs the session until [`Command::Quit`] or the service goes away.
    pub async fn run(mut self) -> Result<(), DartlinkError> {
        tracing::info!(identity = %self.service.identity(), "session running");
        loop {
            self.publish_view();
            let input = {
                let lobby = &mut self.lobby;
                let commands = &mut self.commands;
                let game = self.game_sub.as_mut();
                tokio::select! {
                    event = lobby.recv() => Input::Lobby(event),
                    event = async {
                        match game {
                            Some(sub) => sub.recv().await,
                            None => std::future::pending::<Option<ChannelEvent>>().await,
                        }
                    } => Input::Game(event),
                    command = commands.recv() => Input::Command(command),
                }
            };
            match input {
                Input::Lobby(Some(event)) => self.on_lobby_event(event).await?,
                Input::Game(Some(event)) => self.on_game_event(event),
                Input::Command(Some(Command::Quit)) | Input::Command(None) => break,
                Input::Command(Some(command)) => self.on_command(command).await,
                Input::Lobby(None) | Input::Game(None) => {
                    return Err(DartlinkError::Channel(
                        dartlink_channel::ChannelError::ConnectionClosed(
                            "subscription ended".into(),
                        ),
                    ));
                }
            }
        }
        self.shutdown().await;
        Ok(())
    }

    async fn on_lobby_event(&mut self, event: ChannelEvent) -> Result<(), DartlinkError> {
        match event {
            ChannelEvent::Message { message, .. } => {
                if message.sender() == self.service.identity() {
                    tracing::trace!(kind = message.kind(), "discarding own echo");
                    return Ok(());
                }
                match message {
                    GameMessage::Hello {
                        player_id,
                        player_name,
                        ..
                    } => {
                        let effects = self.pairing.on_hello(PeerInfo {
                            identity: player_id,
                            name: player_name,
                        });
                        self.apply_effects(effects).await?;
                    }
                    GameMessage::Welcome {
                        player_id,
                        player_name,
                        new_player_role,
                        ..
                    } => {
                        let effects = self.pairing.on_welcome(
                            PeerInfo {
                                identity: player_id,
                                name: player_name,
                            },
                            new_player_role,
                        );
                        self.apply_effects(effects).await?;
                    }
                    other => {
                        tracing::debug!(kind = other.kind(), "unexpected message on lobby");
                    }
                }
            }
            ChannelEvent::Presence {
                action, identity, ..
            } => {
                tracing::debug!(%identity, ?action, "lobby presence");
            }
        }
        Ok(())
    }

    fn on_game_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Message { message, .. } => {
                if message.sender() == self.service.identity() {
                    tracing::trace!(kind = message.kind(), "discarding own echo");
                    return;
                }
                match message {
                    GameMessage::GameState(snapshot) => {
                        self.state.apply_remote_state(&snapshot);
                    }
                    GameMessage::DartThrown { dart_value, .. } => {
                        // Advisory only; the snapshot that follows is
                        // what actually updates the board.
                        tracing::info!(value = %dart_value, "opponent threw");
                    }
                    GameMessage::GameOver { winner, .. } => {
                        tracing::info!(winner, "match-over notice");
                    }
                    other => {
                        tracing::debug!(kind = other.kind(), "unexpected message on game channel");
                    }
                }
            }
            ChannelEvent::Presence {
                action: PresenceAction::Leave,
                identity,
                ..
            } => {
                tracing::warn!(%identity, "participant left the game channel");
            }
            ChannelEvent::Presence {
                action, identity, ..
            } => {
                tracing::debug!(%identity, ?action, "game channel presence");
            }
        }
    }

    async fn on_command(&mut self, command: Command) {
        match command {
            Command::SelectMultiplier(multiplier) => {
                self.state.select_multiplier(multiplier);
            }
            Command::Throw(button) => {
                let messages = self.state.submit_throw(button);
                self.publish_game(messages).await;
            }
            Command::Backspace => {
                let messages = self.state.backspace();
                self.publish_game(messages).await;
            }
            Command::Quit => unreachable!("handled in run loop"),
        }
    }

    /// Carries out the actions requested by the pairing machine.
    ///
    /// Lobby publishes are best-effort here; failing to join the game
    /// channel is fatal, there is no game without it.
    async fn apply_effects(&mut self, effects: Vec<PairingEffect>) -> Result<(), DartlinkError> {
        for effect in effects {
            match effect {
                PairingEffect::PublishLobby(message) => {
                    if let Err(e) = self
                        .service
                        .publish(&self.config.lobby_channel, &message)
                        .await
                    {
                        tracing::warn!(error = %e, kind = message.kind(), "lobby publish failed");
                    }
                }
                PairingEffect::RoleAssigned(role) => {
                    self.state.assign_role(role);
                }
                PairingEffect::JoinGameChannel(channel) => {
                    let sub = self.service.subscribe(&channel).await?;
                    self.game_sub = Some(sub);
                    self.game_channel = Some(channel);
                }
                PairingEffect::Paired { bootstrap, channel } => {
                    tracing::info!(%channel, bootstrap, "pairing complete");
                    if bootstrap {
                        let messages = self.state.start();
                        self.publish_game(messages).await;
                    } else {
                        self.state.mark_started();
                    }
                }
            }
        }
        Ok(())
    }

    /// Publishes to the game channel, swallowing failures: the protocol
    /// is level-triggered, the next snapshot heals a lost message.
    async fn publish_game(&mut self, messages: Vec<GameMessage>) {
        let Some(channel) = self.game_channel.clone() else {
            if !messages.is_empty() {
                tracing::debug!("dropping messages, no game channel yet");
            }
            return;
        };
        for message in messages {
            if let Err(e) = self.service.publish(&channel, &message).await {
                tracing::warn!(
                    error = %e,
                    kind = message.kind(),
                    "game publish failed, next snapshot will resync"
                );
            }
        }
    }

    fn publish_view(&self) {
        let view = GameView {
            phase: self.state.phase(),
            pairing: self.pairing.phase(),
            role: self.state.local_role(),
            score_self: self.state.score_self(),
            score_opponent: self.state.score_opponent(),
            legs_self: self.state.legs_self(),
            legs_opponent: self.state.legs_opponent(),
            is_my_turn: self.state.is_local_turn(),
            pending: self.state.pending_throws().to_vec(),
            multiplier: self.state.multiplier(),
            last_leg_winner: self.state.last_leg_winner(),
            opponent_name: self.pairing.opponent().map(|peer| peer.name.clone()),
        };
        self.view_tx.send_if_modified(|current| {
            if *current != view {
                *current = view;
                true
            } else {
                false
            }
        });
    }

    async fn shutdown(&mut self) {
        if let Some(channel) = self.game_channel.take() {
            if let Err(e) = self.service.unsubscribe(&channel).await {
                tracing::debug!(error = %e, "game channel unsubscribe failed");
            }
        }
        if let Err(e) = self.service.unsubscribe(&self.config.lobby_channel).await {
            tracing::debug!(error = %e, "lobby unsubscribe failed");
        }
        tracing::info!(identity = %self.service.identity(), "session ended");
    }
}
