//! Remote-snapshot reconciliation tests.
//!
//! Two machines with opposite roles exchange snapshots the way the
//! session layer would, plus the out-of-order delivery cases the
//! leg-change guard exists for.

use dartlink_game::{GameConfig, GamePhase, Role, TurnState};
use dartlink_protocol::{GameMessage, GameStateSnapshot, PlayerIdentity, PlayerSlot};
use dartlink_scoring::{ButtonInput, Multiplier};

fn machine(name: &str, role: Role) -> TurnState {
    let mut state = TurnState::new(
        PlayerIdentity(name.to_string()),
        GameConfig::default(),
    );
    state.assign_role(role);
    state.mark_started();
    state
}

fn snapshot_of(msgs: &[GameMessage]) -> GameStateSnapshot {
    msgs.iter()
        .find_map(|m| match m {
            GameMessage::GameState(s) => Some(s.clone()),
            _ => None,
        })
        .expect("no snapshot in broadcast")
}

/// Convenience: a hand-built wire snapshot.
fn wire(
    p1_score: u16,
    p2_score: u16,
    p1_legs: u32,
    p2_legs: u32,
    current: PlayerSlot,
) -> GameStateSnapshot {
    GameStateSnapshot {
        player_id: PlayerIdentity("peer-1".into()),
        player1_score: p1_score,
        player2_score: p2_score,
        player1_legs: p1_legs,
        player2_legs: p2_legs,
        current_player: current,
        timestamp: 0,
    }
}

#[test]
fn peer_sees_local_throws_through_snapshots() {
    let mut first = machine("first-1", Role::FirstMover);
    let mut second = machine("second-1", Role::SecondMover);

    first.select_multiplier(Multiplier::Triple);
    let out = first.submit_throw(ButtonInput::Number(20));
    second.apply_remote_state(&snapshot_of(&out));

    // The second mover sees the first mover's 60 as the opponent score.
    assert_eq!(second.score_opponent(), 41);
    assert_eq!(second.score_self(), 101);
    assert!(!second.is_local_turn());
}

#[test]
fn turn_passes_to_peer_after_three_darts() {
    let mut first = machine("first-1", Role::FirstMover);
    let mut second = machine("second-1", Role::SecondMover);

    first.submit_throw(ButtonInput::Number(5));
    first.submit_throw(ButtonInput::Number(5));
    let out = first.submit_throw(ButtonInput::Number(5));
    second.apply_remote_state(&snapshot_of(&out));

    assert!(second.is_local_turn());
    assert!(!first.is_local_turn());
    assert_eq!(second.score_opponent(), 86);
}

#[test]
fn snapshot_application_is_idempotent() {
    let mut second = machine("second-1", Role::SecondMover);
    let snap = wire(41, 101, 0, 0, PlayerSlot::Player1);

    second.apply_remote_state(&snap);
    let once = (
        second.score_self(),
        second.score_opponent(),
        second.legs_self(),
        second.legs_opponent(),
        second.is_local_turn(),
    );
    second.apply_remote_state(&snap);
    let twice = (
        second.score_self(),
        second.score_opponent(),
        second.legs_self(),
        second.legs_opponent(),
        second.is_local_turn(),
    );
    assert_eq!(once, twice);
}

#[test]
fn leg_reset_snapshot_is_idempotent_too() {
    let mut second = machine("second-1", Role::SecondMover);
    let reset = wire(101, 101, 1, 0, PlayerSlot::Player2);

    second.apply_remote_state(&reset);
    assert_eq!(second.legs_opponent(), 1);
    assert_eq!(second.score_self(), 101);
    second.apply_remote_state(&reset);
    assert_eq!(second.legs_opponent(), 1);
    assert_eq!(second.score_self(), 101);
}

#[test]
fn leg_change_snapshot_with_stale_scores_is_idempotent() {
    // The resetting snapshot can carry the finished leg's final scores
    // (a winner's broadcast crossing with an in-flight throw). After the
    // first application merges the leg counts, a redelivered copy has a
    // matching leg tuple — it still must not smuggle the dead scores
    // back in as fresh new-leg scores.
    let mut second = machine("second-1", Role::SecondMover);
    let winning = wire(80, 101, 1, 0, PlayerSlot::Player2);

    second.apply_remote_state(&winning);
    assert_eq!(second.legs_opponent(), 1);
    assert_eq!((second.score_self(), second.score_opponent()), (101, 101));

    second.apply_remote_state(&winning);
    assert_eq!((second.score_self(), second.score_opponent()), (101, 101));

    // A genuinely new snapshot in the new leg still applies verbatim.
    second.apply_remote_state(&wire(60, 101, 1, 0, PlayerSlot::Player2));
    assert_eq!(second.score_opponent(), 60);
    assert_eq!(second.score_self(), 101);
}

#[test]
fn lower_opponent_score_with_same_legs_is_applied_verbatim() {
    // Scenario E: the guard keys on leg deltas, never score deltas.
    let mut second = machine("second-1", Role::SecondMover);
    second.apply_remote_state(&wire(41, 101, 0, 0, PlayerSlot::Player1));
    assert_eq!(second.score_opponent(), 41);

    // A surprising drop with unchanged legs: trusted as-is.
    second.apply_remote_state(&wire(2, 101, 0, 0, PlayerSlot::Player1));
    assert_eq!(second.score_opponent(), 2);
    assert_eq!(second.score_self(), 101);
}

#[test]
fn leg_change_resets_scores_instead_of_trusting_snapshot() {
    let mut second = machine("second-1", Role::SecondMover);
    second.apply_remote_state(&wire(41, 77, 0, 0, PlayerSlot::Player2));
    assert_eq!(second.score_self(), 77);

    // Peer won a leg: snapshot legs changed, so scores reset to the
    // initial value regardless of what the snapshot carries.
    second.apply_remote_state(&wire(101, 101, 1, 0, PlayerSlot::Player2));
    assert_eq!(second.legs_opponent(), 1);
    assert_eq!(second.score_self(), 101);
    assert_eq!(second.score_opponent(), 101);
}

#[test]
fn stale_mid_leg_snapshot_after_reset_does_not_resurrect_scores() {
    let mut second = machine("second-1", Role::SecondMover);

    // Leg 1 ends: peer broadcasts the reset.
    second.apply_remote_state(&wire(101, 101, 1, 0, PlayerSlot::Player2));

    // A stale mid-leg-1 snapshot (legs still 0/0) arrives late. Its leg
    // tuple differs from the last known one, so its scores are not
    // trusted, and leg counts never go backwards.
    second.apply_remote_state(&wire(41, 77, 0, 0, PlayerSlot::Player1));
    assert_eq!(second.legs_opponent(), 1);
    assert_eq!(second.score_self(), 101);
    assert_eq!(second.score_opponent(), 101);

    // Replaying the stale message is also a no-op on scores and legs.
    second.apply_remote_state(&wire(41, 77, 0, 0, PlayerSlot::Player1));
    assert_eq!(second.legs_opponent(), 1);
    assert_eq!(second.score_self(), 101);
}

#[test]
fn snapshot_marks_game_started() {
    let mut second = TurnState::new(
        PlayerIdentity("second-1".into()),
        GameConfig::default(),
    );
    second.assign_role(Role::SecondMover);
    assert_eq!(second.phase(), GamePhase::AwaitingOpponent);

    second.apply_remote_state(&wire(101, 101, 0, 0, PlayerSlot::Player1));
    assert_eq!(second.phase(), GamePhase::InProgress);
}

#[test]
fn snapshot_before_role_assignment_is_ignored() {
    let mut state = TurnState::new(
        PlayerIdentity("late-1".into()),
        GameConfig::default(),
    );
    state.apply_remote_state(&wire(41, 77, 0, 0, PlayerSlot::Player1));
    assert_eq!(state.score_self(), 101);
    assert_eq!(state.phase(), GamePhase::AwaitingOpponent);
}

#[test]
fn full_leg_between_two_machines() {
    let mut first = machine("first-1", Role::FirstMover);
    let mut second = machine("second-1", Role::SecondMover);

    // First mover: T20, T20 leaves 101 - 120 … that busts in a 101 leg,
    // so play a realistic 101 checkout: T20 (41 left), then next turn.
    let out = {
        first.select_multiplier(Multiplier::Triple);
        let mut out = first.submit_throw(ButtonInput::Number(20)); // 41
        out.extend(first.submit_throw(ButtonInput::Number(1))); // 40
        out.extend(first.submit_throw(ButtonInput::Miss)); // turn over
        out
    };
    let last = snapshot_of(&out[out.len() - 2..]);
    second.apply_remote_state(&last);
    assert!(second.is_local_turn());

    // Second mover throws one dart and retracts it.
    let out = second.submit_throw(ButtonInput::Number(19));
    first.apply_remote_state(&snapshot_of(&out));
    assert_eq!(first.score_opponent(), 82);
    let out = second.backspace();
    first.apply_remote_state(&snapshot_of(&out));
    assert_eq!(first.score_opponent(), 101);

    // Second mover finishes the turn without scoring.
    second.submit_throw(ButtonInput::Miss);
    second.submit_throw(ButtonInput::Miss);
    let out = second.submit_throw(ButtonInput::Miss);
    first.apply_remote_state(&snapshot_of(&out));
    assert!(first.is_local_turn());
    assert_eq!(first.score_self(), 40);

    // First mover checks out 40 with D20; leg counts propagate and the
    // peer resets for the next leg.
    first.select_multiplier(Multiplier::Double);
    let out = first.submit_throw(ButtonInput::Number(20));
    assert_eq!(first.legs_self(), 1);
    second.apply_remote_state(&snapshot_of(&out));
    assert_eq!(second.legs_opponent(), 1);
    assert_eq!(second.score_self(), 101);
    assert_eq!(second.score_opponent(), 101);

    // Leg-start alternation: the second mover leads leg two.
    assert!(second.is_local_turn());
    assert!(!first.is_local_turn());
}
