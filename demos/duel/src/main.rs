//! A scripted duel: two sessions pair over an in-process hub and play
//! one leg of 101, logging every state change.
//!
//! ```text
//! RUST_LOG=debug cargo run -p duel
//! ```

use std::time::Duration;

use dartlink::prelude::*;
use tokio::sync::watch;
use tokio::time::timeout;

#[tokio::main]
async fn main() -> Result<(), DartlinkError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let hub = MemoryHub::new();

    let alice_client = hub.client(PlayerIdentity::generate("Alice"));
    let (alice_session, alice) =
        Session::connect(alice_client, SessionConfig::new("Alice")).await?;
    tokio::spawn(alice_session.run());

    let bob_client = hub.client(PlayerIdentity::generate("Bob"));
    let (bob_session, bob) = Session::connect(bob_client, SessionConfig::new("Bob")).await?;
    tokio::spawn(bob_session.run());

    let mut alice_view = alice.watch();
    let mut bob_view = bob.watch();
    settle(&mut alice_view, "pairing", |v| v.phase == GamePhase::InProgress).await;
    settle(&mut bob_view, "pairing", |v| v.phase == GamePhase::InProgress).await;
    tracing::info!(
        alice = ?alice.view().role,
        bob = ?bob.view().role,
        "paired, Alice to throw"
    );

    // Alice opens with 60-1-Miss, leaving 40.
    alice.command(Command::SelectMultiplier(Multiplier::Triple)).await;
    alice.command(Command::Throw(ButtonInput::Number(20))).await;
    alice.command(Command::Throw(ButtonInput::Number(1))).await;
    alice.command(Command::Throw(ButtonInput::Miss)).await;
    settle(&mut bob_view, "Alice's opening turn", |v| v.is_my_turn).await;
    report("after Alice's opening", &alice.view(), &bob.view());

    // Bob scores 19, regrets it, retracts, and burns the turn.
    bob.command(Command::Throw(ButtonInput::Number(19))).await;
    bob.command(Command::Backspace).await;
    for _ in 0..3 {
        bob.command(Command::Throw(ButtonInput::Miss)).await;
    }
    settle(&mut alice_view, "Bob's turn", |v| v.is_my_turn).await;
    report("after Bob's turn", &alice.view(), &bob.view());

    // Alice takes the leg on the double.
    alice.command(Command::SelectMultiplier(Multiplier::Double)).await;
    alice.command(Command::Throw(ButtonInput::Number(20))).await;
    settle(&mut bob_view, "the leg result", |v| v.legs_opponent == 1).await;
    report("after the checkout", &alice.view(), &bob.view());
    tracing::info!("Alice takes the leg; Bob leads the next one");

    alice.command(Command::Quit).await;
    bob.command(Command::Quit).await;
    Ok(())
}

/// Waits for the peer's view to reflect a change, with a hard timeout
/// so a scripting mistake fails loudly instead of hanging.
async fn settle<F>(rx: &mut watch::Receiver<GameView>, what: &str, pred: F)
where
    F: FnMut(&GameView) -> bool,
{
    if timeout(Duration::from_secs(5), rx.wait_for(pred)).await.is_err() {
        tracing::error!(what, view = ?rx.borrow(), "timed out waiting");
        std::process::exit(1);
    }
}

fn report(stage: &str, alice: &GameView, bob: &GameView) {
    let turn = if alice.is_my_turn { "Alice" } else { "Bob" };
    tracing::info!(
        stage,
        alice_score = alice.score_self,
        bob_score = bob.score_self,
        alice_legs = alice.legs_self,
        bob_legs = bob.legs_self,
        turn,
    );
}
