//! Potion Blast entry point
//!
//! `bridge` runs the ingestion side, `play` runs a headless game fed by a
//! bridge. Both run on a single-threaded runtime.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use potion_blast::Settings;
use potion_blast::bridge::{BridgeServer, open_source};
use potion_blast::cli::{CliArgs, Mode, print_usage};
use potion_blast::link::ConnectionManager;
use potion_blast::sim::{FieldEvent, GameSession};

/// Readings waiting for the game loop before new ones are dropped
const READING_CHANNEL_BUFFER: usize = 16;
const DEFAULT_CONFIG: &str = "potion-blast.json";

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = CliArgs::parse()?;
    let Some(mode) = args.mode.filter(|_| !args.show_help) else {
        print_usage();
        return Ok(());
    };

    let config_path = args.config.clone().unwrap_or_else(|| DEFAULT_CONFIG.into());
    let mut settings = Settings::load(Path::new(&config_path));
    args.apply(&mut settings);

    log::info!("Potion Blast {} starting...", mode);
    match mode {
        Mode::Bridge => run_bridge(&settings).await,
        Mode::Play => run_play(&settings).await,
    }
}

async fn run_bridge(settings: &Settings) -> anyhow::Result<()> {
    // A link that fails to open leaves this process with nothing to do
    let source = open_source(&settings.source).await?;
    let server = BridgeServer::bind(&settings.listen_addr).await?;

    let shutdown = cancel_on_ctrl_c();
    server
        .run(source, shutdown)
        .await
        .context("bridge stopped")?;
    Ok(())
}

async fn run_play(settings: &Settings) -> anyhow::Result<()> {
    let seed = settings.seed.unwrap_or_else(potion_blast::now_ms);
    log::info!("Game initialized with seed: {}", seed);

    let shutdown = cancel_on_ctrl_c();
    let (tx, mut readings) = mpsc::channel(READING_CHANNEL_BUFFER);
    let connection = ConnectionManager::new(settings.bridge_url.clone()).spawn(tx);

    let mut session = GameSession::new(seed);
    let frame_ms = settings.frame_ms();
    let mut frames = tokio::time::interval(Duration::from_millis(frame_ms));
    frames.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                log::info!("Interrupted");
                break;
            }
            Some(reading) = readings.recv() => {
                session.on_reading(&reading);
            }
            _ = frames.tick() => {
                for event in session.step(frame_ms) {
                    log_event(&event, session.field().score());
                }
                if session.is_over() {
                    break;
                }
            }
        }
    }

    let state = session.field().state();
    log::info!(
        "Final score {} ({})",
        state.score,
        if state.game_won {
            "won"
        } else if state.game_over {
            "lost"
        } else {
            "unfinished"
        }
    );

    connection.shutdown().await;
    Ok(())
}

/// Token cancelled once by the first Ctrl-C
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let ctrl_c = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });
    token
}

fn log_event(event: &FieldEvent, score: u64) {
    match event {
        FieldEvent::Burst { bubbles, points, .. } => {
            log::info!("Burst {} potions (+{}), score {}", bubbles, points, score)
        }
        FieldEvent::RowAdded => log::info!("New threat row"),
        FieldEvent::GameWon => log::info!("You won!"),
        FieldEvent::GameOver => log::info!("Game over"),
        FieldEvent::ColorChanged(color) => log::info!("Potion: {}", color),
        other => log::debug!("{:?}", other),
    }
}
