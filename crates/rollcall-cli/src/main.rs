use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rollcall_core::{
    random_challenges, recognize_face, ChallengeAction, ChallengeSource, Clock, FixedChallenges,
    KnownPerson, LivenessSession, ManualClock, RandomChallenges, SystemClock,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

mod config;
mod replay;

use config::Config;
use replay::{run_capture_loop, JsonlReplay, ReplayOptions};

#[derive(Parser)]
#[command(name = "rollcall", version, about = "Liveness check and face matching for attendance")]
struct Cli {
    /// TOML settings file; ROLLCALL_* environment variables override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a recorded landmark stream (JSON lines) through a liveness session.
    Verify {
        #[arg(long)]
        frames: PathBuf,
        /// Gallery to match against once liveness is verified.
        #[arg(long)]
        gallery: Option<PathBuf>,
        /// Seed for challenge generation.
        #[arg(long, conflicts_with = "actions")]
        seed: Option<u64>,
        /// Fixed challenge list, e.g. `blink,turn-left`.
        #[arg(long, value_delimiter = ',', value_parser = parse_action)]
        actions: Vec<ChallengeAction>,
        /// Restart timed-out attempts until attempts are exhausted.
        #[arg(long)]
        retry: bool,
    },
    /// Match a probe descriptor against a gallery.
    Recognize {
        /// JSON array of floats.
        #[arg(long)]
        probe: PathBuf,
        /// JSON array of `{id, name, descriptor}`.
        #[arg(long)]
        gallery: PathBuf,
    },
    /// Print a generated challenge batch.
    Challenges {
        #[arg(long)]
        count: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    tracing::debug!(?config, "configuration loaded");

    match cli.command {
        Command::Verify {
            frames,
            gallery,
            seed,
            actions,
            retry,
        } => {
            let gallery = match gallery {
                Some(path) => read_json::<Vec<KnownPerson>>(&path)?,
                None => Vec::new(),
            };
            let source: Box<dyn ChallengeSource> = if !actions.is_empty() {
                Box::new(FixedChallenges::new(actions))
            } else if let Some(seed) = seed {
                Box::new(RandomChallenges::new(StdRng::seed_from_u64(seed)))
            } else {
                Box::new(RandomChallenges::from_entropy())
            };

            let clock = ManualClock::new(SystemClock.now());
            let mut session = LivenessSession::with_sources(
                config.liveness.clone(),
                source,
                Arc::new(clock.clone()),
            )
            .context("invalid [liveness] settings")?;
            let mut stream = JsonlReplay::open(&frames)?;
            let opts = ReplayOptions {
                interval: config.frame_interval(),
                retry,
            };

            let report = run_capture_loop(
                &mut stream,
                &mut session,
                &clock,
                &config.recognition,
                &gallery,
                &opts,
            )?;
            print_json(&report)
        }
        Command::Recognize { probe, gallery } => {
            let probe: Vec<f32> = read_json(&probe)?;
            let gallery: Vec<KnownPerson> = read_json(&gallery)?;
            if gallery.is_empty() {
                tracing::warn!("gallery is empty");
            }
            let result = recognize_face(&probe, &gallery, &config.recognition);
            print_json(&result)
        }
        Command::Challenges { count, seed } => {
            let count = count.unwrap_or(config.liveness.challenge_count);
            if count == 0 {
                bail!("--count must be at least 1");
            }
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            let batch = random_challenges(&mut rng, count, SystemClock.now());
            print_json(&batch)
        }
    }
}

fn parse_action(s: &str) -> Result<ChallengeAction, String> {
    match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
        "blink" => Ok(ChallengeAction::Blink),
        "turn-left" | "left" => Ok(ChallengeAction::TurnLeft),
        "turn-right" | "right" => Ok(ChallengeAction::TurnRight),
        "smile" => Ok(ChallengeAction::Smile),
        "nod" => Ok(ChallengeAction::Nod),
        other => Err(format!(
            "unknown challenge '{other}' (expected blink, turn-left, turn-right, smile, nod)"
        )),
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid JSON in {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
