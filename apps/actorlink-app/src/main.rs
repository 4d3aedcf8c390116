//! actorlink simulation host CLI.
//!
//! Provides two modes of operation:
//! - `run`: Drive a toy multi-actor simulation against a remote decision service
//! - `info`: Print crate and protocol versions

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::{Parser, Subcommand};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use actorlink_channels::prelude::*;
use actorlink_core::prelude::*;
use actorlink_exchange::PROTOCOL_VERSION;
use actorlink_exchange::prelude::*;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

/// Step-synchronous simulation host for remote decision services.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to a decision service and run the toy simulation.
    Run {
        /// TOML file with an `ExchangeConfig`.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of simulation steps.
        #[arg(short, long, default_value_t = 1000)]
        steps: u32,

        /// Number of actors sharing the behavior.
        #[arg(short, long, default_value_t = 4)]
        actors: u16,

        /// Behavior name announced to the peer.
        #[arg(short, long, default_value = "Walker")]
        behavior: String,

        /// Maximum steps per episode.
        #[arg(short, long, default_value_t = 200)]
        max_steps: u32,
    },

    /// Print crate information.
    Info,
}

// ---------------------------------------------------------------------------
// Toy simulation
// ---------------------------------------------------------------------------

/// One actor walking toward a target on the plane.
struct Walker {
    id: i32,
    position: [f32; 2],
    target: [f32; 2],
    steps: u32,
}

impl Walker {
    fn spawn(id: i32, rng: &mut ChaCha8Rng) -> Self {
        Self {
            id,
            position: [rng.gen_range(-5.0..5.0), rng.gen_range(-5.0..5.0)],
            target: [rng.gen_range(-5.0..5.0), rng.gen_range(-5.0..5.0)],
            steps: 0,
        }
    }

    fn distance(&self) -> f32 {
        let dx = self.target[0] - self.position[0];
        let dy = self.target[1] - self.position[1];
        dx.hypot(dy)
    }

    fn observe(&self, max_steps: u32) -> ObservationRecord {
        let obs = Observation::new(vec![
            self.position[0],
            self.position[1],
            self.target[0],
            self.target[1],
        ]);
        let reached = self.distance() < 0.25;
        let timed_out = self.steps >= max_steps;
        ObservationRecord::new(self.id, vec![obs])
            .with_reward(-self.distance() * 0.01 + if reached { 1.0 } else { 0.0 })
            .with_done(reached || timed_out)
            .with_max_step_reached(timed_out && !reached)
    }

    fn apply(&mut self, action: &Action) {
        if let Some(&[dx, dy]) = action.as_continuous() {
            self.position[0] += dx.clamp(-1.0, 1.0) * 0.1;
            self.position[1] += dy.clamp(-1.0, 1.0) * 0.1;
        }
        self.steps += 1;
    }
}

fn walker_spec(behavior: &str) -> BehaviorSpec {
    BehaviorSpec::new(behavior, vec![vec![4]], ActionSpec::Continuous { size: 2 })
}

// ---------------------------------------------------------------------------
// Mode implementations
// ---------------------------------------------------------------------------

fn load_config(path: Option<&PathBuf>) -> Result<ExchangeConfig, ActorlinkError> {
    let config = match path {
        Some(path) => ExchangeConfig::from_file(path)?,
        None => ExchangeConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn run_simulation(
    config: &ExchangeConfig,
    steps: u32,
    actors: u16,
    behavior: &str,
    max_steps: u32,
) -> Result<(), ActorlinkError> {
    let mut session = Session::from_config(TcpTransport::new(config), config);

    let quit = Arc::new(AtomicBool::new(false));
    let reset = Arc::new(AtomicBool::new(false));
    {
        let quit = Arc::clone(&quit);
        session.on_quit(move || quit.store(true, Ordering::SeqCst));
        let reset = Arc::clone(&reset);
        session.on_reset(move || reset.store(true, Ordering::SeqCst));
    }

    session.register_side_channel(Box::new(EngineConfigurationChannel::new()))?;
    session.register_side_channel(Box::new(FloatPropertiesChannel::new()))?;
    session.register_behavior(walker_spec(behavior));

    let remote = session.open()?;
    info!(
        remote_version = %remote.communication_version,
        seed = ?remote.seed,
        "connected to decision service"
    );

    let seed = remote.seed.or(config.seed).unwrap_or(0);
    let mut rng = ChaCha8Rng::seed_from_u64(u64::from(seed.unsigned_abs()));
    let mut walkers: Vec<Walker> = (0..i32::from(actors))
        .map(|id| Walker::spawn(id, &mut rng))
        .collect();
    let mut episodes_done = 0u32;

    for step in 0..steps {
        if quit.load(Ordering::SeqCst) {
            info!(step, "peer ended the session");
            break;
        }
        if reset.swap(false, Ordering::SeqCst) {
            info!(step, "peer requested reset; respawning walkers");
            for walker in &mut walkers {
                *walker = Walker::spawn(walker.id, &mut rng);
            }
        }

        if let Some(update) = session
            .side_channel_mut::<EngineConfigurationChannel>(EngineConfigurationChannel::DEFAULT_ID)
            .and_then(EngineConfigurationChannel::take_update)
        {
            info!(time_scale = update.time_scale, "engine configuration updated");
        }

        for walker in &walkers {
            session.submit_observation(behavior, walker.observe(max_steps));
        }
        session.step()?;

        for walker in &mut walkers {
            if walker.observe(max_steps).done {
                episodes_done += 1;
                *walker = Walker::spawn(walker.id, &mut rng);
                continue;
            }
            match session.read_action(behavior, walker.id) {
                Some(action) => walker.apply(action),
                None => warn!(actor = walker.id, "no action received"),
            }
        }
    }

    session.close();
    info!(episodes_done, "simulation finished");
    Ok(())
}

fn run_info() {
    println!("actorlink v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("protocol: {PROTOCOL_VERSION}");
    println!();
    println!("crates:");
    println!("  actorlink-core      {}", env!("CARGO_PKG_VERSION"));
    println!("  actorlink-channels  {}", env!("CARGO_PKG_VERSION"));
    println!("  actorlink-exchange  {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("edition: 2024");
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            steps,
            actors,
            behavior,
            max_steps,
        } => {
            let result = load_config(config.as_ref())
                .and_then(|config| run_simulation(&config, steps, actors, &behavior, max_steps));
            if let Err(e) = result {
                error!("{e}");
                return ExitCode::FAILURE;
            }
        }
        Commands::Info => run_info(),
    }
    ExitCode::SUCCESS
}
