//! Telelock simulated node binary.
//!
//! Runs the full node runtime (durable store, real clock, OS randomness)
//! against simulated sensors and a simulated radio with seeded failures.
//!
//! # Usage
//!
//! ```bash
//! # First run prompts for the master key and device identifier
//! telelock-node --db node.redb --cycles 20 --interval-secs 5
//!
//! # Condensed IVs with a random session nonce over a lossy link
//! telelock-node --iv-width counter4 --nonce random --link-failure-rate 0.3
//!
//! # Restart the key chain and counter, keep the identity
//! telelock-node --reset
//! ```

use std::{path::PathBuf, thread, time::Duration};

use clap::{Parser, ValueEnum};
use telelock_node::{
    FACTORY_RESET_SCOPE, FrameConfig, IvWidth, KeyChainConfig, LinePrompt, NodeConfig, NonceMode,
    Position, RESET_SCOPE, RedbStore, SimulatedRadio, SimulatedSensors, Store, SystemEnv,
    TelemetryNode, TimeSource, TransmitConfig, config::DEFAULT_PROVISIONING_EPOCH, provision,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Where the simulated sensors report from.
const BASE_POSITION: Position = Position { latitude: 45.07, longitude: 7.68 };

/// Probability that a simulated sensor read yields nothing.
const SENSOR_DROPOUT_RATE: f64 = 0.05;

/// Telelock telemetry node
#[derive(Parser, Debug)]
#[command(name = "telelock-node")]
#[command(about = "Simulated telelock telemetry node")]
#[command(version)]
struct Args {
    /// Path to the node's persistent store
    #[arg(long, default_value = "telelock-node.redb")]
    db: PathBuf,

    /// Number of telemetry cycles to run
    #[arg(short, long, default_value = "10")]
    cycles: u64,

    /// Pause between cycles, in seconds
    #[arg(long, default_value = "10")]
    interval_secs: u64,

    /// Counter prefix carried by each frame
    #[arg(long, value_enum, default_value_t = IvWidthArg::Full16)]
    iv_width: IvWidthArg,

    /// How key rotations advance the persisted epoch
    #[arg(long, value_enum, default_value_t = TimeSourceArg::LocalCounter)]
    time_source: TimeSourceArg,

    /// Nonce half of the effective IV
    #[arg(long, value_enum, default_value_t = NonceArg::Zero)]
    nonce: NonceArg,

    /// Chain origin used when the store holds none (Unix seconds)
    #[arg(long, default_value_t = DEFAULT_PROVISIONING_EPOCH)]
    provisioning_epoch: u64,

    /// Maximum number of frames buffered while the link is down
    #[arg(long, default_value = "4")]
    queue_capacity: usize,

    /// Probability that a simulated uplink is not acknowledged
    #[arg(long, default_value = "0.1")]
    link_failure_rate: f64,

    /// Seed for the simulated sensors and radio
    #[arg(long, default_value = "1")]
    seed: u64,

    /// Wipe the key chain and send counter before starting
    #[arg(long)]
    reset: bool,

    /// Wipe the key chain, send counter and device identity before starting
    #[arg(long, conflicts_with = "reset")]
    factory_reset: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum IvWidthArg {
    Counter2,
    Counter4,
    Full16,
}

impl From<IvWidthArg> for IvWidth {
    fn from(arg: IvWidthArg) -> Self {
        match arg {
            IvWidthArg::Counter2 => Self::Counter2,
            IvWidthArg::Counter4 => Self::Counter4,
            IvWidthArg::Full16 => Self::Full16,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TimeSourceArg {
    LocalCounter,
    External,
}

impl From<TimeSourceArg> for TimeSource {
    fn from(arg: TimeSourceArg) -> Self {
        match arg {
            TimeSourceArg::LocalCounter => Self::LocalCounter,
            TimeSourceArg::External => Self::External,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum NonceArg {
    Zero,
    Random,
}

impl From<NonceArg> for NonceMode {
    fn from(arg: NonceArg) -> Self {
        match arg {
            NonceArg::Zero => Self::Zero,
            NonceArg::Random => Self::Random,
        }
    }
}

impl Args {
    fn node_config(&self) -> NodeConfig {
        NodeConfig {
            key_chain: KeyChainConfig {
                time_source: self.time_source.into(),
                provisioning_epoch: self.provisioning_epoch,
            },
            frame: FrameConfig { iv_width: self.iv_width.into(), nonce_mode: self.nonce.into() },
            transmit: TransmitConfig { capacity: self.queue_capacity },
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    if !(0.0..=1.0).contains(&args.link_failure_rate) {
        return Err(format!(
            "--link-failure-rate must be between 0.0 and 1.0, got {}",
            args.link_failure_rate
        )
        .into());
    }

    tracing::info!(db = %args.db.display(), "telelock node starting");

    let store = RedbStore::open(&args.db)?;

    if args.factory_reset {
        store.clear(&FACTORY_RESET_SCOPE)?;
        tracing::warn!("factory reset: key chain, counter and identity wiped");
    } else if args.reset {
        store.clear(&RESET_SCOPE)?;
        tracing::warn!("key chain and send counter reset");
    }

    let identity = {
        let stdin = std::io::stdin();
        let mut prompt = LinePrompt::new(stdin.lock(), std::io::stdout());
        provision(&store, &mut prompt)?
    };
    tracing::info!(device_id = %identity.device_id(), "identity loaded");

    let radio = SimulatedRadio::new(store.clone(), args.link_failure_rate, args.seed);
    let mut sensors = SimulatedSensors::new(BASE_POSITION, SENSOR_DROPOUT_RATE, args.seed);
    let mut node = TelemetryNode::start(store, SystemEnv::new(), radio, args.node_config())?;

    for cycle in 1..=args.cycles {
        match node.run_cycle(&mut sensors) {
            Ok(report) => tracing::info!(
                cycle,
                counter = report.counter,
                delivered = report.delivered(),
                pending = node.transmit().pending().len(),
                "cycle complete"
            ),
            Err(e) if e.is_transient() => {
                tracing::warn!(cycle, error = %e, "cycle failed, retrying next interval");
            },
            Err(e) => {
                tracing::error!(cycle, error = %e, "cycle failed, stopping");
                return Err(e.into());
            },
        }

        if cycle < args.cycles {
            thread::sleep(Duration::from_secs(args.interval_secs));
        }
    }

    let pending = node.transmit().pending().len();
    if pending > 0 {
        match node.transmit_mut().flush() {
            Ok(frames) => tracing::info!(frames, "pending frames flushed on shutdown"),
            Err(e) => tracing::warn!(pending, error = %e, "pending frames lost on shutdown"),
        }
    }

    tracing::info!("telelock node stopped");

    Ok(())
}
