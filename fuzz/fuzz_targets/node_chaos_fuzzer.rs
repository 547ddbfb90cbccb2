//! Fuzz target for the node runtime under store and link failures
//!
//! Drives a `TelemetryNode` over a `ChaoticStore` with an arbitrary
//! sequence of cycles, clock jumps, link outages and restarts.
//!
//! # Strategy
//!
//! - Variable store failure rates (0% to 90%)
//! - Clock jumps of minutes to weeks between cycles
//! - Link outages and forced send failures
//! - Restarts that rebuild the node from the surviving store
//!
//! # Invariants
//!
//! - The node NEVER panics on store or link errors
//! - No counter value is ever embedded twice, across restarts
//! - Every delivered frame decrypts under the key a receiver derives for
//!   the epoch the chain was at when the frame was built

#![no_main]

use std::collections::{HashMap, HashSet};

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use telelock_crypto::{MasterSecret, derive_key_for_day};
use telelock_node::{
    ChaoticStore, IvWidth, MemoryStore, Namespace, NodeConfig, Position, SimEnv, SimulatedRadio,
    SimulatedSensors, Store, TelemetryNode,
    provisioning::{DEVICE_ID, MASTER_KEY},
};
use telelock_proto::{SessionNonce, TelemetryFrame};

const MASTER_HEX: &str = "00112233445566778899aabbccddeeff";
const START: u64 = 1_742_169_600;

#[derive(Debug, Clone, Arbitrary)]
struct ChaosScenario {
    /// Seed for ChaoticStore RNG (deterministic failures)
    chaos_seed: u64,
    /// Failure rate 0-9 maps to 0%-90%
    failure_rate_tenth: u8,
    /// Sequence of operations to perform
    operations: Vec<ChaosOperation>,
}

#[derive(Debug, Clone, Arbitrary)]
enum ChaosOperation {
    /// Run one telemetry cycle
    Cycle,
    /// Move the clock forward
    Advance { minutes: u16 },
    /// Fail the next few uplinks
    FailSends { count: u8 },
    /// Drop the radio session
    Deactivate,
    /// Rebuild the node from the store
    Restart,
}

type Node = TelemetryNode<ChaoticStore<MemoryStore>, SimEnv, SimulatedRadio<MemoryStore>>;

fn start(store: &ChaoticStore<MemoryStore>, env: &SimEnv) -> Option<Node> {
    let radio = SimulatedRadio::new(store.inner().clone(), 0.0, 1);
    TelemetryNode::start(store.clone(), env.clone(), radio, NodeConfig::default()).ok()
}

fn check_delivered(node: &Node, epochs: &HashMap<u32, u64>, master: &MasterSecret) {
    for payload in node.transmit().link().delivered() {
        let Ok(frames) = TelemetryFrame::split_batch(payload, IvWidth::Full16) else {
            panic!("delivered payload is not a frame batch");
        };
        for frame in frames {
            let Ok(parsed) = frame.parse() else {
                panic!("delivered frame does not parse");
            };
            let counter = parsed.counter(&SessionNonce::zero());
            let key = derive_key_for_day(master, "VEH-001", START, epochs[&counter]);
            assert!(parsed.decrypt(&key, &SessionNonce::zero()).is_ok());
        }
    }
}

fuzz_target!(|scenario: ChaosScenario| {
    let failure_rate = f64::from(scenario.failure_rate_tenth % 10) / 10.0;

    let inner = MemoryStore::new();
    if inner.put_string(Namespace::Identity, MASTER_KEY, MASTER_HEX).is_err()
        || inner.put_string(Namespace::Identity, DEVICE_ID, "VEH-001").is_err()
    {
        return;
    }
    let Ok(master) = MasterSecret::from_hex(MASTER_HEX) else {
        return;
    };

    let store = ChaoticStore::with_seed(inner, failure_rate, scenario.chaos_seed);
    let env = SimEnv::new(START, scenario.chaos_seed);

    let mut node = start(&store, &env);
    let mut embedded = HashSet::new();
    let mut epochs = HashMap::new();

    for op in scenario.operations {
        match op {
            ChaosOperation::Cycle => {
                let Some(node) = node.as_mut() else { continue };
                let mut sensors = SimulatedSensors::new(Position::default(), 0.0, 1);
                if let Ok(report) = node.run_cycle(&mut sensors) {
                    assert!(embedded.insert(report.counter), "counter {} reused", report.counter);
                    epochs.insert(report.counter, node.key_chain().last_epoch());
                }
            },
            ChaosOperation::Advance { minutes } => env.advance(u64::from(minutes) * 60),
            ChaosOperation::FailSends { count } => {
                if let Some(node) = node.as_mut() {
                    node.transmit_mut().link_mut().fail_next(usize::from(count % 8));
                }
            },
            ChaosOperation::Deactivate => {
                if let Some(node) = node.as_mut() {
                    node.transmit_mut().link_mut().deactivate();
                }
            },
            ChaosOperation::Restart => {
                if let Some(old) = node.take() {
                    check_delivered(&old, &epochs, &master);
                }
                node = start(&store, &env);
            },
        }
    }

    if let Some(node) = node {
        check_delivered(&node, &epochs, &master);
    }
});
