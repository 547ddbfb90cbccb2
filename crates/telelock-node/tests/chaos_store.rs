//! Chaos property tests for node state under a failing store
//!
//! Wraps the store in `ChaoticStore` and verifies that injected flash
//! failures never compromise keystream uniqueness:
//! - Embedded counters are strictly increasing, even across restarts
//! - A failed rotation leaves key and epoch unchanged
//! - The key chain always agrees with a receiver replaying from the origin

use std::collections::HashSet;

use proptest::prelude::*;
use telelock_crypto::{MasterSecret, SECONDS_PER_DAY, derive_key_for_day};
use telelock_node::{
    ChaoticStore, FrameBuildError, FrameBuilder, FrameConfig, KeyChain, KeyChainConfig,
    KeyChainError, MemoryStore, Namespace, Rotation, SensorSnapshot, Store, StoreError,
    TimeSource,
    provisioning::{DEVICE_ID, MASTER_KEY},
};
use telelock_proto::SessionNonce;

const MASTER_HEX: &str = "00112233445566778899aabbccddeeff";
const START: u64 = 1_742_169_600;

fn provisioned_store() -> MemoryStore {
    let store = MemoryStore::new();
    store.put_string(Namespace::Identity, MASTER_KEY, MASTER_HEX).unwrap();
    store.put_string(Namespace::Identity, DEVICE_ID, "VEH-001").unwrap();
    store
}

#[test]
fn prop_chaos_counter_never_reused() {
    proptest!(ProptestConfig::with_cases(100), |(
        failure_rate in 0.0..0.7,
        seed in any::<u64>(),
        restarts in 1usize..5,
        attempts in 10usize..60,
    )| {
        let backing = MemoryStore::new();
        let key = telelock_crypto::DailyKey::from_bytes([3; 16]);
        let mut embedded = Vec::new();

        for restart in 0..restarts {
            let store =
                ChaoticStore::with_seed(backing.clone(), failure_rate, seed ^ restart as u64);
            let mut builder =
                FrameBuilder::with_nonce(store, FrameConfig::default(), SessionNonce::zero());

            for _ in 0..attempts {
                match builder.build_frame(&SensorSnapshot::default(), &key) {
                    Ok(_) => embedded.push(builder.last_embedded().unwrap()),
                    Err(FrameBuildError::Store(StoreError::Injected { .. })) => {},
                    Err(e) => panic!("Unexpected error: {e:?}"),
                }
            }
        }

        // ORACLE: strictly increasing, therefore unique
        prop_assert!(embedded.windows(2).all(|w| w[0] < w[1]));

        // ORACLE: the store never lags an embedded value
        let persisted = backing.get_u32(Namespace::Counter, "counter").unwrap();
        prop_assert_eq!(persisted, embedded.last().copied());
    });
}

#[test]
fn prop_chaos_rotation_is_atomic() {
    proptest!(ProptestConfig::with_cases(100), |(
        failure_rate in 0.0..0.7,
        seed in any::<u64>(),
        checks in 5usize..40,
    )| {
        let backing = provisioned_store();
        let config =
            KeyChainConfig { time_source: TimeSource::LocalCounter, provisioning_epoch: START };
        KeyChain::initialize(backing.clone(), config).unwrap();

        // Loading is five reads; retry until one pass gets through the chaos
        let store = ChaoticStore::with_seed(backing.clone(), failure_rate, seed);
        let mut chain_under_chaos = (0..10_000)
            .find_map(|_| KeyChain::initialize(store.clone(), config).ok())
            .expect("chain loads eventually");

        let master = MasterSecret::from_hex(MASTER_HEX).unwrap();
        let now = START + 30 * SECONDS_PER_DAY;

        for _ in 0..checks {
            let before_key = chain_under_chaos.current_key().clone();
            let before_epoch = chain_under_chaos.last_epoch();

            match chain_under_chaos.check_rotation(now) {
                Ok(Rotation::Rotated { epoch }) => {
                    prop_assert_eq!(epoch, before_epoch + SECONDS_PER_DAY);
                },
                Ok(Rotation::Unchanged) => {},
                Err(KeyChainError::Store(StoreError::Injected { .. })) => {
                    prop_assert_eq!(chain_under_chaos.current_key(), &before_key);
                    prop_assert_eq!(chain_under_chaos.last_epoch(), before_epoch);
                },
                Err(e) => panic!("Unexpected error: {e:?}"),
            }

            // ORACLE: memory and a receiver replay agree on the current key
            let replayed =
                derive_key_for_day(&master, "VEH-001", START, chain_under_chaos.last_epoch());
            prop_assert_eq!(chain_under_chaos.current_key(), &replayed);
        }

        // ORACLE: what survived in the store is the same state
        let reloaded = KeyChain::initialize(backing, config).unwrap();
        prop_assert_eq!(reloaded.current_key(), chain_under_chaos.current_key());
        prop_assert_eq!(reloaded.last_epoch(), chain_under_chaos.last_epoch());
    });
}

#[test]
fn prop_chaos_counter_values_are_distinct_frames() {
    proptest!(ProptestConfig::with_cases(50), |(
        failure_rate in 0.0..0.5,
        seed in any::<u64>(),
    )| {
        let store = ChaoticStore::with_seed(MemoryStore::new(), failure_rate, seed);
        let mut builder =
            FrameBuilder::with_nonce(store, FrameConfig::default(), SessionNonce::zero());
        let key = telelock_crypto::DailyKey::from_bytes([5; 16]);

        let mut prefixes = HashSet::new();
        for _ in 0..50 {
            if let Ok(frame) = builder.build_frame(&SensorSnapshot::default(), &key) {
                // ORACLE: every frame carries an IV never seen before
                prop_assert!(prefixes.insert(frame.counter_prefix().to_vec()));
            }
        }
    });
}
