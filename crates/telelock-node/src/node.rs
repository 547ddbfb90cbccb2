//! Per-cycle node driver.
//!
//! Wires the key chain, frame builder and transmit buffer over one store and
//! runs a telemetry cycle to completion:
//!
//! ```text
//! run_cycle(sensors):
//!   key_chain.check_rotation(now)     (at most one chain step)
//!   snapshot = capture(sensors)
//!   frame    = builder.build_frame(snapshot, current_key)
//!   outcome  = transmit.send(frame)   (delivered or queued)
//! ```
//!
//! Rotation and counter failures abort the cycle before anything is
//! encrypted. Link failures do not: the frame is queued and the cycle still
//! reports success with the transmit outcome attached.

use telelock_proto::TelemetryFrame;

use crate::{
    config::NodeConfig,
    env::Environment,
    error::{NodeError, TransmitError},
    frame_builder::FrameBuilder,
    key_chain::{KeyChain, Rotation},
    radio::RadioLink,
    sensors::{SensorSnapshot, Sensors},
    storage::Store,
    transmit::{SendOutcome, TransmitBuffer},
};

/// What one cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Result of the rotation check
    pub rotation: Rotation,
    /// Counter embedded in the frame
    pub counter: u32,
    /// The frame as handed to the transmit buffer
    pub frame: TelemetryFrame,
    /// Delivery result; link failures land here rather than failing the cycle
    pub outcome: Result<SendOutcome, TransmitError>,
}

impl CycleReport {
    /// Whether the frame was acknowledged this cycle.
    pub fn delivered(&self) -> bool {
        matches!(self.outcome, Ok(SendOutcome::Delivered { .. }))
    }
}

/// A telemetry node: one store, one clock, one radio link.
pub struct TelemetryNode<S: Store, E: Environment, L: RadioLink> {
    env: E,
    key_chain: KeyChain<S>,
    builder: FrameBuilder<S>,
    transmit: TransmitBuffer<L>,
}

impl<S: Store, E: Environment, L: RadioLink> TelemetryNode<S, E, L> {
    /// Boot the node: load or start the key chain, draw the session nonce,
    /// and attempt to activate the link.
    ///
    /// The identity must already be provisioned. An inactive link is not an
    /// error; frames queue until it comes up.
    pub fn start(store: S, env: E, mut link: L, config: NodeConfig) -> Result<Self, NodeError> {
        let key_chain = KeyChain::initialize(store.clone(), config.key_chain)?;
        let builder = FrameBuilder::new(store, config.frame, &env);

        if link.load_session() {
            tracing::info!("link activated");
        } else {
            tracing::warn!("link not activated at startup; frames will queue");
        }

        tracing::info!(
            device_id = %key_chain.device_id(),
            iv_width = ?config.frame.iv_width,
            time_source = ?config.key_chain.time_source,
            queue_capacity = config.transmit.capacity,
            "node started"
        );

        Ok(Self { env, key_chain, builder, transmit: TransmitBuffer::new(link, config.transmit) })
    }

    /// Run one telemetry cycle.
    ///
    /// # Errors
    ///
    /// `KeyChain` if the rotation could not be persisted (the previous key
    /// stays active and no frame is built). `FrameBuild` if the counter could
    /// not be advanced.
    pub fn run_cycle<T: Sensors + ?Sized>(
        &mut self,
        sensors: &mut T,
    ) -> Result<CycleReport, NodeError> {
        let rotation = self.key_chain.check_rotation(self.env.now_epoch())?;

        let snapshot = SensorSnapshot::capture(sensors);
        let frame = self.builder.build_frame(&snapshot, self.key_chain.current_key())?;
        let counter = self.builder.last_embedded().unwrap_or_default();

        let outcome = self.transmit.send(frame);
        if let Err(e) = &outcome {
            tracing::error!(counter, error = %e, "frame not delivered");
        }

        Ok(CycleReport { rotation, counter, frame, outcome })
    }

    /// The key chain.
    pub fn key_chain(&self) -> &KeyChain<S> {
        &self.key_chain
    }

    /// The frame builder.
    pub fn frame_builder(&self) -> &FrameBuilder<S> {
        &self.builder
    }

    /// The transmit buffer.
    pub fn transmit(&self) -> &TransmitBuffer<L> {
        &self.transmit
    }

    /// The transmit buffer, mutably.
    pub fn transmit_mut(&mut self) -> &mut TransmitBuffer<L> {
        &mut self.transmit
    }

    /// The environment.
    pub fn env(&self) -> &E {
        &self.env
    }
}

#[cfg(test)]
mod tests {
    use telelock_crypto::{MasterSecret, SECONDS_PER_DAY, derive_key_for_day};
    use telelock_proto::SessionNonce;

    use super::*;
    use crate::{
        config::DEFAULT_PROVISIONING_EPOCH,
        env::SimEnv,
        provisioning::{DEVICE_ID, MASTER_KEY},
        radio::SimulatedRadio,
        sensors::{Position, SimulatedSensors},
        storage::{MemoryStore, Namespace},
    };

    const MASTER_HEX: &str = "00112233445566778899aabbccddeeff";

    fn provisioned_store() -> MemoryStore {
        let store = MemoryStore::new();
        store.put_string(Namespace::Identity, MASTER_KEY, MASTER_HEX).unwrap();
        store.put_string(Namespace::Identity, DEVICE_ID, "VEH-001").unwrap();
        store
    }

    fn node(
        store: &MemoryStore,
        env: &SimEnv,
    ) -> TelemetryNode<MemoryStore, SimEnv, SimulatedRadio<MemoryStore>> {
        let radio = SimulatedRadio::new(store.clone(), 0.0, 1);
        TelemetryNode::start(store.clone(), env.clone(), radio, NodeConfig::default()).unwrap()
    }

    #[test]
    fn start_requires_provisioning() {
        let store = MemoryStore::new();
        let radio = SimulatedRadio::new(store.clone(), 0.0, 1);
        let result = TelemetryNode::start(
            store,
            SimEnv::new(DEFAULT_PROVISIONING_EPOCH, 1),
            radio,
            NodeConfig::default(),
        );
        assert!(matches!(result, Err(NodeError::KeyChain(_))));
    }

    #[test]
    fn cycle_delivers_decryptable_frame() {
        let store = provisioned_store();
        let env = SimEnv::new(DEFAULT_PROVISIONING_EPOCH + 60, 1);
        let mut node = node(&store, &env);
        let mut sensors =
            SimulatedSensors::new(Position { latitude: 45.0, longitude: 7.6 }, 0.0, 2);

        let report = node.run_cycle(&mut sensors).unwrap();
        assert_eq!(report.rotation, Rotation::Unchanged);
        assert_eq!(report.counter, 1);
        assert!(report.delivered());

        let master = MasterSecret::from_hex(MASTER_HEX).unwrap();
        let key = derive_key_for_day(
            &master,
            "VEH-001",
            DEFAULT_PROVISIONING_EPOCH,
            env.now_epoch(),
        );
        let parsed = report.frame.parse().unwrap();
        let secure = parsed.decrypt(&key, &SessionNonce::zero()).unwrap();
        assert!(secure.latitude > 449_000_000 && secure.latitude < 451_000_000);
    }

    #[test]
    fn day_boundary_rotates_before_building() {
        let store = provisioned_store();
        let env = SimEnv::new(DEFAULT_PROVISIONING_EPOCH + 60, 1);
        let mut node = node(&store, &env);
        let mut sensors = SimulatedSensors::new(Position::default(), 0.0, 2);

        node.run_cycle(&mut sensors).unwrap();
        env.advance(SECONDS_PER_DAY);

        let report = node.run_cycle(&mut sensors).unwrap();
        assert_eq!(report.rotation, Rotation::Rotated {
            epoch: DEFAULT_PROVISIONING_EPOCH + SECONDS_PER_DAY
        });
        assert_eq!(report.counter, 2);
    }

    #[test]
    fn link_failure_queues_without_failing_cycle() {
        let store = provisioned_store();
        let env = SimEnv::new(DEFAULT_PROVISIONING_EPOCH, 1);
        let mut node = node(&store, &env);
        let mut sensors = SimulatedSensors::new(Position::default(), 0.0, 2);
        node.transmit_mut().link_mut().fail_next(1);

        let first = node.run_cycle(&mut sensors).unwrap();
        assert!(!first.delivered());
        assert_eq!(node.transmit().pending().len(), 1);

        let second = node.run_cycle(&mut sensors).unwrap();
        assert_eq!(second.outcome, Ok(SendOutcome::Delivered { frames: 2, bytes: 74 }));
        assert_eq!(node.transmit().pending().len(), 0);
    }
}
