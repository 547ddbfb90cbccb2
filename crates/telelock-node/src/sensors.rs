//! Sensor capability and per-cycle snapshots.
//!
//! Acquisition is external; the node only needs the three reads below. Any
//! reading may be unavailable, in which case its frame fields encode as
//! zero and the frame is still produced.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use telelock_proto::{
    ClearFields, SecureFields,
    fields::{
        scale_angular_rate, scale_coordinate, scale_humidity, scale_magnitude, scale_temperature,
    },
};

/// One inertial reading.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Motion {
    /// Acceleration per axis, m/s²
    pub accel: [f32; 3],
    /// Angular rate per axis, rad/s
    pub gyro: [f32; 3],
}

/// One position fix.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    /// Latitude, degrees
    pub latitude: f64,
    /// Longitude, degrees
    pub longitude: f64,
}

/// Sensor collaborator.
pub trait Sensors {
    /// Temperature (°C) and relative humidity (%), or `None` if the sensor
    /// did not answer.
    fn read_temperature_humidity(&mut self) -> Option<(i32, i32)>;

    /// Accelerometer and gyroscope, or `None` if unavailable.
    fn read_motion(&mut self) -> Option<Motion>;

    /// Position, or `None` without a valid fix.
    fn read_position(&mut self) -> Option<Position>;
}

/// Readings captured for one telemetry cycle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SensorSnapshot {
    /// Temperature °C and humidity %
    pub climate: Option<(i32, i32)>,
    /// Inertial reading
    pub motion: Option<Motion>,
    /// Position fix
    pub position: Option<Position>,
}

impl SensorSnapshot {
    /// Read every sensor once.
    pub fn capture<T: Sensors + ?Sized>(sensors: &mut T) -> Self {
        Self {
            climate: sensors.read_temperature_humidity(),
            motion: sensors.read_motion(),
            position: sensors.read_position(),
        }
    }

    /// Clear-block fields; unavailable readings become zero.
    pub fn clear_fields(&self) -> ClearFields {
        let (temperature, humidity) = self.climate.unwrap_or_default();
        let gyro = self.motion.map_or([0.0; 3], |m| m.gyro);

        ClearFields {
            temperature: scale_temperature(temperature),
            humidity: scale_humidity(humidity),
            gyro: gyro.map(scale_angular_rate),
        }
    }

    /// Secure-block fields; unavailable readings become zero.
    pub fn secure_fields(&self) -> SecureFields {
        let position = self.position.unwrap_or_default();

        SecureFields {
            accel_magnitude: self.motion.map_or(0, |m| scale_magnitude(m.accel)),
            latitude: scale_coordinate(position.latitude),
            longitude: scale_coordinate(position.longitude),
        }
    }
}

/// Seeded pseudo-sensors for the simulated node.
///
/// Readings wander around a fixed base point; each read independently
/// drops out with `dropout_rate`.
pub struct SimulatedSensors {
    rng: ChaCha8Rng,
    dropout_rate: f64,
    base: Position,
}

impl SimulatedSensors {
    /// Sensors near `base`, reproducible for a given `seed`.
    ///
    /// # Panics
    ///
    /// Panics if `dropout_rate` is not in [0.0, 1.0]
    pub fn new(base: Position, dropout_rate: f64, seed: u64) -> Self {
        assert!(
            (0.0..=1.0).contains(&dropout_rate),
            "dropout_rate must be between 0.0 and 1.0, got {dropout_rate}"
        );
        Self { rng: ChaCha8Rng::seed_from_u64(seed), dropout_rate, base }
    }

    fn available(&mut self) -> bool {
        !self.rng.gen_bool(self.dropout_rate)
    }
}

impl Sensors for SimulatedSensors {
    fn read_temperature_humidity(&mut self) -> Option<(i32, i32)> {
        self.available().then(|| (self.rng.gen_range(-10..=40), self.rng.gen_range(20..=90)))
    }

    fn read_motion(&mut self) -> Option<Motion> {
        if !self.available() {
            return None;
        }

        let mut axis = |spread: f32| self.rng.gen_range(-spread..=spread);
        let accel = [axis(2.0), axis(2.0), 9.81 + axis(2.0)];
        let gyro = [axis(1.0), axis(1.0), axis(1.0)];
        Some(Motion { accel, gyro })
    }

    fn read_position(&mut self) -> Option<Position> {
        if !self.available() {
            return None;
        }

        Some(Position {
            latitude: self.base.latitude + self.rng.gen_range(-0.01..=0.01),
            longitude: self.base.longitude + self.rng.gen_range(-0.01..=0.01),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_readings_encode_as_zero() {
        let snapshot = SensorSnapshot::default();
        assert_eq!(snapshot.clear_fields(), ClearFields::default());
        assert_eq!(snapshot.secure_fields(), SecureFields::default());
    }

    #[test]
    fn readings_are_scaled() {
        let snapshot = SensorSnapshot {
            climate: Some((23, 55)),
            motion: Some(Motion { accel: [0.0, 0.0, 9.81], gyro: [0.123, -0.5, 2.0] }),
            position: Some(Position { latitude: 45.123_456_78, longitude: -7.654_321_09 }),
        };

        assert_eq!(snapshot.clear_fields(), ClearFields {
            temperature: 23,
            humidity: 55,
            gyro: [12, -50, 127]
        });
        assert_eq!(snapshot.secure_fields(), SecureFields {
            accel_magnitude: 10,
            latitude: 451_234_567,
            longitude: -76_543_210
        });
    }

    #[test]
    fn simulated_sensors_are_reproducible() {
        let base = Position { latitude: 45.0, longitude: 7.6 };
        let mut a = SimulatedSensors::new(base, 0.2, 11);
        let mut b = SimulatedSensors::new(base, 0.2, 11);

        for _ in 0..20 {
            assert_eq!(SensorSnapshot::capture(&mut a), SensorSnapshot::capture(&mut b));
        }
    }

    #[test]
    fn full_dropout_yields_empty_snapshot() {
        let mut sensors = SimulatedSensors::new(Position::default(), 1.0, 3);
        assert_eq!(SensorSnapshot::capture(&mut sensors), SensorSnapshot::default());
    }
}
