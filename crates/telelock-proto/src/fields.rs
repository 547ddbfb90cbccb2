//! Frame field values and their fixed-point encodings.
//!
//! Scaling factors and widths are part of frame format v1 and must not
//! change without a format bump:
//!
//! | field          | unit      | scale   | wire type            |
//! |----------------|-----------|---------|----------------------|
//! | temperature    | °C        | 1       | i8                   |
//! | humidity       | %RH       | 1       | u8                   |
//! | gyro x/y/z     | rad/s     | ×100    | i8, rounded          |
//! | accel magnitude| m/s²      | 1       | u8, rounded          |
//! | latitude       | degrees   | ×10^7   | i32 LE, truncated    |
//! | longitude      | degrees   | ×10^7   | i32 LE, truncated    |
//!
//! Out-of-range values saturate at the type bounds; NaN encodes as zero.
//! Missing readings encode as zero.

/// Multiplier applied to angular rates before narrowing.
pub const ANGULAR_RATE_SCALE: f32 = 100.0;

/// Multiplier applied to coordinates before narrowing.
pub const COORDINATE_SCALE: f64 = 10_000_000.0;

/// Non-sensitive readings sent in the clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClearFields {
    /// Temperature in whole °C
    pub temperature: i8,
    /// Relative humidity in whole percent
    pub humidity: u8,
    /// Angular rate per axis, rad/s ×100
    pub gyro: [i8; 3],
}

impl ClearFields {
    /// Angular rates back in rad/s (receiver side).
    pub fn gyro_rad_per_sec(&self) -> [f32; 3] {
        self.gyro.map(|axis| f32::from(axis) / ANGULAR_RATE_SCALE)
    }
}

/// Sensitive readings carried in the encrypted block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SecureFields {
    /// Acceleration vector magnitude in whole m/s²
    pub accel_magnitude: u8,
    /// Latitude, degrees ×10^7
    pub latitude: i32,
    /// Longitude, degrees ×10^7
    pub longitude: i32,
}

impl SecureFields {
    /// Latitude in degrees (receiver side).
    pub fn latitude_deg(&self) -> f64 {
        f64::from(self.latitude) / COORDINATE_SCALE
    }

    /// Longitude in degrees (receiver side).
    pub fn longitude_deg(&self) -> f64 {
        f64::from(self.longitude) / COORDINATE_SCALE
    }
}

/// Whole-degree temperature, saturated to `i8`.
pub fn scale_temperature(celsius: i32) -> i8 {
    celsius.clamp(i32::from(i8::MIN), i32::from(i8::MAX)) as i8
}

/// Whole-percent humidity, saturated to `u8`.
pub fn scale_humidity(percent: i32) -> u8 {
    percent.clamp(0, i32::from(u8::MAX)) as u8
}

/// rad/s → rad/s ×100, rounded to nearest and saturated to `i8`.
pub fn scale_angular_rate(rad_per_sec: f32) -> i8 {
    // Float-to-int `as` saturates and maps NaN to 0
    (rad_per_sec * ANGULAR_RATE_SCALE).round() as i8
}

/// Euclidean magnitude of an acceleration vector, rounded, saturated to
/// `u8`.
pub fn scale_magnitude(xyz: [f32; 3]) -> u8 {
    let [x, y, z] = xyz;
    (x * x + y * y + z * z).sqrt().round() as u8
}

/// Degrees → degrees ×10^7, truncated toward zero, saturated to `i32`.
pub fn scale_coordinate(degrees: f64) -> i32 {
    (degrees * COORDINATE_SCALE) as i32
}
