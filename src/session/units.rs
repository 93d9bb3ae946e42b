//! Conversions between wheel positions and Kinesis device units

use crate::config::{ANGLE_TO_DEVICE_UNITS, NUM_POSITIONS, SPEED_TO_DEVICE_UNITS, STEP_ANGLE};

pub fn degrees_to_device_units(degrees: f64) -> i32 {
    (degrees * ANGLE_TO_DEVICE_UNITS).round() as i32
}

pub fn device_units_to_degrees(units: i32) -> f64 {
    f64::from(units) / ANGLE_TO_DEVICE_UNITS
}

/// Absolute target of the slot with the given index
pub fn index_to_device_units(index: u32) -> i32 {
    degrees_to_device_units(f64::from(index) * STEP_ANGLE)
}

/// Index of the slot closest to the given position. Positions past a full turn
/// wrap around.
pub fn device_units_to_index(units: i32) -> u32 {
    let steps = (device_units_to_degrees(units) / STEP_ANGLE).round() as i64;
    steps.rem_euclid(i64::from(NUM_POSITIONS)) as u32
}

pub fn speed_to_device_units(speed: u32) -> i32 {
    (f64::from(speed) * SPEED_TO_DEVICE_UNITS).round() as i32
}

pub fn device_units_to_speed(units: i32) -> f64 {
    f64::from(units) / SPEED_TO_DEVICE_UNITS
}
