//! Sensor telemetry
//!
//! Turns raw comma-separated glove frames into validated [`SensorReading`]s
//! and defines the JSON wire shape they travel in.

pub mod frame;
pub mod reading;

pub use frame::{DecodedLine, FrameDecoder, FrameError, FrameStats, decode_line};
pub use reading::{LinkError, SensorReading, WireReading};
