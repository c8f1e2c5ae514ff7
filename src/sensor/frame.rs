//! Frame decoder for the glove's serial telemetry
//!
//! The firmware prints one frame per line: 13 comma-separated numbers
//! (4 flex, 6 touch, 3 accel). Lines starting with `[DEBUG]` are firmware log
//! output and are forwarded to the log instead of being parsed.

use super::reading::SensorReading;
use crate::consts::*;
use crate::now_ms;

/// Why a data line was rejected
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FrameError {
    #[error("expected 13 fields, found {fields}")]
    Malformed { fields: usize },
    #[error("field {index} is not a finite number: {value:?}")]
    NonNumeric { index: usize, value: String },
}

/// Result of decoding one line
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedLine<'a> {
    /// Firmware log message (marker stripped)
    Debug(&'a str),
    /// A validated data frame
    Reading(SensorReading),
}

/// Decode a single raw line, stamping the reading with `captured_at`.
///
/// Never panics: malformed input is returned as a [`FrameError`].
pub fn decode_line(raw: &str, captured_at: u64) -> Result<DecodedLine<'_>, FrameError> {
    let line = raw.trim();

    if let Some(message) = line.strip_prefix(DEBUG_MARKER) {
        return Ok(DecodedLine::Debug(message.trim()));
    }

    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() != FRAME_FIELDS {
        return Err(FrameError::Malformed {
            fields: fields.len(),
        });
    }

    let mut values = [0.0; FRAME_FIELDS];
    for (index, field) in fields.iter().enumerate() {
        values[index] = field
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| FrameError::NonNumeric {
                index,
                value: field.to_string(),
            })?;
    }

    SensorReading::from_values(&values, captured_at)
        .map(DecodedLine::Reading)
        .ok_or(FrameError::Malformed {
            fields: fields.len(),
        })
}

/// Counters kept by a [`FrameDecoder`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub readings: u64,
    pub debug_lines: u64,
    pub malformed: u64,
    pub non_numeric: u64,
}

impl FrameStats {
    pub fn rejected(&self) -> u64 {
        self.malformed + self.non_numeric
    }
}

/// Stateful wrapper around [`decode_line`] that reports every outcome to the
/// log and keeps counters. Used by the bridge's ingestion loop.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    stats: FrameStats,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Decode a line stamped with the current wall-clock time
    pub fn decode(&mut self, raw: &str) -> Option<SensorReading> {
        self.decode_at(raw, now_ms())
    }

    /// Decode a line, logging debug output and rejections.
    /// Returns the reading only for valid data frames.
    pub fn decode_at(&mut self, raw: &str, captured_at: u64) -> Option<SensorReading> {
        match decode_line(raw, captured_at) {
            Ok(DecodedLine::Debug(message)) => {
                self.stats.debug_lines += 1;
                log::info!(target: "device", "{}", message);
                None
            }
            Ok(DecodedLine::Reading(reading)) => {
                self.stats.readings += 1;
                log::debug!(
                    "Parsed: flex={:?} touch[0..2]={:?} accel={:?}",
                    reading.flex,
                    &reading.touch[..2],
                    reading.accel
                );
                Some(reading)
            }
            Err(err) => {
                match err {
                    FrameError::Malformed { .. } => self.stats.malformed += 1,
                    FrameError::NonNumeric { .. } => self.stats.non_numeric += 1,
                }
                log::warn!("Rejected frame ({}): {:?}", err, raw);
                None
            }
        }
    }
}
