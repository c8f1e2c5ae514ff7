//! Sensor reading value and its JSON wire shape

use serde::{Deserialize, Serialize};

use crate::consts::*;

/// One validated snapshot of every glove channel.
///
/// Constructed only from a fully numeric 13-field frame (see
/// [`decode_line`](super::decode_line)) or from a wire message carrying all
/// three channel groups at their exact lengths.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    /// Finger flex sensors (higher = more bent)
    pub flex: [f64; FLEX_CHANNELS],
    /// Capacitive pads: index, middle, ring, little, thumb, palm (lower = firmer contact)
    pub touch: [f64; TOUCH_CHANNELS],
    /// Accelerometer x, y, z
    pub accel: [f64; ACCEL_CHANNELS],
    /// Epoch milliseconds at which the frame was decoded
    #[serde(rename = "timestamp")]
    pub captured_at: u64,
}

impl SensorReading {
    /// Build a reading from exactly [`FRAME_FIELDS`] values in wire order.
    ///
    /// Returns `None` if `values` has the wrong length.
    pub fn from_values(values: &[f64], captured_at: u64) -> Option<Self> {
        if values.len() != FRAME_FIELDS {
            return None;
        }
        let mut flex = [0.0; FLEX_CHANNELS];
        let mut touch = [0.0; TOUCH_CHANNELS];
        let mut accel = [0.0; ACCEL_CHANNELS];
        let (f, rest) = values.split_at(FLEX_CHANNELS);
        let (t, a) = rest.split_at(TOUCH_CHANNELS);
        flex.copy_from_slice(f);
        touch.copy_from_slice(t);
        accel.copy_from_slice(a);
        Some(Self {
            flex,
            touch,
            accel,
            captured_at,
        })
    }

    /// All channels flattened back into wire order
    pub fn values(&self) -> Vec<f64> {
        self.flex
            .iter()
            .chain(self.touch.iter())
            .chain(self.accel.iter())
            .copied()
            .collect()
    }

    /// Mean of the four flex channels
    pub fn avg_flex(&self) -> f64 {
        self.flex.iter().sum::<f64>() / FLEX_CHANNELS as f64
    }

    /// Serialize to the JSON wire message
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse an inbound wire message on the consumer side.
    ///
    /// Only checks that the three channel groups exist with usable lengths;
    /// the ingestion side already validated the values. A message without a
    /// timestamp is stamped with `received_at`.
    pub fn from_wire(text: &str, received_at: u64) -> Result<Self, LinkError> {
        let wire: WireReading = serde_json::from_str(text)?;
        wire.into_reading(received_at)
    }
}

/// Lenient shape of an inbound wire message.
///
/// Groups are kept as raw JSON values so a missing, short or non-numeric
/// group is reported by name instead of as a generic JSON error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireReading {
    pub flex: Option<Vec<serde_json::Value>>,
    pub touch: Option<Vec<serde_json::Value>>,
    pub accel: Option<Vec<serde_json::Value>>,
    pub timestamp: Option<f64>,
}

impl WireReading {
    pub fn into_reading(self, received_at: u64) -> Result<SensorReading, LinkError> {
        let flex = group::<FLEX_CHANNELS>("flex", self.flex)?;
        let touch = group::<TOUCH_CHANNELS>("touch", self.touch)?;
        let accel = group::<ACCEL_CHANNELS>("accel", self.accel)?;
        let captured_at = match self.timestamp {
            Some(ts) if ts.is_finite() && ts >= 0.0 => ts as u64,
            _ => received_at,
        };
        Ok(SensorReading {
            flex,
            touch,
            accel,
            captured_at,
        })
    }
}

fn group<const N: usize>(
    name: &'static str,
    values: Option<Vec<serde_json::Value>>,
) -> Result<[f64; N], LinkError> {
    let values = values.ok_or(LinkError::MissingGroup(name))?;
    if values.len() != N {
        return Err(LinkError::WrongLength {
            group: name,
            expected: N,
            found: values.len(),
        });
    }
    let mut channels = [0.0; N];
    for (index, (slot, value)) in channels.iter_mut().zip(&values).enumerate() {
        *slot = value
            .as_f64()
            .ok_or(LinkError::NonNumeric { group: name, index })?;
    }
    Ok(channels)
}

/// Why an inbound wire message could not be handed to the gesture decoder
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("missing sensor group `{0}`")]
    MissingGroup(&'static str),
    #[error("sensor group `{group}` has {found} channels, expected {expected}")]
    WrongLength {
        group: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("sensor group `{group}` channel {index} is not a number")]
    NonNumeric { group: &'static str, index: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SensorReading {
        let values: Vec<f64> = (0..13).map(|v| v as f64).collect();
        SensorReading::from_values(&values, 1_700_000_000_000).unwrap()
    }

    #[test]
    fn test_wire_format_shape() {
        let json = sample().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["flex"].as_array().unwrap().len(), 4);
        assert_eq!(value["touch"].as_array().unwrap().len(), 6);
        assert_eq!(value["accel"].as_array().unwrap().len(), 3);
        assert_eq!(value["timestamp"].as_u64(), Some(1_700_000_000_000));
    }

    #[test]
    fn test_from_wire_accepts_bridge_output() {
        let reading = sample();
        let parsed = SensorReading::from_wire(&reading.to_json().unwrap(), 0).unwrap();
        assert_eq!(parsed, reading);
    }

    #[test]
    fn test_from_wire_missing_group() {
        let text = r#"{"flex":[1,2,3,4],"accel":[0,0,0],"timestamp":5}"#;
        let err = SensorReading::from_wire(text, 0).unwrap_err();
        assert!(matches!(err, LinkError::MissingGroup("touch")));
    }

    #[test]
    fn test_from_wire_wrong_length() {
        let text = r#"{"flex":[1,2,3],"touch":[1,2,3,4,5,6],"accel":[0,0,0]}"#;
        let err = SensorReading::from_wire(text, 0).unwrap_err();
        assert!(matches!(
            err,
            LinkError::WrongLength {
                group: "flex",
                expected: 4,
                found: 3
            }
        ));
    }

    #[test]
    fn test_from_wire_null_channel_names_group() {
        let text = r#"{"flex":[1,null,3,4],"touch":[1,2,3,4,5,6],"accel":[0,0,0]}"#;
        let err = SensorReading::from_wire(text, 0).unwrap_err();
        assert!(matches!(
            err,
            LinkError::NonNumeric {
                group: "flex",
                index: 1
            }
        ));

        let text = r#"{"flex":[1,2,3,4],"touch":[1,2,3,4,5,6],"accel":[0,"x",0]}"#;
        let err = SensorReading::from_wire(text, 0).unwrap_err();
        assert!(matches!(err, LinkError::NonNumeric { group: "accel", .. }));
    }

    #[test]
    fn test_from_wire_without_timestamp_uses_receive_time() {
        let text = r#"{"flex":[1,2,3,4],"touch":[1,2,3,4,5,6],"accel":[0,0,0]}"#;
        let reading = SensorReading::from_wire(text, 42).unwrap();
        assert_eq!(reading.captured_at, 42);
    }

    #[test]
    fn test_from_wire_garbage() {
        assert!(matches!(
            SensorReading::from_wire("not json", 0),
            Err(LinkError::Json(_))
        ));
    }

    #[test]
    fn test_avg_flex() {
        let reading = SensorReading::from_values(
            &[1000.0, 2000.0, 3000.0, 4000.0, 0., 0., 0., 0., 0., 0., 0., 0., 0.],
            0,
        )
        .unwrap();
        assert!((reading.avg_flex() - 2500.0).abs() < 1e-9);
    }
}
