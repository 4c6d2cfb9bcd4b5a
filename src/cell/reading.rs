//! Raw cell readings as reported by the telephony stack
//!
//! One reading per cell the modem can see, registered or neighbor. Field
//! values are passed through untouched: the platform reports "unavailable"
//! as the maximum of the field's integer type, and carrier codes may be
//! missing entirely or arrive as JSON numbers instead of strings. Validation happens in [`super::normalize`].
//!
//! JSON form (one element of the array a source returns):
//!
//! ```json
//! {"type": "lte", "registered": true, "dbm": -97,
//!  "mcc": "310", "mnc": "260", "tac": 11801, "ci": 26744321}
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};

/// Platform sentinel for an unavailable 32-bit identity field
pub const UNAVAILABLE: i32 = i32::MAX;

/// Platform sentinel for an unavailable NR cell identity
pub const UNAVAILABLE_LONG: i64 = i64::MAX;

/// A single cell as delivered by the platform, tagged by radio technology
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RawCellReading {
    Gsm {
        #[serde(default)]
        registered: bool,
        #[serde(default, rename = "dbm")]
        signal_dbm: Option<i32>,
        #[serde(default, deserialize_with = "carrier_code")]
        mcc: Option<String>,
        #[serde(default, deserialize_with = "carrier_code")]
        mnc: Option<String>,
        #[serde(default = "unavailable")]
        lac: i32,
        #[serde(default = "unavailable")]
        cid: i32,
    },
    Wcdma {
        #[serde(default)]
        registered: bool,
        #[serde(default, rename = "dbm")]
        signal_dbm: Option<i32>,
        #[serde(default, deserialize_with = "carrier_code")]
        mcc: Option<String>,
        #[serde(default, deserialize_with = "carrier_code")]
        mnc: Option<String>,
        #[serde(default = "unavailable")]
        lac: i32,
        #[serde(default = "unavailable")]
        cid: i32,
    },
    Lte {
        #[serde(default)]
        registered: bool,
        #[serde(default, rename = "dbm")]
        signal_dbm: Option<i32>,
        #[serde(default, deserialize_with = "carrier_code")]
        mcc: Option<String>,
        #[serde(default, deserialize_with = "carrier_code")]
        mnc: Option<String>,
        #[serde(default = "unavailable")]
        tac: i32,
        #[serde(default = "unavailable")]
        ci: i32,
    },
    Nr {
        #[serde(default)]
        registered: bool,
        #[serde(default, rename = "dbm")]
        signal_dbm: Option<i32>,
        #[serde(default, deserialize_with = "carrier_code")]
        mcc: Option<String>,
        #[serde(default, deserialize_with = "carrier_code")]
        mnc: Option<String>,
        #[serde(default = "unavailable")]
        tac: i32,
        #[serde(default = "unavailable_long")]
        nci: i64,
    },
    Cdma {
        #[serde(default)]
        registered: bool,
        #[serde(default, rename = "dbm")]
        signal_dbm: Option<i32>,
        #[serde(default = "unavailable", rename = "system")]
        system_id: i32,
        #[serde(default = "unavailable", rename = "network")]
        network_id: i32,
        #[serde(default = "unavailable", rename = "basestation")]
        basestation_id: i32,
    },
}

/// Radio technologies this crate understands, by their JSON tag
const KNOWN_TECHNOLOGIES: [&str; 5] = ["gsm", "wcdma", "lte", "nr", "cdma"];

/// MCC/MNC as either a string or a bare number
#[derive(Deserialize)]
#[serde(untagged)]
enum CarrierCode {
    Text(String),
    Number(u64),
}

/// Carrier code as a string; a numeric code becomes its decimal form
fn carrier_code<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(
        Option::<CarrierCode>::deserialize(deserializer)?.map(|code| match code {
            CarrierCode::Text(text) => text,
            CarrierCode::Number(n) => n.to_string(),
        }),
    )
}

fn unavailable() -> i32 {
    UNAVAILABLE
}

fn unavailable_long() -> i64 {
    UNAVAILABLE_LONG
}

impl RawCellReading {
    /// Whether the device is registered on (serving from) this cell
    pub fn is_registered(&self) -> bool {
        match self {
            RawCellReading::Gsm { registered, .. }
            | RawCellReading::Wcdma { registered, .. }
            | RawCellReading::Lte { registered, .. }
            | RawCellReading::Nr { registered, .. }
            | RawCellReading::Cdma { registered, .. } => *registered,
        }
    }

    /// Signal strength in dBm, `None` when the platform did not report one
    pub fn signal_dbm(&self) -> Option<i32> {
        let dbm = match self {
            RawCellReading::Gsm { signal_dbm, .. }
            | RawCellReading::Wcdma { signal_dbm, .. }
            | RawCellReading::Lte { signal_dbm, .. }
            | RawCellReading::Nr { signal_dbm, .. }
            | RawCellReading::Cdma { signal_dbm, .. } => *signal_dbm,
        };
        dbm.filter(|&v| v != UNAVAILABLE)
    }
}

/// Parse a JSON array of readings
///
/// Elements of an unrecognized technology (TD-SCDMA and the like) are
/// skipped quietly. A known technology that fails to parse is skipped too,
/// with a warning.
pub fn parse_readings(json: &str) -> serde_json::Result<Vec<RawCellReading>> {
    let values: Vec<serde_json::Value> = serde_json::from_str(json)?;
    Ok(values
        .into_iter()
        .filter_map(|value| {
            let known = value
                .get("type")
                .and_then(|tag| tag.as_str())
                .is_some_and(|tag| KNOWN_TECHNOLOGIES.contains(&tag));
            match serde_json::from_value(value) {
                Ok(reading) => Some(reading),
                Err(e) if known => {
                    warn!("Dropping malformed cell reading: {}", e);
                    None
                }
                Err(e) => {
                    debug!("Skipping unsupported cell reading: {}", e);
                    None
                }
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mixed_snapshot() {
        let json = r#"[
            {"type": "lte", "registered": true, "dbm": -97,
             "mcc": "310", "mnc": "260", "tac": 11801, "ci": 26744321},
            {"type": "gsm", "mcc": "310", "mnc": "260", "lac": 7, "cid": 1042},
            {"type": "cdma", "system": 5, "network": 7, "basestation": 9}
        ]"#;

        let readings = parse_readings(json).unwrap();
        assert_eq!(readings.len(), 3);
        assert!(readings[0].is_registered());
        assert_eq!(readings[0].signal_dbm(), Some(-97));
        assert!(!readings[1].is_registered());
        assert_eq!(readings[1].signal_dbm(), None);
        match &readings[2] {
            RawCellReading::Cdma {
                system_id,
                network_id,
                basestation_id,
                ..
            } => {
                assert_eq!((*system_id, *network_id, *basestation_id), (5, 7, 9));
            }
            other => panic!("Expected CDMA reading, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_fields_default_to_sentinels() {
        let readings = parse_readings(r#"[{"type": "nr", "mcc": "001"}]"#).unwrap();
        match &readings[0] {
            RawCellReading::Nr { mnc, tac, nci, .. } => {
                assert_eq!(*mnc, None);
                assert_eq!(*tac, UNAVAILABLE);
                assert_eq!(*nci, UNAVAILABLE_LONG);
            }
            other => panic!("Expected NR reading, got {:?}", other),
        }
    }

    #[test]
    fn test_unavailable_signal_is_none() {
        let reading = RawCellReading::Lte {
            registered: false,
            signal_dbm: Some(UNAVAILABLE),
            mcc: None,
            mnc: None,
            tac: 1,
            ci: 1,
        };
        assert_eq!(reading.signal_dbm(), None);
    }

    #[test]
    fn test_unknown_technology_is_skipped() {
        let json = r#"[{"type": "tdscdma", "lac": 1}, {"type": "gsm", "lac": 2, "cid": 3}]"#;
        let readings = parse_readings(json).unwrap();
        assert_eq!(readings.len(), 1);
    }

    #[test]
    fn test_numeric_carrier_codes_are_accepted() {
        let json = r#"[{"type": "lte", "registered": true, "dbm": -97,
                        "mcc": 310, "mnc": 260, "tac": 11801, "ci": 26744321}]"#;
        let readings = parse_readings(json).unwrap();
        assert_eq!(readings.len(), 1);
        match &readings[0] {
            RawCellReading::Lte { mcc, mnc, .. } => {
                assert_eq!(mcc.as_deref(), Some("310"));
                assert_eq!(mnc.as_deref(), Some("260"));
            }
            other => panic!("Expected LTE reading, got {:?}", other),
        }
    }

    #[test]
    fn test_null_carrier_code_is_missing() {
        let readings = parse_readings(r#"[{"type": "gsm", "mcc": null, "lac": 1, "cid": 2}]"#).unwrap();
        match &readings[0] {
            RawCellReading::Gsm { mcc, mnc, .. } => {
                assert_eq!(*mcc, None);
                assert_eq!(*mnc, None);
            }
            other => panic!("Expected GSM reading, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_known_technology_does_not_sink_snapshot() {
        let json = r#"[
            {"type": "lte", "mcc": "310", "mnc": "260", "tac": "eleven", "ci": 1},
            {"type": "lte", "mcc": [3, 1, 0], "mnc": "260", "tac": 1, "ci": 2},
            {"type": "gsm", "mcc": "310", "mnc": "260", "lac": 7, "cid": 1042}
        ]"#;
        let readings = parse_readings(json).unwrap();
        assert_eq!(readings.len(), 1);
        assert!(matches!(readings[0], RawCellReading::Gsm { cid: 1042, .. }));
    }

    #[test]
    fn test_malformed_json_fails() {
        assert!(parse_readings("{not json").is_err());
        assert!(parse_readings(r#"{"type": "gsm"}"#).is_err());
    }
}
