pub mod reading;

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::trace;

pub use reading::RawCellReading;
use reading::{UNAVAILABLE, UNAVAILABLE_LONG};

/// First platform API level that exposes NR (5G) cell identity
pub const NR_MIN_API_LEVEL: u32 = 29;

/// Cell id slot used for CDMA records, which have no fourth identity field
pub const CDMA_CELL_PLACEHOLDER: i64 = 0;

/// Radio access technology of a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RadioTech {
    Gsm,
    Wcdma,
    Lte,
    Nr,
    Cdma,
}

impl fmt::Display for RadioTech {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RadioTech::Gsm => write!(f, "GSM"),
            RadioTech::Wcdma => write!(f, "WCDMA"),
            RadioTech::Lte => write!(f, "LTE"),
            RadioTech::Nr => write!(f, "5G NR"),
            RadioTech::Cdma => write!(f, "CDMA"),
        }
    }
}

/// Whether the device is camped on a cell or merely hears it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegistrationStatus {
    Registered,
    Neighbor,
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationStatus::Registered => write!(f, "Registered"),
            RegistrationStatus::Neighbor => write!(f, "Neighbor"),
        }
    }
}

/// A validated cell record with a uniform identity across technologies
///
/// For CDMA, `mcc`/`mnc` carry the system and network id, `area_code` the
/// base-station id and `cell_id` is always [`CDMA_CELL_PLACEHOLDER`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedCellRecord {
    pub technology: RadioTech,
    pub status: RegistrationStatus,
    pub mcc: String,
    pub mnc: String,
    pub area_code: i64,
    pub cell_id: i64,
    pub signal_dbm: Option<i32>,
}

impl NormalizedCellRecord {
    /// `mcc_mnc_area_cell`, the tower's identity within one snapshot
    pub fn composite_key(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            self.mcc, self.mnc, self.area_code, self.cell_id
        )
    }

    pub fn is_registered(&self) -> bool {
        self.status == RegistrationStatus::Registered
    }

    /// `mcc-mnc`, used to group towers by carrier network
    pub fn network_identifier(&self) -> String {
        format!("{}-{}", self.mcc, self.mnc)
    }
}

impl fmt::Display for NormalizedCellRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} signal={}",
            self.technology,
            self.status,
            self.composite_key(),
            self.signal_dbm
                .map(|dbm| format!("{}dBm", dbm))
                .unwrap_or("-".to_string()),
        )
    }
}

/// Normalize one raw reading, or `None` if it is malformed
///
/// Never panics. NR readings are only accepted when `api_level` is at least
/// [`NR_MIN_API_LEVEL`].
pub fn normalize(reading: &RawCellReading, api_level: u32) -> Option<NormalizedCellRecord> {
    let (technology, mcc, mnc, area_code, cell_id) = match reading {
        RawCellReading::Gsm {
            mcc, mnc, lac, cid, ..
        } => (
            RadioTech::Gsm,
            carrier_code(mcc)?,
            carrier_code(mnc)?,
            identity_field(*lac)?,
            identity_field(*cid)?,
        ),
        RawCellReading::Wcdma {
            mcc, mnc, lac, cid, ..
        } => (
            RadioTech::Wcdma,
            carrier_code(mcc)?,
            carrier_code(mnc)?,
            identity_field(*lac)?,
            identity_field(*cid)?,
        ),
        RawCellReading::Lte {
            mcc, mnc, tac, ci, ..
        } => (
            RadioTech::Lte,
            carrier_code(mcc)?,
            carrier_code(mnc)?,
            identity_field(*tac)?,
            identity_field(*ci)?,
        ),
        RawCellReading::Nr {
            mcc, mnc, tac, nci, ..
        } => {
            if api_level < NR_MIN_API_LEVEL {
                return None;
            }
            (
                RadioTech::Nr,
                carrier_code(mcc)?,
                carrier_code(mnc)?,
                identity_field(*tac)?,
                truncate_nci(*nci)?,
            )
        }
        RawCellReading::Cdma {
            system_id,
            network_id,
            basestation_id,
            ..
        } => {
            if *system_id == UNAVAILABLE
                || *network_id == UNAVAILABLE
                || *basestation_id == UNAVAILABLE
            {
                return None;
            }
            (
                RadioTech::Cdma,
                system_id.to_string(),
                network_id.to_string(),
                identity_field(*basestation_id)?,
                CDMA_CELL_PLACEHOLDER,
            )
        }
    };

    let status = if reading.is_registered() {
        RegistrationStatus::Registered
    } else {
        RegistrationStatus::Neighbor
    };

    Some(NormalizedCellRecord {
        technology,
        status,
        mcc,
        mnc,
        area_code,
        cell_id,
        signal_dbm: reading.signal_dbm(),
    })
}

/// Normalize a whole snapshot, dropping malformed readings
pub fn normalize_all(readings: &[RawCellReading], api_level: u32) -> Vec<NormalizedCellRecord> {
    readings
        .iter()
        .filter_map(|reading| {
            let record = normalize(reading, api_level);
            if record.is_none() {
                trace!("Dropped malformed cell reading: {:?}", reading);
            }
            record
        })
        .collect()
}

/// MCC/MNC must be present as a non-empty decimal digit string
fn carrier_code(code: &Option<String>) -> Option<String> {
    code.as_deref()
        .filter(|c| !c.is_empty() && c.bytes().all(|b| b.is_ascii_digit()))
        .map(str::to_string)
}

fn identity_field(value: i32) -> Option<i64> {
    if value == UNAVAILABLE || value == -1 {
        None
    } else {
        Some(value as i64)
    }
}

/// NR cell identities are 36 bits wide; only the low 32 bits are kept so
/// keys stay compatible with logs written by earlier builds. Distinct NCIs
/// can collide after truncation.
fn truncate_nci(nci: i64) -> Option<i64> {
    if nci == UNAVAILABLE_LONG || nci == -1 {
        None
    } else {
        Some(nci & 0xFFFF_FFFF)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const API: u32 = 34;

    fn lte(mcc: Option<&str>, mnc: Option<&str>, tac: i32, ci: i32) -> RawCellReading {
        RawCellReading::Lte {
            registered: true,
            signal_dbm: Some(-97),
            mcc: mcc.map(str::to_string),
            mnc: mnc.map(str::to_string),
            tac,
            ci,
        }
    }

    fn nr(nci: i64) -> RawCellReading {
        RawCellReading::Nr {
            registered: false,
            signal_dbm: None,
            mcc: Some("310".to_string()),
            mnc: Some("260".to_string()),
            tac: 100,
            nci,
        }
    }

    fn cdma(system_id: i32, network_id: i32, basestation_id: i32) -> RawCellReading {
        RawCellReading::Cdma {
            registered: true,
            signal_dbm: Some(-80),
            system_id,
            network_id,
            basestation_id,
        }
    }

    #[test]
    fn test_lte_record_matches_input() {
        let record = normalize(&lte(Some("310"), Some("260"), 11801, 26744321), API).unwrap();
        assert_eq!(record.technology, RadioTech::Lte);
        assert_eq!(record.status, RegistrationStatus::Registered);
        assert_eq!(record.mcc, "310");
        assert_eq!(record.mnc, "260");
        assert_eq!(record.area_code, 11801);
        assert_eq!(record.cell_id, 26744321);
        assert_eq!(record.signal_dbm, Some(-97));
        assert_eq!(record.composite_key(), "310_260_11801_26744321");
    }

    #[test]
    fn test_gsm_and_wcdma_use_lac_and_cid() {
        let gsm = RawCellReading::Gsm {
            registered: false,
            signal_dbm: Some(-71),
            mcc: Some("234".to_string()),
            mnc: Some("15".to_string()),
            lac: 0,
            cid: UNAVAILABLE - 1,
        };
        let record = normalize(&gsm, API).unwrap();
        assert_eq!(record.technology, RadioTech::Gsm);
        assert_eq!(record.status, RegistrationStatus::Neighbor);
        assert_eq!(record.area_code, 0);
        assert_eq!(record.cell_id, (UNAVAILABLE - 1) as i64);

        let wcdma = RawCellReading::Wcdma {
            registered: true,
            signal_dbm: None,
            mcc: Some("234".to_string()),
            mnc: Some("015".to_string()),
            lac: 4,
            cid: 5,
        };
        let record = normalize(&wcdma, API).unwrap();
        assert_eq!(record.technology, RadioTech::Wcdma);
        assert_eq!(record.composite_key(), "234_015_4_5");
    }

    #[test]
    fn test_missing_carrier_codes_rejected() {
        assert!(normalize(&lte(None, Some("260"), 1, 2), API).is_none());
        assert!(normalize(&lte(Some("310"), None, 1, 2), API).is_none());
        assert!(normalize(&lte(Some(""), Some("260"), 1, 2), API).is_none());
        assert!(normalize(&lte(Some("31a"), Some("260"), 1, 2), API).is_none());
    }

    #[test]
    fn test_sentinel_identity_fields_rejected() {
        assert!(normalize(&lte(Some("310"), Some("260"), UNAVAILABLE, 2), API).is_none());
        assert!(normalize(&lte(Some("310"), Some("260"), 1, UNAVAILABLE), API).is_none());
        assert!(normalize(&lte(Some("310"), Some("260"), -1, 2), API).is_none());
        assert!(normalize(&lte(Some("310"), Some("260"), 1, -1), API).is_none());
    }

    #[test]
    fn test_nr_cell_id_truncated_to_low_32_bits() {
        let record = normalize(&nr(0x1_0000_0001), API).unwrap();
        assert_eq!(record.technology, RadioTech::Nr);
        assert_eq!(record.cell_id, 1);

        let record = normalize(&nr(0xF_FFFF_FFFF), API).unwrap();
        assert_eq!(record.cell_id, 0xFFFF_FFFF);
    }

    #[test]
    fn test_nr_sentinels_rejected() {
        assert!(normalize(&nr(UNAVAILABLE_LONG), API).is_none());
        assert!(normalize(&nr(-1), API).is_none());
    }

    #[test]
    fn test_nr_requires_api_level() {
        assert!(normalize(&nr(42), NR_MIN_API_LEVEL - 1).is_none());
        assert!(normalize(&nr(42), NR_MIN_API_LEVEL).is_some());
    }

    #[test]
    fn test_cdma_substitutes_system_and_network_ids() {
        let record = normalize(&cdma(5, 7, 9), API).unwrap();
        assert_eq!(record.technology, RadioTech::Cdma);
        assert_eq!(record.composite_key(), "5_7_9_0");
    }

    #[test]
    fn test_cdma_sentinels_rejected() {
        assert!(normalize(&cdma(UNAVAILABLE, 7, 9), API).is_none());
        assert!(normalize(&cdma(5, UNAVAILABLE, 9), API).is_none());
        assert!(normalize(&cdma(5, 7, UNAVAILABLE), API).is_none());
        assert!(normalize(&cdma(5, 7, -1), API).is_none());
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let reading = lte(Some("310"), Some("260"), 11801, 26744321);
        assert_eq!(normalize(&reading, API), normalize(&reading, API));
    }

    #[test]
    fn test_normalize_all_drops_malformed() {
        let readings = vec![
            lte(Some("310"), Some("260"), 1, 2),
            lte(None, None, 1, 2),
            cdma(UNAVAILABLE, 7, 9),
            nr(0x1_0000_0001),
        ];
        let records = normalize_all(&readings, API);
        let keys: Vec<String> = records.iter().map(|r| r.composite_key()).collect();
        assert_eq!(keys, vec!["310_260_1_2", "310_260_100_1"]);
    }

    #[test]
    fn test_numeric_codes_normalize_like_strings() {
        let json = r#"[{"type": "lte", "registered": true, "dbm": -97,
                        "mcc": 310, "mnc": 260, "tac": 11801, "ci": 26744321}]"#;
        let readings = reading::parse_readings(json).unwrap();
        let record = normalize(&readings[0], API).unwrap();
        assert_eq!(record.composite_key(), "310_260_11801_26744321");
        assert!(record.is_registered());
    }

    #[test]
    fn test_display() {
        assert_eq!(RadioTech::Nr.to_string(), "5G NR");
        let record = normalize(&nr(7), API).unwrap();
        assert_eq!(record.to_string(), "5G NR Neighbor 310_260_100_7 signal=-");
    }
}
