//! Medicine records decoded from the model's structured output
//!
//! The model is asked to follow a JSON schema, but nothing guarantees it did.
//! Every record is checked against that schema before it is shown; a single
//! bad record rejects the whole response.

use std::str::FromStr;

use serde::Deserialize;

/// Generic or branded product
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MedicineKind {
    Generic,
    Branded,
}

impl MedicineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MedicineKind::Generic => "Generic",
            MedicineKind::Branded => "Branded",
        }
    }
}

impl FromStr for MedicineKind {
    type Err = String;

    /// Case-insensitive, surrounding whitespace ignored
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "generic" => Ok(MedicineKind::Generic),
            "branded" => Ok(MedicineKind::Branded),
            _ => Err(format!("unknown medicine type {:?}", s)),
        }
    }
}

/// One structured medicine entry returned by the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MedicineRecord {
    pub name: String,
    pub kind: MedicineKind,
    pub common_use: String,
    pub price: String,
    pub instructions: String,
    /// Percentage in 0..=100
    pub effectiveness: u8,
    pub side_effects: String,
}

/// Wire shape of a record; every field is required
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMedicine {
    medicine_name: String,
    #[serde(rename = "type")]
    kind: String,
    common_use: String,
    price: String,
    instructions: String,
    effectiveness: i64,
    side_effects: String,
}

#[derive(Deserialize)]
struct RawMedicineList {
    #[serde(default)]
    medicines: Option<Vec<serde_json::Value>>,
}

impl TryFrom<RawMedicine> for MedicineRecord {
    type Error = String;

    fn try_from(raw: RawMedicine) -> Result<Self, Self::Error> {
        if raw.medicine_name.trim().is_empty() {
            return Err("medicineName is blank".to_string());
        }
        let kind: MedicineKind = raw.kind.parse()?;
        let effectiveness = u8::try_from(raw.effectiveness)
            .ok()
            .filter(|pct| *pct <= 100)
            .ok_or_else(|| format!("effectiveness {} outside 0..=100", raw.effectiveness))?;

        Ok(Self {
            name: raw.medicine_name,
            kind,
            common_use: raw.common_use,
            price: raw.price,
            instructions: raw.instructions,
            effectiveness,
            side_effects: raw.side_effects,
        })
    }
}

/// Decode the model's JSON text into validated records.
///
/// A missing or null `medicines` key decodes as an empty list. The error
/// string names the first problem found.
pub fn parse_medicines(json_text: &str) -> Result<Vec<MedicineRecord>, String> {
    let list: RawMedicineList =
        serde_json::from_str(json_text).map_err(|e| format!("response text is not valid JSON: {}", e))?;

    list.medicines
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(i, value)| {
            let raw: RawMedicine =
                serde_json::from_value(value).map_err(|e| format!("record {}: {}", i, e))?;
            MedicineRecord::try_from(raw).map_err(|e| format!("record {}: {}", i, e))
        })
        .collect()
}
