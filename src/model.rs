//! Records decoded from the stream process and the snapshot handed back to
//! callers once a harvest stops.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// Record
// ============================================================================

/// One decoded JSON line from the stream process.
///
/// Only the `class` tag is required; everything else is kept verbatim so the
/// record can be handed to formatting code untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Record class tag (e.g. `"SKY"`, `"TPV"`, `"VERSION"`)
    pub class: String,

    /// All remaining fields of the JSON object
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    /// Decodes a single output line.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the line is not a JSON object with a string `class`.
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line.trim())
    }

    /// Returns `true` if the record carries `key`, whatever its value.
    pub fn has(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Deserializes the record into a typed view such as [`SkyView`].
    ///
    /// # Errors
    ///
    /// Returns `Err` if the record's fields do not match the view.
    pub fn view<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.fields.clone()))
    }
}

// ============================================================================
// Typed views
// ============================================================================

/// Sky view: satellites currently visible to the receiver.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SkyView {
    pub device: Option<String>,

    #[serde(default)]
    pub satellites: Vec<Satellite>,
}

impl SkyView {
    /// Number of satellites flagged `used` in the current solution.
    pub fn used_count(&self) -> usize {
        self.satellites.iter().filter(|s| s.used).count()
    }

    pub fn visible_count(&self) -> usize {
        self.satellites.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Satellite {
    #[serde(default)]
    pub used: bool,
}

/// Time-position-velocity view.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TpvView {
    pub device: Option<String>,

    /// Raw NMEA fix mode (0 = unknown, 1 = no fix, 2 = 2D, 3 = 3D)
    #[serde(default)]
    pub mode: u8,

    pub lat: f64,
    pub lon: f64,

    /// Altitude above the WGS84 ellipsoid, meters
    #[serde(rename = "altHAE")]
    pub alt_hae: Option<f64>,

    /// ISO 8601 timestamp of the fix
    pub time: Option<String>,
}

impl TpvView {
    pub fn fix_mode(&self) -> FixMode {
        FixMode::from(self.mode)
    }
}

/// Classification of the receiver's fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixMode {
    Unknown,
    NoFix,
    TwoD,
    ThreeD,
}

impl From<u8> for FixMode {
    fn from(mode: u8) -> Self {
        match mode {
            1 => Self::NoFix,
            2 => Self::TwoD,
            3 => Self::ThreeD,
            _ => Self::Unknown,
        }
    }
}

// ============================================================================
// Slots
// ============================================================================

/// The two write-once holders filled during a harvest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Sky,
    Tpv,
}

/// Latched records for one harvest.
///
/// A slot is written at most once; later qualifying records for a filled
/// slot are ignored.
#[derive(Debug, Default)]
pub struct Slots {
    sky: Option<Record>,
    tpv: Option<Record>,
}

impl Slots {
    /// Latches `record` into `slot` if it is still empty.
    ///
    /// Returns `true` when the record was stored.
    pub fn latch(&mut self, slot: Slot, record: Record) -> bool {
        let target = match slot {
            Slot::Sky => &mut self.sky,
            Slot::Tpv => &mut self.tpv,
        };
        if target.is_some() {
            return false;
        }
        *target = Some(record);
        true
    }

    pub fn is_filled(&self, slot: Slot) -> bool {
        match slot {
            Slot::Sky => self.sky.is_some(),
            Slot::Tpv => self.tpv.is_some(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.sky.is_some() && self.tpv.is_some()
    }

    /// Freezes the slots into the caller-facing snapshot.
    pub fn into_result(self) -> HarvestResult {
        HarvestResult {
            sky: self.sky,
            tpv: self.tpv,
        }
    }
}

// ============================================================================
// HarvestResult
// ============================================================================

/// Snapshot returned once harvesting stops.
///
/// Either slot may be empty when the deadline fired or the stream closed
/// first; a partial result is a valid outcome.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HarvestResult {
    sky: Option<Record>,
    tpv: Option<Record>,
}

impl HarvestResult {
    pub fn sky(&self) -> Option<&Record> {
        self.sky.as_ref()
    }

    pub fn tpv(&self) -> Option<&Record> {
        self.tpv.as_ref()
    }

    pub fn is_complete(&self) -> bool {
        self.sky.is_some() && self.tpv.is_some()
    }

    /// Typed sky view, `None` if the slot is empty or does not decode.
    pub fn sky_view(&self) -> Option<SkyView> {
        self.sky.as_ref().and_then(|r| r.view().ok())
    }

    /// Typed TPV view, `None` if the slot is empty or does not decode.
    pub fn tpv_view(&self) -> Option<TpvView> {
        self.tpv.as_ref().and_then(|r| r.view().ok())
    }
}

// ============================================================================
// Tests
// ============================================================================
