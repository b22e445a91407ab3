//! Maps decoded records onto the slot they may fill.

use crate::model::{Record, Slot};

pub const SKY_CLASS: &str = "SKY";
pub const TPV_CLASS: &str = "TPV";

/// Outcome of inspecting one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassUpdate {
    None,
    SetSky,
    SetTpv,
}

impl ClassUpdate {
    pub fn slot(self) -> Option<Slot> {
        match self {
            Self::None => None,
            Self::SetSky => Some(Slot::Sky),
            Self::SetTpv => Some(Slot::Tpv),
        }
    }
}

/// A `SKY` record qualifies when it lists `satellites`; a `TPV` record
/// qualifies when it carries both `lat` and `lon`. Everything else is
/// ignored. Whether the slot is still free is the caller's concern.
pub fn classify(record: &Record) -> ClassUpdate {
    match record.class.as_str() {
        SKY_CLASS if record.has("satellites") => ClassUpdate::SetSky,
        TPV_CLASS if record.has("lat") && record.has("lon") => ClassUpdate::SetTpv,
        _ => ClassUpdate::None,
    }
}
