// ── Zone configuration codec ──
//
// Property 113 carries the mowing zones as base64 text over a 25-byte
// block: five 5-byte records, each three header bytes followed by the
// zone's (distance, ratio) pair. Header bytes are written as zero.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const ZONE_COUNT: usize = 5;
const RECORD_LEN: usize = 5;
const HEADER_LEN: usize = 3;
const BLOCK_LEN: usize = ZONE_COUNT * RECORD_LEN;

/// Failure to decode a zone block.
#[derive(Debug, Error)]
pub enum ZoneDecodeError {
    #[error("zone block is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("zone block is {len} bytes, expected at least {BLOCK_LEN}")]
    TooShort { len: usize },
}

/// One mowing zone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Zone {
    /// Distance from the base station along the boundary wire.
    pub distance: u8,
    /// Share of mowing time spent in this zone.
    pub ratio: u8,
}

impl Zone {
    pub const fn new(distance: u8, ratio: u8) -> Self {
        Self { distance, ratio }
    }
}

/// The mower's five zones. Immutable: build a new value to change it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ZoneConfig {
    zones: [Zone; ZONE_COUNT],
}

impl ZoneConfig {
    pub const fn new(zones: [Zone; ZONE_COUNT]) -> Self {
        Self { zones }
    }

    pub fn zones(&self) -> &[Zone; ZONE_COUNT] {
        &self.zones
    }

    /// Zone by 1-based number, as the mower's app labels them.
    pub fn zone(&self, number: usize) -> Option<Zone> {
        number
            .checked_sub(1)
            .and_then(|i| self.zones.get(i))
            .copied()
    }

    /// Decode the base64 text form. Bytes past the 25th are ignored.
    pub fn decode(encoded: &str) -> Result<Self, ZoneDecodeError> {
        let block = STANDARD.decode(encoded.trim())?;
        if block.len() < BLOCK_LEN {
            return Err(ZoneDecodeError::TooShort { len: block.len() });
        }

        let mut zones = [Zone::default(); ZONE_COUNT];
        for (zone, record) in zones.iter_mut().zip(block.chunks_exact(RECORD_LEN)) {
            *zone = Zone::new(record[HEADER_LEN], record[HEADER_LEN + 1]);
        }
        Ok(Self { zones })
    }

    /// Encode into the base64 text form the device expects.
    pub fn encode(&self) -> String {
        let mut block = [0u8; BLOCK_LEN];
        for (record, zone) in block.chunks_exact_mut(RECORD_LEN).zip(&self.zones) {
            record[HEADER_LEN] = zone.distance;
            record[HEADER_LEN + 1] = zone.ratio;
        }
        STANDARD.encode(block)
    }
}
