//! Codec-specific out-of-band configuration handling.
//!
//! - `avc` - Annex-B NAL parsing, SPS/PPS extraction, avcC construction
//! - `aac` - AudioSpecificConfig derivation and esds construction

pub mod aac;
pub mod avc;
