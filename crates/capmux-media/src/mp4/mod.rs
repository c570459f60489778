//! Progressive MP4 (ISO BMFF) serialization.
//!
//! - `boxes` - structural box writers (ftyp, moov and children, mdat header)
//! - `sample_table` - stbl construction from recorded sample metadata

pub mod boxes;
pub mod sample_table;
