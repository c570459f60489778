//! Progressive MP4 muxing for screen-capture pipelines.
//!
//! Takes already-encoded H.264 video and AAC-LC audio packets and writes a
//! seekable MP4 file: `ftyp` and an open-ended `mdat` up front, samples
//! appended as they arrive, and the `moov` index committed at close.
//!
//! The entry point is [`Mp4Muxer`]:
//!
//! ```ignore
//! use capmux_media::{AudioCodec, AudioConfig, MediaPacket, Mp4Muxer, VideoCodec, VideoConfig};
//!
//! let video = VideoConfig {
//!     codec: VideoCodec::H264,
//!     width: 1920,
//!     height: 1080,
//!     frame_rate: 30,
//!     bitrate: 5_000_000,
//! };
//! let audio = AudioConfig {
//!     codec: AudioCodec::AacLc,
//!     sample_rate: 48_000,
//!     channels: 2,
//!     bitrate: 192_000,
//! };
//!
//! let mut muxer = Mp4Muxer::open("capture.mp4", video, audio)?;
//! muxer.write(&MediaPacket::video(annex_b_keyframe, 0, 33_333, true))?;
//! muxer.close()?;
//! # Ok::<(), capmux_media::Error>(())
//! ```
//!
//! Header commit is deferred until the first video keyframe so the H.264
//! parameter sets can be lifted into the sample description; see
//! [`muxer`] for the lifecycle details.

pub mod codec;
pub mod config;
pub mod error;
mod interleave;
pub mod mp4;
pub mod muxer;
pub mod timebase;

pub use config::{AudioCodec, AudioConfig, MediaPacket, PacketKind, VideoCodec, VideoConfig};
pub use error::{Error, Result};
pub use muxer::{Mp4Muxer, MuxStats};
pub use timebase::TimeBase;
