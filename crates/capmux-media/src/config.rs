//! Stream configuration and packet types — the muxer's input surface.
//!
//! Configs are immutable once passed to [`crate::muxer::Mp4Muxer::open`];
//! packets are consumed exactly once per write and never retained.

use serde::{Deserialize, Serialize};

use crate::codec::aac;
use crate::error::{Error, Result};

/// Video codec accepted by the muxer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoCodec {
    /// H.264 / AVC, Annex-B packetized, 4:2:0 planar source assumed.
    H264,
}

/// Audio codec accepted by the muxer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioCodec {
    /// AAC low complexity profile.
    AacLc,
}

/// Static configuration for the video track.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoConfig {
    /// Video codec.
    pub codec: VideoCodec,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Nominal frame rate in frames per second.
    pub frame_rate: u32,
    /// Target bitrate in bits per second.
    pub bitrate: u32,
}

impl VideoConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::invalid_config(format!(
                "video dimensions must be nonzero, got {}x{}",
                self.width, self.height
            )));
        }
        // tkhd stores dimensions as 16.16 fixed point and the visual sample
        // entry as u16, so anything wider cannot be represented.
        if self.width > 0xFFFF || self.height > 0xFFFF {
            return Err(Error::invalid_config(format!(
                "video dimensions must fit in 16 bits, got {}x{}",
                self.width, self.height
            )));
        }
        if self.frame_rate == 0 {
            return Err(Error::invalid_config("video frame rate must be nonzero"));
        }
        Ok(())
    }
}

/// Static configuration for the audio track.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Audio codec.
    pub codec: AudioCodec,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Number of channels.
    pub channels: u16,
    /// Target bitrate in bits per second.
    pub bitrate: u32,
}

impl AudioConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        // The decoder configuration must be derivable from the negotiated
        // rate and channel count, so reject combinations the
        // AudioSpecificConfig cannot express up front.
        if aac::audio_specific_config(self.sample_rate, self.channels).is_none() {
            return Err(Error::invalid_config(format!(
                "unsupported AAC configuration: {} Hz, {} channels",
                self.sample_rate, self.channels
            )));
        }
        Ok(())
    }
}

/// Packet track kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PacketKind {
    Video,
    Audio,
}

/// One encoded frame handed to the muxer.
///
/// Timestamps are absolute and in microseconds for both kinds; the muxer
/// rescales them into each track's native time base.
#[derive(Debug, Clone)]
pub struct MediaPacket {
    /// Which track this packet belongs to.
    pub kind: PacketKind,
    /// Compressed payload bytes. For video, an Annex-B access unit.
    pub data: Vec<u8>,
    /// Presentation timestamp in microseconds.
    pub pts_micros: i64,
    /// Duration in microseconds.
    pub duration_micros: i64,
    /// Keyframe flag. Only meaningful for video; ignored for audio,
    /// where every sample is a sync sample.
    pub is_keyframe: bool,
}

impl MediaPacket {
    /// Build a video packet.
    pub fn video(data: Vec<u8>, pts_micros: i64, duration_micros: i64, is_keyframe: bool) -> Self {
        Self {
            kind: PacketKind::Video,
            data,
            pts_micros,
            duration_micros,
            is_keyframe,
        }
    }

    /// Build an audio packet.
    pub fn audio(data: Vec<u8>, pts_micros: i64, duration_micros: i64) -> Self {
        Self {
            kind: PacketKind::Audio,
            data,
            pts_micros,
            duration_micros,
            is_keyframe: false,
        }
    }
}
