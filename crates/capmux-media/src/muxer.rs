//! Progressive MP4 muxing session.
//!
//! [`Mp4Muxer`] owns the container's structural lifecycle: track
//! registration at open, deferred header commit, interleaved sample
//! writing, and trailer emission at close.
//!
//! The header (`ftyp` plus the open-ended `mdat`) is irrevocable once the
//! first byte is on disk, but the video track's sample description needs
//! the H.264 parameter sets, and those are only observable in the first
//! keyframe's bitstream. Header commit is therefore deferred until that
//! keyframe arrives; audio packets seen before then are buffered, and
//! non-key video packets are rejected so the file starts on a sync sample.
//!
//! The session is synchronous and not internally locked: callers must
//! serialize `write` calls (and anything racing `open`/`close`) behind one
//! exclusive lock. Every call may block on storage.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::codec::{aac, avc};
use crate::config::{AudioConfig, MediaPacket, PacketKind, VideoConfig};
use crate::error::{Error, Result};
use crate::interleave::{Interleaver, StagedSample};
use crate::mp4::boxes::{self, MOVIE_TIMESCALE};
use crate::mp4::sample_table::{self, SampleInfo};
use crate::timebase::{self, TimeBase};

const VIDEO_TRACK: usize = 0;
const AUDIO_TRACK: usize = 1;
const TRACK_COUNT: usize = 2;

/// Session lifecycle. Transitions only move forward; the guard on leaving
/// `StructurallyOpen` is that video parameter sets are known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    /// Tracks declared and sink opened; no bytes on disk yet.
    StructurallyOpen,
    /// Header committed; accepting packets.
    Active,
    /// A structural write failed. Subsequent writes are rejected; only
    /// `close` remains useful.
    Failed,
    /// Trailer committed (or skipped) and sink released.
    Finalized,
}

/// Runtime state for one registered track.
#[derive(Debug)]
struct TrackState {
    time_base: TimeBase,
    samples: Vec<SampleInfo>,
    /// Accumulated duration in track timescale units.
    total_duration: u64,
    /// Last rescaled pts, for monotonicity checking.
    last_pts: Option<i64>,
}

impl TrackState {
    fn new(time_base: TimeBase) -> Self {
        Self {
            time_base,
            samples: Vec::new(),
            total_duration: 0,
            last_pts: None,
        }
    }
}

/// Per-session write counters, snapshotted via [`Mp4Muxer::stats`].
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct MuxStats {
    /// Video packets accepted.
    pub video_packets: u64,
    /// Audio packets accepted (including those buffered before header commit).
    pub audio_packets: u64,
    /// Payload bytes physically written to mdat.
    pub payload_bytes: u64,
    /// Packets rejected without touching the file.
    pub rejected_packets: u64,
}

/// Progressive MP4 muxer writing one H.264 video track and one AAC-LC
/// audio track.
///
/// ```ignore
/// let mut muxer = Mp4Muxer::open("capture.mp4", video_config, audio_config)?;
/// muxer.write(&packet)?;
/// muxer.close()?;
/// ```
pub struct Mp4Muxer {
    writer: Option<BufWriter<File>>,
    path: PathBuf,
    state: SessionState,
    video: VideoConfig,
    audio: AudioConfig,
    tracks: [TrackState; TRACK_COUNT],
    /// SPS/PPS lifted from the first keyframe.
    parameter_sets: Option<avc::ParameterSets>,
    /// Audio staged before header commit, flushed into the interleaver
    /// at commit time.
    pending_audio: Vec<StagedSample>,
    interleaver: Interleaver,
    header_committed: bool,
    /// File position of the mdat box opening (size field to patch).
    mdat_pos: u64,
    stats: MuxStats,
}

impl Mp4Muxer {
    /// Open a muxing session: validate both configs, create the output
    /// file, and register the video (track 1) and audio (track 2) tracks.
    ///
    /// No container bytes are written yet; the header is committed on the
    /// first packet write once the video parameter sets are known.
    pub fn open(path: impl AsRef<Path>, video: VideoConfig, audio: AudioConfig) -> Result<Self> {
        video.validate()?;
        audio.validate()?;

        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;

        info!(
            path = %path.display(),
            width = video.width,
            height = video.height,
            frame_rate = video.frame_rate,
            sample_rate = audio.sample_rate,
            channels = audio.channels,
            "muxing session opened"
        );

        let tracks = [
            TrackState::new(TimeBase::MICROS),
            TrackState::new(TimeBase::new(audio.sample_rate)),
        ];

        Ok(Self {
            writer: Some(BufWriter::new(file)),
            path,
            state: SessionState::StructurallyOpen,
            video,
            audio,
            tracks,
            parameter_sets: None,
            pending_audio: Vec::new(),
            interleaver: Interleaver::new(TRACK_COUNT),
            header_committed: false,
            mdat_pos: 0,
            stats: MuxStats::default(),
        })
    }

    /// Write one encoded packet.
    ///
    /// Recoverable rejections ([`Error::AwaitingKeyframe`],
    /// [`Error::InvalidPacket`]) leave the session fully usable. I/O
    /// failures mark the session failed; the caller should stop sending
    /// packets and proceed to [`Mp4Muxer::close`].
    pub fn write(&mut self, packet: &MediaPacket) -> Result<()> {
        match self.state {
            SessionState::Finalized => {
                return Err(Error::InvalidState("write after close"));
            }
            SessionState::Failed => {
                return Err(Error::InvalidState("session failed; only close is valid"));
            }
            SessionState::StructurallyOpen | SessionState::Active => {}
        }

        match packet.kind {
            PacketKind::Video => self.write_video(packet),
            PacketKind::Audio => self.write_audio(packet),
        }
    }

    /// Finalize the session. Idempotent.
    ///
    /// If the header was committed, drains the interleaver, patches the
    /// mdat size, and writes the moov trailer. With no packets ever
    /// written the trailer is skipped and the call succeeds. Resources are
    /// released unconditionally, even when the trailer write fails.
    pub fn close(&mut self) -> Result<()> {
        if self.state == SessionState::Finalized {
            return Ok(());
        }

        if !self.pending_audio.is_empty() {
            warn!(
                buffered = self.pending_audio.len(),
                "dropping audio buffered before header commit; no keyframe ever arrived"
            );
        }

        let result = if self.header_committed {
            self.write_trailer()
        } else {
            // Samples only reach the interleaver once the header is down.
            debug_assert!(self.interleaver.is_empty());
            debug!("header never committed; skipping trailer");
            Ok(())
        };

        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.flush() {
                warn!(error = %e, "flush on close failed");
            }
        }
        self.pending_audio.clear();
        self.state = SessionState::Finalized;

        info!(
            path = %self.path.display(),
            video_packets = self.stats.video_packets,
            audio_packets = self.stats.audio_packets,
            payload_bytes = self.stats.payload_bytes,
            "muxing session closed"
        );
        result
    }

    /// Snapshot the session's write counters.
    pub fn stats(&self) -> MuxStats {
        self.stats
    }

    /// Path of the output file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_video(&mut self, packet: &MediaPacket) -> Result<()> {
        if self.parameter_sets.is_none() {
            if !packet.is_keyframe {
                self.stats.rejected_packets += 1;
                warn!(
                    pts_micros = packet.pts_micros,
                    "video packet precedes first keyframe; rejected"
                );
                return Err(Error::AwaitingKeyframe);
            }
            match avc::extract_parameter_sets(&packet.data) {
                Some(sets) => {
                    debug!(
                        sps_len = sets.sps.len(),
                        pps_len = sets.pps.len(),
                        "extracted parameter sets from first keyframe"
                    );
                    self.parameter_sets = Some(sets);
                }
                None => {
                    self.stats.rejected_packets += 1;
                    return Err(Error::invalid_packet(
                        "keyframe carries no SPS/PPS parameter sets",
                    ));
                }
            }
        }

        let data = avc::to_length_prefixed(&packet.data);
        if data.is_empty() {
            self.stats.rejected_packets += 1;
            return Err(Error::invalid_packet("access unit has no sample data"));
        }

        self.ensure_header_committed()?;

        let sample = self.stage_sample(VIDEO_TRACK, packet, data, packet.is_keyframe);
        self.stats.video_packets += 1;
        self.interleaver.push(sample);
        self.drain_ready()
    }

    fn write_audio(&mut self, packet: &MediaPacket) -> Result<()> {
        let sample = self.stage_sample(AUDIO_TRACK, packet, packet.data.clone(), true);
        self.stats.audio_packets += 1;

        if !self.header_committed {
            // Header commit waits on the first video keyframe; hold audio
            // until then so it lands after the header in submission order.
            self.pending_audio.push(sample);
            return Ok(());
        }

        self.interleaver.push(sample);
        self.drain_ready()
    }

    /// Rescale a packet's timing into its track's time base and wrap the
    /// payload as a staged sample. dts equals pts throughout: encoder
    /// output order is presentation order.
    fn stage_sample(
        &mut self,
        track_index: usize,
        packet: &MediaPacket,
        data: Vec<u8>,
        is_sync: bool,
    ) -> StagedSample {
        let track = &mut self.tracks[track_index];
        let pts = timebase::rescale(packet.pts_micros, TimeBase::MICROS, track.time_base);
        let duration =
            timebase::rescale(packet.duration_micros, TimeBase::MICROS, track.time_base);

        if let Some(last) = track.last_pts {
            if pts < last {
                warn!(
                    track = track_index,
                    pts,
                    last,
                    "non-monotonic timestamp; accepting as-is"
                );
            }
        }
        track.last_pts = Some(pts);

        StagedSample {
            track: track_index,
            pts_micros: packet.pts_micros,
            duration_ticks: u32::try_from(duration.max(0)).unwrap_or(u32::MAX),
            is_sync,
            data,
        }
    }

    /// Commit the header (ftyp + mdat opening) exactly once, then release
    /// any audio buffered while waiting for the keyframe.
    fn ensure_header_committed(&mut self) -> Result<()> {
        if self.header_committed {
            return Ok(());
        }

        // Guard on the StructurallyOpen -> Active transition: committing
        // without the video decoder configuration would fix an invalid
        // header layout forever.
        if self.parameter_sets.is_none() {
            return Err(Error::MissingCodecConfig("H.264 parameter sets"));
        }

        if let Err(e) = self.commit_header() {
            self.state = SessionState::Failed;
            error!(error = %e, "header commit failed; session is unusable");
            return Err(e);
        }

        self.header_committed = true;
        self.state = SessionState::Active;
        info!(path = %self.path.display(), "container header committed");

        for sample in std::mem::take(&mut self.pending_audio) {
            self.interleaver.push(sample);
        }
        self.drain_ready()
    }

    fn commit_header(&mut self) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or(Error::InvalidState("sink already released"))?;
        writer.write_all(&boxes::write_ftyp())?;
        self.mdat_pos = writer.stream_position()?;
        writer.write_all(&boxes::mdat_placeholder())?;
        writer.flush()?;
        Ok(())
    }

    /// Write out every interleaver sample that is safe to order.
    fn drain_ready(&mut self) -> Result<()> {
        while let Some(sample) = self.interleaver.pop_ready() {
            self.write_sample(sample)?;
        }
        Ok(())
    }

    /// Append one sample to mdat and record its metadata for the trailer.
    fn write_sample(&mut self, sample: StagedSample) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or(Error::InvalidState("sink already released"))?;

        let offset = match append_payload(writer, &sample.data) {
            Ok(offset) => offset,
            Err(e) => {
                self.state = SessionState::Failed;
                error!(error = %e, track = sample.track, "physical write failed");
                return Err(e);
            }
        };

        let track = &mut self.tracks[sample.track];
        track.samples.push(SampleInfo {
            offset,
            size: sample.data.len() as u32,
            duration: sample.duration_ticks,
            is_sync: sample.is_sync,
        });
        track.total_duration += sample.duration_ticks as u64;
        self.stats.payload_bytes += sample.data.len() as u64;
        Ok(())
    }

    /// Drain remaining samples, patch the mdat size, and write moov.
    fn write_trailer(&mut self) -> Result<()> {
        while let Some(sample) = self.interleaver.pop_any() {
            self.write_sample(sample)?;
        }

        let moov = self.build_moov()?;

        let writer = self
            .writer
            .as_mut()
            .ok_or(Error::InvalidState("sink already released"))?;

        let end = writer.stream_position()?;
        let mdat_size = end - self.mdat_pos;
        writer.seek(SeekFrom::Start(self.mdat_pos + 8))?;
        writer.write_all(&mdat_size.to_be_bytes())?;
        writer.seek(SeekFrom::Start(end))?;

        writer.write_all(&moov)?;
        writer.flush()?;

        info!(
            mdat_bytes = mdat_size,
            moov_bytes = moov.len(),
            video_samples = self.tracks[VIDEO_TRACK].samples.len(),
            audio_samples = self.tracks[AUDIO_TRACK].samples.len(),
            "container trailer committed"
        );
        Ok(())
    }

    fn build_moov(&self) -> Result<Vec<u8>> {
        let sets = self
            .parameter_sets
            .as_ref()
            .ok_or(Error::MissingCodecConfig("H.264 parameter sets"))?;
        let avcc = avc::build_avcc(sets);
        let esds = aac::build_esds(self.audio.sample_rate, self.audio.channels, self.audio.bitrate)
            .ok_or(Error::MissingCodecConfig("AAC AudioSpecificConfig"))?;

        let video = &self.tracks[VIDEO_TRACK];
        let audio = &self.tracks[AUDIO_TRACK];
        let movie_tb = TimeBase::new(MOVIE_TIMESCALE);

        let video_movie_dur =
            timebase::rescale(video.total_duration as i64, video.time_base, movie_tb) as u64;
        let audio_movie_dur =
            timebase::rescale(audio.total_duration as i64, audio.time_base, movie_tb) as u64;
        let movie_duration = video_movie_dur.max(audio_movie_dur);

        let video_stsd = boxes::write_video_stsd(self.video.width, self.video.height, &avcc);
        let video_stbl = sample_table::write_stbl(&video_stsd, &video.samples, false);
        let video_trak = boxes::write_video_trak(
            1,
            video.time_base.ticks_per_second,
            video.total_duration,
            video_movie_dur,
            self.video.width,
            self.video.height,
            &video_stbl,
        );

        let audio_stsd =
            boxes::write_audio_stsd(self.audio.sample_rate, self.audio.channels, &esds);
        let audio_stbl = sample_table::write_stbl(&audio_stsd, &audio.samples, true);
        let audio_trak = boxes::write_audio_trak(
            2,
            audio.time_base.ticks_per_second,
            audio.total_duration,
            audio_movie_dur,
            &audio_stbl,
        );

        Ok(boxes::write_moov(
            MOVIE_TIMESCALE,
            movie_duration,
            &[&video_trak, &audio_trak],
        ))
    }
}

fn append_payload(writer: &mut BufWriter<File>, data: &[u8]) -> Result<u64> {
    let offset = writer.stream_position()?;
    writer.write_all(data)?;
    Ok(offset)
}

impl Drop for Mp4Muxer {
    fn drop(&mut self) {
        if self.state != SessionState::Finalized {
            if let Err(e) = self.close() {
                warn!(error = %e, "implicit close on drop failed");
            }
        }
    }
}

impl std::fmt::Debug for Mp4Muxer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mp4Muxer")
            .field("path", &self.path)
            .field("state", &self.state)
            .field("header_committed", &self.header_committed)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
