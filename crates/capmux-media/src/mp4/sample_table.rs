//! Sample table (stbl) construction from recorded sample metadata.
//!
//! The muxer appends payloads to mdat as they arrive and records one
//! `SampleInfo` per sample; this module turns those records into the
//! stts/stsz/stsc/co64 (and stss) tables the moov trailer carries.
//! Every sample is written as its own chunk, so stsc is a single entry
//! and the chunk offset table has one entry per sample.

use super::boxes::{fullbox_header, write_box, write_container_box};

/// Metadata for one sample written to mdat.
#[derive(Debug, Clone)]
pub(crate) struct SampleInfo {
    /// Absolute byte offset of the sample in the file.
    pub offset: u64,
    /// Sample size in bytes.
    pub size: u32,
    /// Sample duration in track timescale units.
    pub duration: u32,
    /// Whether this is a sync sample (keyframe).
    pub is_sync: bool,
}

/// stts: run-length encoded sample durations.
fn write_stts(samples: &[SampleInfo]) -> Vec<u8> {
    let mut runs: Vec<(u32, u32)> = Vec::new();
    for sample in samples {
        match runs.last_mut() {
            Some((count, delta)) if *delta == sample.duration => *count += 1,
            _ => runs.push((1, sample.duration)),
        }
    }

    let mut content = Vec::with_capacity(8 + runs.len() * 8);
    content.extend_from_slice(&fullbox_header(0, 0));
    content.extend_from_slice(&(runs.len() as u32).to_be_bytes());
    for (count, delta) in runs {
        content.extend_from_slice(&count.to_be_bytes());
        content.extend_from_slice(&delta.to_be_bytes());
    }
    write_box(b"stts", &content)
}

/// stsz: per-sample sizes (sample_size field zero, explicit table).
fn write_stsz(samples: &[SampleInfo]) -> Vec<u8> {
    let mut content = Vec::with_capacity(12 + samples.len() * 4);
    content.extend_from_slice(&fullbox_header(0, 0));
    content.extend_from_slice(&0u32.to_be_bytes()); // sample_size: not uniform
    content.extend_from_slice(&(samples.len() as u32).to_be_bytes());
    for sample in samples {
        content.extend_from_slice(&sample.size.to_be_bytes());
    }
    write_box(b"stsz", &content)
}

/// stsc: one sample per chunk, single run covering every chunk.
fn write_stsc(sample_count: usize) -> Vec<u8> {
    let mut content = Vec::with_capacity(8 + 12);
    content.extend_from_slice(&fullbox_header(0, 0));
    if sample_count == 0 {
        content.extend_from_slice(&0u32.to_be_bytes());
    } else {
        content.extend_from_slice(&1u32.to_be_bytes()); // entry count
        content.extend_from_slice(&1u32.to_be_bytes()); // first_chunk
        content.extend_from_slice(&1u32.to_be_bytes()); // samples_per_chunk
        content.extend_from_slice(&1u32.to_be_bytes()); // sample_description_index
    }
    write_box(b"stsc", &content)
}

/// co64: 64-bit chunk offsets, one per sample.
fn write_co64(samples: &[SampleInfo]) -> Vec<u8> {
    let mut content = Vec::with_capacity(8 + samples.len() * 8);
    content.extend_from_slice(&fullbox_header(0, 0));
    content.extend_from_slice(&(samples.len() as u32).to_be_bytes());
    for sample in samples {
        content.extend_from_slice(&sample.offset.to_be_bytes());
    }
    write_box(b"co64", &content)
}

/// stss: 1-based indices of sync samples.
fn write_stss(samples: &[SampleInfo]) -> Vec<u8> {
    let sync_indices: Vec<u32> = samples
        .iter()
        .enumerate()
        .filter(|(_, s)| s.is_sync)
        .map(|(idx, _)| idx as u32 + 1)
        .collect();

    let mut content = Vec::with_capacity(8 + sync_indices.len() * 4);
    content.extend_from_slice(&fullbox_header(0, 0));
    content.extend_from_slice(&(sync_indices.len() as u32).to_be_bytes());
    for index in sync_indices {
        content.extend_from_slice(&index.to_be_bytes());
    }
    write_box(b"stss", &content)
}

/// Assemble the full stbl for a track.
///
/// `all_sync` marks tracks (audio) where every sample is a sync sample;
/// per ISO 14496-12 the absence of stss means exactly that, so the box is
/// omitted there and written only for video.
pub(crate) fn write_stbl(stsd: &[u8], samples: &[SampleInfo], all_sync: bool) -> Vec<u8> {
    let stts = write_stts(samples);
    let stsz = write_stsz(samples);
    let stsc = write_stsc(samples.len());
    let co64 = write_co64(samples);

    if all_sync {
        write_container_box(b"stbl", &[stsd, &stts, &stsc, &stsz, &co64])
    } else {
        let stss = write_stss(samples);
        write_container_box(b"stbl", &[stsd, &stts, &stsc, &stsz, &stss, &co64])
    }
}
