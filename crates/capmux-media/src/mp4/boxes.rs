//! ISO BMFF box writers for a progressive (moov-at-end) MP4.
//!
//! Each box follows the standard layout: 4-byte size (big-endian u32),
//! 4-byte type (ASCII), then box-specific content. The mdat box opens with
//! a 64-bit size placeholder that the muxer patches at finalization.

/// Movie-level timescale for mvhd/tkhd durations.
pub(crate) const MOVIE_TIMESCALE: u32 = 1_000;

// ---------------------------------------------------------------------------
// Low-level box writing helpers
// ---------------------------------------------------------------------------

/// Write a complete box: size (u32 BE) + type (4 ASCII bytes) + content.
pub(crate) fn write_box(box_type: &[u8; 4], content: &[u8]) -> Vec<u8> {
    let size = (8 + content.len()) as u32;
    let mut out = Vec::with_capacity(size as usize);
    out.extend_from_slice(&size.to_be_bytes());
    out.extend_from_slice(box_type);
    out.extend_from_slice(content);
    out
}

/// Write a container box (size + type + children concatenated).
pub(crate) fn write_container_box(box_type: &[u8; 4], children: &[&[u8]]) -> Vec<u8> {
    let children_len: usize = children.iter().map(|c| c.len()).sum();
    let size = (8 + children_len) as u32;
    let mut out = Vec::with_capacity(size as usize);
    out.extend_from_slice(&size.to_be_bytes());
    out.extend_from_slice(box_type);
    for child in children {
        out.extend_from_slice(child);
    }
    out
}

/// Write a full box header (version + flags).
pub(crate) fn fullbox_header(version: u8, flags: u32) -> [u8; 4] {
    let val = ((version as u32) << 24) | (flags & 0x00FF_FFFF);
    val.to_be_bytes()
}

// ---------------------------------------------------------------------------
// ftyp box
// ---------------------------------------------------------------------------

/// Generate the `ftyp` box.
/// Major brand: "isom", minor version: 0x200,
/// compatible brands: ["isom", "iso6", "mp41"].
pub(crate) fn write_ftyp() -> Vec<u8> {
    let mut content = Vec::with_capacity(4 + 4 + 3 * 4);
    content.extend_from_slice(b"isom");
    content.extend_from_slice(&0x200u32.to_be_bytes());
    content.extend_from_slice(b"isom");
    content.extend_from_slice(b"iso6");
    content.extend_from_slice(b"mp41");
    write_box(b"ftyp", &content)
}

// ---------------------------------------------------------------------------
// mdat box opening
// ---------------------------------------------------------------------------

/// The 16-byte `mdat` opening with a 64-bit size placeholder.
///
/// The size field is the extended-size marker (1) and the largesize is
/// zeroed; the muxer patches bytes 8..16 with the final box size once the
/// last sample lands.
pub(crate) fn mdat_placeholder() -> [u8; 16] {
    let mut hdr = [0u8; 16];
    hdr[..4].copy_from_slice(&1u32.to_be_bytes());
    hdr[4..8].copy_from_slice(b"mdat");
    hdr
}

// ---------------------------------------------------------------------------
// mvhd box (movie header, version 1 for 64-bit times)
// ---------------------------------------------------------------------------

pub(crate) fn write_mvhd(timescale: u32, duration: u64) -> Vec<u8> {
    let mut content = Vec::with_capacity(112);
    // version 1, flags 0
    content.extend_from_slice(&fullbox_header(1, 0));
    // creation_time / modification_time (u64)
    content.extend_from_slice(&0u64.to_be_bytes());
    content.extend_from_slice(&0u64.to_be_bytes());
    content.extend_from_slice(&timescale.to_be_bytes());
    content.extend_from_slice(&duration.to_be_bytes());
    // rate = 1.0 (fixed 16.16)
    content.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    // volume = 1.0 (fixed 8.8)
    content.extend_from_slice(&0x0100u16.to_be_bytes());
    // reserved (2 + 8 bytes)
    content.extend_from_slice(&[0u8; 10]);
    // Matrix (identity)
    content.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    content.extend_from_slice(&[0u8; 12]);
    content.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    content.extend_from_slice(&[0u8; 12]);
    content.extend_from_slice(&0x4000_0000u32.to_be_bytes());
    // Pre-defined (6 * u32)
    content.extend_from_slice(&[0u8; 24]);
    // Next track ID: video (1) and audio (2) are taken
    content.extend_from_slice(&3u32.to_be_bytes());

    write_box(b"mvhd", &content)
}

// ---------------------------------------------------------------------------
// tkhd box (track header, version 1)
// ---------------------------------------------------------------------------

/// `duration` is in movie timescale units, per the spec of tkhd.
pub(crate) fn write_tkhd(
    track_id: u32,
    duration: u64,
    is_video: bool,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let mut content = Vec::with_capacity(96);
    // version 1, flags = 3 (enabled | in_movie)
    content.extend_from_slice(&fullbox_header(1, 3));
    content.extend_from_slice(&0u64.to_be_bytes()); // creation_time
    content.extend_from_slice(&0u64.to_be_bytes()); // modification_time
    content.extend_from_slice(&track_id.to_be_bytes());
    content.extend_from_slice(&0u32.to_be_bytes()); // reserved
    content.extend_from_slice(&duration.to_be_bytes());
    content.extend_from_slice(&[0u8; 8]); // reserved
    content.extend_from_slice(&0u16.to_be_bytes()); // layer
    content.extend_from_slice(&0u16.to_be_bytes()); // alternate_group
    // volume: 1.0 for audio, 0 for video
    let volume: u16 = if is_video { 0 } else { 0x0100 };
    content.extend_from_slice(&volume.to_be_bytes());
    content.extend_from_slice(&0u16.to_be_bytes()); // reserved
    // Matrix (identity)
    content.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    content.extend_from_slice(&[0u8; 12]);
    content.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    content.extend_from_slice(&[0u8; 12]);
    content.extend_from_slice(&0x4000_0000u32.to_be_bytes());
    // Width and height (16.16 fixed point), zero for audio
    if is_video {
        content.extend_from_slice(&(width << 16).to_be_bytes());
        content.extend_from_slice(&(height << 16).to_be_bytes());
    } else {
        content.extend_from_slice(&[0u8; 8]);
    }

    write_box(b"tkhd", &content)
}

// ---------------------------------------------------------------------------
// mdhd box (media header, version 1)
// ---------------------------------------------------------------------------

pub(crate) fn write_mdhd(timescale: u32, duration: u64) -> Vec<u8> {
    let mut content = Vec::with_capacity(36);
    content.extend_from_slice(&fullbox_header(1, 0));
    content.extend_from_slice(&0u64.to_be_bytes()); // creation_time
    content.extend_from_slice(&0u64.to_be_bytes()); // modification_time
    content.extend_from_slice(&timescale.to_be_bytes());
    content.extend_from_slice(&duration.to_be_bytes());
    // language: undetermined (0x55C4)
    content.extend_from_slice(&0x55C4u16.to_be_bytes());
    content.extend_from_slice(&0u16.to_be_bytes()); // pre_defined

    write_box(b"mdhd", &content)
}

// ---------------------------------------------------------------------------
// hdlr box (handler reference)
// ---------------------------------------------------------------------------

pub(crate) fn write_hdlr(handler_type: &[u8; 4], name: &[u8]) -> Vec<u8> {
    let mut content = Vec::with_capacity(24 + name.len() + 1);
    content.extend_from_slice(&fullbox_header(0, 0));
    content.extend_from_slice(&0u32.to_be_bytes()); // pre_defined
    content.extend_from_slice(handler_type);
    content.extend_from_slice(&[0u8; 12]); // reserved
    content.extend_from_slice(name);
    content.push(0); // null terminator

    write_box(b"hdlr", &content)
}

// ---------------------------------------------------------------------------
// dinf + dref boxes (data information)
// ---------------------------------------------------------------------------

pub(crate) fn write_dinf() -> Vec<u8> {
    // url box, flags = 1 => media data in the same file
    let url_box = {
        let mut c = Vec::with_capacity(4);
        c.extend_from_slice(&fullbox_header(0, 1));
        write_box(b"url ", &c)
    };
    let dref_box = {
        let mut c = Vec::with_capacity(8 + url_box.len());
        c.extend_from_slice(&fullbox_header(0, 0));
        c.extend_from_slice(&1u32.to_be_bytes()); // entry count
        c.extend_from_slice(&url_box);
        write_box(b"dref", &c)
    };
    write_container_box(b"dinf", &[&dref_box])
}

// ---------------------------------------------------------------------------
// vmhd / smhd boxes (media information headers)
// ---------------------------------------------------------------------------

pub(crate) fn write_vmhd() -> Vec<u8> {
    let mut content = Vec::with_capacity(12);
    content.extend_from_slice(&fullbox_header(0, 1));
    content.extend_from_slice(&0u16.to_be_bytes()); // graphicsmode
    content.extend_from_slice(&[0u8; 6]); // opcolor
    write_box(b"vmhd", &content)
}

pub(crate) fn write_smhd() -> Vec<u8> {
    let mut content = Vec::with_capacity(8);
    content.extend_from_slice(&fullbox_header(0, 0));
    content.extend_from_slice(&0u16.to_be_bytes()); // balance
    content.extend_from_slice(&0u16.to_be_bytes()); // reserved
    write_box(b"smhd", &content)
}

// ---------------------------------------------------------------------------
// stsd boxes (sample descriptions)
// ---------------------------------------------------------------------------

/// Video sample description: avc1 entry wrapping the avcC record.
pub(crate) fn write_video_stsd(width: u32, height: u32, avcc_record: &[u8]) -> Vec<u8> {
    // Visual sample entry content
    let mut entry = Vec::with_capacity(78 + avcc_record.len() + 8);
    entry.extend_from_slice(&[0u8; 6]); // reserved
    entry.extend_from_slice(&1u16.to_be_bytes()); // data_reference_index
    entry.extend_from_slice(&[0u8; 16]); // pre_defined + reserved
    entry.extend_from_slice(&(width as u16).to_be_bytes());
    entry.extend_from_slice(&(height as u16).to_be_bytes());
    entry.extend_from_slice(&0x0048_0000u32.to_be_bytes()); // horiz res, 72 dpi
    entry.extend_from_slice(&0x0048_0000u32.to_be_bytes()); // vert res, 72 dpi
    entry.extend_from_slice(&0u32.to_be_bytes()); // reserved
    entry.extend_from_slice(&1u16.to_be_bytes()); // frame count
    entry.extend_from_slice(&[0u8; 32]); // compressor name
    entry.extend_from_slice(&0x0018u16.to_be_bytes()); // depth
    entry.extend_from_slice(&(-1i16).to_be_bytes()); // pre_defined

    entry.extend_from_slice(&write_box(b"avcC", avcc_record));

    let sample_entry_box = write_box(b"avc1", &entry);

    let mut stsd_content = Vec::with_capacity(8 + sample_entry_box.len());
    stsd_content.extend_from_slice(&fullbox_header(0, 0));
    stsd_content.extend_from_slice(&1u32.to_be_bytes()); // entry count
    stsd_content.extend_from_slice(&sample_entry_box);

    write_box(b"stsd", &stsd_content)
}

/// Audio sample description: mp4a entry wrapping the esds content.
pub(crate) fn write_audio_stsd(sample_rate: u32, channels: u16, esds_content: &[u8]) -> Vec<u8> {
    let mut entry = Vec::with_capacity(28 + esds_content.len() + 8);
    entry.extend_from_slice(&[0u8; 6]); // reserved
    entry.extend_from_slice(&1u16.to_be_bytes()); // data_reference_index
    entry.extend_from_slice(&[0u8; 8]); // reserved
    entry.extend_from_slice(&channels.to_be_bytes());
    entry.extend_from_slice(&16u16.to_be_bytes()); // sample size
    entry.extend_from_slice(&0u16.to_be_bytes()); // pre_defined
    entry.extend_from_slice(&0u16.to_be_bytes()); // reserved
    // Sample rate, 16.16 fixed point. The field caps at 65535 Hz; the
    // authoritative rate lives in the esds AudioSpecificConfig.
    entry.extend_from_slice(&(sample_rate.min(0xFFFF) << 16).to_be_bytes());

    entry.extend_from_slice(&write_box(b"esds", esds_content));

    let sample_entry_box = write_box(b"mp4a", &entry);

    let mut stsd_content = Vec::with_capacity(8 + sample_entry_box.len());
    stsd_content.extend_from_slice(&fullbox_header(0, 0));
    stsd_content.extend_from_slice(&1u32.to_be_bytes()); // entry count
    stsd_content.extend_from_slice(&sample_entry_box);

    write_box(b"stsd", &stsd_content)
}

// ---------------------------------------------------------------------------
// trak assembly
// ---------------------------------------------------------------------------

/// Assemble the video trak. `duration` is in track timescale units,
/// `movie_duration` in movie timescale units.
pub(crate) fn write_video_trak(
    track_id: u32,
    timescale: u32,
    duration: u64,
    movie_duration: u64,
    width: u32,
    height: u32,
    stbl: &[u8],
) -> Vec<u8> {
    let tkhd = write_tkhd(track_id, movie_duration, true, width, height);
    let mdhd = write_mdhd(timescale, duration);
    let hdlr = write_hdlr(b"vide", b"VideoHandler");
    let vmhd = write_vmhd();
    let dinf = write_dinf();
    let minf = write_container_box(b"minf", &[&vmhd, &dinf, stbl]);
    let mdia = write_container_box(b"mdia", &[&mdhd, &hdlr, &minf]);
    write_container_box(b"trak", &[&tkhd, &mdia])
}

/// Assemble the audio trak.
pub(crate) fn write_audio_trak(
    track_id: u32,
    timescale: u32,
    duration: u64,
    movie_duration: u64,
    stbl: &[u8],
) -> Vec<u8> {
    let tkhd = write_tkhd(track_id, movie_duration, false, 0, 0);
    let mdhd = write_mdhd(timescale, duration);
    let hdlr = write_hdlr(b"soun", b"SoundHandler");
    let smhd = write_smhd();
    let dinf = write_dinf();
    let minf = write_container_box(b"minf", &[&smhd, &dinf, stbl]);
    let mdia = write_container_box(b"mdia", &[&mdhd, &hdlr, &minf]);
    write_container_box(b"trak", &[&tkhd, &mdia])
}

// ---------------------------------------------------------------------------
// moov container
// ---------------------------------------------------------------------------

pub(crate) fn write_moov(timescale: u32, duration: u64, traks: &[&[u8]]) -> Vec<u8> {
    let mvhd = write_mvhd(timescale, duration);
    let mut children: Vec<&[u8]> = Vec::with_capacity(1 + traks.len());
    children.push(&mvhd);
    children.extend_from_slice(traks);
    write_container_box(b"moov", &children)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn read_u32(data: &[u8], offset: usize) -> u32 {
        u32::from_be_bytes([
            data[offset],
            data[offset + 1],
            data[offset + 2],
            data[offset + 3],
        ])
    }

    #[test]
    fn test_write_box_size_and_type() {
        let b = write_box(b"test", &[1, 2, 3]);
        assert_eq!(b.len(), 11);
        assert_eq!(read_u32(&b, 0), 11);
        assert_eq!(&b[4..8], b"test");
        assert_eq!(&b[8..], &[1, 2, 3]);
    }

    #[test]
    fn test_ftyp_box() {
        let ftyp = write_ftyp();
        assert_eq!(ftyp.len(), 28);
        assert_eq!(read_u32(&ftyp, 0), 28);
        assert_eq!(&ftyp[4..8], b"ftyp");
        assert_eq!(&ftyp[8..12], b"isom");
    }

    #[test]
    fn test_mdat_placeholder_layout() {
        let hdr = mdat_placeholder();
        assert_eq!(read_u32(&hdr, 0), 1); // extended size marker
        assert_eq!(&hdr[4..8], b"mdat");
        assert_eq!(&hdr[8..16], &[0u8; 8]); // largesize to be patched
    }

    #[test]
    fn test_mvhd_box_size() {
        let mvhd = write_mvhd(MOVIE_TIMESCALE, 0);
        // version-1 mvhd is 120 bytes total (8 header + 112 content)
        assert_eq!(mvhd.len(), 120);
        assert_eq!(&mvhd[4..8], b"mvhd");
        // next track ID sits in the last four bytes
        assert_eq!(read_u32(&mvhd, mvhd.len() - 4), 3);
    }

    #[test]
    fn test_tkhd_box_size() {
        let tkhd = write_tkhd(1, 1000, true, 1920, 1080);
        // version-1 tkhd is 104 bytes (8 header + 96 content)
        assert_eq!(tkhd.len(), 104);
        assert_eq!(read_u32(&tkhd, 0), 104);
    }

    #[test]
    fn test_mdhd_box_size() {
        let mdhd = write_mdhd(1_000_000, 0);
        assert_eq!(mdhd.len(), 44);
        assert_eq!(read_u32(&mdhd, 0), 44);
    }

    #[test]
    fn test_video_stsd_contains_avcc() {
        let record = vec![0x01, 0x64, 0x00, 0x1F, 0xFF, 0xE1, 0x00, 0x01, 0x67];
        let stsd = write_video_stsd(1280, 720, &record);
        assert_eq!(&stsd[4..8], b"stsd");
        let pos = stsd
            .windows(4)
            .position(|w| w == b"avcC")
            .expect("avcC box present");
        assert_eq!(&stsd[pos + 4..pos + 4 + record.len()], &record[..]);
    }

    #[test]
    fn test_audio_stsd_contains_esds() {
        let esds = vec![0, 0, 0, 0, 0x03, 0x05, 0, 1, 0, 0x05, 0x00];
        let stsd = write_audio_stsd(48_000, 2, &esds);
        assert!(stsd.windows(4).any(|w| w == b"esds"));
        // channel count lands right after the fixed audio entry prefix
        let mp4a = stsd.windows(4).position(|w| w == b"mp4a").unwrap();
        let channels_at = mp4a + 4 + 6 + 2 + 8;
        assert_eq!(&stsd[channels_at..channels_at + 2], &2u16.to_be_bytes());
    }

    #[test]
    fn test_trak_box_nesting() {
        let stbl = write_container_box(b"stbl", &[]);
        let trak = write_video_trak(1, 1_000_000, 2_000_000, 2_000, 1920, 1080, &stbl);
        assert_eq!(&trak[4..8], b"trak");
        assert_eq!(read_u32(&trak, 0) as usize, trak.len());
        for name in [&b"tkhd"[..], b"mdia", b"mdhd", b"hdlr", b"minf", b"vmhd", b"dinf", b"stbl"] {
            assert!(
                trak.windows(4).any(|w| w == name),
                "missing {:?}",
                std::str::from_utf8(name)
            );
        }
    }

    #[test]
    fn test_moov_spans_children() {
        let stbl = write_container_box(b"stbl", &[]);
        let vtrak = write_video_trak(1, 1_000_000, 0, 0, 640, 480, &stbl);
        let atrak = write_audio_trak(2, 48_000, 0, 0, &stbl);
        let moov = write_moov(MOVIE_TIMESCALE, 0, &[&vtrak, &atrak]);
        assert_eq!(&moov[4..8], b"moov");
        assert_eq!(read_u32(&moov, 0) as usize, moov.len());
        assert_eq!(moov.len(), 8 + 120 + vtrak.len() + atrak.len());
    }
}
