//! AAC decoder configuration (AudioSpecificConfig and esds).
//!
//! The AudioSpecificConfig is derived from the negotiated sample rate and
//! channel count. A fixed byte pair tied to one rate/channel profile would
//! silently produce a spec-violating file the moment the encoder negotiates
//! anything else, so no hardcoded configuration exists here.

/// MPEG-4 sampling frequency index table (ISO 14496-3).
const SAMPLING_FREQUENCIES: [u32; 13] = [
    96_000, 88_200, 64_000, 48_000, 44_100, 32_000, 24_000, 22_050, 16_000, 12_000, 11_025, 8_000,
    7_350,
];

/// AAC-LC audio object type.
const OBJECT_TYPE_AAC_LC: u16 = 2;

/// Look up the sampling frequency index for a sample rate.
/// Returns `None` for rates the table cannot express.
pub fn sampling_frequency_index(sample_rate: u32) -> Option<u8> {
    SAMPLING_FREQUENCIES
        .iter()
        .position(|&rate| rate == sample_rate)
        .map(|idx| idx as u8)
}

/// Build the two-byte AudioSpecificConfig for AAC-LC.
///
/// Layout: 5 bits object type, 4 bits frequency index, 4 bits channel
/// configuration, 3 bits zero padding.
pub fn audio_specific_config(sample_rate: u32, channels: u16) -> Option<[u8; 2]> {
    let freq_index = sampling_frequency_index(sample_rate)?;
    // Channel configurations 1-7 map directly to channel counts.
    if channels == 0 || channels > 7 {
        return None;
    }

    let bits = (OBJECT_TYPE_AAC_LC << 11) | ((freq_index as u16) << 7) | (channels << 3);
    Some(bits.to_be_bytes())
}

/// Build the esds box content: fullbox header plus the ES_Descriptor
/// wrapping a DecoderConfigDescriptor and the AudioSpecificConfig.
pub fn build_esds(sample_rate: u32, channels: u16, bitrate: u32) -> Option<Vec<u8>> {
    let asc = audio_specific_config(sample_rate, channels)?;

    // Descriptor lengths, innermost out. All stay below 128 so single-byte
    // length encoding suffices.
    let dec_specific_len = asc.len();
    let decoder_config_len = 13 + 2 + dec_specific_len;
    let es_len = 3 + 2 + decoder_config_len + 3;

    let mut out = Vec::with_capacity(4 + 2 + es_len);
    out.extend_from_slice(&[0, 0, 0, 0]); // version + flags

    out.push(0x03); // ES_Descriptor tag
    out.push(es_len as u8);
    out.extend_from_slice(&1u16.to_be_bytes()); // ES_ID
    out.push(0); // no stream dependence, URL, or OCR

    out.push(0x04); // DecoderConfigDescriptor tag
    out.push(decoder_config_len as u8);
    out.push(0x40); // objectTypeIndication: MPEG-4 Audio
    out.push(0x15); // streamType: audio
    out.extend_from_slice(&[0, 0, 0]); // bufferSizeDB
    out.extend_from_slice(&bitrate.to_be_bytes()); // maxBitrate
    out.extend_from_slice(&bitrate.to_be_bytes()); // avgBitrate

    out.push(0x05); // DecoderSpecificInfo tag
    out.push(dec_specific_len as u8);
    out.extend_from_slice(&asc);

    out.extend_from_slice(&[0x06, 0x01, 0x02]); // SLConfigDescriptor

    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frequency_index_table() {
        assert_eq!(sampling_frequency_index(48_000), Some(3));
        assert_eq!(sampling_frequency_index(44_100), Some(4));
        assert_eq!(sampling_frequency_index(8_000), Some(11));
        assert_eq!(sampling_frequency_index(48_001), None);
    }

    #[test]
    fn test_asc_44100_stereo() {
        // The well-known AAC-LC 44.1 kHz stereo configuration.
        assert_eq!(audio_specific_config(44_100, 2), Some([0x12, 0x10]));
    }

    #[test]
    fn test_asc_48000_stereo() {
        // 48 kHz stereo is 0x11 0x90, not the 0x12 0x10 pair often
        // mislabeled as "48 kHz" (which actually encodes 44.1 kHz).
        assert_eq!(audio_specific_config(48_000, 2), Some([0x11, 0x90]));
    }

    #[test]
    fn test_asc_mono() {
        // AOT 2, freq index 3, channel config 1.
        assert_eq!(audio_specific_config(48_000, 1), Some([0x11, 0x88]));
    }

    #[test]
    fn test_asc_rejects_unexpressible_input() {
        assert_eq!(audio_specific_config(96_001, 2), None);
        assert_eq!(audio_specific_config(48_000, 0), None);
        assert_eq!(audio_specific_config(48_000, 8), None);
    }

    #[test]
    fn test_esds_descriptor_layout() {
        let esds = build_esds(48_000, 2, 128_000).unwrap();

        assert_eq!(&esds[0..4], &[0, 0, 0, 0]); // fullbox header
        assert_eq!(esds[4], 0x03); // ES_Descriptor tag
        assert_eq!(esds[5] as usize, esds.len() - 6); // ES length spans the rest
        assert_eq!(&esds[6..8], &[0x00, 0x01]); // ES_ID
        assert_eq!(esds[9], 0x04); // DecoderConfigDescriptor tag
        assert_eq!(esds[11], 0x40); // MPEG-4 Audio
        assert_eq!(esds[12], 0x15); // audio stream
        assert_eq!(&esds[16..20], &128_000u32.to_be_bytes()); // maxBitrate
        assert_eq!(&esds[20..24], &128_000u32.to_be_bytes()); // avgBitrate
        assert_eq!(esds[24], 0x05); // DecoderSpecificInfo tag
        assert_eq!(esds[25], 2);
        assert_eq!(&esds[26..28], &[0x11, 0x90]); // derived ASC
        assert_eq!(&esds[28..], &[0x06, 0x01, 0x02]); // SLConfig
    }
}
