//! H.264 / AVC bitstream handling.
//!
//! Hardware and software encoders alike emit Annex-B access units: NAL units
//! prefixed with 3- or 4-byte start codes, with SPS/PPS bundled ahead of the
//! IDR slice on keyframes. MP4 carries none of that framing — parameter sets
//! live in the sample description's avcC record and each in-sample NAL is
//! prefixed with its big-endian length instead of a start code. This module
//! does both conversions.

/// H.264 NAL unit type constants (low 5 bits of the NAL header byte).
pub mod nal_unit_type {
    pub const SPS: u8 = 7;
    pub const PPS: u8 = 8;
}

/// Sequence and picture parameter sets lifted from a keyframe bitstream,
/// stored without start codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterSets {
    pub sps: Vec<u8>,
    pub pps: Vec<u8>,
}

/// Split an Annex-B buffer into NAL unit payloads (start codes stripped).
///
/// Handles both 3-byte (`00 00 01`) and 4-byte (`00 00 00 01`) start codes.
/// A buffer with no start codes at all is treated as a single raw NAL unit.
pub fn split_nal_units(data: &[u8]) -> Vec<&[u8]> {
    // (start code position, payload position) per unit
    let mut marks: Vec<(usize, usize)> = Vec::new();
    let mut i = 0;
    while i + 2 < data.len() {
        if data[i] == 0 && data[i + 1] == 0 {
            if data[i + 2] == 1 {
                marks.push((i, i + 3));
                i += 3;
                continue;
            }
            if i + 3 < data.len() && data[i + 2] == 0 && data[i + 3] == 1 {
                marks.push((i, i + 4));
                i += 4;
                continue;
            }
        }
        i += 1;
    }

    if marks.is_empty() {
        return if data.is_empty() { Vec::new() } else { vec![data] };
    }

    let mut units = Vec::with_capacity(marks.len());
    for (idx, &(_, payload_start)) in marks.iter().enumerate() {
        let end = if idx + 1 < marks.len() {
            marks[idx + 1].0
        } else {
            data.len()
        };
        if payload_start < end {
            units.push(&data[payload_start..end]);
        }
    }
    units
}

/// Extract SPS and PPS from an Annex-B access unit.
///
/// Returns `None` unless both are present; the first occurrence of each wins.
pub fn extract_parameter_sets(data: &[u8]) -> Option<ParameterSets> {
    let mut sps: Option<Vec<u8>> = None;
    let mut pps: Option<Vec<u8>> = None;

    for nal in split_nal_units(data) {
        match nal[0] & 0x1F {
            nal_unit_type::SPS if sps.is_none() => sps = Some(nal.to_vec()),
            nal_unit_type::PPS if pps.is_none() => pps = Some(nal.to_vec()),
            _ => {}
        }
    }

    Some(ParameterSets {
        sps: sps?,
        pps: pps?,
    })
}

/// Build the AVCDecoderConfigurationRecord (avcC box content).
///
/// Profile, compatibility, and level bytes come straight out of the SPS.
pub fn build_avcc(sets: &ParameterSets) -> Vec<u8> {
    let sps = &sets.sps;
    let pps = &sets.pps;

    let mut out = Vec::with_capacity(11 + sps.len() + pps.len());
    out.push(1); // configurationVersion
    out.push(sps.get(1).copied().unwrap_or(0x64)); // AVCProfileIndication
    out.push(sps.get(2).copied().unwrap_or(0x00)); // profile_compatibility
    out.push(sps.get(3).copied().unwrap_or(0x1F)); // AVCLevelIndication
    out.push(0xFF); // lengthSizeMinusOne = 3 (4-byte lengths) | reserved
    out.push(0xE1); // numOfSequenceParameterSets = 1 | reserved
    out.extend_from_slice(&(sps.len() as u16).to_be_bytes());
    out.extend_from_slice(sps);
    out.push(1); // numOfPictureParameterSets
    out.extend_from_slice(&(pps.len() as u16).to_be_bytes());
    out.extend_from_slice(pps);
    out
}

/// Convert an Annex-B access unit into the length-prefixed sample form.
///
/// SPS and PPS units are carried in avcC and stripped from the sample;
/// every remaining NAL gets a 4-byte big-endian length prefix. Returns an
/// empty vector when the access unit contains no sample-worthy NALs.
pub fn to_length_prefixed(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 8);
    for nal in split_nal_units(data) {
        let nal_type = nal[0] & 0x1F;
        if nal_type == nal_unit_type::SPS || nal_type == nal_unit_type::PPS {
            continue;
        }
        out.extend_from_slice(&(nal.len() as u32).to_be_bytes());
        out.extend_from_slice(nal);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPS: &[u8] = &[0x67, 0x64, 0x00, 0x1F, 0xAC, 0xD9];
    const PPS: &[u8] = &[0x68, 0xEE, 0x3C, 0x80];
    const IDR: &[u8] = &[0x65, 0x88, 0x84, 0x00, 0x11, 0x22];

    /// Annex-B keyframe: 4-byte code + SPS, 4-byte code + PPS, 3-byte + IDR.
    fn keyframe() -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&[0, 0, 0, 1]);
        data.extend_from_slice(SPS);
        data.extend_from_slice(&[0, 0, 0, 1]);
        data.extend_from_slice(PPS);
        data.extend_from_slice(&[0, 0, 1]);
        data.extend_from_slice(IDR);
        data
    }

    #[test]
    fn test_split_mixed_start_codes() {
        let data = keyframe();
        let units = split_nal_units(&data);
        assert_eq!(units.len(), 3);
        assert_eq!(units[0], SPS);
        assert_eq!(units[1], PPS);
        assert_eq!(units[2], IDR);
    }

    #[test]
    fn test_split_without_start_codes() {
        let units = split_nal_units(IDR);
        assert_eq!(units, vec![IDR]);
        assert!(split_nal_units(&[]).is_empty());
    }

    #[test]
    fn test_extract_parameter_sets() {
        let sets = extract_parameter_sets(&keyframe()).unwrap();
        assert_eq!(sets.sps, SPS);
        assert_eq!(sets.pps, PPS);
    }

    #[test]
    fn test_extract_requires_both_sets() {
        let mut data = Vec::new();
        data.extend_from_slice(&[0, 0, 0, 1]);
        data.extend_from_slice(SPS);
        data.extend_from_slice(&[0, 0, 0, 1]);
        data.extend_from_slice(IDR);
        assert!(extract_parameter_sets(&data).is_none());
    }

    #[test]
    fn test_avcc_layout() {
        let sets = ParameterSets {
            sps: SPS.to_vec(),
            pps: PPS.to_vec(),
        };
        let avcc = build_avcc(&sets);

        assert_eq!(avcc[0], 1); // configurationVersion
        assert_eq!(avcc[1], SPS[1]); // profile from SPS
        assert_eq!(avcc[3], SPS[3]); // level from SPS
        assert_eq!(avcc[4], 0xFF); // 4-byte NAL lengths
        assert_eq!(avcc[5], 0xE1); // one SPS
        assert_eq!(&avcc[6..8], &(SPS.len() as u16).to_be_bytes());
        assert_eq!(&avcc[8..8 + SPS.len()], SPS);
        let pps_at = 8 + SPS.len();
        assert_eq!(avcc[pps_at], 1); // one PPS
        assert_eq!(&avcc[pps_at + 3..], PPS);
    }

    #[test]
    fn test_length_prefixed_strips_parameter_sets() {
        let sample = to_length_prefixed(&keyframe());

        // Only the IDR slice survives, with a 4-byte length prefix.
        let mut expected = Vec::new();
        expected.extend_from_slice(&(IDR.len() as u32).to_be_bytes());
        expected.extend_from_slice(IDR);
        assert_eq!(sample, expected);
    }

    #[test]
    fn test_length_prefixed_keeps_sei() {
        let sei = [0x06, 0x05, 0x01, 0xFF];
        let mut data = Vec::new();
        data.extend_from_slice(&[0, 0, 0, 1]);
        data.extend_from_slice(&sei);
        data.extend_from_slice(&[0, 0, 0, 1]);
        data.extend_from_slice(IDR);

        let sample = to_length_prefixed(&data);
        assert_eq!(&sample[..4], &(sei.len() as u32).to_be_bytes());
        assert_eq!(&sample[4..4 + sei.len()], &sei);
    }
}
