//! HisarMod 2019.1 parser (text-tabular container)
//!
//! One frame per line, 1024 comma-separated complex tokens in `I+Qi` /
//! `I-Qi` form. The file carries `20 SNRs x 26 modulations x 500
//! frames = 260 000` lines, ordered first by SNR ascending from -20 dB
//! in +2 dB steps, then by the fixed [`MODULATION_SERIES`] code
//! sequence, then by frame index. Every 500 lines one signal is
//! finalized and inserted.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::debug;

use crate::dataset::DatasetKind;
use crate::error::{DatasetError, DatasetResult};
use crate::modulation::ModulationName;
use crate::store::DatasetStore;
use crate::types::{FrameData, IqPoint, SignalData};

const KIND: DatasetKind = DatasetKind::HisarMod2019;

/// Physical order of the modulation codes within each SNR block.
pub const MODULATION_SERIES: [u32; 26] = [
    4, 14, 44, 32, 2, 12, 22, 34, 23, 3, 13, 54, 30, 0, 40, 10, 50, 20, 51, 21, 61, 31, 1, 41, 11,
    24,
];

/// Map a dataset modulation code to its name.
pub fn modulation_for_code(code: u32) -> Option<ModulationName> {
    use ModulationName::*;
    let name = match code {
        // PSK
        0 => Bpsk,
        10 => Qpsk,
        20 => Psk8,
        30 => Psk16,
        40 => Psk32,
        50 => Psk64,
        // QAM
        1 => Qam4,
        11 => Qam8,
        21 => Qam16,
        31 => Qam32,
        41 => Qam64,
        51 => Qam128,
        61 => Qam256,
        // FSK
        2 => Fsk2,
        12 => Fsk4,
        22 => Fsk8,
        32 => Fsk16,
        // PAM
        3 => Pam4,
        13 => Pam8,
        23 => Pam16,
        // analog
        4 => AmDsb,
        14 => AmDsbSc,
        24 => AmUsb,
        34 => AmLsb,
        44 => Fm,
        54 => Pm,
        _ => return None,
    };
    Some(name)
}

/// Parse a complex token like `1.5+2.25i` or `-0.5-0.75i`.
///
/// A possible leading sign belongs to the real part, so the search for
/// the inner separator sign starts after it; sign characters inside an
/// exponent (`1e-3`) are skipped as well.
fn parse_point(token: &str) -> DatasetResult<IqPoint> {
    let bad = || DatasetError::format(format!("invalid complex token ({})", token));
    let bytes = token.as_bytes();

    let skip = usize::from(matches!(bytes.first(), Some(b'+') | Some(b'-')));
    let sep = (skip + 1..bytes.len())
        .find(|&i| {
            (bytes[i] == b'+' || bytes[i] == b'-')
                && !matches!(bytes[i - 1], b'e' | b'E')
        })
        .ok_or_else(bad)?;

    let imag_str = token[sep..].strip_suffix('i').ok_or_else(bad)?;
    let re = token[..sep].parse::<f32>().map_err(|_| bad())?;
    let im = imag_str.parse::<f32>().map_err(|_| bad())?;

    Ok(IqPoint::new(re, im))
}

/// Parse one line into a frame of exactly `frame_len` points.
fn parse_line(line: &str, frame_len: usize) -> DatasetResult<FrameData> {
    let mut frame = Vec::with_capacity(frame_len);

    for token in line.split(',') {
        frame.push(parse_point(token.trim())?);
    }

    if frame.len() != frame_len {
        return Err(DatasetError::format(format!(
            "line holds {} points, expected {}",
            frame.len(),
            frame_len
        )));
    }

    Ok(frame)
}

/// Modulation and SNR implied by a zero-based line number.
fn line_coordinates(line_nr: usize) -> DatasetResult<(ModulationName, i32)> {
    let lines_per_snr = KIND.frames_per_mod_snr() * KIND.modulation_count();

    let snr_db = -20 + 2 * (line_nr / lines_per_snr) as i32;
    let series_index = (line_nr % lines_per_snr) / KIND.frames_per_mod_snr();
    let code = MODULATION_SERIES[series_index];
    let name = modulation_for_code(code)
        .ok_or_else(|| DatasetError::format(format!("unmapped modulation code {}", code)))?;

    Ok((name, snr_db))
}

/// Parse the whole file into a complete store.
pub fn parse_file(path: &Path) -> DatasetResult<DatasetStore> {
    parse_reader(BufReader::new(File::open(path)?))
}

/// Parse from any buffered reader; one frame per line.
pub fn parse_reader<R: BufRead>(reader: R) -> DatasetResult<DatasetStore> {
    let frames_per_combination = KIND.frames_per_mod_snr();
    let total_lines = frames_per_combination * KIND.modulation_count() * KIND.snr_count();

    let mut store = DatasetStore::new();
    let mut signal = SignalData::new();
    let mut line_nr = 0usize;

    for line in reader.lines() {
        let line = line?;

        if line_nr >= total_lines {
            return Err(DatasetError::format(format!(
                "more than {} lines in file",
                total_lines
            )));
        }

        let (name, snr_db) = line_coordinates(line_nr)?;
        signal.push_frame(parse_line(&line, KIND.frame_length())?);

        if (line_nr + 1) % frames_per_combination == 0 {
            store.insert(name, snr_db, std::mem::take(&mut signal))?;
        }

        line_nr += 1;
    }

    if line_nr != total_lines {
        return Err(DatasetError::format(format!(
            "file holds {} lines, expected {}",
            line_nr, total_lines
        )));
    }

    store.check_cardinalities(KIND)?;

    debug!(entries = store.len(), "parsed {} container", KIND.label());
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complex_tokens() {
        assert_eq!(parse_point("1.5+2.25i").unwrap(), IqPoint::new(1.5, 2.25));
        assert_eq!(parse_point("-0.5-0.75i").unwrap(), IqPoint::new(-0.5, -0.75));
        assert_eq!(parse_point("-1-1i").unwrap(), IqPoint::new(-1.0, -1.0));
        assert_eq!(parse_point("2e-3+1.5e-2i").unwrap(), IqPoint::new(0.002, 0.015));
        assert_eq!(parse_point("0+0.5i").unwrap(), IqPoint::new(0.0, 0.5));

        assert!(parse_point("1.5").is_err());
        assert!(parse_point("1.5+2.25").is_err());
        assert!(parse_point("").is_err());
    }

    #[test]
    fn first_line_decode() {
        let mut tokens = vec!["1.5+2.25i".to_string(), "-0.5-0.75i".to_string()];
        tokens.extend(std::iter::repeat("0.1+0.1i".to_string()).take(1022));
        let line = tokens.join(",");

        let frame = parse_line(&line, 1024).unwrap();
        assert_eq!(frame[0], IqPoint::new(1.5, 2.25));
        assert_eq!(frame[1], IqPoint::new(-0.5, -0.75));

        let mut signal = SignalData::new();
        signal.push_frame(frame);
        assert_eq!(signal.max_abs, 2.25);
    }

    #[test]
    fn short_line_fails() {
        assert!(matches!(
            parse_line("1+1i,2+2i", 1024),
            Err(DatasetError::InputFormat(_))
        ));
    }

    #[test]
    fn line_number_mapping() {
        // first block: SNR -20, series code 4 -> AM-DSB
        assert_eq!(
            line_coordinates(0).unwrap(),
            (ModulationName::AmDsb, -20)
        );
        assert_eq!(
            line_coordinates(499).unwrap(),
            (ModulationName::AmDsb, -20)
        );
        // second series entry: code 14 -> AM-DSB SC
        assert_eq!(
            line_coordinates(500).unwrap(),
            (ModulationName::AmDsbSc, -20)
        );
        // last modulation of the first SNR block: code 24 -> AM-USB
        assert_eq!(
            line_coordinates(12_999).unwrap(),
            (ModulationName::AmUsb, -20)
        );
        // next SNR block
        assert_eq!(
            line_coordinates(13_000).unwrap(),
            (ModulationName::AmDsb, -18)
        );
        // last line of the file
        assert_eq!(
            line_coordinates(259_999).unwrap(),
            (ModulationName::AmUsb, 18)
        );
    }

    #[test]
    fn series_covers_every_mapped_code() {
        assert_eq!(MODULATION_SERIES.len(), 26);
        for code in MODULATION_SERIES {
            assert!(modulation_for_code(code).is_some(), "code {}", code);
        }

        // distinct names for distinct codes
        let mut names: Vec<ModulationName> = MODULATION_SERIES
            .iter()
            .map(|c| modulation_for_code(*c).unwrap())
            .collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 26);
    }

    #[test]
    fn empty_input_fails() {
        assert!(matches!(
            parse_reader(std::io::Cursor::new("")),
            Err(DatasetError::InputFormat(_))
        ));
    }

    #[test]
    fn truncated_file_fails() {
        let line = vec!["1+1i"; 1024].join(",");
        let text = format!("{}\n{}\n", line, line);
        assert!(matches!(
            parse_reader(std::io::Cursor::new(text)),
            Err(DatasetError::InputFormat(_))
        ));
    }
}
