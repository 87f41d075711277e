//! RadioML 2016.10A parser (serialized-object container)
//!
//! The pickle decoder itself is a black box behind [`PickleSource`]; it
//! hands back one flat dict-literal text of the form
//!
//! ```text
//! {('QPSK', -4): (array([0.1, -0.2, ...]), ...), ('BPSK', 6): (...), ...}
//! ```
//!
//! Each key region starts at an opening parenthesis and holds the quoted
//! modulation alias plus the SNR after a `", "` separator. The next
//! parenthesis opens the value region whose bracketed list carries
//! `frame_length x frames x 2` floats: within each frame-sized stride the
//! first half is the I stream and the second half the Q stream.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::dataset::DatasetKind;
use crate::error::{DatasetError, DatasetResult};
use crate::modulation::ModulationName;
use crate::store::DatasetStore;
use crate::types::{IqPoint, SignalData};

const KIND: DatasetKind = DatasetKind::RadioMl2016;

/// Black-box decoder from the on-disk container to the flat dict text.
pub trait PickleSource {
    fn load_text(&self, path: &Path) -> DatasetResult<String>;
}

/// Default source: reads the file as UTF-8 text. Stands in for the
/// serialized-object decoder when the container has already been
/// flattened to its textual representation.
#[derive(Debug, Default)]
pub struct TextFileSource;

impl PickleSource for TextFileSource {
    fn load_text(&self, path: &Path) -> DatasetResult<String> {
        Ok(fs::read_to_string(path)?)
    }
}

/// Parser for the RadioML 2016.10A container
#[derive(Debug, Default)]
pub struct PklParser<S = TextFileSource> {
    source: S,
}

impl PklParser<TextFileSource> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S: PickleSource> PklParser<S> {
    pub fn with_source(source: S) -> Self {
        Self { source }
    }

    pub fn parse_file(&self, path: &Path) -> DatasetResult<DatasetStore> {
        let text = self.source.load_text(path)?;
        parse_text(&text)
    }
}

/// Parse the decoded dict text into a complete store.
pub fn parse_text(text: &str) -> DatasetResult<DatasetStore> {
    let store = scan_entries(text)?;
    store.check_cardinalities(KIND)?;

    debug!(
        entries = store.len(),
        "parsed {} container",
        KIND.label()
    );
    Ok(store)
}

/// Scan all key/value regions into a store, without the final
/// cardinality check.
fn scan_entries(text: &str) -> DatasetResult<DatasetStore> {
    let expected = KIND.frame_length() * KIND.frames_per_mod_snr() * 2;
    let mut store = DatasetStore::new();
    let mut pos = 0;

    while let Some(rel) = text[pos..].find('(') {
        let key_open = pos + rel;
        let key_close = key_open
            + 1
            + text[key_open + 1..]
                .find(')')
                .ok_or_else(|| DatasetError::format("unterminated key tuple"))?;
        let (name, snr_db) = parse_key(&text[key_open + 1..key_close])?;

        let val_open = key_close
            + text[key_close..]
                .find('(')
                .ok_or_else(|| DatasetError::format("key without value tuple"))?;
        let val_close = val_open
            + 1
            + text[val_open + 1..]
                .find(')')
                .ok_or_else(|| DatasetError::format("unterminated value tuple"))?;

        let floats = parse_float_list(&text[val_open + 1..val_close], expected)?;
        let signal = build_signal(&floats, KIND.frame_length(), KIND.frames_per_mod_snr());
        store.insert(name, snr_db, signal)?;

        pos = val_close + 1;
    }

    Ok(store)
}

/// Extract `('<alias>', <snr>)` from the inside of a key tuple.
fn parse_key(key: &str) -> DatasetResult<(ModulationName, i32)> {
    let quote_open = key
        .find('\'')
        .ok_or_else(|| DatasetError::format("key without quoted modulation"))?;
    let quote_close = quote_open
        + 1
        + key[quote_open + 1..]
            .find('\'')
            .ok_or_else(|| DatasetError::format("unclosed quote in key"))?;
    let name = ModulationName::from_alias(&key[quote_open + 1..quote_close]);

    let separator = key[quote_close..]
        .find(", ")
        .map(|i| quote_close + i)
        .ok_or_else(|| DatasetError::format("key without SNR separator"))?;
    let snr_db = key[separator + 2..]
        .trim()
        .parse::<i32>()
        .map_err(|_| DatasetError::format(format!("invalid SNR in key ({})", key)))?;

    Ok((name, snr_db))
}

/// Tokenize the bracketed list into floats and check the count.
fn parse_float_list(value: &str, expected: usize) -> DatasetResult<Vec<f32>> {
    let list_open = value
        .find('[')
        .ok_or_else(|| DatasetError::format("value without data list"))?;
    let list_close = list_open
        + 1
        + value[list_open + 1..]
            .find(']')
            .ok_or_else(|| DatasetError::format("unterminated data list"))?;

    let mut floats = Vec::with_capacity(expected);

    for token in value[list_open + 1..list_close].split(',') {
        let v = token
            .trim()
            .parse::<f32>()
            .map_err(|_| DatasetError::format(format!("invalid float token ({})", token.trim())))?;
        floats.push(v);
    }

    if floats.len() != expected {
        return Err(DatasetError::format(format!(
            "data list holds {} floats, expected {}",
            floats.len(),
            expected
        )));
    }

    Ok(floats)
}

/// Reshape a flat float array into frames. Within each frame-sized
/// stride the first `frame_len` floats are I and the next `frame_len`
/// are Q. The caller guarantees `floats.len() == frames * frame_len * 2`.
fn build_signal(floats: &[f32], frame_len: usize, frames: usize) -> SignalData {
    let mut signal = SignalData::new();

    for frame in 0..frames {
        let base = frame * 2 * frame_len;
        let mut points = Vec::with_capacity(frame_len);

        for pt in 0..frame_len {
            points.push(IqPoint::new(floats[base + pt], floats[base + pt + frame_len]));
        }

        signal.push_frame(points);
    }

    signal
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One full-size value list: per frame, `frame_len` ones (I) then
    /// `frame_len` twos (Q).
    fn ones_twos_list(frame_len: usize, frames: usize) -> String {
        let mut out = String::new();
        for _ in 0..frames {
            for _ in 0..frame_len {
                out.push_str("1.0, ");
            }
            for _ in 0..frame_len {
                out.push_str("2.0, ");
            }
        }
        out.truncate(out.len() - 2);
        out
    }

    fn single_entry_text() -> String {
        format!(
            "{{('QPSK', -4): (array([{}]), dtype)}}",
            ones_twos_list(128, 1000)
        )
    }

    #[test]
    fn build_signal_splits_frame_halves() {
        // two frames, each: [1, 1, 2, 2] -> points (1, 2)
        let floats = [1.0, 1.0, 2.0, 2.0, 1.0, 1.0, 2.0, 2.0];
        let signal = build_signal(&floats, 2, 2);

        assert_eq!(signal.frame_count(), 2);
        for frame in &signal.frames {
            assert_eq!(frame, &vec![IqPoint::new(1.0, 2.0); 2]);
        }
        assert_eq!(signal.max_abs, 2.0);
    }

    #[test]
    fn single_key_scans_but_fails_cardinality() {
        let text = single_entry_text();

        let store = scan_entries(&text).unwrap();
        assert_eq!(store.len(), 1);

        let signal = store.get(ModulationName::Qpsk, -4).unwrap();
        assert_eq!(signal.frame_count(), 1000);
        assert_eq!(signal.frames[0], vec![IqPoint::new(1.0, 2.0); 128]);
        assert_eq!(signal.max_abs, 2.0);

        // one modulation and one SNR cannot satisfy (11, 20)
        assert!(matches!(
            parse_text(&text),
            Err(DatasetError::InputFormat(_))
        ));
    }

    #[test]
    fn empty_input_fails() {
        assert!(matches!(parse_text(""), Err(DatasetError::InputFormat(_))));
    }

    #[test]
    fn missing_separator_fails() {
        let text = "{('QPSK' -4): (array([1.0]), dtype)}";
        assert!(matches!(
            scan_entries(text),
            Err(DatasetError::InputFormat(_))
        ));
    }

    #[test]
    fn unclosed_quote_fails() {
        let text = "{('QPSK, -4): (array([1.0]), dtype)}";
        assert!(matches!(
            scan_entries(text),
            Err(DatasetError::InputFormat(_))
        ));
    }

    #[test]
    fn wrong_float_count_fails() {
        let text = "{('QPSK', -4): (array([1.0, 2.0]), dtype)}";
        assert!(matches!(
            scan_entries(text),
            Err(DatasetError::InputFormat(_))
        ));
    }

    #[test]
    fn duplicate_key_fails() {
        let list = ones_twos_list(128, 1000);
        let text = format!(
            "{{('QPSK', -4): (array([{list}]), d), ('QPSK', -4): (array([{list}]), d)}}",
        );
        assert!(matches!(
            scan_entries(&text),
            Err(DatasetError::InputFormat(_))
        ));
    }
}
