//! RadioML 2018.01 parser (hierarchical-scientific container)
//!
//! The container holds three root-level datasets: `X` of shape
//! `(2 555 904, 1024, 2)` (the I/Q cube), `Y` of shape `(2 555 904, 24)`
//! (one-hot modulation) and `Z` of shape `(2 555 904, 1)` (SNR). The
//! full cube is ~19.5 GB, so only the contiguous slab of one
//! caller-chosen modulation (~832 MB) is ever read.
//!
//! Rows are ordered first by modulation in the fixed
//! [`MODULATION_ORDER`], then by SNR ascending from -20 dB in +2 dB
//! steps, then by frame index. The container decoder itself is a black
//! box behind [`ContainerSource`]; the parser only interprets the
//! enumerated shapes and the raw float slab.

use tracing::debug;

use crate::dataset::DatasetKind;
use crate::error::{DatasetError, DatasetResult};
use crate::modulation::ModulationName;
use crate::store::DatasetStore;
use crate::types::{IqPoint, SignalData};

const KIND: DatasetKind = DatasetKind::RadioMl2018;

/// Physical row order of the 24 modulations in the container.
pub const MODULATION_ORDER: [ModulationName; 24] = [
    // ASK
    ModulationName::Ook,
    ModulationName::Ask4,
    ModulationName::Ask8,
    // PSK
    ModulationName::Bpsk,
    ModulationName::Qpsk,
    ModulationName::Psk8,
    ModulationName::Psk16,
    ModulationName::Psk32,
    // APSK
    ModulationName::Apsk16,
    ModulationName::Apsk32,
    ModulationName::Apsk64,
    ModulationName::Apsk128,
    // QAM
    ModulationName::Qam16,
    ModulationName::Qam32,
    ModulationName::Qam64,
    ModulationName::Qam128,
    ModulationName::Qam256,
    // AM
    ModulationName::AmSsbWc,
    ModulationName::AmSsbSc,
    ModulationName::AmDsbWc,
    ModulationName::AmDsbSc,
    // FM
    ModulationName::Fm,
    // FSK
    ModulationName::Gmsk,
    // PSK
    ModulationName::Oqpsk,
];

/// One root-level dataset reported by the container decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetEntry {
    pub name: String,
    pub dims: Vec<u64>,
    /// Datatype class is floating-point
    pub is_float: bool,
}

/// Black-box view of the hierarchical container.
pub trait ContainerSource {
    /// Enumerate the root-level datasets.
    fn entries(&mut self) -> DatasetResult<Vec<DatasetEntry>>;

    /// Read `out.len()` consecutive `f32` elements of dataset `name`,
    /// starting at flat element index `start_element`.
    fn read_f32(&mut self, name: &str, start_element: u64, out: &mut [f32]) -> DatasetResult<()>;
}

/// Validated shape record of the three expected datasets. The only
/// consumer of the container listing, so the listing collapses into
/// this flat record instead of a metadata tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CubeLayout {
    pub x: [u64; 3],
    pub y: [u64; 2],
    pub z: [u64; 2],
}

/// Total row count: frames x modulations x SNRs.
pub const fn expected_rows() -> u64 {
    (KIND.frames_per_mod_snr() * KIND.modulation_count() * KIND.snr_count()) as u64
}

/// Rows of one modulation slab.
pub const fn rows_per_modulation() -> u64 {
    expected_rows() / KIND.modulation_count() as u64
}

/// Rows of one `(modulation, SNR)` block.
pub const fn rows_per_snr() -> u64 {
    rows_per_modulation() / KIND.snr_count() as u64
}

/// SNR in dB at a given block index within a modulation slab.
pub const fn snr_at(snr_index: usize) -> i32 {
    -20 + 2 * snr_index as i32
}

/// Position of a modulation in the container row order.
pub fn modulation_offset(name: ModulationName) -> Option<usize> {
    MODULATION_ORDER.iter().position(|m| *m == name)
}

/// Check presence, rank and dimensions of `X`, `Y`, `Z`.
fn validate_entries(entries: &[DatasetEntry]) -> DatasetResult<CubeLayout> {
    let rows = expected_rows();
    let mut x = None;
    let mut y = None;
    let mut z = None;

    for entry in entries {
        match entry.name.as_str() {
            "X" => {
                let dims: [u64; 3] = entry.dims.as_slice().try_into().map_err(|_| {
                    DatasetError::format(format!("X has rank {}, expected 3", entry.dims.len()))
                })?;
                if dims != [rows, KIND.frame_length() as u64, 2] {
                    return Err(DatasetError::format(format!(
                        "X has shape {:?}, expected ({}, {}, 2)",
                        dims,
                        rows,
                        KIND.frame_length()
                    )));
                }
                if !entry.is_float {
                    return Err(DatasetError::format("X datatype class is not floating-point"));
                }
                x = Some(dims);
            }
            "Y" => {
                let dims: [u64; 2] = entry.dims.as_slice().try_into().map_err(|_| {
                    DatasetError::format(format!("Y has rank {}, expected 2", entry.dims.len()))
                })?;
                if dims != [rows, KIND.modulation_count() as u64] {
                    return Err(DatasetError::format(format!(
                        "Y has shape {:?}, expected ({}, {})",
                        dims,
                        rows,
                        KIND.modulation_count()
                    )));
                }
                y = Some(dims);
            }
            "Z" => {
                let dims: [u64; 2] = entry.dims.as_slice().try_into().map_err(|_| {
                    DatasetError::format(format!("Z has rank {}, expected 2", entry.dims.len()))
                })?;
                if dims != [rows, 1] {
                    return Err(DatasetError::format(format!(
                        "Z has shape {:?}, expected ({}, 1)",
                        dims, rows
                    )));
                }
                z = Some(dims);
            }
            _ => {}
        }
    }

    match (x, y, z) {
        (Some(x), Some(y), Some(z)) => Ok(CubeLayout { x, y, z }),
        (None, _, _) => Err(DatasetError::format("container has no X dataset")),
        (_, None, _) => Err(DatasetError::format("container has no Y dataset")),
        (_, _, None) => Err(DatasetError::format("container has no Z dataset")),
    }
}

/// Parse one modulation slab of the container into a complete store.
pub fn parse<S: ContainerSource>(
    source: &mut S,
    modulation: ModulationName,
) -> DatasetResult<DatasetStore> {
    if modulation == ModulationName::Unknown {
        return Err(DatasetError::format("no modulation selected"));
    }

    let entries = source.entries()?;
    let layout = validate_entries(&entries)?;

    let offset = modulation_offset(modulation).ok_or_else(|| {
        DatasetError::format(format!(
            "modulation {} is not part of the container order",
            modulation.canonical()
        ))
    })?;

    let total_elements = layout.x[0] * layout.x[1] * layout.x[2];
    let slab_elements = (total_elements / KIND.modulation_count() as u64) as usize;
    let start_element = offset as u64 * slab_elements as u64;

    // one contiguous slab, ~832 MB; the fold below is its only owner
    let mut slab: Vec<f32> = Vec::new();
    slab.try_reserve_exact(slab_elements).map_err(|_| {
        DatasetError::ResourceExhausted {
            bytes: slab_elements * std::mem::size_of::<f32>(),
        }
    })?;
    slab.resize(slab_elements, 0.0);

    source.read_f32("X", start_element, &mut slab)?;

    let store = fold_slab(
        &slab,
        modulation,
        KIND.frame_length(),
        KIND.frames_per_mod_snr(),
        KIND.snr_count(),
    )?;

    if store.snrs().len() != KIND.snr_count() {
        return Err(DatasetError::format(format!(
            "found {} SNRs, expected {}",
            store.snrs().len(),
            KIND.snr_count()
        )));
    }

    debug!(
        modulation = modulation.canonical(),
        elements = slab_elements,
        "parsed {} slab",
        KIND.label()
    );
    Ok(store)
}

/// Fold one modulation slab into per-SNR signals. The slab is laid out
/// as `snr_count` blocks of `frames_per_snr` frames of `frame_len`
/// interleaved `(I, Q)` floats.
fn fold_slab(
    slab: &[f32],
    modulation: ModulationName,
    frame_len: usize,
    frames_per_snr: usize,
    snr_count: usize,
) -> DatasetResult<DatasetStore> {
    let elements_per_frame = 2 * frame_len;
    let elements_per_snr = elements_per_frame * frames_per_snr;

    if slab.len() != elements_per_snr * snr_count {
        return Err(DatasetError::format(format!(
            "slab holds {} elements, expected {}",
            slab.len(),
            elements_per_snr * snr_count
        )));
    }

    let mut store = DatasetStore::new();

    for (snr_index, block) in slab.chunks_exact(elements_per_snr).enumerate() {
        let mut signal = SignalData::new();

        for frame in block.chunks_exact(elements_per_frame) {
            let mut points = Vec::with_capacity(frame_len);
            for iq in frame.chunks_exact(2) {
                points.push(IqPoint::new(iq[0], iq[1]));
            }
            signal.push_frame(points);
        }

        store.insert(modulation, snr_at(snr_index), signal)?;
    }

    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn good_entries() -> Vec<DatasetEntry> {
        let rows = expected_rows();
        vec![
            DatasetEntry {
                name: "X".into(),
                dims: vec![rows, 1024, 2],
                is_float: true,
            },
            DatasetEntry {
                name: "Y".into(),
                dims: vec![rows, 24],
                is_float: true,
            },
            DatasetEntry {
                name: "Z".into(),
                dims: vec![rows, 1],
                is_float: false,
            },
        ]
    }

    #[test]
    fn slab_row_math() {
        assert_eq!(expected_rows(), 2_555_904);
        assert_eq!(rows_per_modulation(), 106_496);
        assert_eq!(rows_per_snr(), 4096);

        // modulation offset 5 (8PSK), SNR block 13
        assert_eq!(modulation_offset(ModulationName::Psk8), Some(5));
        assert_eq!(snr_at(13), 6);
        assert_eq!(5 * rows_per_modulation(), 532_480);
    }

    #[test]
    fn modulation_order_spans_the_container() {
        assert_eq!(MODULATION_ORDER.len(), 24);
        assert_eq!(modulation_offset(ModulationName::Ook), Some(0));
        assert_eq!(modulation_offset(ModulationName::Oqpsk), Some(23));
        assert_eq!(modulation_offset(ModulationName::Wbfm), None);
    }

    #[test]
    fn validation_accepts_expected_layout() {
        let layout = validate_entries(&good_entries()).unwrap();
        assert_eq!(layout.x, [expected_rows(), 1024, 2]);
        assert_eq!(layout.y, [expected_rows(), 24]);
        assert_eq!(layout.z, [expected_rows(), 1]);
    }

    #[test]
    fn validation_rejects_missing_x() {
        let entries: Vec<DatasetEntry> =
            good_entries().into_iter().filter(|e| e.name != "X").collect();
        assert!(matches!(
            validate_entries(&entries),
            Err(DatasetError::InputFormat(_))
        ));
    }

    #[test]
    fn validation_rejects_wrong_rank_and_shape() {
        let mut entries = good_entries();
        entries[0].dims = vec![expected_rows(), 1024];
        assert!(validate_entries(&entries).is_err());

        let mut entries = good_entries();
        entries[0].dims = vec![expected_rows(), 512, 2];
        assert!(validate_entries(&entries).is_err());
    }

    #[test]
    fn validation_rejects_non_float_cube() {
        let mut entries = good_entries();
        entries[0].is_float = false;
        assert!(matches!(
            validate_entries(&entries),
            Err(DatasetError::InputFormat(_))
        ));
    }

    #[test]
    fn fold_slab_small_shape() {
        // 3 SNR blocks x 2 frames x 2 points
        let frame_len = 2;
        let frames = 2;
        let snrs = 3;
        let slab: Vec<f32> = (0..(2 * frame_len * frames * snrs))
            .map(|v| v as f32)
            .collect();

        let store = fold_slab(&slab, ModulationName::Qpsk, frame_len, frames, snrs).unwrap();

        assert_eq!(store.snrs(), vec![-20, -18, -16]);
        assert_eq!(store.modulations(), vec![ModulationName::Qpsk]);

        let first = store.get(ModulationName::Qpsk, -20).unwrap();
        assert_eq!(first.frames[0], vec![IqPoint::new(0.0, 1.0), IqPoint::new(2.0, 3.0)]);
        assert_eq!(first.frames[1], vec![IqPoint::new(4.0, 5.0), IqPoint::new(6.0, 7.0)]);
        assert_eq!(first.max_abs, 7.0);

        let last = store.get(ModulationName::Qpsk, -16).unwrap();
        assert_eq!(last.max_abs, 23.0);
    }

    #[test]
    fn fold_slab_rejects_size_mismatch() {
        let slab = vec![0.0f32; 10];
        assert!(matches!(
            fold_slab(&slab, ModulationName::Qpsk, 2, 2, 3),
            Err(DatasetError::InputFormat(_))
        ));
    }

    #[test]
    fn parse_requires_a_selected_modulation() {
        struct NoSource;
        impl ContainerSource for NoSource {
            fn entries(&mut self) -> DatasetResult<Vec<DatasetEntry>> {
                unreachable!("entries must not be read without a modulation")
            }
            fn read_f32(
                &mut self,
                _: &str,
                _: u64,
                _: &mut [f32],
            ) -> DatasetResult<()> {
                unreachable!()
            }
        }

        assert!(matches!(
            parse(&mut NoSource, ModulationName::Unknown),
            Err(DatasetError::InputFormat(_))
        ));
    }

    #[test]
    fn parse_rejects_bad_container() {
        struct EmptySource;
        impl ContainerSource for EmptySource {
            fn entries(&mut self) -> DatasetResult<Vec<DatasetEntry>> {
                Ok(Vec::new())
            }
            fn read_f32(
                &mut self,
                _: &str,
                _: u64,
                _: &mut [f32],
            ) -> DatasetResult<()> {
                unreachable!("read must not happen when validation fails")
            }
        }

        assert!(matches!(
            parse(&mut EmptySource, ModulationName::Qpsk),
            Err(DatasetError::InputFormat(_))
        ));
    }
}
