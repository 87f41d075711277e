//! End-to-end transmit flow against the simulated backend: a parse
//! session publishes a store, the HAL borrows one signal, converts it
//! and pushes the cyclic buffer.

use std::sync::Arc;

use modtx_core::{
    DatasetKind, DatasetStore, IqPoint, ModulationName, ParseSession, ParseState, SignalData,
};
use modtx_hal::hal::default_dump_filename;
use modtx_hal::{SimBackend, TrxError, TxDeviceKind, TxHal};

const PLUTO_URI: &str = "usb:1.2.5";
const PLUTO_TX: &str = "cf-ad9361-dds-core-lpc";

fn pluto_backend() -> SimBackend {
    let sim = SimBackend::new();
    sim.add_pluto(PLUTO_URI, "Analog Devices PlutoSDR (AD9363)");
    sim
}

/// A store shaped like a miniature dataset: one combination with two
/// frames of two points.
fn tiny_store() -> DatasetStore {
    let mut signal = SignalData::new();
    signal.push_frame(vec![IqPoint::new(0.5, -1.0), IqPoint::new(0.25, 0.0)]);
    signal.push_frame(vec![IqPoint::new(-0.5, 1.0), IqPoint::new(0.0, 0.75)]);

    let mut store = DatasetStore::new();
    store.insert(ModulationName::Qpsk, -4, signal).unwrap();
    store
}

#[test]
fn parse_then_stream() {
    let sim = pluto_backend();
    let mut hal = TxHal::new(Box::new(sim.clone()));

    // parse on the worker; transmit stays locked out until Ready
    let mut session = ParseSession::new();
    session
        .begin(DatasetKind::HisarMod2019, Box::new(|| Ok(tiny_store())))
        .unwrap();
    session.wait().unwrap();
    assert_eq!(session.state(), ParseState::Ready);

    hal.initialize_device(0).unwrap();
    assert_eq!(hal.device_kind(), Some(TxDeviceKind::Ad9361));

    // sampling-rate policy for the freshly parsed dataset
    hal.update_sampling_frequency(session.dataset().unwrap()).unwrap();
    assert_eq!(hal.sampling_frequency().unwrap(), 20_000_000);

    let signal = session.signal(ModulationName::Qpsk, -4).unwrap();
    hal.set_dump_filename(default_dump_filename(
        DatasetKind::HisarMod2019,
        ModulationName::Qpsk,
        -4,
    ))
    .unwrap();
    hal.load_signal(signal).unwrap();
    hal.start_streaming().unwrap();

    // 12-bit DAC words, shifted left by 4, max_abs = 1.0
    let pushed = sim.pushed_buffers(PLUTO_URI, PLUTO_TX);
    assert_eq!(pushed.len(), 1);
    assert_eq!(
        pushed[0],
        vec![
            16368, -32752, 8176, 0, // frame 0
            -16368, 32752, 0, 24560, // frame 1
        ]
    );

    // stop silences the DAC with a zero-filled cyclic buffer
    hal.stop_streaming().unwrap();
    let pushed = sim.pushed_buffers(PLUTO_URI, PLUTO_TX);
    assert_eq!(pushed.len(), 2);
    assert_eq!(pushed[1].len(), 2 * 1024);
    assert!(pushed[1].iter().all(|w| *w == 0));

    // stop is idempotent
    hal.stop_streaming().unwrap();
    assert_eq!(sim.pushed_buffers(PLUTO_URI, PLUTO_TX).len(), 3);
}

#[test]
fn signal_is_not_released_while_streaming() {
    let sim = pluto_backend();
    let mut hal = TxHal::new(Box::new(sim));
    hal.initialize_device(0).unwrap();

    let store = tiny_store();
    let signal = store.signal(ModulationName::Qpsk, -4).unwrap();
    hal.load_signal(Arc::clone(&signal)).unwrap();

    // dropping the store keeps the borrowed signal alive for the session
    drop(store);
    hal.start_streaming().unwrap();
}

#[test]
fn failed_parse_blocks_transmit() {
    let mut session = ParseSession::new();
    session
        .begin(
            DatasetKind::RadioMl2016,
            Box::new(|| {
                Err(modtx_core::DatasetError::InputFormat(
                    "bad container".into(),
                ))
            }),
        )
        .unwrap();
    assert!(session.wait().is_err());

    assert_eq!(session.state(), ParseState::Idle);
    assert!(session.signal(ModulationName::Qpsk, -4).is_none());
}

#[test]
fn buffer_allocation_failure_surfaces() {
    let sim = pluto_backend();
    let mut hal = TxHal::new(Box::new(sim.clone()));
    hal.initialize_device(0).unwrap();

    let store = tiny_store();
    hal.load_signal(store.signal(ModulationName::Qpsk, -4).unwrap())
        .unwrap();

    sim.fail_buffer_alloc(PLUTO_URI, PLUTO_TX, true);
    assert!(matches!(
        hal.start_streaming(),
        Err(TrxError::BufferAllocFailed(_))
    ));
}
