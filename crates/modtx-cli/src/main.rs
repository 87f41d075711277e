//! Dataset replay command-line driver
//!
//! A thin presenter over the ingestion core and the transmit HAL:
//! scan transport contexts, inspect a dataset file, or replay one
//! `(modulation, SNR)` combination through a transmit front-end.
//!
//! Without real hardware support compiled in, `--sim` routes all
//! transport traffic to the in-memory backend.

use std::io::BufRead;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use modtx_core::{
    csv_parser, pkl_parser::PklParser, DatasetKind, ModulationName, ModulationRegistry,
    ParseSession,
};
use modtx_hal::hal::default_dump_filename;
use modtx_hal::{IioBackend, SimBackend, TxHal};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "modtx")]
#[command(author, version, about = "Replay RF modulation datasets through an SDR transmitter", long_about = None)]
struct Cli {
    /// Enable verbose output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Use the in-memory simulated transport instead of real hardware
    #[arg(long, global = true)]
    sim: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KindArg {
    /// RadioML 2016.10A (pickle)
    Radioml2016,
    /// RadioML 2018.01 (HDF5)
    Radioml2018,
    /// HisarMod 2019.1 (CSV)
    Hisarmod2019,
}

impl From<KindArg> for DatasetKind {
    fn from(value: KindArg) -> Self {
        match value {
            KindArg::Radioml2016 => DatasetKind::RadioMl2016,
            KindArg::Radioml2018 => DatasetKind::RadioMl2018,
            KindArg::Hisarmod2019 => DatasetKind::HisarMod2019,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List the transport contexts a transmitter could be driven on
    Scan,

    /// Parse a dataset file and report its contents
    Inspect {
        /// Dataset family of the file
        #[arg(value_enum)]
        kind: KindArg,

        /// Path to the dataset file
        file: PathBuf,
    },

    /// Replay one modulation-SNR combination
    Tx {
        /// Dataset family of the file
        #[arg(value_enum)]
        kind: KindArg,

        /// Path to the dataset file
        file: PathBuf,

        /// Modulation label, e.g. 16QAM
        #[arg(short, long)]
        modulation: String,

        /// SNR in dB
        #[arg(short, long)]
        snr: i32,

        /// Index into the scanned context list
        #[arg(long, default_value = "0")]
        context: usize,

        /// LO frequency in Hz (device default when omitted)
        #[arg(long)]
        frequency: Option<i64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    // inconsistent alias table is the only fatal condition
    let registry = ModulationRegistry::new().context("modulation alias table")?;

    match cli.command {
        Commands::Scan => scan(backend(cli.sim)?),
        Commands::Inspect { kind, file } => inspect(kind.into(), file),
        Commands::Tx {
            kind,
            file,
            modulation,
            snr,
            context,
            frequency,
        } => tx(
            backend(cli.sim)?,
            &registry,
            kind.into(),
            file,
            &modulation,
            snr,
            context,
            frequency,
        ),
    }
}

/// The transport backend for this run. Real libiio support is not
/// compiled in; everything hardware-facing runs against the simulator.
fn backend(sim: bool) -> Result<Box<dyn IioBackend>> {
    if !sim {
        bail!("no hardware transport compiled in; re-run with --sim");
    }

    let backend = SimBackend::new();
    backend.add_pluto("usb:1.2.5", "Analog Devices PlutoSDR (AD9363)");
    Ok(Box::new(backend))
}

fn scan(backend: Box<dyn IioBackend>) -> Result<()> {
    let hal = TxHal::new(backend);

    if hal.scan_contexts().is_empty() {
        println!("no transport contexts found");
        return Ok(());
    }

    for (index, entry) in hal.scan_contexts().iter().enumerate() {
        println!("[{}] {} {}", index, entry.uri, entry.description);
    }
    Ok(())
}

/// Run the parser for `kind` on the session worker and wait for the
/// completion notification.
fn parse(session: &mut ParseSession, kind: DatasetKind, file: PathBuf) -> Result<()> {
    match kind {
        DatasetKind::RadioMl2016 => session.begin(
            kind,
            Box::new(move || PklParser::new().parse_file(&file)),
        )?,
        DatasetKind::HisarMod2019 => {
            session.begin(kind, Box::new(move || csv_parser::parse_file(&file)))?
        }
        DatasetKind::RadioMl2018 => {
            // the hierarchical container needs an external decoder
            bail!("no HDF5 container decoder compiled in");
        }
    }

    session.wait().map_err(|err| {
        eprintln!("Parsing failed.");
        anyhow::Error::from(err)
    })?;
    Ok(())
}

fn inspect(kind: DatasetKind, file: PathBuf) -> Result<()> {
    let mut session = ParseSession::new();
    parse(&mut session, kind, file)?;

    let store = session.store().expect("session is ready after a parse");
    println!(
        "{}: {} combinations, {} frames of {} points each",
        kind.label(),
        store.len(),
        kind.frames_per_mod_snr(),
        kind.frame_length()
    );

    let snrs = store.snrs();
    println!(
        "SNRs [dB]: {}",
        snrs.iter()
            .map(i32::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("modulations:");
    for name in store.modulations() {
        println!(
            "  {:<10} {:<7} {}",
            name.canonical(),
            name.kind(),
            name.family()
        );
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn tx(
    backend: Box<dyn IioBackend>,
    registry: &ModulationRegistry,
    kind: DatasetKind,
    file: PathBuf,
    modulation: &str,
    snr: i32,
    context: usize,
    frequency: Option<i64>,
) -> Result<()> {
    let name = registry.lookup(modulation);
    if name == ModulationName::Unknown {
        bail!("unknown modulation '{}'", modulation);
    }

    let mut session = ParseSession::new();
    parse(&mut session, kind, file)?;

    let signal = session
        .signal(name, snr)
        .with_context(|| format!("no data for {} at {} dB", name.canonical(), snr))?;

    let mut hal = TxHal::new(backend);
    let entries = hal.scan_contexts();
    if entries.is_empty() {
        bail!("no transport contexts found");
    }
    info!(
        uri = %entries.get(context).map(|e| e.uri.as_str()).unwrap_or("?"),
        "initializing transmit device"
    );

    hal.initialize_device(context)?;
    hal.update_sampling_frequency(kind)?;

    if let Some(hz) = frequency {
        hal.set_lo_frequency(hz)?;
    }

    hal.set_dump_filename(default_dump_filename(kind, name, snr))?;
    hal.load_signal(signal)?;
    hal.start_streaming()?;

    println!(
        "streaming {} at {} dB cyclically; press Enter to stop",
        name.canonical(),
        snr
    );
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;

    hal.stop_streaming()?;
    println!("transmitter silenced");
    Ok(())
}
