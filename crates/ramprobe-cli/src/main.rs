use anyhow::{bail, Context};
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use ramprobe_mem::{
    AddressLineFault, AliasedRam, CellFault, CellFaults, DataLineFault, DenseRam,
    FaultyDataLines, MiswiredAddressLines, WordStore, WordWidth,
};
use ramprobe_post::{BufferSink, MemoryProbe, MemoryRegion, ProbeConfig, ProbeOutcome};

#[derive(Parser, Debug)]
#[command(
    name = "ramprobe",
    about = "Run the early-boot memory diagnostic (data bus walk, self-address fill, wraparound sizing) against a simulated memory bank."
)]
struct Args {
    /// Simulated bank size in bytes (hex with 0x prefix or decimal)
    #[arg(long, value_name = "BYTES", default_value = "0x10000", value_parser = parse_u64)]
    size: u64,

    /// First byte of the probed window
    #[arg(long, value_name = "ADDR", default_value = "0x0", value_parser = parse_u64)]
    base: u64,

    /// One past the last byte of the probed window (defaults to --size)
    #[arg(long, value_name = "ADDR", value_parser = parse_u64)]
    limit: Option<u64>,

    /// Word width on the simulated bus (16, 32 or 64)
    #[arg(long, value_name = "BITS", default_value_t = 32)]
    word_bits: u32,

    /// Cap on sizing passes (default derives from the window size)
    #[arg(long, value_name = "N")]
    max_passes: Option<u32>,

    /// Back the bank with this many bytes of real storage; higher addresses
    /// wrap onto it (address % period)
    #[arg(long, value_name = "BYTES", value_parser = parse_u64)]
    alias_period: Option<u64>,

    /// Wire a data line permanently low
    #[arg(long, value_name = "BIT")]
    stuck_low_bit: Option<u8>,

    /// Wire a data line permanently high
    #[arg(long, value_name = "BIT")]
    stuck_high_bit: Option<u8>,

    /// Short two data lines together (each carries the wired-AND)
    #[arg(long, value_name = "A,B", value_parser = parse_line_pair)]
    bridge: Option<(u8, u8)>,

    /// Wire an address line permanently low
    #[arg(long, value_name = "LINE")]
    addr_stuck_low: Option<u8>,

    /// Wire an address line permanently high
    #[arg(long, value_name = "LINE")]
    addr_stuck_high: Option<u8>,

    /// Short an address line pair; the victim carries whatever the driven
    /// line does
    #[arg(long, value_name = "DRIVEN,VICTIM", value_parser = parse_line_pair)]
    addr_short: Option<(u8, u8)>,

    /// A cell that always reads this value (repeatable)
    #[arg(long, value_name = "ADDR,VALUE", value_parser = parse_u64_pair)]
    stuck_cell: Vec<(u64, u64)>,

    /// A cell that loses its charge once writes move past it (repeatable)
    #[arg(long, value_name = "ADDR,GARBAGE", value_parser = parse_u64_pair)]
    decay_cell: Vec<(u64, u64)>,

    /// A cell that stops retaining after N writes (repeatable)
    #[arg(long, value_name = "ADDR,N,GARBAGE", value_parser = parse_wear_spec)]
    wear_cell: Vec<(u64, u32, u64)>,

    /// Emit a JSON summary instead of the plain report
    #[arg(long, action = clap::ArgAction::SetTrue)]
    json: bool,

    /// Log sizing internals to stderr
    #[arg(long, action = clap::ArgAction::SetTrue)]
    verbose: bool,
}

/// Machine-readable run summary for `--json`.
#[derive(Debug, Serialize)]
struct ProbeSummary<'a> {
    word_bits: u32,
    base: u64,
    limit: u64,
    outcome: &'static str,
    usable_bytes: u64,
    passes: Option<u32>,
    failing_bit: Option<u8>,
    fault_addr: Option<u64>,
    report: &'a [String],
}

impl<'a> ProbeSummary<'a> {
    fn new(
        width: WordWidth,
        region: MemoryRegion,
        outcome: ProbeOutcome,
        report: &'a [String],
    ) -> Self {
        let (kind, passes, failing_bit, fault_addr) = match outcome {
            ProbeOutcome::Sized { passes, .. } => ("sized", Some(passes), None, None),
            ProbeOutcome::DataBusFault(fault) => {
                ("data-bus-fault", None, Some(fault.failing_bit), None)
            }
            ProbeOutcome::FillFailure {
                mismatch,
                refill: false,
            } => ("fill-failure", None, None, Some(mismatch.addr)),
            ProbeOutcome::FillFailure {
                mismatch,
                refill: true,
            } => ("refill-failure", None, None, Some(mismatch.addr)),
            ProbeOutcome::Inconclusive { passes, .. } => ("inconclusive", Some(passes), None, None),
        };
        Self {
            word_bits: width.bits(),
            base: region.base,
            limit: region.limit,
            outcome: kind,
            usable_bytes: outcome.usable_bytes(),
            passes,
            failing_bit,
            fault_addr,
            report,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);
    run(args)
}

fn run(args: Args) -> anyhow::Result<()> {
    let Some(width) = WordWidth::from_bits(args.word_bits) else {
        bail!(
            "unsupported word width {} (expected 16, 32 or 64)",
            args.word_bits
        );
    };
    let limit = args.limit.unwrap_or(args.size);
    let region = MemoryRegion::new(args.base, limit);
    let mut store = build_store(&args, width)?;

    let mut config = ProbeConfig::new(region);
    config.max_passes = args.max_passes;

    let mut sink = BufferSink::new();
    let outcome = MemoryProbe::new(config)
        .run(store.as_mut(), &mut sink)
        .with_context(|| format!("probe [0x{:x}, 0x{limit:x})", args.base))?;

    if args.json {
        let summary = ProbeSummary::new(width, region, outcome, sink.lines());
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        for line in sink.lines() {
            println!("{line}");
        }
    }

    match outcome {
        ProbeOutcome::Sized { usable_bytes, .. } if usable_bytes > 0 => Ok(()),
        other => bail!("memory diagnostic failed: {other}"),
    }
}

/// Assembles the simulated bank inside out: RAM, then address-path faults,
/// then data-path faults, then cell faults keyed by probe-visible address.
fn build_store(args: &Args, width: WordWidth) -> anyhow::Result<Box<dyn WordStore>> {
    let mut store: Box<dyn WordStore> = match args.alias_period {
        Some(period) => Box::new(AliasedRam::new(args.size, period, width)?),
        None => Box::new(DenseRam::new(args.size, width)?),
    };

    if let Some(line) = args.addr_stuck_low {
        store = Box::new(MiswiredAddressLines::new(
            store,
            AddressLineFault::StuckLow(line),
        )?);
    }
    if let Some(line) = args.addr_stuck_high {
        store = Box::new(MiswiredAddressLines::new(
            store,
            AddressLineFault::StuckHigh(line),
        )?);
    }
    if let Some((driven, victim)) = args.addr_short {
        store = Box::new(MiswiredAddressLines::new(
            store,
            AddressLineFault::ShortedTo { driven, victim },
        )?);
    }

    if let Some(bit) = args.stuck_low_bit {
        store = Box::new(FaultyDataLines::new(
            store,
            DataLineFault::StuckLow(data_line_mask(bit)?),
        )?);
    }
    if let Some(bit) = args.stuck_high_bit {
        store = Box::new(FaultyDataLines::new(
            store,
            DataLineFault::StuckHigh(data_line_mask(bit)?),
        )?);
    }
    if let Some((a, b)) = args.bridge {
        store = Box::new(FaultyDataLines::new(store, DataLineFault::Bridged(a, b))?);
    }

    let mut cells: Vec<(u64, CellFault)> = Vec::new();
    for &(addr, value) in &args.stuck_cell {
        cells.push((addr, CellFault::Stuck(value)));
    }
    for &(addr, garbage) in &args.decay_cell {
        cells.push((addr, CellFault::Decay { garbage }));
    }
    for &(addr, writes, garbage) in &args.wear_cell {
        cells.push((addr, CellFault::WearOut { writes, garbage }));
    }
    if !cells.is_empty() {
        store = Box::new(CellFaults::new(store, cells));
    }
    Ok(store)
}

fn data_line_mask(bit: u8) -> anyhow::Result<u64> {
    if bit >= 64 {
        bail!("data line {bit} out of range");
    }
    Ok(1u64 << bit)
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_u64(s: &str) -> Result<u64, String> {
    let s = s.trim();
    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
    } else {
        s.parse()
    };
    parsed.map_err(|e| format!("bad number {s:?}: {e}"))
}

fn parse_u64_pair(s: &str) -> Result<(u64, u64), String> {
    let (a, b) = s
        .split_once(',')
        .ok_or_else(|| format!("expected two comma-separated values, got {s:?}"))?;
    Ok((parse_u64(a)?, parse_u64(b)?))
}

fn parse_line_pair(s: &str) -> Result<(u8, u8), String> {
    let (a, b) = parse_u64_pair(s)?;
    let line = |n: u64| u8::try_from(n).map_err(|_| format!("line {n} out of range"));
    Ok((line(a)?, line(b)?))
}

fn parse_wear_spec(s: &str) -> Result<(u64, u32, u64), String> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 3 {
        return Err(format!("expected ADDR,N,GARBAGE, got {s:?}"));
    }
    let addr = parse_u64(parts[0])?;
    let writes = parse_u64(parts[1])?;
    let writes = u32::try_from(writes).map_err(|_| format!("write budget {writes} too large"))?;
    let garbage = parse_u64(parts[2])?;
    Ok((addr, writes, garbage))
}
