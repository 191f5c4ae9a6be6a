use proptest::prelude::*;

use ramprobe_mem::{
    AddressLineFault, AliasedRam, CellFault, CellFaults, DataLineFault, DenseRam,
    FaultyDataLines, MiswiredAddressLines, WordStore, WordWidth,
};

use crate::fill::fill_with_addresses;
use crate::probe::{MemoryProbe, ProbeConfig, ProbeOutcome};
use crate::region::MemoryRegion;
use crate::report::BufferSink;
use crate::sizer::{discover_usable, ScanOutcome};

fn width_strategy() -> impl Strategy<Value = WordWidth> {
    prop_oneof![
        Just(WordWidth::W16),
        Just(WordWidth::W32),
        Just(WordWidth::W64),
    ]
}

fn cell_fault_strategy() -> impl Strategy<Value = CellFault> {
    prop_oneof![
        any::<u64>().prop_map(CellFault::Stuck),
        (0u32..4, any::<u64>())
            .prop_map(|(writes, garbage)| CellFault::WearOut { writes, garbage }),
        any::<u64>().prop_map(|garbage| CellFault::Decay { garbage }),
    ]
}

#[derive(Clone, Debug)]
enum FaultPlan {
    Clean,
    DataLine(DataLineFault),
    AddressLine(AddressLineFault),
    Cells(Vec<(u64, CellFault)>),
}

fn fault_plan_strategy(
    width: WordWidth,
    base: u64,
    span_words: u64,
) -> impl Strategy<Value = FaultPlan> {
    let bits = width.bits();
    let align = width.addr_align_bits() as u8;
    let bytes = width.bytes();
    let data_line = prop_oneof![
        (0..bits).prop_map(|b| DataLineFault::StuckLow(1u64 << b)),
        (0..bits).prop_map(|b| DataLineFault::StuckHigh(1u64 << b)),
        (0..bits, 1..bits).prop_map(move |(a, d)| {
            DataLineFault::Bridged(a as u8, ((a + d) % bits) as u8)
        }),
    ];
    let addr_line = prop_oneof![
        (align..align + 10).prop_map(AddressLineFault::StuckLow),
        (align..align + 10).prop_map(AddressLineFault::StuckHigh),
        (align..align + 10, 1u8..10).prop_map(move |(a, d)| AddressLineFault::ShortedTo {
            driven: a,
            victim: align + (a - align + d) % 10,
        }),
    ];
    let cells = prop::collection::vec((0..span_words, cell_fault_strategy()), 1..4).prop_map(
        move |list| {
            FaultPlan::Cells(
                list.into_iter()
                    .map(|(word, fault)| (base + word * bytes, fault))
                    .collect(),
            )
        },
    );
    prop_oneof![
        2 => Just(FaultPlan::Clean),
        2 => data_line.prop_map(FaultPlan::DataLine),
        2 => addr_line.prop_map(FaultPlan::AddressLine),
        3 => cells,
    ]
}

fn build_store(
    width: WordWidth,
    nominal: u64,
    physical: u64,
    plan: FaultPlan,
) -> Box<dyn WordStore> {
    let base: Box<dyn WordStore> = if physical < nominal {
        Box::new(AliasedRam::new(nominal, physical, width).unwrap())
    } else {
        Box::new(DenseRam::new(nominal, width).unwrap())
    };
    match plan {
        FaultPlan::Clean => base,
        FaultPlan::DataLine(fault) => Box::new(FaultyDataLines::new(base, fault).unwrap()),
        FaultPlan::AddressLine(fault) => {
            Box::new(MiswiredAddressLines::new(base, fault).unwrap())
        }
        FaultPlan::Cells(cells) => Box::new(CellFaults::new(base, cells)),
    }
}

proptest! {
    /// Filling is deterministic: the pattern verifies on the way in, every
    /// word reads back its own address afterwards, and repeating the fill
    /// changes nothing.
    #[test]
    fn self_address_fill_is_exact_and_repeatable(
        width in width_strategy(),
        base_words in 0u64..8,
        span_words in 1u64..48,
    ) {
        let bytes = width.bytes();
        let base = base_words * bytes;
        let limit = base + span_words * bytes;
        let mut ram = DenseRam::new(limit, width).unwrap();

        for _ in 0..2 {
            prop_assert_eq!(fill_with_addresses(&mut ram, base, limit).unwrap(), None);
            let mut addr = base;
            while addr < limit {
                prop_assert_eq!(ram.read_word(addr).unwrap(), addr);
                addr += bytes;
            }
        }
    }

    /// Over a fault-free ring the scan settles on exactly the physical size
    /// (or the whole window when it fits), taking one pass per alias layer.
    #[test]
    fn sizing_recovers_the_exact_ring_period(
        width in width_strategy(),
        base_words in 0u64..8,
        span_words in 1u64..40,
        period_words in 1u64..12,
        slack_words in 0u64..8,
    ) {
        let bytes = width.bytes();
        let base = base_words * bytes;
        let span = span_words * bytes;
        let limit = base + span;
        let physical = period_words * bytes;
        let nominal = limit + slack_words * bytes;
        prop_assume!(physical <= nominal);

        let mut ram = AliasedRam::new(nominal, physical, width).unwrap();
        let region = MemoryRegion::new(base, limit);
        prop_assert_eq!(fill_with_addresses(&mut ram, base, limit).unwrap(), None);

        let mut sink = BufferSink::new();
        let outcome = discover_usable(&mut ram, region, 64, &mut sink).unwrap();
        let expected_span = span.min(physical);
        let expected_passes = ((span + physical - 1) / physical) as u32;
        match outcome {
            ScanOutcome::Converged { state, passes } => {
                prop_assert!(state.converged);
                prop_assert_eq!(state.usable_bytes(), expected_span);
                prop_assert_eq!(passes, expected_passes);
            }
            other => prop_assert!(false, "unexpected outcome: {:?}", other),
        }
    }

    /// Whatever the fault model, a probe run terminates within its pass cap
    /// and never reports more usable memory than the window holds.
    #[test]
    fn probe_never_overstates_usable_memory(
        (width, base_words, span_words, phys_words, plan) in
            (width_strategy(), 0u64..8, 1u64..40, 1u64..40)
                .prop_flat_map(|(width, base_words, span_words, phys_words)| {
                    let base = base_words * width.bytes();
                    fault_plan_strategy(width, base, span_words).prop_map(move |plan| {
                        (width, base_words, span_words, phys_words, plan)
                    })
                }),
    ) {
        let bytes = width.bytes();
        let base = base_words * bytes;
        let limit = base + span_words * bytes;
        let physical = (phys_words * bytes).min(limit);
        let mut store = build_store(width, limit, physical, plan);
        let region = MemoryRegion::new(base, limit);
        let config = ProbeConfig::new(region);
        let cap = config.effective_max_passes(width);
        let mut sink = BufferSink::new();
        let outcome = MemoryProbe::new(config).run(store.as_mut(), &mut sink).unwrap();

        prop_assert!(outcome.usable_bytes() <= limit - base);
        prop_assert_eq!(outcome.usable_bytes() % width.bytes(), 0);
        match outcome {
            ProbeOutcome::Sized { passes, .. } => prop_assert!(passes >= 1 && passes <= cap),
            ProbeOutcome::Inconclusive { passes, .. } => prop_assert_eq!(passes, cap),
            ProbeOutcome::DataBusFault(fault) => {
                prop_assert!(u32::from(fault.failing_bit) < width.bits());
            }
            ProbeOutcome::FillFailure { mismatch, .. } => {
                prop_assert!(mismatch.addr >= base && mismatch.addr < limit);
            }
        }
        let last = sink.lines().last().map(String::as_str).unwrap_or("");
        prop_assert!(last.starts_with("result:"));
    }
}
