//! End-to-end tests for the `sf` command dispatcher running against
//! the simulated chip and memory window.

use sfnor_core::dispatch::{Dispatcher, DEFAULT_MODE, DEFAULT_SPEED_HZ};
use sfnor_core::Error;
use sfnor_sim::{Op, SimBus, SimConfig, SimMemory};

const BLOCK: u32 = 0x1000;
const RAM_BASE: u64 = 0x8000_0000;

fn config() -> SimConfig {
    SimConfig {
        size: 16 * BLOCK,
        erase_block_size: BLOCK,
        bulk_erase_supported: true,
    }
}

fn dispatcher(config: SimConfig) -> Dispatcher<SimBus, SimMemory> {
    Dispatcher::new(SimBus::new(config), SimMemory::new(RAM_BASE, 0x8000))
}

#[test]
fn commands_before_probe_report_no_device() {
    let mut sf = dispatcher(config());

    for argv in [
        &["read", "80000000", "0", "100"][..],
        &["write", "80000000", "0", "100"],
        &["update", "80000000", "0", "100"],
        &["erase", "0", "+1"],
        &["bulkerase"],
        // The device check precedes argument validation.
        &["erase", "not-hex"],
    ] {
        assert_eq!(sf.dispatch(argv), Err(Error::NoDeviceSelected), "{argv:?}");
    }
}

#[test]
fn probe_addressing_forms() {
    let mut sf = dispatcher(config());

    sf.dispatch(&["probe", "2:1"]).unwrap();
    let dev = sf.registry_mut().current().unwrap();
    assert_eq!((dev.bus, dev.cs), (2, 1));
    assert_eq!(dev.speed_hz, DEFAULT_SPEED_HZ);
    assert_eq!(dev.mode, DEFAULT_MODE);

    sf.dispatch(&["probe", "3"]).unwrap();
    let dev = sf.registry_mut().current().unwrap();
    assert_eq!((dev.bus, dev.cs), (0, 3));

    sf.dispatch(&["probe"]).unwrap();
    let dev = sf.registry_mut().current().unwrap();
    assert_eq!((dev.bus, dev.cs), (0, 0));

    sf.dispatch(&["probe", "1", "2000000", "0"]).unwrap();
    let dev = sf.registry_mut().current().unwrap();
    assert_eq!(dev.speed_hz, 2_000_000);
    assert_eq!(dev.mode, 0);
}

#[test]
fn malformed_probe_tokens_are_usage_errors() {
    let mut sf = dispatcher(config());

    for argv in [
        &["probe", "3:"][..],
        &["probe", ":1"],
        &["probe", "2:1", "fast"],
        &["probe", "2:1", "1000000", "3z"],
        &["probe", "a", "b", "c", "d"],
    ] {
        let err = sf.dispatch(argv).unwrap_err();
        assert!(err.is_usage(), "{argv:?} -> {err}");
    }
    assert!(!sf.registry().is_selected());
}

#[test]
fn failed_probe_is_not_a_usage_error() {
    let mut bus = SimBus::new(config());
    bus.deny_probe();
    let mut sf = Dispatcher::new(bus, SimMemory::new(RAM_BASE, 0));

    let err = sf.dispatch(&["probe", "3:1"]).unwrap_err();
    assert_eq!(err, Error::ProbeFailed { bus: 3, cs: 1 });
    assert!(!err.is_usage());
}

#[test]
fn unknown_and_incomplete_commands_are_usage_errors() {
    let mut sf = dispatcher(config());
    sf.dispatch(&["probe"]).unwrap();

    assert!(sf.dispatch(&[]).unwrap_err().is_usage());
    assert!(sf.dispatch(&["frobnicate"]).unwrap_err().is_usage());
    assert!(sf.dispatch(&["read", "80000000", "0"]).unwrap_err().is_usage());
    assert!(sf.dispatch(&["erase", "0"]).unwrap_err().is_usage());
    assert!(sf.dispatch(&["bulkerase", "now"]).unwrap_err().is_usage());
    // Trailing junk after a numeric token is rejected, not truncated.
    assert!(sf.dispatch(&["read", "80000000", "0", "0x10xyz"]).unwrap_err().is_usage());
}

#[test]
fn read_copies_flash_into_mapped_memory() {
    let mut sf = dispatcher(config());
    sf.dispatch(&["probe"]).unwrap();
    sf.bus().preload(0x40, &[0xDE, 0xAD, 0xBE, 0xEF]);

    sf.dispatch(&["read", "80000010", "40", "4"]).unwrap();

    assert_eq!(&sf.memory().bytes()[0x10..0x14], &[0xDE, 0xAD, 0xBE, 0xEF]);
}

#[test]
fn write_programs_mapped_memory_into_flash() {
    let mut sf = dispatcher(config());
    sf.dispatch(&["probe"]).unwrap();
    sf.memory_mut().load(RAM_BASE, &[0x12, 0x34]);

    sf.dispatch(&["write", "80000000", "100", "2"]).unwrap();

    assert_eq!(&sf.bus().contents()[0x100..0x102], &[0x12, 0x34]);
    assert_eq!(sf.bus().writes(), vec![(0x100, 2)]);
}

#[test]
fn unmappable_address_fails_without_touching_flash() {
    let mut sf = dispatcher(config());
    sf.dispatch(&["probe"]).unwrap();

    let err = sf.dispatch(&["read", "1000", "0", "4"]).unwrap_err();
    assert!(matches!(err, Error::MapFailed { .. }));
    assert!(sf.bus().reads().is_empty());
}

#[test]
fn update_skips_matching_blocks_and_rewrites_changed_ones() {
    let mut sf = dispatcher(config());
    sf.dispatch(&["probe"]).unwrap();

    // Two blocks on-chip: first already matches the source, second differs.
    let mut source = vec![0xAA; 2 * BLOCK as usize];
    source[BLOCK as usize..].fill(0x55);
    sf.bus().preload(0, &vec![0xAA; BLOCK as usize]);
    sf.memory_mut().load(RAM_BASE, &source);

    sf.dispatch(&["update", "80000000", "0", "2000"]).unwrap();

    assert_eq!(sf.bus().erases(), vec![(BLOCK, BLOCK)]);
    assert_eq!(sf.bus().writes(), vec![(BLOCK, BLOCK)]);
    assert_eq!(&sf.bus().contents()[..2 * BLOCK as usize], &source[..]);
}

#[test]
fn update_failure_carries_the_stage_and_keeps_progress() {
    let mut sf = dispatcher(config());
    sf.dispatch(&["probe"]).unwrap();
    sf.bus().fail_on(Op::Erase, 1);

    let source = vec![0x00; 3 * BLOCK as usize];
    sf.memory_mut().load(RAM_BASE, &source);

    let err = sf.dispatch(&["update", "80000000", "0", "3000"]).unwrap_err();
    assert_eq!(err, Error::EraseFailed);
    // The first block was updated before the fault and stays updated.
    assert!(sf.bus().contents()[..BLOCK as usize].iter().all(|&b| b == 0x00));
    assert!(sf.bus().contents()[BLOCK as usize..2 * BLOCK as usize]
        .iter()
        .all(|&b| b == 0xFF));
}

#[test]
fn erase_length_round_up_goes_through_the_parser() {
    let mut sf = dispatcher(config());
    sf.dispatch(&["probe"]).unwrap();

    sf.dispatch(&["erase", "0", "+1"]).unwrap();
    sf.dispatch(&["erase", "0x2000", "+0x1001"]).unwrap();
    sf.dispatch(&["erase", "0", "0x30"]).unwrap();

    assert_eq!(sf.bus().erases(), vec![(0, BLOCK), (0x2000, 2 * BLOCK), (0, 0x30)]);
}

#[test]
fn bulk_erase_unsupported_is_distinct_from_failure() {
    let mut cfg = config();
    cfg.bulk_erase_supported = false;
    let mut sf = dispatcher(cfg);
    sf.dispatch(&["probe"]).unwrap();

    assert_eq!(sf.dispatch(&["bulkerase"]), Err(Error::Unsupported));

    let mut sf = dispatcher(config());
    sf.dispatch(&["probe"]).unwrap();
    sf.bus().preload(0x10, &[0x00; 8]);
    sf.dispatch(&["bulkerase"]).unwrap();
    assert!(sf.bus().contents().iter().all(|&b| b == 0xFF));
}

#[test]
fn reprobe_replaces_the_selected_device() {
    let mut sf = dispatcher(config());
    sf.dispatch(&["probe", "0:0"]).unwrap();
    sf.dispatch(&["probe", "2:1", "500000"]).unwrap();

    let dev = sf.registry_mut().current().unwrap();
    assert_eq!((dev.bus, dev.cs, dev.speed_hz), (2, 1, 500_000));
}
