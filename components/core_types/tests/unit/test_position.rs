//! Unit tests for InterpreterPosition packing

use core_types::{InterpreterPosition, PackedPosition};

#[test]
fn test_round_trip_all_small_positions() {
    for bci in 0..512u16 {
        for sp in 0..16u16 {
            let pos = InterpreterPosition::new(bci, sp);
            let packed = pos.pack();
            assert_eq!(packed.unpack(), pos);
            assert_eq!(PackedPosition::from_raw(packed.raw()).unpack(), pos);
        }
    }
}

#[test]
fn test_sp_lives_in_high_half() {
    let packed = InterpreterPosition::new(0, 1).pack();
    assert_eq!(packed.raw(), 0x0001_0000);
    let packed = InterpreterPosition::new(1, 0).pack();
    assert_eq!(packed.raw(), 0x0000_0001);
}

#[test]
fn test_conversions() {
    let pos = InterpreterPosition::new(33, 4);
    let packed: PackedPosition = pos.into();
    let back: InterpreterPosition = packed.into();
    assert_eq!(back, pos);
    assert_eq!(pos.to_string(), "bci=33 sp=4");
}

#[test]
fn test_from_offsets_never_wraps() {
    use core_types::IntegrityViolation;

    let err = InterpreterPosition::from_offsets(70_000, 1).unwrap_err();
    assert_eq!(err, IntegrityViolation::PositionOutOfRange { bci: 70_000, sp: 1 });
    assert!(err.to_string().contains("70000"));
}
