//! Tiering and fusion transparency
//!
//! The same program must produce the same result whether it runs plain,
//! quickened, through compiled loops, through compiled loops that keep
//! bailing out, or with loops compiled in the background, on either frame
//! kind.

use core_types::{IntegrityViolation, Value, VmError};
use integration_tests::{nested_reference, program, tiered_vm, GCD, NESTED};
use interpreter::{FrameKind, RawFrame, VmConfig, VM};
use jit_compiler::{CompilerConfig, LoopState};

fn setups(frame: FrameKind) -> Vec<(String, VM)> {
    let mut vms = Vec::new();
    for quicken in [false, true] {
        let base = VmConfig::new().with_frame(frame).with_quicken(quicken);
        let tag = |what: &str| format!("{:?} quicken={} {}", frame, quicken, what);

        vms.push((tag("plain"), VM::with_config(base.clone().with_tiering(false))));
        vms.push((
            tag("forced osr"),
            tiered_vm(base.clone().with_osr_threshold(1), CompilerConfig::default()).0,
        ));
        vms.push((
            tag("stress deopt"),
            tiered_vm(
                base.clone().with_osr_threshold(3),
                CompilerConfig::new().with_stress_deopt_after(2),
            )
            .0,
        ));
        vms.push((
            tag("background"),
            tiered_vm(
                base.clone().with_osr_threshold(1),
                CompilerConfig::new().with_background(true),
            )
            .0,
        ));
    }
    vms
}

#[test]
fn test_gcd_everywhere() {
    let gcd = program(GCD);
    let cases = [
        (1071, 462, 21),
        (832_040, 514_229, 1),
        (48, 18, 6),
        (7, 0, 7),
        (0, 5, 5),
        (12, 18, 6),
    ];
    for frame in [FrameKind::Raw, FrameKind::Checked] {
        for (name, vm) in setups(frame) {
            for (a, b, expected) in cases {
                let result = vm.execute_with_args(&gcd, &[Value::Int(a), Value::Int(b)]);
                assert_eq!(result, Ok(Value::Int(expected)), "{}: gcd({}, {})", name, a, b);
            }
        }
    }
}

#[test]
fn test_nested_loops_everywhere() {
    let nested = program(NESTED);
    for frame in [FrameKind::Raw, FrameKind::Checked] {
        for (name, vm) in setups(frame) {
            for (n, m) in [(0, 5), (3, 0), (20, 30), (64, 7)] {
                let result = vm.execute_with_args(&nested, &[Value::Int(n), Value::Int(m)]);
                assert_eq!(
                    result,
                    Ok(Value::Int(nested_reference(n, m))),
                    "{}: nested({}, {})",
                    name,
                    n,
                    m
                );
            }
        }
    }
}

#[test]
fn test_inner_loop_entry_finishes_outer_loop() {
    let nested = program(NESTED);
    let (vm, tier) = tiered_vm(VmConfig::new().with_osr_threshold(5), CompilerConfig::default());
    let mut act = vm.activation::<RawFrame>(&nested);
    act.set_arguments(&[Value::Int(50), Value::Int(50)]).unwrap();
    assert_eq!(act.run(), Ok(Value::Int(nested_reference(50, 50))));
    // the first loop to get hot is the inner one, and its compiled code
    // runs the rest of the activation, outer loop included
    assert_eq!(act.controller().osr_entries(), 1);
    assert_eq!(tier.cache().compiled_count(), 1);
}

#[test]
fn test_locals_identical_after_compiled_run() {
    let gcd = program(GCD);
    let plain = VM::with_config(VmConfig::new().with_tiering(false));
    let (fast, _) = tiered_vm(VmConfig::new().with_osr_threshold(2), CompilerConfig::default());
    let (stressed, _) = tiered_vm(
        VmConfig::new().with_osr_threshold(2),
        CompilerConfig::new().with_stress_deopt_after(1),
    );

    let mut expected = plain.activation::<RawFrame>(&gcd);
    expected.set_arguments(&[Value::Int(832_040), Value::Int(514_229)]).unwrap();
    expected.run().unwrap();

    for vm in [&fast, &stressed] {
        let mut act = vm.activation::<RawFrame>(&gcd);
        act.set_arguments(&[Value::Int(832_040), Value::Int(514_229)]).unwrap();
        act.run().unwrap();
        assert_eq!(act.frame(), expected.frame());
    }
}

#[test]
fn test_repeated_deopts_fall_back_to_interpreter() {
    let gcd = program(GCD);
    let (vm, tier) = tiered_vm(
        VmConfig::new().with_osr_threshold(1),
        CompilerConfig::new()
            .with_stress_deopt_after(1)
            .with_max_deopts_per_loop(3),
    );
    let result = vm.execute_with_args(&gcd, &[Value::Int(832_040), Value::Int(514_229)]);
    assert_eq!(result, Ok(Value::Int(1)));
    let key = (gcd.id(), 0);
    assert_eq!(tier.cache().deopt_count(key), 3);
    assert!(matches!(tier.cache().lookup(key), Some(LoopState::Disabled)));
}

#[test]
fn test_fatal_errors_are_identical() {
    let source = "
        .locals 2
        loop:   ld_loc 0
                const 0
                less
                jump_false body
                ld_loc 0
                ld_loc 1
                mod
                return
        body:   ld_loc 0
                const -1
                add
                st_loc 0
                jump loop
    ";
    let prog = program(source);
    let expected = VmError::Integrity(IntegrityViolation::DivisionByZero { bci: 12 });
    for frame in [FrameKind::Raw, FrameKind::Checked] {
        for (name, vm) in setups(frame) {
            let result = vm.execute_with_args(&prog, &[Value::Int(100), Value::Int(0)]);
            assert_eq!(result, Err(expected.clone()), "{}", name);
        }
    }
}

#[test]
fn test_type_mismatch_only_on_checked_frames() {
    let gcd = program(GCD);
    let args = [Value::Boolean(true), Value::Int(3)];

    let checked = VM::with_config(VmConfig::new().with_frame(FrameKind::Checked));
    assert!(matches!(
        checked.execute_with_args(&gcd, &args),
        Err(VmError::TypeMismatch(_))
    ));

    // raw frames read the boolean's bits as 1
    let raw = VM::with_config(VmConfig::new().with_frame(FrameKind::Raw));
    assert_eq!(raw.execute_with_args(&gcd, &args), Ok(Value::Int(1)));
}
