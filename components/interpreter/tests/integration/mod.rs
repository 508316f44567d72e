//! Integration tests for interpreter
//!
//! Tests the interaction between the dispatch loop, the OSR controller,
//! frames and the pause gate, using simulated compiled tiers.

use bytecode_system::{assemble, Program};
use core_types::{IntegrityViolation, PackedPosition, Value, VmError, VmResult};
use interpreter::{
    execute_at, CompiledEntry, Frame, FrameKind, OsrCompiler, OsrController, OsrExit, OsrRequest,
    PauseGate, RawFrame, SafepointPoll, TierRuntime, VmConfig, VM,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const GCD: &str = "
.locals 3
loop:   const 0
        ld_loc 1
        less
        jump_false end
        ld_loc 0
        ld_loc 1
        mod
        st_loc 2
        ld_loc 1
        st_loc 0
        ld_loc 2
        st_loc 1
        jump loop
end:    ld_loc 0
        return
";

fn gcd() -> Program {
    assemble(GCD).unwrap()
}

fn gcd_cases() -> Vec<(i32, i32, i32)> {
    vec![
        (1071, 462, 21),
        (832_040, 514_229, 1),
        (270, 192, 6),
        (17, 0, 17),
        (0, 9, 9),
        (1 << 20, 1 << 12, 1 << 12),
    ]
}

/// Compiled tier that finishes the loop by copying the frame out, running
/// the interpreter on the copy, and copying the state back.
struct HandOff {
    program: Program,
    entries: AtomicUsize,
}

impl CompiledEntry for HandOff {
    fn enter(&self, frame: &mut dyn Frame, position: PackedPosition) -> VmResult<OsrExit> {
        self.entries.fetch_add(1, Ordering::SeqCst);
        let mut copy = RawFrame::new(frame.size());
        for (slot, value) in frame.snapshot().into_iter().enumerate() {
            copy.set_value(slot, value);
        }
        let mut untiered = OsrController::new(Arc::new(TierRuntime::new(
            &VmConfig::new().with_tiering(false),
        )));
        let result = execute_at(&self.program, &mut copy, position.unpack(), &mut untiered)?;
        for (slot, value) in copy.snapshot().into_iter().enumerate() {
            frame.set_value(slot, value);
        }
        Ok(OsrExit::Returned(result))
    }
}

/// Compiled tier that bails out immediately at the entry position.
struct BailOut {
    entries: AtomicUsize,
}

impl CompiledEntry for BailOut {
    fn enter(&self, _frame: &mut dyn Frame, position: PackedPosition) -> VmResult<OsrExit> {
        self.entries.fetch_add(1, Ordering::SeqCst);
        Ok(OsrExit::Deoptimized(position))
    }
}

struct HandOffCompiler;

impl OsrCompiler for HandOffCompiler {
    fn compile_loop(&self, request: &OsrRequest<'_>) -> Option<Arc<dyn CompiledEntry>> {
        Some(Arc::new(HandOff {
            program: request.program.clone(),
            entries: AtomicUsize::new(0),
        }))
    }
}

struct BailOutCompiler(Arc<BailOut>);

impl OsrCompiler for BailOutCompiler {
    fn compile_loop(&self, _request: &OsrRequest<'_>) -> Option<Arc<dyn CompiledEntry>> {
        Some(self.0.clone())
    }
}

fn vm_with(compiler: Arc<dyn OsrCompiler>, config: VmConfig) -> VM {
    let runtime = TierRuntime::new(&config).with_compiler(compiler);
    VM::with_runtime(config, runtime)
}

fn configs() -> Vec<VmConfig> {
    let mut all = Vec::new();
    for frame in [FrameKind::Raw, FrameKind::Checked] {
        for quicken in [false, true] {
            all.push(
                VmConfig::new()
                    .with_frame(frame)
                    .with_quicken(quicken)
                    .with_osr_threshold(2),
            );
        }
    }
    all
}

#[test]
fn test_gcd_interpreted() {
    let vm = VM::new();
    let program = gcd();
    for (a, b, expected) in gcd_cases() {
        let result = vm.execute_with_args(&program, &[Value::Int(a), Value::Int(b)]);
        assert_eq!(result, Ok(Value::Int(expected)), "gcd({}, {})", a, b);
    }
}

#[test]
fn test_gcd_identical_across_tiers() {
    let program = gcd();
    let reference = VM::new();

    for config in configs() {
        let plain = VM::with_config(config.clone());
        let handoff = vm_with(Arc::new(HandOffCompiler), config.clone());
        let bail = vm_with(
            Arc::new(BailOutCompiler(Arc::new(BailOut {
                entries: AtomicUsize::new(0),
            }))),
            config.clone(),
        );

        for (a, b, _) in gcd_cases() {
            let args = [Value::Int(a), Value::Int(b)];
            let expected = reference.execute_with_args(&program, &args);
            assert_eq!(plain.execute_with_args(&program, &args), expected, "{:?}", config);
            assert_eq!(handoff.execute_with_args(&program, &args), expected, "{:?}", config);
            assert_eq!(bail.execute_with_args(&program, &args), expected, "{:?}", config);
        }
    }
}

#[test]
fn test_handoff_actually_happens() {
    let program = gcd();
    let config = VmConfig::new().with_osr_threshold(1);
    let vm = vm_with(Arc::new(HandOffCompiler), config);
    let mut act = vm.activation::<RawFrame>(&program);
    act.set_arguments(&[Value::Int(1071), Value::Int(462)]).unwrap();
    assert_eq!(act.run(), Ok(Value::Int(21)));
    assert_eq!(act.controller().osr_entries(), 1);
    // the compiled tier wrote its final state back into our frame
    assert_eq!(act.frame().value(0), Value::Int(21));
    assert_eq!(act.frame().value(1), Value::Int(0));
}

#[test]
fn test_bailouts_are_invisible() {
    let program = gcd();
    let bail = Arc::new(BailOut {
        entries: AtomicUsize::new(0),
    });
    let vm = vm_with(
        Arc::new(BailOutCompiler(bail.clone())),
        VmConfig::new().with_osr_threshold(1),
    );
    let result = vm.execute_with_args(&program, &[Value::Int(832_040), Value::Int(514_229)]);
    assert_eq!(result, Ok(Value::Int(1)));
    assert!(bail.entries.load(Ordering::SeqCst) > 10);
}

#[test]
fn test_final_frames_match_with_and_without_fusion() {
    let program = gcd();
    let plain = VM::new();
    let quick = VM::with_config(VmConfig::new().with_quicken(true));

    let mut a = plain.activation::<RawFrame>(&program);
    let mut b = quick.activation::<RawFrame>(&program);
    for act in [&mut a, &mut b] {
        act.set_arguments(&[Value::Int(270), Value::Int(192)]).unwrap();
    }
    assert_eq!(a.run(), b.run());
    assert_eq!(a.frame(), b.frame());
}

#[test]
fn test_loop_reports_reach_profile() {
    let program = assemble(
        "
        .locals 1
                const 0
                st_loc 0
        loop:   ld_loc 0
                const 1000
                less
                jump_false done
                ld_loc 0
                const 1
                add
                st_loc 0
                jump loop
        done:   ld_loc 0
                return
        ",
    )
    .unwrap();
    let config = VmConfig::new().with_osr_threshold(u32::MAX);
    let bail = Arc::new(BailOut {
        entries: AtomicUsize::new(0),
    });
    let vm = vm_with(Arc::new(BailOutCompiler(bail)), config);
    assert_eq!(vm.execute(&program), Ok(Value::Int(1000)));
    // 1000 back-edges, reported in lumps of 256
    assert_eq!(vm.profile().reports(), 3);
    assert_eq!(vm.profile().count(program.id(), 5), 768);
}

#[test]
fn test_unknown_opcode_inside_loop_is_fatal() {
    let mut code = gcd().code().to_vec();
    // replace the `mod` with garbage
    code[12] = 0x0bad;
    let program = Program::unverified(code, 3, 2, gcd().constants().clone());
    let vm = VM::new();
    let err = vm
        .execute_with_args(&program, &[Value::Int(10), Value::Int(4)])
        .unwrap_err();
    assert_eq!(
        err,
        VmError::Integrity(IntegrityViolation::UnknownOpcode {
            bci: 12,
            word: 0x0bad
        })
    );
    assert!(err.to_string().contains("should not reach here"));
}

#[test]
fn test_pause_gate_parks_running_loops() {
    let program = assemble(
        "
        .locals 1
                const 0
                st_loc 0
        loop:   ld_loc 0
                const 200000
                less
                jump_false done
                ld_loc 0
                const 1
                add
                st_loc 0
                jump loop
        done:   ld_loc 0
                return
        ",
    )
    .unwrap();

    let gate = Arc::new(PauseGate::new());
    let config = VmConfig::default();
    let runtime = TierRuntime::new(&config).with_safepoint(gate.clone() as Arc<dyn SafepointPoll>);
    let vm = Arc::new(VM::with_runtime(config, runtime));

    let guard = gate.request_pause();
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let vm = Arc::clone(&vm);
            let program = program.clone();
            thread::spawn(move || vm.execute(&program))
        })
        .collect();

    assert!(gate.wait_for_parked(4, Duration::from_secs(10)));
    drop(guard);

    for h in handles {
        assert_eq!(h.join().unwrap(), Ok(Value::Int(200_000)));
    }
    assert_eq!(gate.parked(), 0);
}
