//! Concurrency: shared VMs, the background compiler and the pause gate

use core_types::Value;
use integration_tests::{
    nested_reference, program, tiered_vm, tiered_vm_with_safepoint, GCD, NESTED,
};
use interpreter::{PauseGate, SafepointPoll, VmConfig};
use jit_compiler::CompilerConfig;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Default)]
struct CountingSafepoint(AtomicU64);

impl SafepointPoll for CountingSafepoint {
    fn poll(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }
}

#[test]
fn test_shared_vm_across_threads() {
    let (vm, tier) = tiered_vm(
        VmConfig::new().with_osr_threshold(4).with_quicken(true),
        CompilerConfig::new().with_background(true),
    );
    let vm = Arc::new(vm);
    let gcd = program(GCD);
    let nested = program(NESTED);

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let vm = Arc::clone(&vm);
            let gcd = gcd.clone();
            let nested = nested.clone();
            thread::spawn(move || {
                for round in 0..20 {
                    let n = 10 + t + round;
                    let got = vm.execute_with_args(&nested, &[Value::Int(n), Value::Int(9)]);
                    assert_eq!(got, Ok(Value::Int(nested_reference(n, 9))));
                    let got = vm.execute_with_args(&gcd, &[Value::Int(832_040), Value::Int(514_229)]);
                    assert_eq!(got, Ok(Value::Int(1)));
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let queue = tier.queue().unwrap();
    let mut attempts = 0;
    while !queue.is_empty() && attempts < 200 {
        thread::sleep(Duration::from_millis(5));
        attempts += 1;
    }
    let (_, completed, failed, _) = queue.stats().snapshot();
    assert_eq!(failed, 0);
    assert!(completed >= 1);
}

#[test]
fn test_compiled_loops_poll_safepoint() {
    let source = "
        .locals 1
                const 0
                st_loc 0
        loop:   ld_loc 0
                const 3000
                less
                jump_false done
                ld_loc 0
                const 1
                add
                st_loc 0
                jump loop
        done:   ld_loc 0
                return
    ";
    let counter = Arc::new(CountingSafepoint::default());
    let (vm, tier) = tiered_vm_with_safepoint(
        VmConfig::new().with_osr_threshold(1),
        CompilerConfig::default(),
        counter.clone(),
    );
    let prog = program(source);
    assert_eq!(vm.execute(&prog), Ok(Value::Int(3000)));
    // one poll in the interpreter, the rest in compiled code
    assert_eq!(counter.0.load(Ordering::Relaxed), 3000);
    assert_eq!(tier.cache().compiled((prog.id(), 5)).unwrap().entries(), 1);
}

#[test]
fn test_pause_gate_holds_tiered_activations() {
    let gate = Arc::new(PauseGate::new());
    let (vm, _tier) = tiered_vm_with_safepoint(
        VmConfig::new().with_osr_threshold(1),
        CompilerConfig::default(),
        gate.clone(),
    );
    let vm = Arc::new(vm);
    let gcd = program(GCD);

    let guard = gate.request_pause();
    let handles: Vec<_> = (0..3)
        .map(|_| {
            let vm = Arc::clone(&vm);
            let gcd = gcd.clone();
            thread::spawn(move || vm.execute_with_args(&gcd, &[Value::Int(1071), Value::Int(462)]))
        })
        .collect();

    assert!(gate.wait_for_parked(3, Duration::from_secs(10)));
    assert!(gate.is_pause_requested());
    drop(guard);

    for h in handles {
        assert_eq!(h.join().unwrap(), Ok(Value::Int(21)));
    }
}

#[test]
fn test_invalidation_while_other_threads_run() {
    let (vm, tier) = tiered_vm(VmConfig::new().with_osr_threshold(2), CompilerConfig::default());
    let vm = Arc::new(vm);
    let nested = program(NESTED);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let vm = Arc::clone(&vm);
            let nested = nested.clone();
            thread::spawn(move || {
                for _ in 0..10 {
                    let got = vm.execute_with_args(&nested, &[Value::Int(40), Value::Int(40)]);
                    assert_eq!(got, Ok(Value::Int(nested_reference(40, 40))));
                }
            })
        })
        .collect();
    for _ in 0..10 {
        tier.invalidate(nested.id());
        thread::sleep(Duration::from_millis(1));
    }
    for h in handles {
        h.join().unwrap();
    }
}
