//! Integration test suite for the loop VM
//!
//! This crate provides integration tests that verify components work
//! together correctly across component boundaries, plus the programs and
//! VM setups the tests share.

use bytecode_system::{assemble, Program};
use interpreter::{SafepointPoll, TierRuntime, VmConfig, VM};
use jit_compiler::{CompilerConfig, LoopTier};
use std::sync::Arc;

/// Re-export components for test convenience
pub mod components {
    pub use bytecode_system;
    pub use core_types;
    pub use interpreter;
    pub use jit_compiler;
    pub use vm_cli;
}

/// gcd(a, b) in locals 0 and 1
pub const GCD: &str = "
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

/// Sum over i < n and j < m of (i + j) mod 7, as nested loops; n, m in
/// locals 0 and 1
pub const NESTED: &str = "
.locals 5
        const 0
        st_loc 2            # i
        const 0
        st_loc 4            # acc
outer:  ld_loc 2
        ld_loc 0
        less
        jump_false done
        const 0
        st_loc 3            # j
inner:  ld_loc 3
        ld_loc 1
        less
        jump_false next
        ld_loc 4
        ld_loc 2
        ld_loc 3
        add
        const 7
        mod
        add
        st_loc 4
        ld_loc 3
        const 1
        add
        st_loc 3
        jump inner
next:   ld_loc 2
        const 1
        add
        st_loc 2
        jump outer
done:   ld_loc 4
        return
";

/// Assemble one of the shared sources
pub fn program(source: &str) -> Program {
    match assemble(source) {
        Ok(program) => program,
        Err(e) => panic!("test program does not assemble: {}", e),
    }
}

/// Host-side reference for [`NESTED`]
pub fn nested_reference(n: i32, m: i32) -> i32 {
    let mut acc = 0i32;
    for i in 0..n.max(0) {
        for j in 0..m.max(0) {
            acc = acc.wrapping_add((i + j) % 7);
        }
    }
    acc
}

/// VM with a compiled loop tier attached
pub fn tiered_vm(config: VmConfig, compiler: CompilerConfig) -> (VM, Arc<LoopTier>) {
    let tier = Arc::new(LoopTier::new(compiler));
    let runtime = TierRuntime::new(&config).with_compiler(tier.clone());
    (VM::with_runtime(config, runtime), tier)
}

/// Like [`tiered_vm`], polling `safepoint` at every back-edge
pub fn tiered_vm_with_safepoint(
    config: VmConfig,
    compiler: CompilerConfig,
    safepoint: Arc<dyn SafepointPoll>,
) -> (VM, Arc<LoopTier>) {
    let tier = Arc::new(LoopTier::new(compiler));
    let runtime = TierRuntime::new(&config)
        .with_compiler(tier.clone())
        .with_safepoint(safepoint);
    (VM::with_runtime(config, runtime), tier)
}
