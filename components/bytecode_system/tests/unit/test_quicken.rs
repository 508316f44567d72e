//! Tests for superinstruction fusion on a realistic loop

use bytecode_system::{assemble, dequicken, Opcode, Program, Quickener};

const GCD: &str = "
.locals 3
        const 1071
        st_loc 0
        const 462
        st_loc 1
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

#[test]
fn test_gcd_fuses_every_loop_sequence() {
    let program = gcd();
    let (quick, stats) = Quickener::new().quicken(&program);

    assert_eq!(stats.total(), 4);
    assert_eq!(quick.code()[10], Opcode::SiConstLdLessJf.word());
    assert_eq!(quick.code()[18], Opcode::SiLdLdModSt.word());
    assert_eq!(quick.code()[25], Opcode::SiLdSt.word());
    assert_eq!(quick.code()[29], Opcode::SiLdStJump.word());
    assert_eq!(quick.len(), program.len());
    assert_eq!(quick.max_stack(), program.max_stack());
}

#[test]
fn test_quickened_instruction_stream_skips_fused_parts() {
    let (quick, _) = Quickener::new().quicken(&gcd());
    let starts: Vec<usize> = quick.instructions().map(|i| i.unwrap().bci).collect();
    assert_eq!(starts, vec![0, 3, 5, 8, 10, 18, 25, 29, 35, 37]);
}

#[test]
fn test_quickening_twice_is_stable() {
    let (once, _) = Quickener::new().quicken(&gcd());
    let (twice, stats) = Quickener::new().quicken(&once);
    assert_eq!(stats.total(), 0);
    assert_eq!(once.code(), twice.code());
}

#[test]
fn test_dequicken_round_trip() {
    let program = gcd();
    let (quick, _) = Quickener::new().quicken(&program);
    assert_eq!(dequicken(&quick).code(), program.code());
}

#[test]
fn test_quickened_program_reverifies() {
    let (quick, _) = Quickener::new().quicken(&gcd());
    let reverified = Program::verified(
        quick.code().to_vec(),
        quick.locals(),
        quick.constants().clone(),
    )
    .unwrap();
    assert_eq!(reverified.max_stack(), quick.max_stack());
}
