//! Activation state.

use crate::dispatch;
use crate::frame::Frame;
use crate::osr::{OsrController, TierRuntime};
use bytecode_system::Program;
use core_types::{IntegrityViolation, InterpreterPosition, Value, VmResult};
use std::sync::Arc;

/// One invocation of a program: its frame plus its own back-edge counters.
///
/// An activation runs on one thread at a time; nothing in it is shared.
#[derive(Debug)]
pub struct Activation<F: Frame> {
    program: Program,
    frame: F,
    osr: OsrController,
}

impl<F: Frame> Activation<F> {
    /// Fresh activation with every slot cleared
    pub fn new(program: Program, runtime: Arc<TierRuntime>) -> Self {
        let frame = F::with_size(program.frame_size());
        Self {
            program,
            frame,
            osr: OsrController::new(runtime),
        }
    }

    /// Store `value` into local `slot`
    pub fn set_local(&mut self, slot: usize, value: Value) -> VmResult<()> {
        if slot >= self.program.locals() as usize {
            return Err(IntegrityViolation::SlotOutOfRange { bci: 0, index: slot }.into());
        }
        self.frame.set_value(slot, value);
        Ok(())
    }

    /// Store `args` into locals `0..args.len()`
    pub fn set_arguments(&mut self, args: &[Value]) -> VmResult<()> {
        for (slot, arg) in args.iter().enumerate() {
            self.set_local(slot, arg.clone())?;
        }
        Ok(())
    }

    /// Run from the first instruction
    pub fn run(&mut self) -> VmResult<Value> {
        dispatch::execute(&self.program, &mut self.frame, &mut self.osr)
    }

    /// Run from an explicit position
    pub fn run_from(&mut self, position: InterpreterPosition) -> VmResult<Value> {
        dispatch::execute_at(&self.program, &mut self.frame, position, &mut self.osr)
    }

    /// The program being run
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// The frame
    pub fn frame(&self) -> &F {
        &self.frame
    }

    /// Back-edge state
    pub fn controller(&self) -> &OsrController {
        &self.osr
    }
}
