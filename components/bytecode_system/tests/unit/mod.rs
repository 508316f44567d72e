//! Integration test runner for unit tests
//! This file makes cargo test discover the unit test modules

#[path = "test_pool.rs"]
mod test_pool;

#[path = "test_verifier.rs"]
mod test_verifier;

#[path = "test_quicken.rs"]
mod test_quicken;

#[path = "test_asm.rs"]
mod test_asm;
