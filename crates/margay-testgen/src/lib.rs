//! Test generation for C functions under migration.
//!
//! Three input strategies (boundary, edge, random) synthesize per-parameter
//! vectors combined linearly, and an external symbolic-execution engine can
//! contribute path-derived inputs. The generator also emits the C test
//! harness whose stdout follows the line protocol both runners parse.

pub mod generator;
pub mod harness;
pub mod inputs;
pub mod symbolic;

pub use generator::{TestGenerator, TestStrategy};
pub use harness::emit_c_harness;
pub use inputs::{InputGenerator, InputStrategy, DEFAULT_SEED};
pub use symbolic::{SymbolicConfig, SymbolicEngine, SymbolicError, SymbolicTestCase};
