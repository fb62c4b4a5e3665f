//! HIR transformation passes for the Reed compiler.
//!
//! Currently one pass lives here: push-style iteration elimination
//! ([`pushiter`]), which lowers `for x in iter { ... }` loops over
//! iterator functions into plain calls before code generation.

pub mod fault;
pub mod pushiter;

pub use fault::TranslationFault;
pub use pushiter::{rewrite, rewrite_module, REPLAY_FAULT_MESSAGE};
