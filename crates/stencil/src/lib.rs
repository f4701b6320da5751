// lib.rs — Exposes the analysis engine to the binary, benchmarks and
// integration tests.
//
// The CLI entry point lives in main.rs; everything else is library
// surface so tests/ can drive the engine directly.

pub mod builtins;
pub mod cache;
pub mod definitions;
pub mod document;
pub mod json;
pub mod parameter_file;
pub mod position_context;
pub mod references;
pub mod scope;
pub mod span;
pub mod tle;
