// This module serves as the hub for the infrastructure shared by every part of the
// static GC descriptor emitter: the arena-backed compilation session that interns symbol
// names and gathers emission statistics, and the error types surfaced by the graph, the
// listing parser, the image writer and the region reader.

//! Core infrastructure.
//!
//! ## Session Management (`session`)
//! - Arena-based interning of symbol names using `bumpalo`
//! - Emission statistics
//!
//! ## Errors (`error`)
//! - `thiserror` based error enums and `Result` aliases

pub mod error;
pub mod session;

pub use session::{CompilationSession, SessionStats};

pub use error::{
    EmitError,
    EmitResult,
    GraphError,
    GraphResult,
    ParseError,
    RegionReadError,
};
