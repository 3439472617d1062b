// This module defines the error types of the static GC descriptor emitter using the
// thiserror crate. EmitError is the top-level error surfaced by the image writer and the
// object dumper: it wraps object file writing and reading failures, I/O errors, listing
// errors, addends that do not fit their field, graph misuse and malformed descriptor
// regions without retrying anything. GraphError covers misuse of the dependency graph
// (emitting before the mark phase reached a fixed point, unknown nodes). ParseError
// reports problems in type-layout listings with the offending line number.
// RegionReadError is raised when decoding a descriptor region whose size does not agree
// with its series-count header. Internal consistency faults such as a series-count
// mismatch are not represented here: they are assertions.

//! Error types for static GC descriptor emission.
//!
//! Using thiserror for more idiomatic error handling.

use thiserror::Error;

/// Main error type for image emission.
#[derive(Error, Debug)]
pub enum EmitError {
    #[error("Object file generation failed: {0}")]
    ObjectWrite(#[from] object::write::Error),

    #[error("Object file parsing failed: {0}")]
    ObjectRead(#[from] object::read::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Region(#[from] RegionReadError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Relocation addend {addend} at offset {offset:#x} does not fit a 32-bit field")]
    AddendOutOfRange {
        offset: u32,
        addend: i64,
    },

    #[error("Symbol not found: {name}")]
    SymbolNotFound {
        name: String,
    },

    #[error("Unsupported object architecture: {architecture}")]
    UnsupportedArchitecture {
        architecture: String,
    },

    #[error("Malformed object: {reason}")]
    MalformedObject {
        reason: String,
    },
}

/// Errors raised by the dependency graph and the node factory.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Mark phase has not reached a fixed point: {pending} node(s) pending")]
    MarkPhaseIncomplete {
        pending: usize,
    },

    #[error("Unknown node: #{index}")]
    UnknownNode {
        index: u32,
    },
}

/// Errors found while parsing a type-layout listing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("line {line}: unknown directive '{directive}'")]
    UnknownDirective {
        line: usize,
        directive: String,
    },

    #[error("line {line}: invalid slot '{slot}' in reference map (expected 'R' or '.')")]
    InvalidSlot {
        line: usize,
        slot: char,
    },

    #[error("line {line}: unknown target '{name}'")]
    UnknownTarget {
        line: usize,
        name: String,
    },

    #[error("line {line}: type '{name}' is defined twice")]
    DuplicateType {
        line: usize,
        name: String,
    },

    #[error("line {line}: type '{name}' is not defined")]
    UnknownType {
        line: usize,
        name: String,
    },

    #[error("line {line}: {reason}")]
    Malformed {
        line: usize,
        reason: String,
    },
}

/// Errors found while decoding an emitted descriptor region.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegionReadError {
    #[error("Region is too short to hold a series-count header ({len} bytes)")]
    MissingHeader {
        len: usize,
    },

    #[error("Region holds {actual} bytes but its header announces {series} series ({expected} bytes)")]
    SizeMismatch {
        series: u32,
        expected: usize,
        actual: usize,
    },
}

/// Result type alias for emission operations.
pub type EmitResult<T> = Result<T, EmitError>;

/// Result type alias for graph operations.
pub type GraphResult<T> = Result<T, GraphError>;
