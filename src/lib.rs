//! Static GC descriptor emission.
//!
//! Every type with GC-tracked static fields gets a compact descriptor that
//! run-length encodes which pointer-sized slots of its static block hold
//! references. Descriptors are collected into four regions, split by static
//! versus thread-static storage and by concrete versus canonical (shared
//! generic) types, so the garbage collector can enumerate static roots
//! without per-type metadata walks.
//!
//! # Primary Usage
//!
//! ```ignore
//! use gcstatics::core::CompilationSession;
//! use gcstatics::emit::ImageWriter;
//! use gcstatics::graph::{DependencyGraph, NodeFactory};
//! use bumpalo::Bump;
//!
//! let arena = Bump::new();
//! let mut factory = NodeFactory::new(CompilationSession::new(&arena), &types);
//! let mut graph = DependencyGraph::new();
//! graph.add_root(factory.gc_static_desc(ty, false), "root");
//! graph.compute_marked_nodes(&mut factory)?;
//! let object = ImageWriter::new(&factory, &graph, target).write()?;
//! ```
//!
//! # Architecture
//!
//! - [`layout`] - Reference bitmaps, the type layout oracle and listings
//! - [`gcdesc`] - Descriptor encoding, regions and region decoding
//! - [`graph`] - Node factory and mark phase
//! - [`emit`] - Two-pass object data emission and the ELF writer
//! - [`core`] - Session, statistics and errors
//! - [`dump`] - Reading emitted images back

pub mod core;
pub mod driver;
pub mod dump;
pub mod emit;
pub mod gcdesc;
pub mod graph;
pub mod layout;
pub mod target;

pub use crate::core::{
    CompilationSession, EmitError, EmitResult, GraphError, GraphResult, ParseError,
    RegionReadError, SessionStats,
};
pub use driver::{build_image, read_listing, BuiltImage};
pub use emit::{EmissionPass, ImageWriter};
pub use gcdesc::{GcStaticDescKind, GcStaticDescNode, GcStaticDescRegion};
pub use graph::{DependencyGraph, NodeFactory, NodeId};
pub use layout::{parse_listing, ReferenceBitmap, TypeId, TypeLayout, TypeTable};
pub use target::{TargetArchitecture, TargetDetails};
