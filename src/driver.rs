//! One-shot compilation of a type-layout listing into an ELF image.

use std::fs;
use std::path::Path;

use bumpalo::Bump;

use crate::core::{CompilationSession, EmitResult, SessionStats};
use crate::emit::ImageWriter;
use crate::graph::{DependencyGraph, NodeFactory};
use crate::layout::{parse_listing, LayoutListing};

/// An emitted object file and the statistics of the session that built it.
#[derive(Debug, Clone)]
pub struct BuiltImage {
    pub bytes: Vec<u8>,
    pub stats: SessionStats,
}

/// Read and parse a type-layout listing from disk.
pub fn read_listing(path: &Path) -> EmitResult<LayoutListing> {
    let text = fs::read_to_string(path)?;
    Ok(parse_listing(&text)?)
}

/// Mark the listing's roots, run the mark phase and write the image for the
/// listing's target.
pub fn build_image(listing: &LayoutListing) -> EmitResult<BuiltImage> {
    let arena = Bump::new();
    let target = listing.table.target();
    let mut factory = NodeFactory::new(CompilationSession::new(&arena), &listing.table);
    let mut graph = DependencyGraph::new();

    for root in &listing.roots {
        let node = factory.gc_static_desc(root.ty, root.thread_static);
        graph.add_root(node, "listing root");
    }
    graph.compute_marked_nodes(&mut factory)?;

    let bytes = ImageWriter::new(&factory, &graph, target).write()?;
    let stats = factory.session().stats();
    log::debug!("{}", stats);
    Ok(BuiltImage { bytes, stats })
}
