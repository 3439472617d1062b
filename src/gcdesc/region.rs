//! Descriptor regions.
//!
//! A region is the contiguous table of every reachable descriptor of one
//! [`GcStaticDescKind`]. Its layout is a 4-byte total series count followed
//! by the members' series records in registration order, which is the order
//! in which the dependency graph first marked each member. The header lets a
//! runtime scanner walk the table without knowing the member boundaries.

use super::{GcStaticDescKind, REGION_HEADER_SIZE, SERIES_RECORD_SIZE};
use crate::core::GraphResult;
use crate::emit::{EmissionPass, ObjectData, ObjectDataBuilder, ObjectSection};
use crate::graph::{NodeFactory, NodeId};

/// Aggregator of all reachable descriptors of one kind.
#[derive(Debug, Clone)]
pub struct GcStaticDescRegion {
    kind: GcStaticDescKind,
    node: NodeId,
    members: Vec<NodeId>,
}

impl GcStaticDescRegion {
    pub fn new(kind: GcStaticDescKind, node: NodeId) -> Self {
        Self {
            kind,
            node,
            members: Vec::new(),
        }
    }

    pub fn kind(&self) -> GcStaticDescKind {
        self.kind
    }

    /// Graph node standing for this region.
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn symbol(&self) -> &'static str {
        self.kind.region_symbol()
    }

    /// Members in registration order.
    pub fn members(&self) -> &[NodeId] {
        &self.members
    }

    /// Append a member. Callers guarantee each descriptor is added once.
    pub(crate) fn add_member(&mut self, member: NodeId) {
        debug_assert!(!self.members.contains(&member));
        self.members.push(member);
    }

    /// Emit the header and every member's series records.
    ///
    /// Member symbols are only published by the final pass; both passes
    /// produce the same number of bytes.
    pub fn emit_all(
        &self,
        factory: &NodeFactory<'_>,
        pass: EmissionPass,
    ) -> GraphResult<ObjectData> {
        let members = self
            .members
            .iter()
            .map(|&id| factory.gc_static_desc_node(id).map(|desc| (id, desc)))
            .collect::<GraphResult<Vec<_>>>()?;

        let total_series: u32 = members.iter().map(|(_, desc)| desc.series_count()).sum();
        let pointer_size = factory.pointer_size();

        let mut builder = ObjectDataBuilder::new(pass, ObjectSection::ReadOnlyRelocated, 4);
        builder.emit_u32(total_series);

        for (id, desc) in &members {
            if !builder.pass().is_relocs_only() {
                builder.add_symbol_at_cursor(*id);
            }
            desc.encode(&mut builder, pointer_size);
            if !builder.pass().is_relocs_only() {
                builder.finish_symbol();
            }
        }

        let size = builder.cursor();
        assert_eq!(
            size as usize,
            REGION_HEADER_SIZE + total_series as usize * SERIES_RECORD_SIZE,
            "{} header does not match its members",
            self.symbol()
        );

        if !builder.pass().is_relocs_only() {
            builder.add_symbol(self.node, 0, size);
            factory.session().record_region_emitted(self.kind, total_series, size as usize);
            log::debug!(
                "Emitted {}: {} members, {} series, {} bytes",
                self.symbol(),
                members.len(),
                total_series,
                size
            );
        }

        Ok(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::CompilationSession;
    use crate::graph::DependencyGraph;
    use crate::layout::{ReferenceBitmap, TypeEntry, TypeTable};
    use bumpalo::Bump;

    fn table(types: &[(&str, &str)]) -> TypeTable {
        let mut table = TypeTable::default();
        for (name, map) in types {
            table.add_type(TypeEntry {
                name: name.to_string(),
                canonical: false,
                statics: ReferenceBitmap::from_slots(map.chars().map(|c| c == 'R').collect()),
                thread_statics: ReferenceBitmap::default(),
            });
        }
        table
    }

    fn header(data: &ObjectData) -> u32 {
        u32::from_le_bytes([data.data[0], data.data[1], data.data[2], data.data[3]])
    }

    #[test]
    fn test_header_is_sum_of_members() {
        let arena = Bump::new();
        let types = table(&[("A", "RR.R"), ("B", "R.R.R"), ("C", "....")]);
        let mut factory = NodeFactory::new(CompilationSession::new(&arena), &types);
        let mut graph = DependencyGraph::new();

        let mut series = 0;
        for name in ["A", "B", "C"] {
            let desc = factory.gc_static_desc(types.lookup(name).unwrap(), false);
            series += factory.gc_static_desc_node(desc).unwrap().series_count();
            graph.add_root(desc, "test root");
        }
        graph.compute_marked_nodes(&mut factory).unwrap();

        let region = factory.region(GcStaticDescKind::StaticConcrete);
        let data = region.emit_all(&factory, EmissionPass::Final).unwrap();
        assert_eq!(series, 5);
        assert_eq!(header(&data), 5);
        assert_eq!(data.len(), 4 + 5 * 8);
        assert_eq!(data.relocs.len(), 5);
    }

    #[test]
    fn test_member_offsets_follow_registration_order() {
        let arena = Bump::new();
        let types = table(&[("A", "R"), ("B", "R.R")]);
        let mut factory = NodeFactory::new(CompilationSession::new(&arena), &types);
        let mut graph = DependencyGraph::new();

        // B is discovered first, so it is laid out first.
        let b = factory.gc_static_desc(types.lookup("B").unwrap(), false);
        let a = factory.gc_static_desc(types.lookup("A").unwrap(), false);
        graph.add_root(b, "first");
        graph.add_root(a, "second");
        graph.compute_marked_nodes(&mut factory).unwrap();

        let region = factory.region(GcStaticDescKind::StaticConcrete);
        assert_eq!(region.members(), &[b, a]);

        let data = region.emit_all(&factory, EmissionPass::Final).unwrap();
        assert_eq!(data.symbol_offset(b), Some(4));
        assert_eq!(data.symbol_offset(a), Some(20));
        assert_eq!(data.symbol_offset(region.node()), Some(0));
    }

    #[test]
    fn test_discovery_pass_matches_final_pass() {
        let arena = Bump::new();
        let types = table(&[("A", "RRR.R"), ("B", ".R"), ("C", "")]);
        let mut factory = NodeFactory::new(CompilationSession::new(&arena), &types);
        let mut graph = DependencyGraph::new();
        for ty in types.types() {
            let desc = factory.gc_static_desc(ty, false);
            graph.add_root(desc, "test root");
        }
        graph.compute_marked_nodes(&mut factory).unwrap();

        let region = factory.region(GcStaticDescKind::StaticConcrete);
        let discovery = region.emit_all(&factory, EmissionPass::RelocsOnly).unwrap();
        let final_data = region.emit_all(&factory, EmissionPass::Final).unwrap();

        assert_eq!(discovery.len(), final_data.len());
        assert_eq!(discovery.data, final_data.data);
        assert!(discovery.symbols.is_empty());
        assert_eq!(final_data.symbols.len(), 4);
    }

    #[test]
    fn test_empty_region() {
        let arena = Bump::new();
        let types = TypeTable::default();
        let factory = NodeFactory::new(CompilationSession::new(&arena), &types);

        let region = factory.region(GcStaticDescKind::ThreadStaticCanonical);
        let data = region.emit_all(&factory, EmissionPass::Final).unwrap();
        assert_eq!(data.data, vec![0, 0, 0, 0]);
        assert!(region.members().is_empty());
    }
}
