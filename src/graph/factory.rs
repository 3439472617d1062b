//! Node factory.
//!
//! The factory is the explicit per-compilation context: it owns the session,
//! every node, and the four descriptor regions. Nodes are interned by key so
//! asking twice for the descriptor of the same (type, thread-static) pair
//! yields the same node.

use hashbrown::HashMap;

use super::{NodeId, StaticBaseNode};
use crate::core::{CompilationSession, GraphError, GraphResult};
use crate::emit::{EmissionPass, ObjectData};
use crate::gcdesc::{GcStaticDescKind, GcStaticDescNode, GcStaticDescRegion};
use crate::layout::{TypeId, TypeLayout};

/// A node of the dependency graph.
#[derive(Debug, Clone)]
pub enum Node<'a> {
    GcStaticDesc(GcStaticDescNode<'a>),
    /// Stands for the factory's region of this kind.
    GcStaticDescRegion(GcStaticDescKind),
    StaticBase(StaticBaseNode<'a>),
}

/// Whether a symbol addresses ordinary or thread-local data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolClass {
    Data,
    Tls,
}

/// Symbol a node is known by in the object file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeSymbol<'a> {
    pub name: &'a str,
    pub class: SymbolClass,
}

pub struct NodeFactory<'a> {
    session: CompilationSession<'a>,
    layout: &'a dyn TypeLayout,
    nodes: Vec<Node<'a>>,
    regions: [GcStaticDescRegion; GcStaticDescKind::COUNT],
    gc_static_descs: HashMap<(TypeId, bool), NodeId>,
    static_bases: HashMap<(TypeId, bool), NodeId>,
}

impl<'a> NodeFactory<'a> {
    pub fn new(session: CompilationSession<'a>, layout: &'a dyn TypeLayout) -> Self {
        let mut nodes = Vec::new();
        let regions = GcStaticDescKind::ALL.map(|kind| {
            let node = NodeId::from_index(nodes.len());
            nodes.push(Node::GcStaticDescRegion(kind));
            GcStaticDescRegion::new(kind, node)
        });

        Self {
            session,
            layout,
            nodes,
            regions,
            gc_static_descs: HashMap::new(),
            static_bases: HashMap::new(),
        }
    }

    pub fn session(&self) -> &CompilationSession<'a> {
        &self.session
    }

    pub fn layout(&self) -> &'a dyn TypeLayout {
        self.layout
    }

    pub fn pointer_size(&self) -> usize {
        self.layout.pointer_size()
    }

    pub fn region(&self, kind: GcStaticDescKind) -> &GcStaticDescRegion {
        &self.regions[kind.index()]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, id: NodeId) -> GraphResult<&Node<'a>> {
        self.nodes
            .get(id.index())
            .ok_or(GraphError::UnknownNode { index: id.raw() })
    }

    pub fn gc_static_desc_node(&self, id: NodeId) -> GraphResult<&GcStaticDescNode<'a>> {
        match self.node(id)? {
            Node::GcStaticDesc(desc) => Ok(desc),
            _ => Err(GraphError::UnknownNode { index: id.raw() }),
        }
    }

    fn add_node(&mut self, node: Node<'a>) -> NodeId {
        let id = NodeId::from_index(self.nodes.len());
        self.nodes.push(node);
        id
    }

    /// Descriptor of the static (or thread-static) block of `ty`.
    pub fn gc_static_desc(&mut self, ty: TypeId, thread_static: bool) -> NodeId {
        if let Some(&id) = self.gc_static_descs.get(&(ty, thread_static)) {
            return id;
        }

        let layout = self.layout;
        let canonical = layout.is_canonical_subtype(ty);
        let bitmap = if thread_static {
            layout.build_thread_static_reference_bitmap(ty)
        } else {
            layout.build_static_reference_bitmap(ty)
        };

        let kind = GcStaticDescKind::classify(thread_static, canonical);
        let type_name = self.session.intern_str(layout.type_name(ty));
        let symbol = self
            .session
            .intern_str(&format!("{}{}", kind.member_prefix(), layout.mangled_name(ty)));
        let region = self.region(kind).node();
        let static_base = (!canonical).then(|| self.static_base(ty, thread_static));

        let desc = GcStaticDescNode::new(
            ty,
            type_name,
            symbol,
            bitmap,
            thread_static,
            canonical,
            region,
            static_base,
        );
        let id = self.add_node(Node::GcStaticDesc(desc));
        self.gc_static_descs.insert((ty, thread_static), id);
        id
    }

    /// Storage block of the GC statics (or thread statics) of `ty`.
    pub fn static_base(&mut self, ty: TypeId, thread_static: bool) -> NodeId {
        if let Some(&id) = self.static_bases.get(&(ty, thread_static)) {
            return id;
        }

        let layout = self.layout;
        let slots = if thread_static {
            layout.build_thread_static_reference_bitmap(ty).len()
        } else {
            layout.build_static_reference_bitmap(ty).len()
        };
        let prefix = if thread_static {
            StaticBaseNode::THREAD_STATIC_PREFIX
        } else {
            StaticBaseNode::GC_STATIC_PREFIX
        };
        let symbol = self
            .session
            .intern_str(&format!("{}{}", prefix, layout.mangled_name(ty)));

        let id = self.add_node(Node::StaticBase(StaticBaseNode::new(
            ty,
            symbol,
            slots,
            thread_static,
        )));
        self.static_bases.insert((ty, thread_static), id);
        id
    }

    pub fn symbol(&self, id: NodeId) -> GraphResult<NodeSymbol<'a>> {
        Ok(match self.node(id)? {
            Node::GcStaticDesc(desc) => NodeSymbol {
                name: desc.symbol(),
                class: SymbolClass::Data,
            },
            Node::GcStaticDescRegion(kind) => NodeSymbol {
                name: kind.region_symbol(),
                class: SymbolClass::Data,
            },
            Node::StaticBase(base) => NodeSymbol {
                name: base.symbol(),
                class: if base.is_thread_static() {
                    SymbolClass::Tls
                } else {
                    SymbolClass::Data
                },
            },
        })
    }

    pub fn static_dependencies(&self, id: NodeId) -> GraphResult<Vec<(NodeId, &'static str)>> {
        Ok(match self.node(id)? {
            Node::GcStaticDesc(desc) => desc.static_dependencies(),
            Node::GcStaticDescRegion(_) | Node::StaticBase(_) => Vec::new(),
        })
    }

    /// On-marked hook: a descriptor joins its region the first time only.
    pub fn on_marked(&mut self, id: NodeId) -> GraphResult<()> {
        let kind = match self.nodes.get_mut(id.index()) {
            Some(Node::GcStaticDesc(desc)) => {
                if !desc.mark_registered() {
                    return Ok(());
                }
                desc.kind()
            }
            Some(_) => return Ok(()),
            None => return Err(GraphError::UnknownNode { index: id.raw() }),
        };

        self.regions[kind.index()].add_member(id);
        self.session.record_descriptor_registered();
        log::trace!("Registered {} with {}", id, kind.region_symbol());
        Ok(())
    }

    /// Contents of a standalone node. Descriptors are embedded in their
    /// region and have none of their own.
    pub fn emit(&self, id: NodeId, pass: EmissionPass) -> GraphResult<Option<ObjectData>> {
        match self.node(id)? {
            Node::GcStaticDesc(_) => Ok(None),
            Node::GcStaticDescRegion(kind) => self.region(*kind).emit_all(self, pass).map(Some),
            Node::StaticBase(base) => Ok(Some(base.emit(id, pass, self.pointer_size()))),
        }
    }
}
