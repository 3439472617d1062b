// This module implements the object data builder every emitted node writes through, and
// the two-pass emission discipline shared by all of them. Each node's contents are built
// twice: once in a size-discovery pass in which final addresses are not yet known, and
// once in the final pass in which symbol offsets are committed. The pass is an explicit
// EmissionPass parameter threaded through every emit call rather than hidden state, and
// a node's byte length must not depend on it. The builder records little-endian integer
// fields, 32-bit relocations against other nodes and symbol definitions at the current
// cursor; the resulting ObjectData is later placed into an ELF section by ImageWriter.

//! Object data emission.
//!
//! - [`ObjectDataBuilder`] accumulates bytes, relocations and symbol definitions
//! - [`EmissionPass`] selects the size-discovery or final pass
//! - [`object_writer`] lays the marked nodes out into an ELF object

pub mod object_writer;

pub use object_writer::ImageWriter;

use crate::graph::NodeId;

/// Emission pass selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmissionPass {
    /// Size discovery: offsets are not final, no symbols are published.
    RelocsOnly,
    /// Final layout: offsets are committed and symbols published.
    Final,
}

impl EmissionPass {
    pub fn is_relocs_only(self) -> bool {
        self == EmissionPass::RelocsOnly
    }
}

/// Relocation kinds used by descriptor fields. Both patch a 32-bit field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelocKind {
    /// Relative pointer: `target + addend - place`.
    RelPtr32,
    /// Offset of `target + addend` within the thread-local storage block.
    TlsOffset32,
}

/// Relocation recorded against another node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reloc {
    /// Offset of the patched field within the node's data.
    pub offset: u32,
    pub target: NodeId,
    pub kind: RelocKind,
    pub addend: i64,
}

/// Symbol published by a node at an offset within its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolDef {
    pub node: NodeId,
    pub offset: u32,
    pub size: u32,
}

/// Section a node's data is placed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectSection {
    /// Read-only after relocation (`.data.rel.ro`).
    ReadOnlyRelocated,
    /// Zero-initialized data (`.bss`).
    Uninitialized,
    /// Zero-initialized thread-local data (`.tbss`).
    UninitializedTls,
}

/// Finished contents of one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectData {
    pub section: ObjectSection,
    pub alignment: u64,
    pub data: Vec<u8>,
    pub relocs: Vec<Reloc>,
    pub symbols: Vec<SymbolDef>,
}

impl ObjectData {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Offset at which `node` was published, if it was.
    pub fn symbol_offset(&self, node: NodeId) -> Option<u32> {
        self.symbols
            .iter()
            .find(|sym| sym.node == node)
            .map(|sym| sym.offset)
    }
}

/// Builder for a single node's [`ObjectData`].
pub struct ObjectDataBuilder {
    pass: EmissionPass,
    section: ObjectSection,
    alignment: u64,
    data: Vec<u8>,
    relocs: Vec<Reloc>,
    symbols: Vec<SymbolDef>,
}

impl ObjectDataBuilder {
    pub fn new(pass: EmissionPass, section: ObjectSection, alignment: u64) -> Self {
        Self {
            pass,
            section,
            alignment,
            data: Vec::new(),
            relocs: Vec::new(),
            symbols: Vec::new(),
        }
    }

    pub fn pass(&self) -> EmissionPass {
        self.pass
    }

    /// Current byte cursor.
    pub fn cursor(&self) -> u32 {
        self.data.len() as u32
    }

    pub fn emit_u32(&mut self, value: u32) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    pub fn emit_zeros(&mut self, count: usize) {
        self.data.resize(self.data.len() + count, 0);
    }

    /// Emit a 32-bit field patched by a relocation to `target + delta`.
    ///
    /// The field holds zero; targets with implicit addends get the addend
    /// written into it when the image is laid out.
    pub fn emit_reloc(&mut self, target: NodeId, kind: RelocKind, delta: i64) {
        self.relocs.push(Reloc {
            offset: self.cursor(),
            target,
            kind,
            addend: delta,
        });
        self.emit_u32(0);
    }

    /// Publish `node` at the current cursor. The size is fixed up by
    /// [`ObjectDataBuilder::finish_symbol`].
    pub fn add_symbol_at_cursor(&mut self, node: NodeId) {
        let offset = self.cursor();
        self.add_symbol(node, offset, 0);
    }

    pub fn add_symbol(&mut self, node: NodeId, offset: u32, size: u32) {
        self.symbols.push(SymbolDef { node, offset, size });
    }

    /// Set the size of the most recently published symbol to end at the cursor.
    pub fn finish_symbol(&mut self) {
        let cursor = self.cursor();
        if let Some(sym) = self.symbols.last_mut() {
            sym.size = cursor - sym.offset;
        }
    }

    pub fn build(self) -> ObjectData {
        ObjectData {
            section: self.section,
            alignment: self.alignment,
            data: self.data,
            relocs: self.relocs,
            symbols: self.symbols,
        }
    }
}
