//! Static storage blocks.
//!
//! A concrete type's GC statics live in a zero-initialized, pointer-aligned
//! block of `slots * pointer_size` bytes; thread statics live in the
//! equivalent thread-local block. Descriptors relocate against these.

use super::NodeId;
use crate::emit::{EmissionPass, ObjectData, ObjectDataBuilder, ObjectSection};
use crate::layout::TypeId;

#[derive(Debug, Clone)]
pub struct StaticBaseNode<'a> {
    owning_type: TypeId,
    symbol: &'a str,
    slots: usize,
    thread_static: bool,
}

impl<'a> StaticBaseNode<'a> {
    pub const GC_STATIC_PREFIX: &'static str = "__GCSTATICBASE_";
    pub const THREAD_STATIC_PREFIX: &'static str = "__THREADSTATICBASE_";

    pub fn new(owning_type: TypeId, symbol: &'a str, slots: usize, thread_static: bool) -> Self {
        Self {
            owning_type,
            symbol,
            slots,
            thread_static,
        }
    }

    pub fn owning_type(&self) -> TypeId {
        self.owning_type
    }

    pub fn symbol(&self) -> &'a str {
        self.symbol
    }

    pub fn is_thread_static(&self) -> bool {
        self.thread_static
    }

    pub fn size(&self, pointer_size: usize) -> usize {
        self.slots * pointer_size
    }

    pub fn emit(&self, id: NodeId, pass: EmissionPass, pointer_size: usize) -> ObjectData {
        let section = if self.thread_static {
            ObjectSection::UninitializedTls
        } else {
            ObjectSection::Uninitialized
        };
        let mut builder = ObjectDataBuilder::new(pass, section, pointer_size as u64);
        if !builder.pass().is_relocs_only() {
            builder.add_symbol_at_cursor(id);
        }
        builder.emit_zeros(self.size(pointer_size));
        if !builder.pass().is_relocs_only() {
            builder.finish_symbol();
        }
        builder.build()
    }
}
