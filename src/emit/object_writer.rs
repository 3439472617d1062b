//! ELF image writer.
//!
//! Lays the contents of every marked node out into an ELF relocatable
//! object. Regions go to `.data.rel.ro`, static blocks to `.bss` and thread
//! static blocks to `.tbss`. Nodes are placed in first-marked order so the
//! image is reproducible.

use hashbrown::HashMap;
use object::write::{Object, Relocation, StandardSection, Symbol, SymbolId, SymbolSection};
use object::{BinaryFormat, Endianness, SymbolFlags, SymbolKind, SymbolScope};

use super::{EmissionPass, ObjectData, ObjectSection};
use crate::core::{EmitError, EmitResult, GraphError};
use crate::graph::{DependencyGraph, NodeFactory, NodeId, SymbolClass};
use crate::target::TargetDetails;

pub struct ImageWriter<'f, 'a> {
    factory: &'f NodeFactory<'a>,
    graph: &'f DependencyGraph,
    target: TargetDetails,
}

impl<'f, 'a> ImageWriter<'f, 'a> {
    pub fn new(factory: &'f NodeFactory<'a>, graph: &'f DependencyGraph, target: TargetDetails) -> Self {
        debug_assert_eq!(factory.pointer_size(), target.pointer_size());
        Self { factory, graph, target }
    }

    /// Run the discovery and final passes over every marked node.
    ///
    /// # Panics
    ///
    /// Panics if a node's final contents differ in size from what the
    /// discovery pass reported.
    pub fn emit_nodes(&self) -> EmitResult<Vec<(NodeId, ObjectData)>> {
        let pending = self.graph.pending();
        if pending != 0 {
            return Err(GraphError::MarkPhaseIncomplete { pending }.into());
        }

        let mut discovered = Vec::new();
        for &id in self.graph.marked_nodes() {
            if let Some(data) = self.factory.emit(id, EmissionPass::RelocsOnly)? {
                discovered.push((id, data.len()));
            }
        }
        log::debug!(
            "Discovery pass: {} node(s), {} bytes",
            discovered.len(),
            discovered.iter().map(|(_, size)| size).sum::<usize>()
        );

        let mut emitted = Vec::with_capacity(discovered.len());
        for (id, size) in discovered {
            if let Some(data) = self.factory.emit(id, EmissionPass::Final)? {
                assert_eq!(
                    data.len(),
                    size,
                    "node {} changed size between emission passes",
                    id
                );
                emitted.push((id, data));
            }
        }
        Ok(emitted)
    }

    /// Build the object file in memory.
    pub fn build_object(&self) -> EmitResult<Object<'static>> {
        let mut obj = Object::new(
            BinaryFormat::Elf,
            self.target.object_architecture(),
            Endianness::Little,
        );
        let mut nodes = self.emit_nodes()?;
        if self.target.implicit_addends() {
            for (_, data) in &mut nodes {
                write_implicit_addends(data)?;
            }
        }

        let mut symbols: HashMap<NodeId, SymbolId> = HashMap::new();
        let mut placed = Vec::with_capacity(nodes.len());
        for (_, data) in &nodes {
            let section = obj.section_id(standard_section(data.section));
            let base = match data.section {
                ObjectSection::ReadOnlyRelocated => {
                    obj.append_section_data(section, &data.data, data.alignment)
                }
                ObjectSection::Uninitialized | ObjectSection::UninitializedTls => {
                    obj.append_section_bss(section, data.len() as u64, data.alignment)
                }
            };

            for def in &data.symbols {
                let sym = self.factory.symbol(def.node)?;
                let symbol_id = obj.add_symbol(Symbol {
                    name: sym.name.as_bytes().to_vec(),
                    value: base + def.offset as u64,
                    size: def.size as u64,
                    kind: symbol_kind(sym.class),
                    scope: SymbolScope::Linkage,
                    weak: false,
                    section: SymbolSection::Section(section),
                    flags: SymbolFlags::None,
                });
                symbols.insert(def.node, symbol_id);
            }
            placed.push((section, base, data));
        }

        let mut relocations = 0usize;
        for (section, base, data) in placed {
            for reloc in &data.relocs {
                let symbol = match symbols.get(&reloc.target) {
                    Some(&symbol) => symbol,
                    None => {
                        let sym = self.factory.symbol(reloc.target)?;
                        log::warn!("Relocation target {} is not part of the image", sym.name);
                        let symbol = obj.add_symbol(Symbol {
                            name: sym.name.as_bytes().to_vec(),
                            value: 0,
                            size: 0,
                            kind: symbol_kind(sym.class),
                            scope: SymbolScope::Linkage,
                            weak: false,
                            section: SymbolSection::Undefined,
                            flags: SymbolFlags::None,
                        });
                        symbols.insert(reloc.target, symbol);
                        symbol
                    }
                };

                let addend = if self.target.implicit_addends() { 0 } else { reloc.addend };
                obj.add_relocation(
                    section,
                    Relocation {
                        offset: base + reloc.offset as u64,
                        symbol,
                        addend,
                        flags: self.target.reloc_flags(reloc.kind),
                    },
                )?;
                relocations += 1;
            }
        }

        log::info!(
            "Built {} image: {} node(s), {} symbol(s), {} relocation(s)",
            self.target,
            nodes.len(),
            symbols.len(),
            relocations
        );
        Ok(obj)
    }

    /// Write the ELF relocatable object.
    pub fn write(&self) -> EmitResult<Vec<u8>> {
        Ok(self.build_object()?.write()?)
    }
}

fn standard_section(section: ObjectSection) -> StandardSection {
    match section {
        ObjectSection::ReadOnlyRelocated => StandardSection::ReadOnlyDataWithRel,
        ObjectSection::Uninitialized => StandardSection::UninitializedData,
        ObjectSection::UninitializedTls => StandardSection::UninitializedTls,
    }
}

fn symbol_kind(class: SymbolClass) -> SymbolKind {
    match class {
        SymbolClass::Data => SymbolKind::Data,
        SymbolClass::Tls => SymbolKind::Tls,
    }
}

/// Store each relocation's addend in the 32-bit field it patches.
fn write_implicit_addends(data: &mut ObjectData) -> EmitResult<()> {
    for reloc in &data.relocs {
        let addend = i32::try_from(reloc.addend).map_err(|_| EmitError::AddendOutOfRange {
            offset: reloc.offset,
            addend: reloc.addend,
        })?;
        let offset = reloc.offset as usize;
        data.data[offset..offset + 4].copy_from_slice(&addend.to_le_bytes());
    }
    Ok(())
}
