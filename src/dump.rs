//! Reading emitted images back.
//!
//! [`read_regions`] parses an ELF object with the `object` read API, decodes
//! every descriptor region it defines with [`RegionReader`] and resolves the
//! relocation applied to each location field to the name of its target
//! symbol. The result prints as a listing:
//!
//! ```text
//! __GCStaticDescRegion: 2 series, 20 bytes
//!   +4     slots=1  rel32 __GCSTATICBASE_A+8
//!   +12    slots=2  rel32 __GCSTATICBASE_B+0
//!   __GCStaticDesc_A at +4, 8 bytes
//!   __GCStaticDesc_B at +12, 8 bytes
//! ```

use object::{Object, ObjectSection, ObjectSymbol, RelocationFlags, RelocationTarget};
use std::fmt;

use crate::core::{EmitError, EmitResult};
use crate::emit::RelocKind;
use crate::gcdesc::{resolve_canonical_offsets, GcStaticDescKind, RegionReader};
use crate::layout::{TypeLayout, TypeTable};
use crate::target::TargetDetails;

/// Where a series record points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeriesLocation {
    /// Zero placeholder of a canonical descriptor.
    Canonical,
    /// Location field patched by a relocation.
    Relocated {
        kind: RelocKind,
        symbol: String,
        addend: i64,
    },
    /// Raw location field with no relocation applied.
    Unrelocated(u32),
}

/// A decoded series record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesDump {
    /// Offset of the record within the region.
    pub position: usize,
    pub slot_count: u32,
    pub location: SeriesLocation,
}

/// A descriptor symbol defined inside a region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberDump {
    pub symbol: String,
    /// Offset of the descriptor within the region.
    pub offset: u64,
    pub size: u64,
    /// Static-base-relative offsets the canonical series of this member
    /// resolve to, when the type layout is known.
    pub resolved: Option<Vec<usize>>,
}

/// A decoded descriptor region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionDump {
    pub kind: GcStaticDescKind,
    pub size: u64,
    pub series: Vec<SeriesDump>,
    pub members: Vec<MemberDump>,
}

impl RegionDump {
    pub fn symbol(&self) -> &'static str {
        self.kind.region_symbol()
    }
}

/// Decode every descriptor region defined by an ELF object.
pub fn read_regions(bytes: &[u8], layout: Option<&TypeTable>) -> EmitResult<Vec<RegionDump>> {
    let file = object::File::parse(bytes)?;
    let target = object_target(&file)?;
    let mut regions = Vec::new();
    for kind in GcStaticDescKind::ALL {
        if let Some(symbol) = file.symbol_by_name(kind.region_symbol()) {
            regions.push(decode_region(&file, &symbol, kind, target, layout)?);
        }
    }
    log::debug!("Decoded {} region(s)", regions.len());
    Ok(regions)
}

/// Decode the region published under `name`.
pub fn read_region(bytes: &[u8], name: &str, layout: Option<&TypeTable>) -> EmitResult<RegionDump> {
    let kind = GcStaticDescKind::ALL
        .into_iter()
        .find(|kind| kind.region_symbol() == name)
        .ok_or_else(|| EmitError::SymbolNotFound { name: name.to_string() })?;
    let file = object::File::parse(bytes)?;
    let target = object_target(&file)?;
    let symbol = file
        .symbol_by_name(name)
        .ok_or_else(|| EmitError::SymbolNotFound { name: name.to_string() })?;
    decode_region(&file, &symbol, kind, target, layout)
}

/// Render every region of an ELF object as a listing.
pub fn dump_object(bytes: &[u8], layout: Option<&TypeTable>) -> EmitResult<String> {
    let regions = read_regions(bytes, layout)?;
    let mut out = String::new();
    for region in &regions {
        out.push_str(&region.to_string());
    }
    if regions.is_empty() {
        out.push_str("no static GC descriptor regions\n");
    }
    Ok(out)
}

fn object_target(file: &object::File<'_>) -> EmitResult<TargetDetails> {
    TargetDetails::from_object_architecture(file.architecture()).ok_or_else(|| {
        EmitError::UnsupportedArchitecture {
            architecture: format!("{:?}", file.architecture()),
        }
    })
}

/// A relocation applied inside a region.
struct PatchedField {
    position: usize,
    kind: RelocKind,
    symbol: String,
    addend: i64,
    implicit: bool,
}

fn decode_region<'data>(
    file: &object::File<'data>,
    symbol: &object::Symbol<'data, '_>,
    kind: GcStaticDescKind,
    target: TargetDetails,
    layout: Option<&TypeTable>,
) -> EmitResult<RegionDump> {
    let section_index = symbol.section_index().ok_or_else(|| EmitError::MalformedObject {
        reason: format!("{} is not defined in a section", kind.region_symbol()),
    })?;
    let section = file.section_by_index(section_index)?;
    let start = symbol.address();
    let size = symbol.size();
    let data = section.data_range(start, size)?.ok_or_else(|| EmitError::MalformedObject {
        reason: format!("{} lies outside its section", kind.region_symbol()),
    })?;
    let reader = RegionReader::new(data)?;

    let mut relocations = Vec::new();
    for (offset, reloc) in section.relocations() {
        if offset < start || offset >= start + size {
            continue;
        }
        let RelocationTarget::Symbol(index) = reloc.target() else {
            continue;
        };
        let r_type = match reloc.flags() {
            RelocationFlags::Elf { r_type } => r_type,
            _ => continue,
        };
        let Some(reloc_kind) = target.reloc_kind(r_type) else {
            log::warn!("Skipping relocation of type {} at {:#x}", r_type, offset);
            continue;
        };
        let name = file.symbol_by_index(index)?.name()?.to_string();
        relocations.push(PatchedField {
            position: (offset - start) as usize,
            kind: reloc_kind,
            symbol: name,
            addend: reloc.addend(),
            implicit: reloc.has_implicit_addend(),
        });
    }

    let series = reader
        .records()
        .map(|record| {
            let position = record.location_position();
            let location = match relocations.iter().find(|field| field.position == position) {
                Some(field) => SeriesLocation::Relocated {
                    kind: field.kind,
                    symbol: field.symbol.clone(),
                    // REL targets keep the addend in the field itself.
                    addend: if field.implicit {
                        record.location as i32 as i64
                    } else {
                        field.addend
                    },
                },
                None if kind.is_canonical() && record.location == 0 => SeriesLocation::Canonical,
                None => SeriesLocation::Unrelocated(record.location),
            };
            SeriesDump {
                position: record.position,
                slot_count: record.slot_count,
                location,
            }
        })
        .collect();

    let mut members = Vec::new();
    for sym in file.symbols() {
        if sym.section_index() != Some(section_index) {
            continue;
        }
        let name = sym.name()?;
        let address = sym.address();
        let inside = address >= start && address + sym.size() <= start + size;
        if !inside || !name.starts_with(kind.member_prefix()) {
            continue;
        }
        let resolved = match layout {
            Some(layout) if kind.is_canonical() => {
                resolve_member(layout, &name[kind.member_prefix().len()..], kind)
            }
            _ => None,
        };
        members.push(MemberDump {
            symbol: name.to_string(),
            offset: address - start,
            size: sym.size(),
            resolved,
        });
    }
    members.sort_by_key(|member| member.offset);

    Ok(RegionDump {
        kind,
        size,
        series,
        members,
    })
}

/// Resolve a canonical member's series through the layout of its type.
fn resolve_member(layout: &TypeTable, mangled: &str, kind: GcStaticDescKind) -> Option<Vec<usize>> {
    let ty = layout.types().find(|&ty| layout.mangled_name(ty) == mangled)?;
    let bitmap = if kind.is_thread_static() {
        layout.build_thread_static_reference_bitmap(ty)
    } else {
        layout.build_static_reference_bitmap(ty)
    };
    Some(resolve_canonical_offsets(&bitmap, layout.pointer_size()))
}

impl fmt::Display for SeriesLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeriesLocation::Canonical => write!(f, "canonical"),
            SeriesLocation::Relocated { kind, symbol, addend } => {
                let kind = match kind {
                    RelocKind::RelPtr32 => "rel32",
                    RelocKind::TlsOffset32 => "tlsoff32",
                };
                write!(f, "{} {}{:+}", kind, symbol, addend)
            }
            SeriesLocation::Unrelocated(raw) => write!(f, "raw {:#x}", raw),
        }
    }
}

impl fmt::Display for RegionDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}: {} series, {} bytes", self.symbol(), self.series.len(), self.size)?;
        for series in &self.series {
            writeln!(
                f,
                "  +{:<5} slots={:<2} {}",
                series.position, series.slot_count, series.location
            )?;
        }
        for member in &self.members {
            write!(f, "  {} at +{}, {} bytes", member.symbol, member.offset, member.size)?;
            if let Some(resolved) = &member.resolved {
                write!(f, ", resolves to base+{:?}", resolved)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
