// This module implements the static GC descriptor of a type: a run-length encoding of the
// reference bitmap of the type's static or thread-static block. Every maximal run of
// reference slots becomes one series record made of a 4-byte slot count followed by a
// 4-byte location field. For concrete types the location is a relocation to the type's
// static base (relative pointer) or thread-static base (TLS offset) plus the run's byte
// offset; for canonical forms shared between generic instantiations it is a zero
// placeholder resolved by the runtime from the instantiation's own layout. Each
// descriptor is classified once into one of four region kinds and joins its region the
// first time the dependency graph marks it reachable.

//! Static GC descriptors.
//!
//! - [`GcStaticDescNode`] encodes one type's reference bitmap
//! - [`region::GcStaticDescRegion`] aggregates the descriptors of one kind
//! - [`reader`] decodes emitted regions

pub mod reader;
pub mod region;

pub use reader::{resolve_canonical_offsets, RegionReader, SeriesRecord};
pub use region::GcStaticDescRegion;

use crate::emit::{ObjectDataBuilder, RelocKind};
use crate::graph::NodeId;
use crate::layout::{ReferenceBitmap, TypeId};

/// Size of one encoded series record in bytes.
pub const SERIES_RECORD_SIZE: usize = 8;

/// Size of a region's series-count header in bytes.
pub const REGION_HEADER_SIZE: usize = 4;

/// Symbol prefix of a static descriptor.
pub const GC_STATIC_DESC_PREFIX: &str = "__GCStaticDesc_";

/// Symbol prefix of a thread-static descriptor.
pub const THREAD_STATIC_GC_DESC_PREFIX: &str = "__ThreadStaticGCDesc_";

/// The region a descriptor belongs to, fixed when the descriptor is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GcStaticDescKind {
    StaticConcrete,
    StaticCanonical,
    ThreadStaticConcrete,
    ThreadStaticCanonical,
}

impl GcStaticDescKind {
    pub const COUNT: usize = 4;

    pub const ALL: [GcStaticDescKind; Self::COUNT] = [
        GcStaticDescKind::StaticConcrete,
        GcStaticDescKind::StaticCanonical,
        GcStaticDescKind::ThreadStaticConcrete,
        GcStaticDescKind::ThreadStaticCanonical,
    ];

    pub const fn classify(thread_static: bool, canonical: bool) -> Self {
        match (thread_static, canonical) {
            (false, false) => GcStaticDescKind::StaticConcrete,
            (false, true) => GcStaticDescKind::StaticCanonical,
            (true, false) => GcStaticDescKind::ThreadStaticConcrete,
            (true, true) => GcStaticDescKind::ThreadStaticCanonical,
        }
    }

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn is_thread_static(self) -> bool {
        matches!(
            self,
            GcStaticDescKind::ThreadStaticConcrete | GcStaticDescKind::ThreadStaticCanonical
        )
    }

    pub const fn is_canonical(self) -> bool {
        matches!(
            self,
            GcStaticDescKind::StaticCanonical | GcStaticDescKind::ThreadStaticCanonical
        )
    }

    /// Symbol naming the region of this kind.
    pub const fn region_symbol(self) -> &'static str {
        match self {
            GcStaticDescKind::StaticConcrete => "__GCStaticDescRegion",
            GcStaticDescKind::StaticCanonical => "__CanonicalGCStaticDescRegion",
            GcStaticDescKind::ThreadStaticConcrete => "__ThreadStaticGCDescRegion",
            GcStaticDescKind::ThreadStaticCanonical => "__CanonicalThreadStaticGCDescRegion",
        }
    }

    pub const fn member_prefix(self) -> &'static str {
        if self.is_thread_static() {
            THREAD_STATIC_GC_DESC_PREFIX
        } else {
            GC_STATIC_DESC_PREFIX
        }
    }
}

/// One maximal run of reference slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Series {
    /// Index of the first slot of the run.
    pub start_index: usize,
    /// Number of reference slots in the run.
    pub slot_count: usize,
}

impl Series {
    /// Byte offset of the run within the static block.
    pub fn start_offset(&self, pointer_size: usize) -> usize {
        self.start_index * pointer_size
    }
}

/// Iterator over the series of a bitmap in ascending slot order.
pub struct SeriesIter<'b> {
    slots: &'b [bool],
    pos: usize,
}

impl Iterator for SeriesIter<'_> {
    type Item = Series;

    fn next(&mut self) -> Option<Series> {
        let rest = &self.slots[self.pos..];
        let start = self.pos + rest.iter().position(|&slot| slot)?;
        let slot_count = self.slots[start..]
            .iter()
            .take_while(|&&slot| slot)
            .count();
        self.pos = start + slot_count;
        Some(Series { start_index: start, slot_count })
    }
}

pub fn series(bitmap: &ReferenceBitmap) -> SeriesIter<'_> {
    SeriesIter { slots: bitmap.as_slice(), pos: 0 }
}

/// Number of maximal runs of reference slots, counted by run starts.
pub fn series_count(bitmap: &ReferenceBitmap) -> u32 {
    let slots = bitmap.as_slice();
    (0..slots.len())
        .filter(|&i| slots[i] && (i == 0 || !slots[i - 1]))
        .count() as u32
}

/// Static GC descriptor of one (type, thread-static) pair.
#[derive(Debug, Clone)]
pub struct GcStaticDescNode<'a> {
    owning_type: TypeId,
    type_name: &'a str,
    symbol: &'a str,
    bitmap: ReferenceBitmap,
    kind: GcStaticDescKind,
    series_count: u32,
    region: NodeId,
    static_base: Option<NodeId>,
    registered: bool,
}

impl<'a> GcStaticDescNode<'a> {
    /// Create a descriptor.
    ///
    /// `static_base` is the relocation target of concrete descriptors and
    /// must be `None` exactly when `canonical` is set.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        owning_type: TypeId,
        type_name: &'a str,
        symbol: &'a str,
        bitmap: ReferenceBitmap,
        thread_static: bool,
        canonical: bool,
        region: NodeId,
        static_base: Option<NodeId>,
    ) -> Self {
        debug_assert_eq!(canonical, static_base.is_none());
        let series_count = series_count(&bitmap);
        Self {
            owning_type,
            type_name,
            symbol,
            bitmap,
            kind: GcStaticDescKind::classify(thread_static, canonical),
            series_count,
            region,
            static_base,
            registered: false,
        }
    }

    pub fn owning_type(&self) -> TypeId {
        self.owning_type
    }

    pub fn type_name(&self) -> &'a str {
        self.type_name
    }

    pub fn symbol(&self) -> &'a str {
        self.symbol
    }

    pub fn bitmap(&self) -> &ReferenceBitmap {
        &self.bitmap
    }

    pub fn kind(&self) -> GcStaticDescKind {
        self.kind
    }

    pub fn is_thread_static(&self) -> bool {
        self.kind.is_thread_static()
    }

    pub fn is_canonical(&self) -> bool {
        self.kind.is_canonical()
    }

    pub fn series_count(&self) -> u32 {
        self.series_count
    }

    pub fn region(&self) -> NodeId {
        self.region
    }

    pub fn static_base(&self) -> Option<NodeId> {
        self.static_base
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }

    /// Flip the one-shot registration flag. Returns `true` the first time only.
    pub fn mark_registered(&mut self) -> bool {
        !std::mem::replace(&mut self.registered, true)
    }

    /// Encoded size in bytes; identical in both emission passes.
    pub fn encoded_size(&self) -> usize {
        self.series_count as usize * SERIES_RECORD_SIZE
    }

    pub fn static_dependencies(&self) -> Vec<(NodeId, &'static str)> {
        let mut deps = vec![(self.region, "GC static descriptor region")];
        // Canonical descriptors carry no relocation to the static base.
        if let Some(base) = self.static_base {
            deps.push((base, "GC static descriptor relocation target"));
        }
        deps
    }

    /// Append the series records of this descriptor.
    ///
    /// # Panics
    ///
    /// Panics if the number of records written differs from the series
    /// count computed when the descriptor was created.
    pub fn encode(&self, builder: &mut ObjectDataBuilder, pointer_size: usize) {
        let slots = self.bitmap.as_slice();
        let mut gc_field_count = 0u32;
        let mut start_index = 0usize;
        let mut num_series = 0u32;

        for i in 0..slots.len() {
            if !slots[i] {
                continue;
            }

            gc_field_count += 1;
            if i == 0 || !slots[i - 1] {
                start_index = i;
            }

            if i == slots.len() - 1 || !slots[i + 1] {
                builder.emit_u32(gc_field_count);
                let delta = (start_index * pointer_size) as i64;
                match self.static_base {
                    None => builder.emit_u32(0),
                    Some(base) if self.is_thread_static() => {
                        builder.emit_reloc(base, RelocKind::TlsOffset32, delta)
                    }
                    Some(base) => builder.emit_reloc(base, RelocKind::RelPtr32, delta),
                }
                gc_field_count = 0;
                num_series += 1;
            }
        }

        assert_eq!(
            num_series, self.series_count,
            "series count mismatch in GC static descriptor of {}",
            self.type_name
        );
    }
}
