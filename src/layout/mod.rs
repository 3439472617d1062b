//! Static field layout.
//!
//! The emitter consumes the reference layout of a type's static storage
//! through the [`TypeLayout`] trait. [`TypeTable`] is a table-driven
//! implementation fed from a type-layout listing (see [`parser`]).
//!
//! # Listing Format
//!
//! ```text
//! ; Comments start with semicolon
//! target x86_64
//! type Program statics=RR.R threadstatics=.R
//! type List<__Canon> canonical statics=R
//! root Program static
//! root Program threadstatic
//! ```
//!
//! A reference map has one character per pointer-sized slot: `R` for a slot
//! holding an object reference and `.` for any other slot.

pub mod parser;

use hashbrown::HashMap;
use std::fmt;

use crate::target::TargetDetails;

pub use parser::{parse_listing, LayoutListing, Root};

/// One flag per pointer-sized slot of a static block; `true` marks a slot
/// holding an object reference. Index 0 is the lowest-addressed slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ReferenceBitmap {
    slots: Vec<bool>,
}

impl ReferenceBitmap {
    /// All-clear bitmap of `len` slots.
    pub fn new(len: usize) -> Self {
        Self { slots: vec![false; len] }
    }

    pub fn from_slots(slots: Vec<bool>) -> Self {
        Self { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, index: usize) -> bool {
        self.slots.get(index).copied().unwrap_or(false)
    }

    pub fn set(&mut self, index: usize) {
        self.slots[index] = true;
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.slots
    }

    /// Whether any slot holds a reference.
    pub fn has_references(&self) -> bool {
        self.slots.iter().any(|&slot| slot)
    }
}

impl fmt::Display for ReferenceBitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &slot in &self.slots {
            f.write_str(if slot { "R" } else { "." })?;
        }
        Ok(())
    }
}

/// Handle of a type known to a [`TypeLayout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

impl TypeId {
    pub(crate) fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Static layout queries answered by the type system.
pub trait TypeLayout {
    /// Target address width in bytes.
    fn pointer_size(&self) -> usize;

    /// Reference layout of the type's GC static block.
    fn build_static_reference_bitmap(&self, ty: TypeId) -> ReferenceBitmap;

    /// Reference layout of the type's thread-static block.
    fn build_thread_static_reference_bitmap(&self, ty: TypeId) -> ReferenceBitmap;

    /// Whether the type is a canonical form shared between generic instantiations.
    fn is_canonical_subtype(&self, ty: TypeId) -> bool;

    fn type_name(&self, ty: TypeId) -> &str;

    /// Name used to build the type's symbols.
    fn mangled_name(&self, ty: TypeId) -> String {
        mangle_name(self.type_name(ty))
    }
}

/// Placeholder type argument of canonical generic forms.
pub const CANON_TYPE_NAME: &str = "__Canon";

/// Turn a type name into a symbol-safe identifier.
///
/// ASCII alphanumerics and `_` are kept, `.` becomes `_`, and anything else is
/// spelled as `$` followed by its code point in hex.
pub fn mangle_name(name: &str) -> String {
    let mut mangled = String::with_capacity(name.len());
    for ch in name.chars() {
        match ch {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '_' => mangled.push(ch),
            '.' => mangled.push('_'),
            other => mangled.push_str(&format!("${:x}", other as u32)),
        }
    }
    mangled
}

/// A type's entry in a [`TypeTable`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeEntry {
    pub name: String,
    pub canonical: bool,
    pub statics: ReferenceBitmap,
    pub thread_statics: ReferenceBitmap,
}

/// Table-driven [`TypeLayout`].
#[derive(Debug, Clone, Default)]
pub struct TypeTable {
    target: TargetDetails,
    types: Vec<TypeEntry>,
    by_name: HashMap<String, TypeId>,
}

impl TypeTable {
    pub fn new(target: TargetDetails) -> Self {
        Self {
            target,
            types: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    pub fn target(&self) -> TargetDetails {
        self.target
    }

    pub fn set_target(&mut self, target: TargetDetails) {
        self.target = target;
    }

    /// Add a type, returning `None` if the name is taken.
    pub fn add_type(&mut self, entry: TypeEntry) -> Option<TypeId> {
        if self.by_name.contains_key(&entry.name) {
            return None;
        }
        let id = TypeId(self.types.len() as u32);
        self.by_name.insert(entry.name.clone(), id);
        self.types.push(entry);
        Some(id)
    }

    pub fn lookup(&self, name: &str) -> Option<TypeId> {
        self.by_name.get(name).copied()
    }

    /// # Panics
    ///
    /// Panics if `ty` was not handed out by this table.
    pub fn entry(&self, ty: TypeId) -> &TypeEntry {
        &self.types[ty.index()]
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn types(&self) -> impl Iterator<Item = TypeId> + '_ {
        (0..self.types.len() as u32).map(TypeId)
    }
}

impl TypeLayout for TypeTable {
    fn pointer_size(&self) -> usize {
        self.target.pointer_size()
    }

    fn build_static_reference_bitmap(&self, ty: TypeId) -> ReferenceBitmap {
        self.entry(ty).statics.clone()
    }

    fn build_thread_static_reference_bitmap(&self, ty: TypeId) -> ReferenceBitmap {
        self.entry(ty).thread_statics.clone()
    }

    fn is_canonical_subtype(&self, ty: TypeId) -> bool {
        let entry = self.entry(ty);
        entry.canonical || entry.name.contains(CANON_TYPE_NAME)
    }

    fn type_name(&self, ty: TypeId) -> &str {
        &self.entry(ty).name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, statics: &[bool]) -> TypeEntry {
        TypeEntry {
            name: name.to_string(),
            canonical: false,
            statics: ReferenceBitmap::from_slots(statics.to_vec()),
            thread_statics: ReferenceBitmap::default(),
        }
    }

    #[test]
    fn test_bitmap_display() {
        let mut bitmap = ReferenceBitmap::new(4);
        bitmap.set(0);
        bitmap.set(3);
        assert_eq!(bitmap.to_string(), "R..R");
        assert!(bitmap.has_references());
        assert!(!ReferenceBitmap::new(3).has_references());
        assert!(!bitmap.get(17));
    }

    #[test]
    fn test_mangle_name() {
        assert_eq!(mangle_name("System.String"), "System_String");
        assert_eq!(mangle_name("List`1<__Canon>"), "List$601$3c__Canon$3e");
    }

    #[test]
    fn test_type_table_lookup() {
        let mut table = TypeTable::default();
        let a = table.add_type(entry("A", &[true])).unwrap();
        let b = table.add_type(entry("B", &[false, true])).unwrap();
        assert!(table.add_type(entry("A", &[])).is_none());

        assert_eq!(table.lookup("B"), Some(b));
        assert_eq!(table.len(), 2);
        assert_eq!(table.build_static_reference_bitmap(a).to_string(), "R");
        assert_eq!(table.build_thread_static_reference_bitmap(b).len(), 0);
        assert_eq!(table.pointer_size(), 8);
    }

    #[test]
    fn test_canonical_classification() {
        let mut table = TypeTable::default();
        let plain = table.add_type(entry("Dictionary<int,string>", &[])).unwrap();
        let shared = table.add_type(entry("Dictionary<__Canon,int>", &[])).unwrap();
        let mut flagged = entry("Marked", &[]);
        flagged.canonical = true;
        let flagged = table.add_type(flagged).unwrap();

        assert!(!table.is_canonical_subtype(plain));
        assert!(table.is_canonical_subtype(shared));
        assert!(table.is_canonical_subtype(flagged));
    }

    #[test]
    #[should_panic]
    fn test_entry_of_foreign_type() {
        let mut other = TypeTable::default();
        other.add_type(entry("A", &[])).unwrap();
        let foreign = other.add_type(entry("B", &[])).unwrap();

        let mut table = TypeTable::default();
        table.add_type(entry("A", &[])).unwrap();
        table.entry(foreign);
    }
}
