// This module provides arena-based compilation session management using the bumpalo crate.
// CompilationSession owns the arena in which every symbol name of the session is interned,
// so descriptor nodes, static base nodes and regions can hold `&'arena str` names without
// further lifetime bookkeeping. It also tracks emission statistics: how many descriptors
// were registered with a region during the mark phase, how many series records the final
// emission pass wrote, and how many bytes each of the four descriptor regions occupies.
// Statistics use interior mutability so the session can be shared by reference between
// the node factory, the regions and the image writer.

//! Arena-based compilation session management.
//!
//! This module provides simplified lifetime management for descriptor emission
//! using arena allocation. All symbol names are tied to the session lifetime.

use bumpalo::Bump;
use hashbrown::HashMap;
use std::cell::RefCell;
use std::fmt;

use crate::gcdesc::GcStaticDescKind;

/// Arena-based compilation session.
pub struct CompilationSession<'arena> {
    /// Arena allocator for session objects.
    arena: &'arena Bump,

    /// Session statistics.
    stats: RefCell<SessionStats>,

    /// String interning for symbol names.
    interned_strings: RefCell<HashMap<String, &'arena str>>,
}

impl<'arena> CompilationSession<'arena> {
    /// Create a new compilation session with the given arena.
    pub fn new(arena: &'arena Bump) -> Self {
        Self {
            arena,
            stats: RefCell::new(SessionStats::default()),
            interned_strings: RefCell::new(HashMap::new()),
        }
    }

    /// Intern a string in the arena.
    pub fn intern_str(&self, s: &str) -> &'arena str {
        let mut strings = self.interned_strings.borrow_mut();
        if let Some(&interned) = strings.get(s) {
            return interned;
        }

        let interned = self.arena.alloc_str(s);
        strings.insert(s.to_string(), interned);
        interned
    }

    /// Record that a descriptor joined its region.
    pub fn record_descriptor_registered(&self) {
        self.stats.borrow_mut().descriptors_registered += 1;
    }

    /// Record a region written by the final emission pass.
    pub fn record_region_emitted(&self, kind: GcStaticDescKind, series: u32, bytes: usize) {
        let mut stats = self.stats.borrow_mut();
        stats.series_emitted += series as usize;
        stats.region_bytes[kind.index()] = bytes;
    }

    /// Get emission statistics.
    pub fn stats(&self) -> SessionStats {
        self.stats.borrow().clone()
    }
}

/// Emission statistics of a session.
#[derive(Debug, Default, Clone)]
pub struct SessionStats {
    /// Descriptors registered with a region.
    pub descriptors_registered: usize,

    /// Series records written by the final pass.
    pub series_emitted: usize,

    /// Final size of each region, indexed by [`GcStaticDescKind::index`].
    pub region_bytes: [usize; GcStaticDescKind::COUNT],
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Static GC Descriptor Statistics:")?;
        writeln!(f, "  Descriptors registered: {}", self.descriptors_registered)?;
        writeln!(f, "  Series emitted: {}", self.series_emitted)?;
        for kind in GcStaticDescKind::ALL {
            let bytes = self.region_bytes[kind.index()];
            if bytes != 0 {
                writeln!(f, "  {}: {} bytes", kind.region_symbol(), bytes)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_interning() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);

        let s1 = session.intern_str("__GCStaticDesc_Foo");
        let s2 = session.intern_str("__GCStaticDesc_Foo");
        let s3 = session.intern_str("__GCStaticDesc_Bar");

        assert_eq!(s1.as_ptr(), s2.as_ptr());
        assert_ne!(s1.as_ptr(), s3.as_ptr());
    }

    #[test]
    fn test_session_statistics() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);

        session.record_descriptor_registered();
        session.record_descriptor_registered();
        session.record_region_emitted(GcStaticDescKind::StaticConcrete, 3, 28);
        session.record_region_emitted(GcStaticDescKind::ThreadStaticCanonical, 1, 12);

        let stats = session.stats();
        assert_eq!(stats.descriptors_registered, 2);
        assert_eq!(stats.series_emitted, 4);
        assert_eq!(stats.region_bytes[GcStaticDescKind::StaticConcrete.index()], 28);
        assert_eq!(stats.region_bytes[GcStaticDescKind::StaticCanonical.index()], 0);
    }

    #[test]
    fn test_statistics_display() {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);

        session.record_descriptor_registered();
        session.record_region_emitted(GcStaticDescKind::StaticConcrete, 2, 20);

        let output = format!("{}", session.stats());
        assert!(output.contains("Descriptors registered: 1"));
        assert!(output.contains("Series emitted: 2"));
        assert!(output.contains("__GCStaticDescRegion: 20 bytes"));
        assert!(!output.contains("__ThreadStaticGCDescRegion"));
    }
}
