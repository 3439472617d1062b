//! Target description.
//!
//! The emitter only needs two facts about the target: the width of a pointer,
//! which converts slot indices into byte offsets, and how the two relocation
//! kinds used by descriptors are spelled in the target's ELF relocation set.

use object::{elf, Architecture, RelocationFlags};
use std::fmt;
use std::str::FromStr;

use crate::emit::RelocKind;

/// Supported target architectures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetArchitecture {
    X64,
    X86,
}

/// Target address width and relocation vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetDetails {
    pub architecture: TargetArchitecture,
}

impl TargetDetails {
    pub const fn new(architecture: TargetArchitecture) -> Self {
        Self { architecture }
    }

    /// Size of a pointer-sized static slot in bytes.
    pub const fn pointer_size(&self) -> usize {
        match self.architecture {
            TargetArchitecture::X64 => 8,
            TargetArchitecture::X86 => 4,
        }
    }

    /// Target of an object file, if it is one we emit for.
    pub fn from_object_architecture(architecture: Architecture) -> Option<Self> {
        match architecture {
            Architecture::X86_64 => Some(Self::new(TargetArchitecture::X64)),
            Architecture::I386 => Some(Self::new(TargetArchitecture::X86)),
            _ => None,
        }
    }

    pub fn object_architecture(&self) -> Architecture {
        match self.architecture {
            TargetArchitecture::X64 => Architecture::X86_64,
            TargetArchitecture::X86 => Architecture::I386,
        }
    }

    /// Whether relocation addends live in the relocated field (ELF `REL`)
    /// rather than in the relocation entry (ELF `RELA`).
    pub const fn implicit_addends(&self) -> bool {
        matches!(self.architecture, TargetArchitecture::X86)
    }

    /// ELF relocation used for a 32-bit descriptor field of the given kind.
    ///
    /// `RelPtr32` stores `target + addend - place`; `TlsOffset32` stores the
    /// offset of `target + addend` inside the module's TLS block.
    pub fn reloc_flags(&self, kind: RelocKind) -> RelocationFlags {
        let r_type = match (self.architecture, kind) {
            (TargetArchitecture::X64, RelocKind::RelPtr32) => elf::R_X86_64_PC32,
            (TargetArchitecture::X64, RelocKind::TlsOffset32) => elf::R_X86_64_DTPOFF32,
            (TargetArchitecture::X86, RelocKind::RelPtr32) => elf::R_386_PC32,
            (TargetArchitecture::X86, RelocKind::TlsOffset32) => elf::R_386_TLS_LDO_32,
        };
        RelocationFlags::Elf { r_type }
    }

    /// Inverse of [`TargetDetails::reloc_flags`] for an ELF relocation type.
    pub fn reloc_kind(&self, r_type: u32) -> Option<RelocKind> {
        match (self.architecture, r_type) {
            (TargetArchitecture::X64, elf::R_X86_64_PC32) => Some(RelocKind::RelPtr32),
            (TargetArchitecture::X64, elf::R_X86_64_DTPOFF32) => Some(RelocKind::TlsOffset32),
            (TargetArchitecture::X86, elf::R_386_PC32) => Some(RelocKind::RelPtr32),
            (TargetArchitecture::X86, elf::R_386_TLS_LDO_32) => Some(RelocKind::TlsOffset32),
            _ => None,
        }
    }
}

impl Default for TargetDetails {
    fn default() -> Self {
        Self::new(TargetArchitecture::X64)
    }
}

impl FromStr for TargetDetails {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "x86_64" | "x64" | "amd64" => Ok(Self::new(TargetArchitecture::X64)),
            "x86" | "i386" | "i686" => Ok(Self::new(TargetArchitecture::X86)),
            other => Err(format!("unsupported target '{other}'")),
        }
    }
}

impl fmt::Display for TargetDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.architecture {
            TargetArchitecture::X64 => write!(f, "x86_64"),
            TargetArchitecture::X86 => write!(f, "x86"),
        }
    }
}
