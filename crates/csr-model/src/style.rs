//! Implementation styles of memory blocks.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::access::{AccessCategory, UnknownLiteral};

/// Where a memory block lives and which side may read or write it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryStyle {
    /// Inside the map module; bus reads, hardware writes.
    InternalRo,
    /// Inside the map module; constants readable by the bus.
    InternalConst,
    /// Inside the map module; bus writes, hardware reads.
    InternalWo,
    /// Inside the map module; bus reads and writes.
    InternalRw,
    /// Outside the map module, behind a read port.
    ExternalRo,
    /// Outside the map module, behind a write port.
    ExternalWo,
    /// Outside the map module, behind read and write ports.
    ExternalRw,
}

impl MemoryStyle {
    /// All styles in declaration order.
    pub const ALL: [Self; 7] = [
        Self::InternalRo,
        Self::InternalConst,
        Self::InternalWo,
        Self::InternalRw,
        Self::ExternalRo,
        Self::ExternalWo,
        Self::ExternalRw,
    ];

    /// Lowercase literal of the style.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InternalRo => "internal_ro",
            Self::InternalConst => "internal_const",
            Self::InternalWo => "internal_wo",
            Self::InternalRw => "internal_rw",
            Self::ExternalRo => "external_ro",
            Self::ExternalWo => "external_wo",
            Self::ExternalRw => "external_rw",
        }
    }

    /// Bus access category of the block.
    ///
    /// Constant memories are read-only from the bus.
    #[must_use]
    pub const fn access(self) -> AccessCategory {
        match self {
            Self::InternalRo | Self::InternalConst | Self::ExternalRo => AccessCategory::Ro,
            Self::InternalWo | Self::ExternalWo => AccessCategory::Wo,
            Self::InternalRw | Self::ExternalRw => AccessCategory::Rw,
        }
    }

    /// Block is implemented inside the map module.
    #[must_use]
    pub const fn is_internal(self) -> bool {
        matches!(
            self,
            Self::InternalRo | Self::InternalConst | Self::InternalWo | Self::InternalRw
        )
    }

    /// Block is read-only from the bus.
    #[must_use]
    pub const fn is_ro(self) -> bool {
        matches!(self.access(), AccessCategory::Ro)
    }

    /// Block is write-only from the bus.
    #[must_use]
    pub const fn is_wo(self) -> bool {
        matches!(self.access(), AccessCategory::Wo)
    }

    /// Block is readable and writable from the bus.
    #[must_use]
    pub const fn is_rw(self) -> bool {
        matches!(self.access(), AccessCategory::Rw)
    }
}

impl FromStr for MemoryStyle {
    type Err = UnknownLiteral;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|style| style.as_str() == s)
            .ok_or_else(|| {
                UnknownLiteral::new("memory style", s, &Self::ALL.map(Self::as_str))
            })
    }
}

impl fmt::Display for MemoryStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
