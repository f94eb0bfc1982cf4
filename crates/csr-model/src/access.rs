//! Software access semantics of a field.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

/// Literal that names no known access mode or memory style.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {what} '{literal}', expected one of: {expected}")]
pub struct UnknownLiteral {
    /// Name of the enumerated type.
    pub what: &'static str,
    /// Rejected input.
    pub literal: String,
    /// Comma-separated accepted literals.
    pub expected: String,
}

impl UnknownLiteral {
    pub(crate) fn new(what: &'static str, literal: &str, accepted: &[&str]) -> Self {
        Self {
            what,
            literal: literal.to_owned(),
            expected: accepted.join(", "),
        }
    }
}

/// Coarse access category every [`AccessMode`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessCategory {
    /// Read and write.
    Rw,
    /// Read only; writes have no effect.
    Ro,
    /// Write only; reads return zeros.
    Wo,
}

impl AccessCategory {
    /// Lowercase literal of the category.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rw => "rw",
            Self::Ro => "ro",
            Self::Wo => "wo",
        }
    }
}

impl fmt::Display for AccessCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a field can be accessed by software, including side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    /// Read and write.
    Rw,
    /// Read, write 1 to clear.
    Rw1c,
    /// Read, write 1 to set.
    Rw1s,
    /// Read only.
    Ro,
    /// Read only, cleared after every read.
    Roc,
    /// Read only, latches an active-low pulse until read.
    Roll,
    /// Read only, latches an active-high pulse until read.
    Rolh,
    /// Write only; zeros are read.
    Wo,
    /// Write only, self-clearing on the next clock.
    Wosc,
}

impl AccessMode {
    /// All modes in declaration order.
    pub const ALL: [Self; 9] = [
        Self::Rw,
        Self::Rw1c,
        Self::Rw1s,
        Self::Ro,
        Self::Roc,
        Self::Roll,
        Self::Rolh,
        Self::Wo,
        Self::Wosc,
    ];

    /// Lowercase literal of the mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rw => "rw",
            Self::Rw1c => "rw1c",
            Self::Rw1s => "rw1s",
            Self::Ro => "ro",
            Self::Roc => "roc",
            Self::Roll => "roll",
            Self::Rolh => "rolh",
            Self::Wo => "wo",
            Self::Wosc => "wosc",
        }
    }

    /// Coarse category projection.
    #[must_use]
    pub const fn category(self) -> AccessCategory {
        match self {
            Self::Ro | Self::Roc | Self::Roll | Self::Rolh => AccessCategory::Ro,
            Self::Wo | Self::Wosc => AccessCategory::Wo,
            Self::Rw | Self::Rw1c | Self::Rw1s => AccessCategory::Rw,
        }
    }

    /// Mode belongs to the RO category.
    #[must_use]
    pub const fn is_ro(self) -> bool {
        matches!(self.category(), AccessCategory::Ro)
    }

    /// Mode belongs to the WO category.
    #[must_use]
    pub const fn is_wo(self) -> bool {
        matches!(self.category(), AccessCategory::Wo)
    }

    /// Mode belongs to the RW category.
    #[must_use]
    pub const fn is_rw(self) -> bool {
        matches!(self.category(), AccessCategory::Rw)
    }
}

impl FromStr for AccessMode {
    type Err = UnknownLiteral;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| {
                UnknownLiteral::new("access mode", s, &Self::ALL.map(Self::as_str))
            })
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
