//! Hardware-side capabilities of a field, as a set of single-letter flags.
//!
//! The canonical literal joins flags with `-` in declaration order
//! (`i-o-e`). The legacy compact form (`ioe`) is accepted on input, and an
//! empty literal means [`HardwareFlag::Na`].

use std::cmp::Ordering;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;

use serde::{Serialize, Serializer};
use thiserror::Error;

/// One hardware capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum HardwareFlag {
    /// Field is updated from a hardware input.
    Input = 0,
    /// Field value is exposed to hardware.
    Output = 1,
    /// Hardware can clear the field.
    Clear = 2,
    /// Hardware can set the field.
    Set = 3,
    /// Hardware input is captured only when enabled; requires `Input`.
    Enable = 4,
    /// Hardware can lock the field against changes.
    Lock = 5,
    /// Strobes notify hardware of bus accesses.
    Access = 6,
    /// Field is an interface to an external queue.
    Queue = 7,
    /// Field is a constant.
    Fixed = 8,
    /// Field is not accessible by hardware.
    Na = 9,
}

impl HardwareFlag {
    /// All flags in declaration order.
    pub const ALL: [Self; 10] = [
        Self::Input,
        Self::Output,
        Self::Clear,
        Self::Set,
        Self::Enable,
        Self::Lock,
        Self::Access,
        Self::Queue,
        Self::Fixed,
        Self::Na,
    ];

    /// Single-letter literal of the flag.
    #[must_use]
    pub const fn letter(self) -> char {
        match self {
            Self::Input => 'i',
            Self::Output => 'o',
            Self::Clear => 'c',
            Self::Set => 's',
            Self::Enable => 'e',
            Self::Lock => 'l',
            Self::Access => 'a',
            Self::Queue => 'q',
            Self::Fixed => 'f',
            Self::Na => 'n',
        }
    }

    /// Flag must not be combined with any other flag.
    #[must_use]
    pub const fn is_exclusive(self) -> bool {
        matches!(self, Self::Queue | Self::Fixed | Self::Na)
    }

    /// Looks a flag up by its letter.
    #[must_use]
    pub fn from_letter(letter: char) -> Option<Self> {
        Self::ALL.into_iter().find(|flag| flag.letter() == letter)
    }

    const fn bit(self) -> u16 {
        1 << self as u8
    }
}

impl fmt::Display for HardwareFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// Hardware literal parsing failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HardwareParseError {
    /// Literal contains something that is not a flag letter.
    #[error("unknown hardware mode '{0}'")]
    UnknownFlag(String),
}

/// Set of [`HardwareFlag`]s.
///
/// Ordering is the subset relation, so `a <= b` holds when every flag of
/// `a` is in `b` and unrelated sets are incomparable.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct HardwareMode(u16);

impl HardwareMode {
    /// Set without any flag. Never produced by parsing.
    pub const EMPTY: Self = Self(0);

    /// Not accessible by hardware.
    pub const NA: Self = Self::from_flag(HardwareFlag::Na);

    /// Set holding one flag.
    #[must_use]
    pub const fn from_flag(flag: HardwareFlag) -> Self {
        Self(flag.bit())
    }

    /// Set holding every flag of `flags`.
    #[must_use]
    pub fn from_flags(flags: impl IntoIterator<Item = HardwareFlag>) -> Self {
        flags.into_iter().fold(Self::EMPTY, |acc, flag| acc | flag)
    }

    /// Flag is a member of the set.
    #[must_use]
    pub const fn contains(self, flag: HardwareFlag) -> bool {
        self.0 & flag.bit() != 0
    }

    /// Every flag of `self` is also in `other`.
    #[must_use]
    pub const fn is_subset(self, other: Self) -> bool {
        self.0 & !other.0 == 0
    }

    /// Every flag of `other` is also in `self`.
    #[must_use]
    pub const fn is_superset(self, other: Self) -> bool {
        other.is_subset(self)
    }

    /// Union of both sets.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Number of flags in the set.
    #[must_use]
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Set holds no flags.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Flags in declaration order.
    pub fn iter(self) -> impl Iterator<Item = HardwareFlag> {
        HardwareFlag::ALL
            .into_iter()
            .filter(move |flag| self.contains(*flag))
    }

    /// First exclusive flag that shares the set with another flag.
    #[must_use]
    pub fn exclusive_conflict(self) -> Option<HardwareFlag> {
        if self.len() < 2 {
            return None;
        }
        self.iter().find(|flag| flag.is_exclusive())
    }
}

impl FromStr for HardwareMode {
    type Err = HardwareParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.to_lowercase();
        if lowered.is_empty() {
            return Ok(Self::NA);
        }
        let mut mode = Self::EMPTY;
        if lowered.contains('-') {
            for part in lowered.split('-') {
                let mut chars = part.chars();
                let flag = match (chars.next(), chars.next()) {
                    (Some(letter), None) => HardwareFlag::from_letter(letter),
                    _ => None,
                };
                mode |= flag.ok_or_else(|| HardwareParseError::UnknownFlag(part.to_owned()))?;
            }
        } else {
            for letter in lowered.chars() {
                mode |= HardwareFlag::from_letter(letter)
                    .ok_or_else(|| HardwareParseError::UnknownFlag(letter.to_string()))?;
            }
        }
        Ok(mode)
    }
}

impl BitOr for HardwareMode {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOr<HardwareFlag> for HardwareMode {
    type Output = Self;

    fn bitor(self, rhs: HardwareFlag) -> Self {
        self.union(Self::from_flag(rhs))
    }
}

impl BitOrAssign<HardwareFlag> for HardwareMode {
    fn bitor_assign(&mut self, rhs: HardwareFlag) {
        *self = *self | rhs;
    }
}

impl From<HardwareFlag> for HardwareMode {
    fn from(flag: HardwareFlag) -> Self {
        Self::from_flag(flag)
    }
}

impl PartialOrd for HardwareMode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self.is_subset(*other), other.is_subset(*self)) {
            (true, true) => Some(Ordering::Equal),
            (true, false) => Some(Ordering::Less),
            (false, true) => Some(Ordering::Greater),
            (false, false) => None,
        }
    }
}

impl fmt::Display for HardwareMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, flag) in self.iter().enumerate() {
            if i > 0 {
                f.write_str("-")?;
            }
            write!(f, "{flag}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for HardwareMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HardwareMode({self})")
    }
}

impl Serialize for HardwareMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
