//! Bit fields inside a register.

use std::ops::{Range, RangeInclusive};
use std::sync::{Arc, Weak};

use serde::Serialize;
use thiserror::Error;

use crate::access::AccessMode;
use crate::enumeration::Enum;
use crate::error::{ErrorKind, Location, ModelError};
use crate::hardware::{HardwareFlag, HardwareMode};
use crate::item::{adopt, out_of_range, Adoptable, Header, NamedItem, ParentLink};
use crate::register::Register;

/// Highest bit position plus one that a field may reach.
pub const MAX_REGISTER_BITS: u32 = 128;

/// Byte index outside the bytes a field touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("byte {index} is not touched by the field, expected one of {first}..={last}")]
pub struct ByteLaneError {
    /// Requested byte index.
    pub index: u32,
    /// Lowest byte the field touches.
    pub first: u32,
    /// Highest byte the field touches.
    pub last: u32,
}

/// Construction parameters of a [`Field`].
#[derive(Debug, Clone)]
pub struct FieldParams {
    /// Name and documentation.
    pub header: Header,
    /// Bit offset inside the register.
    pub offset: u32,
    /// Bit width, at least one.
    pub width: u32,
    /// Reset value, `None` when unknown.
    pub reset: Option<u64>,
    /// Software access mode.
    pub access: AccessMode,
    /// Hardware capabilities.
    pub hardware: HardwareMode,
    /// Optional value enumeration.
    pub enumeration: Option<Arc<Enum>>,
}

impl FieldParams {
    /// Parameters of a read-write, hardware-inaccessible field with zero reset.
    #[must_use]
    pub const fn new(header: Header, offset: u32, width: u32) -> Self {
        Self {
            header,
            offset,
            width,
            reset: Some(0),
            access: AccessMode::Rw,
            hardware: HardwareMode::NA,
            enumeration: None,
        }
    }
}

/// Contiguous bit slice of a register.
#[derive(Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Field {
    #[serde(flatten)]
    header: Header,
    offset: u32,
    width: u32,
    reset: Option<u64>,
    access: AccessMode,
    hardware: HardwareMode,
    #[serde(rename = "enum")]
    enumeration: Option<Arc<Enum>>,
    #[serde(skip)]
    parent: ParentLink<Register>,
}

impl Field {
    /// Validates a field.
    ///
    /// # Errors
    ///
    /// - `value_out_of_range` at `width`/`offset` if the slice is empty or
    ///   ends above bit 127, at `reset` if the reset does not fit, at `enum`
    ///   if the enumeration is wider than the field;
    /// - `hardware_combination_error` at `hardware` for an exclusive flag
    ///   combined with others, `e` without `i`, or `q` with an access mode
    ///   other than `rw`, `ro` or `wo`.
    pub fn new(params: FieldParams) -> Result<Arc<Self>, ModelError> {
        check_geometry(params.offset, params.width)?;

        if let Some(reset) = params.reset {
            let needed = u64::BITS - reset.leading_zeros();
            if needed > params.width {
                return Err(out_of_range(
                    "reset",
                    format!("0x{reset:x}"),
                    format!(
                        "reset value 0x{reset:x} requires {needed} bits to represent, but field is {} bits wide",
                        params.width
                    ),
                ));
            }
        }

        check_hardware(params.hardware, params.access)?;

        if let Some(enumeration) = &params.enumeration {
            if enumeration.width() > params.width {
                return Err(out_of_range(
                    "enum",
                    enumeration.name(),
                    format!(
                        "enumeration '{}' requires {} bits to represent, but field is {} bits wide",
                        enumeration.name(),
                        enumeration.width(),
                        params.width
                    ),
                ));
            }
        }

        log::trace!(
            "field '{}' [{}:{}]",
            params.header.name,
            params.offset + params.width - 1,
            params.offset
        );
        Ok(Self::assemble(params, ParentLink::new()))
    }

    fn assemble(params: FieldParams, parent: ParentLink<Register>) -> Arc<Self> {
        Arc::new_cyclic(|this: &Weak<Self>| Self {
            header: params.header,
            offset: params.offset,
            width: params.width,
            reset: params.reset,
            access: params.access,
            hardware: params.hardware,
            enumeration: params.enumeration.as_ref().map(|e| adopt(e, this)),
            parent,
        })
    }

    fn params(&self) -> FieldParams {
        FieldParams {
            header: self.header.clone(),
            offset: self.offset,
            width: self.width,
            reset: self.reset,
            access: self.access,
            hardware: self.hardware,
            enumeration: self.enumeration.clone(),
        }
    }

    /// Copy of this field under another name and offset, sharing its parent link.
    pub(crate) fn repeated(&self, header: Header, offset: u32) -> Arc<Self> {
        let params = FieldParams {
            header,
            offset,
            ..self.params()
        };
        Self::assemble(params, self.parent.share())
    }

    /// Bit offset inside the register.
    #[must_use]
    pub const fn offset(&self) -> u32 {
        self.offset
    }

    /// Bit width.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Reset value, `None` when unknown.
    #[must_use]
    pub const fn reset(&self) -> Option<u64> {
        self.reset
    }

    /// Software access mode.
    #[must_use]
    pub const fn access(&self) -> AccessMode {
        self.access
    }

    /// Hardware capabilities.
    #[must_use]
    pub const fn hardware(&self) -> HardwareMode {
        self.hardware
    }

    /// Attached enumeration.
    #[must_use]
    pub const fn enumeration(&self) -> Option<&Arc<Enum>> {
        self.enumeration.as_ref()
    }

    /// Least significant bit position inside the register.
    #[must_use]
    pub const fn lsb(&self) -> u32 {
        self.offset
    }

    /// Most significant bit position inside the register.
    #[must_use]
    pub const fn msb(&self) -> u32 {
        self.offset + self.width - 1
    }

    /// Register mask covering the field.
    #[must_use]
    pub const fn mask(&self) -> u128 {
        (u128::MAX >> (u128::BITS - self.width)) << self.offset
    }

    /// Field is wider than one bit.
    #[must_use]
    pub const fn is_multibit(&self) -> bool {
        self.width > 1
    }

    /// Register bit positions from LSB to MSB.
    #[must_use]
    pub const fn bit_indices(&self) -> Range<u32> {
        self.offset..self.offset + self.width
    }

    /// Register byte indices the field touches, from lowest to highest.
    #[must_use]
    pub const fn byte_indices(&self) -> RangeInclusive<u32> {
        self.lsb() / 8..=self.msb() / 8
    }

    /// Register-relative `(msb, lsb)` slice the field occupies in byte `index`.
    ///
    /// For a field at offset 3 with width 7, byte 0 gives `(7, 3)` and byte 1
    /// gives `(9, 8)`.
    ///
    /// # Errors
    ///
    /// Returns [`ByteLaneError`] if the field does not touch byte `index`.
    pub const fn byte_select(&self, index: u32) -> Result<(u32, u32), ByteLaneError> {
        let first = self.lsb() / 8;
        let last = self.msb() / 8;
        if index < first || index > last {
            return Err(ByteLaneError { index, first, last });
        }
        let lsb = if index == first { self.lsb() } else { index * 8 };
        let msb = if index == last { self.msb() } else { index * 8 + 7 };
        Ok((msb, lsb))
    }

    /// Same as [`Field::byte_select`] in field-local bit positions.
    ///
    /// # Errors
    ///
    /// Returns [`ByteLaneError`] if the field does not touch byte `index`.
    pub const fn byte_select_self(&self, index: u32) -> Result<(u32, u32), ByteLaneError> {
        match self.byte_select(index) {
            Ok((msb, lsb)) => Ok((msb - self.offset, lsb - self.offset)),
            Err(err) => Err(err),
        }
    }

    /// Register this field belongs to.
    #[must_use]
    pub fn parent_register(&self) -> Option<Arc<Register>> {
        self.parent.get()
    }
}

/// Rejects empty slices and slices reaching past the widest supported register.
pub(crate) fn check_geometry(offset: u32, width: u32) -> Result<(), ModelError> {
    if width == 0 {
        return Err(out_of_range("width", width, "field width must be at least 1".into()));
    }
    if offset >= MAX_REGISTER_BITS {
        return Err(out_of_range(
            "offset",
            offset,
            format!("field offset must be below {MAX_REGISTER_BITS}"),
        ));
    }
    if u64::from(offset) + u64::from(width) > u64::from(MAX_REGISTER_BITS) {
        return Err(out_of_range(
            "width",
            width,
            format!(
                "field [{}:{offset}] exceeds the maximum register width of {MAX_REGISTER_BITS} bits",
                u64::from(offset) + u64::from(width) - 1
            ),
        ));
    }
    Ok(())
}

fn check_hardware(hardware: HardwareMode, access: AccessMode) -> Result<(), ModelError> {
    let reject = |message: String| {
        Err(ModelError::new(ErrorKind::HardwareCombinationError, message)
            .with_value(hardware)
            .at(Location::root().join("hardware")))
    };

    if let Some(flag) = hardware.exclusive_conflict() {
        return reject(format!(
            "hardware mode '{flag}' must be exclusive, but current mode is '{hardware}'"
        ));
    }
    if hardware.contains(HardwareFlag::Queue)
        && !matches!(access, AccessMode::Rw | AccessMode::Ro | AccessMode::Wo)
    {
        return reject(format!(
            "hardware mode 'q' is allowed only with access modes rw, ro, wo, but current access mode is '{access}'"
        ));
    }
    if hardware.contains(HardwareFlag::Enable) && !hardware.contains(HardwareFlag::Input) {
        return reject(format!(
            "hardware mode 'e' is allowed only with 'i', but current mode is '{hardware}'"
        ));
    }
    Ok(())
}

impl NamedItem for Field {
    fn header(&self) -> &Header {
        &self.header
    }

    fn parent_path(&self) -> Option<String> {
        self.parent.path()
    }
}

impl Adoptable for Field {
    type Parent = Register;

    fn parent_link(&self) -> &ParentLink<Register> {
        &self.parent
    }

    fn relinked(&self) -> Arc<Self> {
        Self::assemble(self.params(), ParentLink::new())
    }
}
