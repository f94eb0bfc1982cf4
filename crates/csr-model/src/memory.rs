//! Memory blocks mapped into a register map.

use std::sync::Arc;

use serde::Serialize;

use crate::access::AccessCategory;
use crate::array::Repeatable;
use crate::error::{Location, ModelError};
use crate::item::{out_of_range, Adoptable, Header, MapableItem, NamedItem, ParentLink};
use crate::map::Map;
use crate::style::MemoryStyle;

/// Widest address bus of a map or memory.
pub const MAX_ADDRESS_WIDTH: u32 = 63;

/// Size in bytes of the widest address space.
pub(crate) const ADDRESS_LIMIT: u64 = 1 << MAX_ADDRESS_WIDTH;

/// Rejects address widths outside `1..=MAX_ADDRESS_WIDTH`.
pub(crate) fn check_address_width(address_width: u32) -> Result<(), ModelError> {
    if address_width == 0 || address_width > MAX_ADDRESS_WIDTH {
        return Err(out_of_range(
            "address_width",
            address_width,
            format!("address width must be within 1..={MAX_ADDRESS_WIDTH}, but {address_width} provided"),
        ));
    }
    Ok(())
}

/// Construction parameters of a [`Memory`].
#[derive(Debug, Clone)]
pub struct MemoryParams {
    /// Name and documentation.
    pub header: Header,
    /// Byte offset inside the map.
    pub offset: u64,
    /// Word address width.
    pub address_width: u32,
    /// Word width in bits.
    pub data_width: u32,
    /// Implementation style.
    pub style: MemoryStyle,
    /// Sparse `(word index, value)` table of initial contents.
    pub initial_values: Vec<(u64, u64)>,
}

/// Contiguous region addressed as words.
#[derive(Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Memory {
    #[serde(flatten)]
    header: Header,
    offset: u64,
    address_width: u32,
    data_width: u32,
    style: MemoryStyle,
    initial_values: Vec<(u64, u64)>,
    #[serde(skip)]
    size: u64,
    #[serde(skip)]
    parent: ParentLink<Map>,
}

impl Memory {
    /// Validates a memory block.
    ///
    /// # Errors
    ///
    /// Returns `value_out_of_range` at `address_width` or `data_width` for
    /// an empty or oversized geometry, and at `initial_values[i][0]` or
    /// `initial_values[i][1]` for an initial value outside the capacity or
    /// wider than `data_width`.
    pub fn new(params: MemoryParams) -> Result<Arc<Self>, ModelError> {
        check_address_width(params.address_width)?;
        if params.data_width == 0 {
            return Err(out_of_range(
                "data_width",
                0,
                "memory data width must be at least 1".into(),
            ));
        }
        let capacity = 1_u64 << params.address_width;
        let size = capacity
            .checked_mul(u64::from(params.data_width.div_ceil(8)))
            .ok_or_else(|| {
                out_of_range(
                    "data_width",
                    params.data_width,
                    format!(
                        "memory of 2^{} words of {} bits exceeds the 64-bit address space",
                        params.address_width, params.data_width
                    ),
                )
            })?;

        for (i, &(addr, value)) in params.initial_values.iter().enumerate() {
            let at = Location::root().join("initial_values").join(i);
            if addr >= capacity {
                return Err(out_of_range(
                    "initial_values",
                    format!("0x{addr:x}"),
                    format!("initial value {i} address 0x{addr:x} is out of memory capacity 0x{capacity:x}"),
                )
                .at(at.join(0)));
            }
            if params.data_width < u64::BITS && value >> params.data_width != 0 {
                return Err(out_of_range(
                    "initial_values",
                    format!("0x{value:x}"),
                    format!(
                        "initial value {i} data 0x{value:x} is out of memory data width {} bits",
                        params.data_width
                    ),
                )
                .at(at.join(1)));
            }
        }

        log::trace!(
            "memory '{}' {}x{} ({})",
            params.header.name,
            capacity,
            params.data_width,
            params.style
        );
        Ok(Self::assemble(params, size, ParentLink::new()))
    }

    fn assemble(params: MemoryParams, size: u64, parent: ParentLink<Map>) -> Arc<Self> {
        Arc::new(Self {
            header: params.header,
            offset: params.offset,
            address_width: params.address_width,
            data_width: params.data_width,
            style: params.style,
            initial_values: params.initial_values,
            size,
            parent,
        })
    }

    fn params(&self) -> MemoryParams {
        MemoryParams {
            header: self.header.clone(),
            offset: self.offset,
            address_width: self.address_width,
            data_width: self.data_width,
            style: self.style,
            initial_values: self.initial_values.clone(),
        }
    }

    /// Word address width.
    #[must_use]
    pub const fn address_width(&self) -> u32 {
        self.address_width
    }

    /// Word width in bits.
    #[must_use]
    pub const fn data_width(&self) -> u32 {
        self.data_width
    }

    /// Implementation style.
    #[must_use]
    pub const fn style(&self) -> MemoryStyle {
        self.style
    }

    /// Sparse initial contents.
    #[must_use]
    pub fn initial_values(&self) -> &[(u64, u64)] {
        &self.initial_values
    }

    /// Capacity in words.
    #[must_use]
    pub const fn capacity(&self) -> u64 {
        1 << self.address_width
    }

    /// Bytes per word.
    #[must_use]
    pub fn granularity(&self) -> u64 {
        u64::from(self.data_width.div_ceil(8))
    }

    /// Size in bytes.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Bus access category from the style.
    #[must_use]
    pub const fn access(&self) -> AccessCategory {
        self.style.access()
    }

    /// Map this memory belongs to.
    #[must_use]
    pub fn parent_map(&self) -> Option<Arc<Map>> {
        self.parent.get()
    }
}

impl NamedItem for Memory {
    fn header(&self) -> &Header {
        &self.header
    }

    fn parent_path(&self) -> Option<String> {
        self.parent.path()
    }
}

impl MapableItem for Memory {
    fn offset(&self) -> u64 {
        self.offset
    }

    fn base_address(&self) -> u64 {
        self.parent.get().map_or(0, |map| map.address())
    }
}

impl Adoptable for Memory {
    type Parent = Map;

    fn parent_link(&self) -> &ParentLink<Map> {
        &self.parent
    }

    fn relinked(&self) -> Arc<Self> {
        Self::assemble(self.params(), self.size, ParentLink::new())
    }
}

impl Repeatable for Memory {
    const ARRAY_KIND: &'static str = "memory_array";
    const OFFSET_LIMIT: u64 = ADDRESS_LIMIT;

    fn start(&self) -> u64 {
        self.offset
    }

    fn repeat(&self, header: Header, offset: u64) -> Arc<Self> {
        let params = MemoryParams {
            header,
            offset,
            ..self.params()
        };
        Self::assemble(params, self.size, self.parent.share())
    }
}
