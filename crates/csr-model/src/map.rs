//! Hierarchical containers of registers, memories and sub-maps.
//!
//! A map owns an address space of `2^address_width` bytes split into
//! registers of `register_width` bits. All cross-item invariants are
//! checked here, once every child has validated itself:
//!
//! 1. at least one item;
//! 2. `register_width` is a power of two of at least 8;
//! 3. unique item names (array elements included);
//! 4. unique item offsets;
//! 5. offsets and array increments aligned to the granularity;
//! 6. child maps and memories are not wider than the map;
//! 7. array increments at least the element footprint;
//! 8. disjoint element ranges, so interleaved arrays are accepted;
//! 9. every element range inside the map;
//! 10. every register fits `register_width`.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Weak};

use serde::Serialize;

use crate::array::{MapArray, MemoryArray, RegisterArray, Repeatable};
use crate::error::{ErrorKind, Location, ModelError};
use crate::item::{adopt, out_of_range, Adoptable, Header, MapableItem, Memo, NamedItem, ParentLink};
use crate::memory::{check_address_width, Memory, ADDRESS_LIMIT};
use crate::register::Register;
use crate::types::{Identifier, Pow2Int};

/// Narrowest register a map can hold.
pub const MIN_REGISTER_WIDTH: u32 = 8;

/// Half-open byte range `[start, end)` occupied by an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressRange {
    /// First byte.
    pub start: u64,
    /// One past the last byte.
    pub end: u64,
}

impl AddressRange {
    /// Ranges share at least one byte.
    #[must_use]
    pub const fn overlaps(self, other: Self) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[0x{:x};0x{:x})", self.start, self.end)
    }
}

/// Declared child of a map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MapItem {
    /// Single register.
    Register(Arc<Register>),
    /// Memory block.
    Memory(Arc<Memory>),
    /// Sub-map.
    Map(Arc<Map>),
    /// Repeated register.
    RegisterArray(Arc<RegisterArray>),
    /// Repeated memory block.
    MemoryArray(Arc<MemoryArray>),
    /// Repeated sub-map.
    MapArray(Arc<MapArray>),
}

impl MapItem {
    /// Discriminator literal.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Register(_) => "register",
            Self::Memory(_) => "memory",
            Self::Map(_) => "map",
            Self::RegisterArray(_) => Register::ARRAY_KIND,
            Self::MemoryArray(_) => Memory::ARRAY_KIND,
            Self::MapArray(_) => Map::ARRAY_KIND,
        }
    }

    /// Item is an array descriptor.
    #[must_use]
    pub const fn is_array(&self) -> bool {
        matches!(self, Self::RegisterArray(_) | Self::MemoryArray(_) | Self::MapArray(_))
    }

    /// Declared name.
    #[must_use]
    pub fn name(&self) -> &Identifier {
        match self {
            Self::Register(item) => item.name(),
            Self::Memory(item) => item.name(),
            Self::Map(item) => item.name(),
            Self::RegisterArray(item) => item.name(),
            Self::MemoryArray(item) => item.name(),
            Self::MapArray(item) => item.name(),
        }
    }

    /// Byte offset inside the parent map (first element for arrays).
    #[must_use]
    pub fn offset(&self) -> u64 {
        match self {
            Self::Register(item) => item.offset(),
            Self::Memory(item) => item.offset(),
            Self::Map(item) => item.offset(),
            Self::RegisterArray(item) => item.offset(),
            Self::MemoryArray(item) => item.offset(),
            Self::MapArray(item) => item.offset(),
        }
    }

    /// Absolute byte address (first element for arrays).
    #[must_use]
    pub fn address(&self) -> u64 {
        match self {
            Self::Register(item) => item.address(),
            Self::Memory(item) => item.address(),
            Self::Map(item) => item.address(),
            Self::RegisterArray(item) => item.address(),
            Self::MemoryArray(item) => item.address(),
            Self::MapArray(item) => item.address(),
        }
    }

    /// Own address width of memories and maps.
    #[must_use]
    pub fn address_width(&self) -> Option<u32> {
        match self {
            Self::Register(_) | Self::RegisterArray(_) => None,
            Self::Memory(item) => Some(item.address_width()),
            Self::Map(item) => Some(item.address_width()),
            Self::MemoryArray(item) => Some(item.template().address_width()),
            Self::MapArray(item) => Some(item.template().address_width()),
        }
    }

    /// Bytes occupied by one element in a map of the given granularity.
    #[must_use]
    pub fn footprint(&self, granularity: u64) -> u64 {
        match self {
            Self::Register(_) | Self::RegisterArray(_) => granularity,
            Self::Memory(item) => item.size(),
            Self::Map(item) => item.size(),
            Self::MemoryArray(item) => item.template().size(),
            Self::MapArray(item) => item.template().size(),
        }
    }

    /// `(increment, last element offset)` of array descriptors.
    #[must_use]
    pub fn repetition(&self) -> Option<(u64, u64)> {
        match self {
            Self::Register(_) | Self::Memory(_) | Self::Map(_) => None,
            Self::RegisterArray(item) => Some((item.increment(), item.last_offset())),
            Self::MemoryArray(item) => Some((item.increment(), item.last_offset())),
            Self::MapArray(item) => Some((item.increment(), item.last_offset())),
        }
    }

    /// Byte span of the item, from its first element to the end of its last.
    ///
    /// Interleaved arrays have intersecting spans; use
    /// [`MapItem::element_ranges`] for the bytes actually occupied.
    #[must_use]
    pub fn range(&self, granularity: u64) -> AddressRange {
        let start = self.offset();
        let last = self.repetition().map_or(start, |(_, last)| last);
        AddressRange {
            start,
            end: last.saturating_add(self.footprint(granularity)),
        }
    }

    /// Byte ranges of the concrete items this one stands for, in element order.
    #[must_use]
    pub fn element_ranges(&self, granularity: u64) -> Vec<AddressRange> {
        let footprint = self.footprint(granularity);
        let range = |start: u64| AddressRange {
            start,
            end: start.saturating_add(footprint),
        };
        match self {
            Self::Register(_) | Self::Memory(_) | Self::Map(_) => vec![range(self.offset())],
            Self::RegisterArray(item) => item.element_offsets().iter().copied().map(range).collect(),
            Self::MemoryArray(item) => item.element_offsets().iter().copied().map(range).collect(),
            Self::MapArray(item) => item.element_offsets().iter().copied().map(range).collect(),
        }
    }

    /// Names of the concrete items this one stands for.
    #[must_use]
    pub fn element_names(&self) -> Vec<&Identifier> {
        match self {
            Self::Register(_) | Self::Memory(_) | Self::Map(_) => vec![self.name()],
            Self::RegisterArray(item) => item.element_names().iter().collect(),
            Self::MemoryArray(item) => item.element_names().iter().collect(),
            Self::MapArray(item) => item.element_names().iter().collect(),
        }
    }

    fn register_template(&self) -> Option<&Arc<Register>> {
        match self {
            Self::Register(item) => Some(item),
            Self::RegisterArray(item) => Some(item.template()),
            _ => None,
        }
    }

    fn adopted(&self, parent: &Weak<Map>) -> Self {
        match self {
            Self::Register(item) => Self::Register(adopt(item, parent)),
            Self::Memory(item) => Self::Memory(adopt(item, parent)),
            Self::Map(item) => Self::Map(adopt(item, parent)),
            Self::RegisterArray(item) => Self::RegisterArray(adopt(item, parent)),
            Self::MemoryArray(item) => Self::MemoryArray(adopt(item, parent)),
            Self::MapArray(item) => Self::MapArray(adopt(item, parent)),
        }
    }
}

/// Construction parameters of a [`Map`].
#[derive(Debug, Clone)]
pub struct MapParams {
    /// Name and documentation.
    pub header: Header,
    /// Byte offset inside the parent map; the address of a root map.
    pub offset: u64,
    /// Byte address width.
    pub address_width: u32,
    /// Register width in bits.
    pub register_width: u32,
    /// Registers, memories, sub-maps and arrays of them, in any order.
    pub items: Vec<MapItem>,
}

#[derive(Debug, Default)]
struct Views {
    registers: Vec<Arc<Register>>,
    memories: Vec<Arc<Memory>>,
    maps: Vec<Arc<Map>>,
}

/// Collection of memory-mapped items.
#[derive(Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Map {
    #[serde(flatten)]
    header: Header,
    offset: u64,
    address_width: u32,
    register_width: u32,
    items: Vec<MapItem>,
    #[serde(skip)]
    views: Memo<Views>,
    #[serde(skip)]
    parent: ParentLink<Map>,
}

impl Map {
    /// Validates a map and sorts its items by offset.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant, in the order listed in the
    /// module documentation. Item-level failures are located at
    /// `items[i]`; increment failures at `items[i].<kind>.increment` and
    /// register width failures at `items[i].<kind>.fields`.
    pub fn new(params: MapParams) -> Result<Arc<Self>, ModelError> {
        let MapParams {
            header,
            offset,
            address_width,
            register_width,
            mut items,
        } = params;

        if items.is_empty() {
            return Err(out_of_range(
                "items",
                0,
                format!("map '{}' must have at least one item", header.name),
            ));
        }
        check_register_width(register_width)?;
        check_address_width(address_width)?;
        check_items(&items, address_width, register_width)?;

        items.sort_by_key(MapItem::offset);
        log::trace!("map '{}' with {} items", header.name, items.len());
        Ok(Self::assemble(
            header,
            offset,
            address_width,
            register_width,
            &items,
            ParentLink::new(),
        ))
    }

    fn assemble(
        header: Header,
        offset: u64,
        address_width: u32,
        register_width: u32,
        items: &[MapItem],
        parent: ParentLink<Self>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this: &Weak<Self>| Self {
            header,
            offset,
            address_width,
            register_width,
            items: items.iter().map(|item| item.adopted(this)).collect(),
            views: Memo::new(),
            parent,
        })
    }

    /// Byte address width.
    #[must_use]
    pub const fn address_width(&self) -> u32 {
        self.address_width
    }

    /// Register width in bits.
    #[must_use]
    pub const fn register_width(&self) -> u32 {
        self.register_width
    }

    /// Bytes covered by the address space.
    #[must_use]
    pub const fn size(&self) -> u64 {
        1 << self.address_width
    }

    /// Bytes per register.
    #[must_use]
    pub fn granularity(&self) -> u64 {
        u64::from(self.register_width.div_ceil(8))
    }

    /// Declared items sorted by offset.
    #[must_use]
    pub fn items(&self) -> &[MapItem] {
        &self.items
    }

    /// Declared item with the given name.
    #[must_use]
    pub fn item(&self, name: &str) -> Option<&MapItem> {
        self.items.iter().find(|item| item.name().as_str() == name)
    }

    fn views(&self) -> &Views {
        self.views.get_or_init(|| {
            let mut views = Views::default();
            for item in &self.items {
                match item {
                    MapItem::Register(reg) => views.registers.push(Arc::clone(reg)),
                    MapItem::Memory(mem) => views.memories.push(Arc::clone(mem)),
                    MapItem::Map(map) => views.maps.push(Arc::clone(map)),
                    MapItem::RegisterArray(array) => {
                        views.registers.extend(array.generated_items().iter().cloned());
                    }
                    MapItem::MemoryArray(array) => {
                        views.memories.extend(array.generated_items().iter().cloned());
                    }
                    MapItem::MapArray(array) => {
                        views.maps.extend(array.generated_items().iter().cloned());
                    }
                }
            }
            views.registers.sort_by_key(|reg| reg.offset());
            views.memories.sort_by_key(|mem| mem.offset());
            views.maps.sort_by_key(|map| map.offset());
            views
        })
    }

    /// Concrete registers, arrays expanded, in offset order.
    #[must_use]
    pub fn registers(&self) -> &[Arc<Register>] {
        &self.views().registers
    }

    /// Concrete memories, arrays expanded, in offset order.
    #[must_use]
    pub fn memories(&self) -> &[Arc<Memory>] {
        &self.views().memories
    }

    /// Concrete sub-maps, arrays expanded, in offset order.
    #[must_use]
    pub fn maps(&self) -> &[Arc<Self>] {
        &self.views().maps
    }

    /// Concrete register with the given name.
    #[must_use]
    pub fn register(&self, name: &str) -> Option<&Arc<Register>> {
        self.registers().iter().find(|reg| reg.name().as_str() == name)
    }

    /// Map holds at least one register.
    #[must_use]
    pub fn has_registers(&self) -> bool {
        !self.registers().is_empty()
    }

    /// Map holds at least one memory.
    #[must_use]
    pub fn has_memories(&self) -> bool {
        !self.memories().is_empty()
    }

    /// Map holds at least one sub-map.
    #[must_use]
    pub fn has_maps(&self) -> bool {
        !self.maps().is_empty()
    }

    /// Map has no parent.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent.get().is_none()
    }

    /// Map this one is nested in.
    #[must_use]
    pub fn parent_map(&self) -> Option<Arc<Self>> {
        self.parent.get()
    }
}

fn check_register_width(register_width: u32) -> Result<(), ModelError> {
    Pow2Int::new(u64::from(register_width))
        .map_err(|err| ModelError::from(err).at(Location::root().join("register_width")))?;
    if register_width < MIN_REGISTER_WIDTH {
        return Err(out_of_range(
            "register_width",
            register_width,
            format!(
                "minimal allowed 'register_width' for a map is {MIN_REGISTER_WIDTH}, but {register_width} provided"
            ),
        ));
    }
    Ok(())
}

fn check_items(items: &[MapItem], address_width: u32, register_width: u32) -> Result<(), ModelError> {
    let granularity = u64::from(register_width.div_ceil(8));
    let size = 1_u64 << address_width;
    let at = |i: usize| Location::root().join("items").join(i);
    let error = |kind: ErrorKind, i: usize, message: String| {
        ModelError::new(kind, message)
            .with_value(items[i].name())
            .at(at(i))
    };

    let mut names = HashSet::new();
    for (i, item) in items.iter().enumerate() {
        for name in item.element_names() {
            if !names.insert(name) {
                return Err(error(
                    ErrorKind::UniquenessViolation,
                    i,
                    format!("item name '{name}' is used more than once"),
                ));
            }
        }
    }

    let mut offsets = HashSet::new();
    for (i, item) in items.iter().enumerate() {
        if !offsets.insert(item.offset()) {
            return Err(error(
                ErrorKind::UniquenessViolation,
                i,
                format!("item offset 0x{:x} is used more than once", item.offset()),
            ));
        }
    }

    for (i, item) in items.iter().enumerate() {
        if item.offset() % granularity != 0 {
            return Err(error(
                ErrorKind::AlignmentViolation,
                i,
                format!(
                    "item '{}' offset 0x{:x} is not aligned to map granularity {granularity}",
                    item.name(),
                    item.offset()
                ),
            ));
        }
        if let Some((increment, _)) = item.repetition() {
            if increment % granularity != 0 {
                return Err(error(
                    ErrorKind::AlignmentViolation,
                    i,
                    format!(
                        "item '{}' increment 0x{increment:x} is not aligned to map granularity {granularity}",
                        item.name()
                    ),
                ));
            }
        }
    }

    for (i, item) in items.iter().enumerate() {
        if let Some(width) = item.address_width() {
            if width > address_width {
                return Err(error(
                    ErrorKind::ContainmentViolation,
                    i,
                    format!(
                        "item '{}' address width {width} is greater than map address width {address_width}",
                        item.name()
                    ),
                ));
            }
        }
    }

    for (i, item) in items.iter().enumerate() {
        if let Some((increment, _)) = item.repetition() {
            let footprint = item.footprint(granularity);
            if increment < footprint {
                return Err(ModelError::new(
                    ErrorKind::OverlapViolation,
                    format!(
                        "array '{}' increment 0x{increment:x} is less than element size 0x{footprint:x}, elements overlap",
                        item.name()
                    ),
                )
                .with_value(increment)
                .at(at(i).join(item.kind()).join("increment")));
            }
        }
    }

    // One range per concrete element, tagged with the declaring item.
    let mut ranges: Vec<(AddressRange, usize, &Identifier)> = Vec::new();
    for (i, item) in items.iter().enumerate() {
        let elements = item.element_ranges(granularity).into_iter().zip(item.element_names());
        ranges.extend(elements.map(|(range, name)| (range, i, name)));
    }
    ranges.sort_by_key(|(range, _, _)| (range.start, range.end));
    let mut widest: Option<(AddressRange, usize, &Identifier)> = None;
    for &(range, i, name) in &ranges {
        match widest {
            Some((held, first, holder)) if held.overlaps(range) => {
                return Err(error(
                    ErrorKind::OverlapViolation,
                    first,
                    format!("address collision between '{holder}' {held} and '{name}' {range}"),
                ));
            }
            Some((held, _, _)) if held.end >= range.end => {}
            _ => widest = Some((range, i, name)),
        }
    }

    for (range, i, name) in ranges {
        if range.end > size {
            return Err(error(
                ErrorKind::ContainmentViolation,
                i,
                format!(
                    "item '{name}' address range {range} is falling out of the map address space [0x0;0x{size:x})"
                ),
            ));
        }
    }

    for (i, item) in items.iter().enumerate() {
        let Some(register) = item.register_template() else {
            continue;
        };
        if let Some(last) = register.fields().last() {
            if last.msb() >= register_width {
                return Err(ModelError::new(
                    ErrorKind::ContainmentViolation,
                    format!(
                        "field '{}' (lsb={} msb={}) exceeds size {register_width} of the register within map",
                        last.name(),
                        last.lsb(),
                        last.msb()
                    ),
                )
                .with_value(last.name())
                .at(at(i).join(item.kind()).join("fields")));
            }
        }
    }

    Ok(())
}

impl NamedItem for Map {
    fn header(&self) -> &Header {
        &self.header
    }

    fn parent_path(&self) -> Option<String> {
        self.parent.path()
    }
}

impl MapableItem for Map {
    fn offset(&self) -> u64 {
        self.offset
    }

    fn base_address(&self) -> u64 {
        self.parent.get().map_or(0, |map| map.address())
    }
}

impl Adoptable for Map {
    type Parent = Self;

    fn parent_link(&self) -> &ParentLink<Self> {
        &self.parent
    }

    fn relinked(&self) -> Arc<Self> {
        Self::assemble(
            self.header.clone(),
            self.offset,
            self.address_width,
            self.register_width,
            &self.items,
            ParentLink::new(),
        )
    }
}

impl Repeatable for Map {
    const ARRAY_KIND: &'static str = "map_array";
    const OFFSET_LIMIT: u64 = ADDRESS_LIMIT;

    fn start(&self) -> u64 {
        self.offset
    }

    fn repeat(&self, header: Header, offset: u64) -> Arc<Self> {
        Self::assemble(
            header,
            offset,
            self.address_width,
            self.register_width,
            &self.items,
            self.parent.share(),
        )
    }
}
