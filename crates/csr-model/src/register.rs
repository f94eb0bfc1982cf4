//! Addressable words made of bit fields.

use std::collections::HashSet;
use std::sync::{Arc, Weak};

use serde::Serialize;

use crate::access::AccessCategory;
use crate::array::{FieldArray, Repeatable};
use crate::error::{ErrorKind, Location, ModelError};
use crate::field::{Field, MAX_REGISTER_BITS};
use crate::item::{adopt, out_of_range, Adoptable, Header, MapableItem, Memo, NamedItem, ParentLink};
use crate::map::Map;
use crate::memory::ADDRESS_LIMIT;
use crate::types::Identifier;

/// Declared child of a register.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldItem {
    /// Single field.
    Field(Arc<Field>),
    /// Repeated field.
    FieldArray(Arc<FieldArray>),
}

impl FieldItem {
    /// Discriminator literal.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Field(_) => "field",
            Self::FieldArray(_) => Field::ARRAY_KIND,
        }
    }

    /// Declared name.
    #[must_use]
    pub fn name(&self) -> &Identifier {
        match self {
            Self::Field(field) => field.name(),
            Self::FieldArray(array) => array.name(),
        }
    }

    /// Lowest bit of the item.
    #[must_use]
    pub fn lsb(&self) -> u32 {
        match self {
            Self::Field(field) => field.lsb(),
            Self::FieldArray(array) => array.template().lsb(),
        }
    }

    /// `(name, lsb, msb)` of every concrete field the item stands for.
    fn spans(&self) -> Vec<(&Identifier, u32, u32)> {
        match self {
            Self::Field(field) => vec![(field.name(), field.lsb(), field.msb())],
            Self::FieldArray(array) => {
                let width = array.template().width();
                array
                    .element_names()
                    .iter()
                    .zip(array.element_offsets())
                    .map(|(name, offset)| {
                        let lsb = bit_position(*offset);
                        (name, lsb, lsb + width - 1)
                    })
                    .collect()
            }
        }
    }

    fn adopted(&self, parent: &Weak<Register>) -> Self {
        match self {
            Self::Field(field) => Self::Field(adopt(field, parent)),
            Self::FieldArray(array) => Self::FieldArray(adopt(array, parent)),
        }
    }
}

/// Element offsets of field arrays are checked to stay below the widest register.
fn bit_position(offset: u64) -> u32 {
    u32::try_from(offset).unwrap_or(MAX_REGISTER_BITS)
}

impl Repeatable for Field {
    const ARRAY_KIND: &'static str = "field_array";
    const OFFSET_LIMIT: u64 = MAX_REGISTER_BITS as u64;

    fn start(&self) -> u64 {
        u64::from(self.offset())
    }

    fn check_repeat(&self, increment: u64, last_offset: u64) -> Result<(), ModelError> {
        if increment < u64::from(self.width()) {
            return Err(ModelError::new(
                ErrorKind::OverlapViolation,
                format!(
                    "array increment {increment} is less than field width {}, elements overlap",
                    self.width()
                ),
            )
            .with_value(increment)
            .at(Location::root().join("increment")));
        }
        if last_offset + u64::from(self.width()) > u64::from(MAX_REGISTER_BITS) {
            return Err(out_of_range(
                "num",
                last_offset,
                format!(
                    "last array element at bit {last_offset} exceeds the maximum register width of {MAX_REGISTER_BITS} bits"
                ),
            ));
        }
        Ok(())
    }

    fn repeat(&self, header: Header, offset: u64) -> Arc<Self> {
        self.repeated(header, bit_position(offset))
    }
}

/// Construction parameters of a [`Register`].
#[derive(Debug, Clone)]
pub struct RegisterParams {
    /// Name and documentation.
    pub header: Header,
    /// Byte offset inside the map.
    pub offset: u64,
    /// Fields and field arrays, in any order.
    pub fields: Vec<FieldItem>,
}

/// Rejects repeated names and intersecting bit ranges among `fields`.
fn check_fields(fields: &[FieldItem]) -> Result<(), ModelError> {
    let at = |i: usize| Location::root().join("fields").join(i);

    let mut names = HashSet::new();
    for (i, item) in fields.iter().enumerate() {
        for (name, _, _) in item.spans() {
            if !names.insert(name) {
                return Err(ModelError::new(
                    ErrorKind::UniquenessViolation,
                    format!("field name '{name}' is used more than once"),
                )
                .with_value(name)
                .at(at(i)));
            }
        }
    }

    let mut spans: Vec<_> = fields
        .iter()
        .enumerate()
        .flat_map(|(i, item)| item.spans().into_iter().map(move |(n, l, m)| (l, m, i, n)))
        .collect();
    spans.sort_by_key(|&(lsb, msb, _, _)| (lsb, msb));

    // Highest MSB seen so far and the field holding it.
    let mut widest: Option<(u32, usize, &Identifier)> = None;
    for (lsb, msb, i, name) in spans {
        match widest {
            Some((end, first, first_name)) if lsb <= end => {
                return Err(ModelError::new(
                    ErrorKind::OverlapViolation,
                    format!("field '{first_name}' overlaps with other fields: {name}"),
                )
                .with_value(first_name)
                .at(at(first)));
            }
            _ => widest = Some((msb, i, name)),
        }
    }
    Ok(())
}

/// Control and status register.
#[derive(Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Register {
    #[serde(flatten)]
    header: Header,
    offset: u64,
    fields: Vec<FieldItem>,
    #[serde(skip)]
    expanded: Memo<Vec<Arc<Field>>>,
    #[serde(skip)]
    binstr: Memo<String>,
    #[serde(skip)]
    hexstr: Memo<String>,
    #[serde(skip)]
    parent: ParentLink<Map>,
}

impl Register {
    /// Validates a register and sorts its fields by LSB.
    ///
    /// # Errors
    ///
    /// - `value_out_of_range` at `fields` if there are no fields;
    /// - `uniqueness_violation` at `fields[i]` for a repeated field name;
    /// - `overlap_violation` at `fields[i]` for the lowest field whose bits
    ///   intersect another field.
    pub fn new(params: RegisterParams) -> Result<Arc<Self>, ModelError> {
        let RegisterParams {
            header,
            offset,
            mut fields,
        } = params;

        if fields.is_empty() {
            return Err(out_of_range(
                "fields",
                0,
                format!("register '{}' must have at least one field", header.name),
            ));
        }

        check_fields(&fields)?;

        fields.sort_by_key(FieldItem::lsb);
        log::trace!("register '{}' with {} field items", header.name, fields.len());
        Ok(Self::assemble(header, offset, &fields, ParentLink::new()))
    }

    fn assemble(
        header: Header,
        offset: u64,
        fields: &[FieldItem],
        parent: ParentLink<Map>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this: &Weak<Self>| Self {
            header,
            offset,
            fields: fields.iter().map(|item| item.adopted(this)).collect(),
            expanded: Memo::new(),
            binstr: Memo::new(),
            hexstr: Memo::new(),
            parent,
        })
    }

    /// Declared fields and field arrays, sorted by LSB.
    #[must_use]
    pub fn field_items(&self) -> &[FieldItem] {
        &self.fields
    }

    /// Concrete fields with arrays expanded, sorted by LSB.
    #[must_use]
    pub fn fields(&self) -> &[Arc<Field>] {
        self.expanded.get_or_init(|| {
            let mut fields: Vec<Arc<Field>> = self
                .fields
                .iter()
                .flat_map(|item| match item {
                    FieldItem::Field(field) => vec![Arc::clone(field)],
                    FieldItem::FieldArray(array) => array.generated_items().to_vec(),
                })
                .collect();
            fields.sort_by_key(|field| field.lsb());
            fields
        })
    }

    /// Concrete field with the given name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Arc<Field>> {
        self.fields().iter().find(|field| field.name().as_str() == name)
    }

    /// Highest field MSB plus one.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.fields().iter().map(|field| field.msb() + 1).max().unwrap_or(0)
    }

    /// Coarse access of the register derived from its fields.
    #[must_use]
    pub fn access(&self) -> AccessCategory {
        let fields = self.fields();
        if fields.iter().all(|field| field.access().is_ro()) {
            AccessCategory::Ro
        } else if fields.iter().all(|field| field.access().is_wo()) {
            AccessCategory::Wo
        } else {
            AccessCategory::Rw
        }
    }

    /// Reset value; fields with unknown reset contribute zero.
    #[must_use]
    pub fn reset(&self) -> u128 {
        self.fields()
            .iter()
            .filter_map(|field| field.reset().map(|reset| u128::from(reset) << field.lsb()))
            .fold(0, |acc, value| acc | value)
    }

    /// Reset value as `width` binary digits, MSB first, unknown bits as `x`.
    #[must_use]
    pub fn reset_binstr(&self) -> &str {
        self.binstr.get_or_init(|| {
            let width = self.width() as usize;
            let mut bits = vec!['0'; width];
            for field in self.fields() {
                for bit in field.bit_indices() {
                    let k = bit - field.lsb();
                    bits[bit as usize] = match field.reset() {
                        Some(reset) if reset.checked_shr(k).is_some_and(|v| v & 1 == 1) => '1',
                        Some(_) => '0',
                        None => 'x',
                    };
                }
            }
            bits.iter().rev().collect()
        })
    }

    /// Reset value as hexadecimal digits, MSB first; a nibble with any unknown bit is `x`.
    #[must_use]
    pub fn reset_hexstr(&self) -> &str {
        self.hexstr.get_or_init(|| {
            let lsb_first: Vec<char> = self.reset_binstr().chars().rev().collect();
            let nibbles: Vec<char> = lsb_first
                .chunks(4)
                .map(|chunk| {
                    if chunk.contains(&'x') {
                        return 'x';
                    }
                    let value = chunk
                        .iter()
                        .enumerate()
                        .filter(|(_, bit)| **bit == '1')
                        .fold(0, |acc, (k, _)| acc | 1 << k);
                    char::from_digit(value, 16).unwrap_or('?')
                })
                .collect();
            nibbles.iter().rev().collect()
        })
    }

    /// Map this register belongs to.
    #[must_use]
    pub fn parent_map(&self) -> Option<Arc<Map>> {
        self.parent.get()
    }
}

impl NamedItem for Register {
    fn header(&self) -> &Header {
        &self.header
    }

    fn parent_path(&self) -> Option<String> {
        self.parent.path()
    }
}

impl MapableItem for Register {
    fn offset(&self) -> u64 {
        self.offset
    }

    fn base_address(&self) -> u64 {
        self.parent.get().map_or(0, |map| map.address())
    }
}

impl Adoptable for Register {
    type Parent = Map;

    fn parent_link(&self) -> &ParentLink<Map> {
        &self.parent
    }

    fn relinked(&self) -> Arc<Self> {
        Self::assemble(self.header.clone(), self.offset, &self.fields, ParentLink::new())
    }
}

impl Repeatable for Register {
    const ARRAY_KIND: &'static str = "register_array";
    const OFFSET_LIMIT: u64 = ADDRESS_LIMIT;

    fn start(&self) -> u64 {
        self.offset
    }

    fn repeat(&self, header: Header, offset: u64) -> Arc<Self> {
        Self::assemble(header, offset, &self.fields, self.parent.share())
    }
}
