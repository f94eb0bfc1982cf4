//! Parametric repetition of fields, registers, memories and maps.
//!
//! An array is a template node plus `num`, `increment`, `indices` and a
//! `naming` pattern. Element `i` is the template renamed to
//! `naming` formatted with the template name and `indices[i]`, placed at
//! `offset + i * increment`. Element names and offsets are validated when
//! the array is built; the concrete element nodes are generated on first
//! access to [`ArrayItem::generated_items`].

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::error::{ErrorKind, Location, ModelError};
use crate::field::Field;
use crate::item::{out_of_range, Adoptable, Header, MapableItem, Memo, NamedItem, ParentLink};
use crate::map::Map;
use crate::memory::Memory;
use crate::register::Register;
use crate::types::Identifier;

/// Naming pattern used when none is given.
pub const DEFAULT_NAMING: &str = "{name}{index}";

/// Largest number of elements a single array may expand to.
pub const MAX_ARRAY_ELEMENTS: u64 = 1 << 16;

/// Node type that can be repeated by an [`ArrayItem`].
pub trait Repeatable: NamedItem + Adoptable {
    /// Discriminator of the array variant.
    const ARRAY_KIND: &'static str;

    /// Exclusive bound on element offsets, in the unit of [`Repeatable::start`].
    const OFFSET_LIMIT: u64;

    /// Offset of the template, in the unit of the container (bits or bytes).
    fn start(&self) -> u64;

    /// Checks constraints the node type puts on its own repetition.
    ///
    /// # Errors
    ///
    /// Returns an error located relative to the array.
    fn check_repeat(&self, _increment: u64, _last_offset: u64) -> Result<(), ModelError> {
        Ok(())
    }

    /// Copy of the node under a new header and offset, sharing its parent link.
    fn repeat(&self, header: Header, offset: u64) -> Arc<Self>;
}

/// Repetition parameters of an [`ArrayItem`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArraySpec {
    /// Number of elements, at least two.
    pub num: u64,
    /// Offset step between neighbouring elements.
    pub increment: u64,
    /// Element labels; filled with `0..num` when empty.
    pub indices: Vec<String>,
    /// Element name pattern with a mandatory `{index}` placeholder.
    pub naming: String,
}

impl ArraySpec {
    /// Parameters with numeric indices and the default naming pattern.
    #[must_use]
    pub fn new(num: u64, increment: u64) -> Self {
        Self {
            num,
            increment,
            indices: Vec::new(),
            naming: DEFAULT_NAMING.to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Segment {
    Literal(String),
    Name,
    Index,
}

/// Parsed `naming` pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct NamingPattern(Vec<Segment>);

impl NamingPattern {
    fn parse(pattern: &str) -> Result<Self, String> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = pattern.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut key = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(k) => key.push(k),
                            None => return Err(format!("unclosed '{{' in naming pattern '{pattern}'")),
                        }
                    }
                    let segment = match key.as_str() {
                        "name" => Segment::Name,
                        "index" => Segment::Index,
                        _ => {
                            return Err(format!(
                                "unknown placeholder '{{{key}}}' in naming pattern '{pattern}'"
                            ))
                        }
                    };
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(segment);
                }
                '}' => return Err(format!("single '}}' in naming pattern '{pattern}'")),
                _ => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        if !segments.contains(&Segment::Index) {
            return Err(format!("naming pattern '{pattern}' is missing '{{index}}'"));
        }
        Ok(Self(segments))
    }

    fn render(&self, name: &str, index: &str) -> String {
        self.0
            .iter()
            .map(|segment| match segment {
                Segment::Literal(text) => text.as_str(),
                Segment::Name => name,
                Segment::Index => index,
            })
            .collect()
    }
}

/// Repetition of a template node.
#[derive(PartialEq, Eq, Hash, Serialize)]
pub struct ArrayItem<T> {
    #[serde(flatten)]
    template: Arc<T>,
    num: u64,
    increment: u64,
    indices: Vec<String>,
    naming: String,
    #[serde(skip)]
    names: Vec<Identifier>,
    #[serde(skip)]
    offsets: Vec<u64>,
    #[serde(skip)]
    generated: Memo<Vec<Arc<T>>>,
}

/// Array of bit fields inside a register.
pub type FieldArray = ArrayItem<Field>;
/// Array of registers inside a map.
pub type RegisterArray = ArrayItem<Register>;
/// Array of memories inside a map.
pub type MemoryArray = ArrayItem<Memory>;
/// Array of sub-maps inside a map.
pub type MapArray = ArrayItem<Map>;

impl<T: Repeatable> ArrayItem<T> {
    /// Validates the repetition of `template`.
    ///
    /// # Errors
    ///
    /// - `value_out_of_range` at `num`, `increment` or `indices` for fewer
    ///   than two elements, more than [`MAX_ARRAY_ELEMENTS`], a zero
    ///   increment, element offsets past [`Repeatable::OFFSET_LIMIT`] or too
    ///   few indices;
    /// - errors of [`Repeatable::check_repeat`];
    /// - `uniqueness_violation` at `indices[i]` for a repeated index;
    /// - `naming_pattern_error` at `naming` for a malformed pattern;
    /// - `pattern_mismatch` at `naming` if an element name is not an identifier.
    pub fn new(template: Arc<T>, spec: ArraySpec) -> Result<Arc<Self>, ModelError> {
        let ArraySpec {
            num,
            increment,
            mut indices,
            naming,
        } = spec;

        if num < 2 {
            return Err(out_of_range(
                "num",
                num,
                format!(
                    "at least 2 elements are required for the array, but current size is {num}; \
                     consider using non-array kind instead"
                ),
            ));
        }
        if increment == 0 {
            return Err(out_of_range("increment", increment, "array increment must be positive".into()));
        }
        if num > MAX_ARRAY_ELEMENTS {
            return Err(out_of_range(
                "num",
                num,
                format!("array of {num} elements exceeds the limit of {MAX_ARRAY_ELEMENTS}"),
            ));
        }
        let last_offset = (num - 1)
            .checked_mul(increment)
            .and_then(|span| span.checked_add(template.start()))
            .filter(|last| *last < T::OFFSET_LIMIT)
            .ok_or_else(|| {
                out_of_range(
                    "num",
                    num,
                    format!(
                        "{num} elements every {increment} from {} reach past offset {:#x}",
                        template.start(),
                        T::OFFSET_LIMIT
                    ),
                )
            })?;
        template.check_repeat(increment, last_offset)?;
        let count = usize::try_from(num)
            .map_err(|_| out_of_range("num", num, format!("array of {num} elements is too large")))?;

        if indices.is_empty() {
            indices = (0..num).map(|i| i.to_string()).collect();
        }
        if indices.len() < count {
            return Err(out_of_range(
                "indices",
                indices.len(),
                format!(
                    "number of indices {} is less than number of elements {num}",
                    indices.len()
                ),
            ));
        }
        let mut seen = HashSet::new();
        for (i, index) in indices.iter().enumerate() {
            if !seen.insert(index.as_str()) {
                return Err(ModelError::new(
                    ErrorKind::UniquenessViolation,
                    format!("array index '{index}' is not unique"),
                )
                .with_value(index)
                .at(Location::root().join("indices").join(i)));
            }
        }

        let naming_at = Location::root().join("naming");
        let pattern = NamingPattern::parse(&naming).map_err(|message| {
            ModelError::new(ErrorKind::NamingPatternError, message)
                .with_value(&naming)
                .at(naming_at.clone())
        })?;

        let mut names = Vec::with_capacity(count);
        let mut offsets = Vec::with_capacity(count);
        for (i, index) in (0..num).zip(&indices) {
            let raw = pattern.render(template.name(), index);
            let name = Identifier::new(&raw).map_err(|_| {
                ModelError::new(
                    ErrorKind::PatternMismatch,
                    format!("naming pattern '{naming}' produces invalid name '{raw}' for index '{index}'"),
                )
                .with_value(&raw)
                .at(naming_at.clone())
            })?;
            names.push(name);
            offsets.push(template.start() + i * increment);
        }

        log::trace!(
            "{} '{}' with {num} elements every {increment}",
            T::ARRAY_KIND,
            template.name()
        );
        Ok(Arc::new(Self {
            template,
            num,
            increment,
            indices,
            naming,
            names,
            offsets,
            generated: Memo::new(),
        }))
    }

    /// Concrete elements, generated on first access.
    #[must_use]
    pub fn generated_items(&self) -> &[Arc<T>] {
        self.generated.get_or_init(|| {
            self.names
                .iter()
                .zip(&self.offsets)
                .map(|(name, offset)| {
                    self.template
                        .repeat(self.template.header().renamed(name.clone()), *offset)
                })
                .collect()
        })
    }
}

impl<T> ArrayItem<T> {
    /// Node every element is copied from.
    #[must_use]
    pub const fn template(&self) -> &Arc<T> {
        &self.template
    }

    /// Number of elements.
    #[must_use]
    pub const fn num(&self) -> u64 {
        self.num
    }

    /// Offset step between neighbouring elements.
    #[must_use]
    pub const fn increment(&self) -> u64 {
        self.increment
    }

    /// Element labels, at least `num` of them.
    #[must_use]
    pub fn indices(&self) -> &[String] {
        &self.indices
    }

    /// Element name pattern.
    #[must_use]
    pub fn naming(&self) -> &str {
        &self.naming
    }

    /// Name of element `i`.
    #[must_use]
    pub fn element_name(&self, i: usize) -> Option<&Identifier> {
        self.names.get(i)
    }

    /// Offset of element `i`.
    #[must_use]
    pub fn element_offset(&self, i: usize) -> Option<u64> {
        self.offsets.get(i).copied()
    }

    /// Element names in index order.
    #[must_use]
    pub fn element_names(&self) -> &[Identifier] {
        &self.names
    }

    /// Element offsets in index order.
    #[must_use]
    pub fn element_offsets(&self) -> &[u64] {
        &self.offsets
    }

    /// Offset of the last element.
    #[must_use]
    pub fn last_offset(&self) -> u64 {
        self.offsets.last().copied().unwrap_or_default()
    }
}

impl<T: NamedItem> NamedItem for ArrayItem<T> {
    fn header(&self) -> &Header {
        self.template.header()
    }

    fn parent_path(&self) -> Option<String> {
        self.template.parent_path()
    }
}

impl<T: MapableItem> MapableItem for ArrayItem<T> {
    fn offset(&self) -> u64 {
        self.template.offset()
    }

    fn base_address(&self) -> u64 {
        self.template.base_address()
    }
}

impl<T: Repeatable> Adoptable for ArrayItem<T> {
    type Parent = T::Parent;

    fn parent_link(&self) -> &ParentLink<T::Parent> {
        self.template.parent_link()
    }

    fn relinked(&self) -> Arc<Self> {
        Arc::new(Self {
            template: self.template.relinked(),
            num: self.num,
            increment: self.increment,
            indices: self.indices.clone(),
            naming: self.naming.clone(),
            names: self.names.clone(),
            offsets: self.offsets.clone(),
            generated: Memo::new(),
        })
    }
}

impl<T: NamedItem> fmt::Debug for ArrayItem<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayItem")
            .field("name", self.template.name())
            .field("num", &self.num)
            .field("increment", &self.increment)
            .field("indices", &self.indices)
            .field("naming", &self.naming)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::field::FieldParams;
    use crate::register::{FieldItem, RegisterParams};

    fn bit(name: &str, offset: u32, width: u32) -> Arc<Field> {
        Field::new(FieldParams::new(Header::new(name, "Bit").unwrap(), offset, width)).unwrap()
    }

    #[test]
    fn expands_names_and_offsets() {
        let array = FieldArray::new(bit("irq", 0, 1), ArraySpec::new(4, 2)).unwrap();
        assert_eq!(array.indices(), ["0", "1", "2", "3"]);
        let names: Vec<_> = array.element_names().iter().map(Identifier::as_str).collect();
        assert_eq!(names, vec!["irq0", "irq1", "irq2", "irq3"]);
        assert_eq!(array.element_offsets(), [0, 2, 4, 6]);

        let items = array.generated_items();
        assert_eq!(items.len(), 4);
        assert_eq!(items[3].name().as_str(), "irq3");
        assert_eq!(items[3].offset(), 6);
        assert_eq!(items[3].doc().as_str(), "Bit");
        assert!(Arc::ptr_eq(&items[0], &array.generated_items()[0]));
    }

    #[test]
    fn custom_indices_and_naming() {
        let spec = ArraySpec {
            indices: vec!["a".into(), "b".into(), "c".into()],
            naming: "{name}_{index}".into(),
            ..ArraySpec::new(2, 1)
        };
        let array = FieldArray::new(bit("gpio", 0, 1), spec).unwrap();
        assert_eq!(array.element_name(0).map(Identifier::as_str), Some("gpio_a"));
        assert_eq!(array.element_name(1).map(Identifier::as_str), Some("gpio_b"));
        assert_eq!(array.element_name(2), None);
    }

    #[test]
    fn naming_without_name_is_accepted() {
        let spec = ArraySpec {
            naming: "ch{index}".into(),
            ..ArraySpec::new(2, 1)
        };
        let array = FieldArray::new(bit("x", 0, 1), spec).unwrap();
        assert_eq!(array.element_name(1).map(Identifier::as_str), Some("ch1"));
    }

    #[rstest]
    #[case("{name}", ErrorKind::NamingPatternError)]
    #[case("{name}{idx}", ErrorKind::NamingPatternError)]
    #[case("{name}{index", ErrorKind::NamingPatternError)]
    #[case("{name}}{index}", ErrorKind::NamingPatternError)]
    #[case("{index}", ErrorKind::PatternMismatch)]
    #[case("{name}-{index}", ErrorKind::PatternMismatch)]
    fn rejects_bad_naming(#[case] naming: &str, #[case] kind: ErrorKind) {
        let spec = ArraySpec {
            naming: naming.into(),
            ..ArraySpec::new(2, 1)
        };
        let err = FieldArray::new(bit("x", 0, 1), spec).unwrap_err();
        assert_eq!(err.kind, kind);
        assert_eq!(err.location.to_string(), "naming");
    }

    #[test]
    fn escaped_braces_are_literal() {
        let pattern = NamingPattern::parse("{{{name}}}_{index}").unwrap();
        assert_eq!(pattern.render("a", "0"), "{a}_0");
    }

    #[rstest]
    #[case(ArraySpec::new(1, 1), ErrorKind::ValueOutOfRange, "num")]
    #[case(ArraySpec::new(2, 0), ErrorKind::ValueOutOfRange, "increment")]
    #[case(
        ArraySpec { indices: vec!["0".into()], ..ArraySpec::new(2, 1) },
        ErrorKind::ValueOutOfRange,
        "indices"
    )]
    #[case(
        ArraySpec { indices: vec!["a".into(), "a".into()], ..ArraySpec::new(2, 1) },
        ErrorKind::UniquenessViolation,
        "indices[1]"
    )]
    fn rejects_bad_repetition(#[case] spec: ArraySpec, #[case] kind: ErrorKind, #[case] at: &str) {
        let err = FieldArray::new(bit("x", 0, 1), spec).unwrap_err();
        assert_eq!(err.kind, kind);
        assert_eq!(err.location.to_string(), at);
    }

    #[rstest]
    #[case(ArraySpec::new(10_000_000_000, 1))]
    #[case(ArraySpec::new(MAX_ARRAY_ELEMENTS + 1, 1))]
    #[case(ArraySpec::new(100, 2))]
    #[case(ArraySpec::new(2, u64::MAX))]
    fn impossible_repetition_is_out_of_range(#[case] spec: ArraySpec) {
        let err = FieldArray::new(bit("x", 0, 1), spec).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ValueOutOfRange);
        assert_eq!(err.location.to_string(), "num");
    }

    #[test]
    fn register_elements_stay_in_address_space() {
        let template = Register::new(RegisterParams {
            header: Header::new("r", "Register").unwrap(),
            offset: 0,
            fields: vec![FieldItem::Field(bit("f", 0, 8))],
        })
        .unwrap();
        let err = RegisterArray::new(template.clone(), ArraySpec::new(3, 1 << 62)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ValueOutOfRange);
        assert_eq!(err.location.to_string(), "num");

        let array = RegisterArray::new(template, ArraySpec::new(2, 1 << 62)).unwrap();
        assert_eq!(array.last_offset(), 1 << 62);
    }

    #[test]
    fn field_elements_must_not_overlap() {
        let err = FieldArray::new(bit("x", 0, 4), ArraySpec::new(2, 3)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::OverlapViolation);
        assert_eq!(err.location.to_string(), "increment");
    }

    #[test]
    fn field_elements_must_fit_widest_register() {
        let err = FieldArray::new(bit("x", 120, 4), ArraySpec::new(3, 4)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ValueOutOfRange);
        assert_eq!(err.location.to_string(), "num");
    }

    #[test]
    fn serializes_template_with_repetition() {
        let array = FieldArray::new(bit("x", 0, 1), ArraySpec::new(2, 1)).unwrap();
        let value = serde_json::to_value(&*array).unwrap();
        assert_eq!(value["name"], "x");
        assert_eq!(value["num"], 2);
        assert_eq!(value["increment"], 1);
        assert_eq!(value["indices"], serde_json::json!(["0", "1"]));
        assert_eq!(value["naming"], DEFAULT_NAMING);
    }
}
