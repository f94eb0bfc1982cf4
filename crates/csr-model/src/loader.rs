//! Builds a validated [`Map`] from a deserialized description.
//!
//! Binding walks the input tree once. Every node reads all of its keys
//! before giving up, so a single call reports every shape error it can
//! find; a node whose keys or children failed is not constructed, which
//! in turn fails its parent. Nodes whose input bound cleanly go through
//! their constructors, and constructor errors are nested under the node's
//! schema location. Array-typed children carry their discriminator in the
//! location, e.g. `items[0].register.fields[3].field.enum`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::access::AccessMode;
use crate::array::{ArrayItem, ArraySpec, Repeatable, DEFAULT_NAMING};
use crate::enumeration::{Enum, EnumMember};
use crate::error::{ErrorKind, Location, ModelError, ValidationError, ValidationErrors};
use crate::field::{Field, FieldParams};
use crate::hardware::HardwareMode;
use crate::item::{Header, Metadata, NamedItem};
use crate::map::{Map, MapItem, MapParams};
use crate::memory::{Memory, MemoryParams};
use crate::register::{FieldItem, Register, RegisterParams};
use crate::style::MemoryStyle;

/// Caller preferences for [`build_map_with`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildOptions {
    /// Leave the offending input value out of every reported failure.
    ///
    /// Only [`ValidationError::value`] is withheld. Messages and path
    /// locations are still rendered from the input and may quote the
    /// literals, numbers and names it contains.
    pub hide_input_in_errors: bool,
    /// Report at most this many failures (at least one).
    pub max_errors: Option<usize>,
}

/// Builds a map with default [`BuildOptions`].
///
/// # Errors
///
/// Returns every validation failure found, in discovery order.
pub fn build_map(input: &Value) -> Result<Arc<Map>, ValidationErrors> {
    build_map_with(input, &BuildOptions::default())
}

/// Builds a map from `input`.
///
/// # Errors
///
/// Returns a non-empty collection of validation failures, each carrying its
/// schema location and the matching path of user-visible names.
pub fn build_map_with(input: &Value, options: &BuildOptions) -> Result<Arc<Map>, ValidationErrors> {
    log::debug!("binding register map description");
    let mut binder = Binder::default();
    let map = binder.root(input);

    match map {
        Some(map) if binder.errors.is_empty() => {
            log::debug!(
                "register map '{}' validated: {} items, {} bound nodes",
                map.name(),
                map.items().len(),
                binder.nodes
            );
            Ok(map)
        }
        _ => {
            let mut errors: ValidationErrors = binder
                .errors
                .into_iter()
                .map(|error| ValidationError::locate(error, input, options.hide_input_in_errors))
                .collect();
            if let Some(limit) = options.max_errors {
                errors.truncate(limit.max(1));
            }
            log::debug!("register map description rejected with {} errors", errors.len());
            Err(errors)
        }
    }
}

/// Keys of one input object, tracking which of them were read.
struct Object<'a> {
    entries: &'a serde_json::Map<String, Value>,
    at: Location,
    known: Vec<&'static str>,
}

impl<'a> Object<'a> {
    fn new(entries: &'a serde_json::Map<String, Value>, at: Location) -> Self {
        Self {
            entries,
            at,
            known: Vec::new(),
        }
    }

    /// Object whose `kind` discriminator was already consumed.
    fn tagged(entries: &'a serde_json::Map<String, Value>, at: Location) -> Self {
        Self {
            entries,
            at,
            known: vec!["kind"],
        }
    }

    fn take(&mut self, key: &'static str) -> Option<&'a Value> {
        self.known.push(key);
        self.entries.get(key)
    }

    fn key(&self, key: &str) -> Location {
        self.at.join(key)
    }
}

type Reader<T> = fn(&mut Binder, &Value, Location) -> Option<T>;

#[derive(Default)]
struct Binder {
    errors: Vec<ModelError>,
    nodes: usize,
}

impl Binder {
    fn fail(&mut self, error: ModelError) {
        log::trace!("{}: {}", error.location, error.message);
        self.errors.push(error);
    }

    fn mismatch(&mut self, at: Location, message: &str, value: &Value) {
        self.fail(
            ModelError::new(ErrorKind::TypeMismatch, message)
                .with_value(value)
                .at(at),
        );
    }

    /// Result of a constructor, with its errors nested under `at`.
    fn build<T>(&mut self, at: &Location, result: Result<T, ModelError>) -> Option<T> {
        match result {
            Ok(node) => {
                self.nodes += 1;
                Some(node)
            }
            Err(error) => {
                self.fail(error.nested(at));
                None
            }
        }
    }

    fn required<T>(&mut self, obj: &mut Object<'_>, key: &'static str, read: Reader<T>) -> Option<T> {
        if let Some(value) = obj.take(key) {
            read(self, value, obj.key(key))
        } else {
            self.fail(ModelError::new(ErrorKind::TypeMismatch, "field required").at(obj.key(key)));
            None
        }
    }

    /// `Some(None)` when the key is absent or null.
    fn optional<T>(
        &mut self,
        obj: &mut Object<'_>,
        key: &'static str,
        read: Reader<T>,
    ) -> Option<Option<T>> {
        match obj.take(key) {
            None | Some(Value::Null) => Some(None),
            Some(value) => read(self, value, obj.key(key)).map(Some),
        }
    }

    /// Like [`Binder::optional`], but a present key must not be null.
    fn nullable<T>(&mut self, obj: &mut Object<'_>, key: &'static str, read: Reader<T>) -> Option<Option<T>> {
        match obj.take(key) {
            None => {
                self.fail(ModelError::new(ErrorKind::TypeMismatch, "field required").at(obj.key(key)));
                None
            }
            Some(Value::Null) => Some(None),
            Some(value) => read(self, value, obj.key(key)).map(Some),
        }
    }

    fn finish(&mut self, obj: &Object<'_>) {
        for (key, value) in obj.entries {
            if !obj.known.contains(&key.as_str()) {
                self.mismatch(obj.key(key), "extra inputs are not permitted", value);
            }
        }
    }

    fn uint(&mut self, value: &Value, at: Location) -> Option<u64> {
        match value {
            Value::Number(number) => {
                if let Some(n) = number.as_u64() {
                    return Some(n);
                }
                if number.is_i64() {
                    self.fail(
                        ModelError::new(ErrorKind::ValueOutOfRange, "input should be greater than or equal to 0")
                            .with_value(number)
                            .at(at),
                    );
                } else {
                    self.mismatch(at, "input should be a valid integer", value);
                }
                None
            }
            _ => {
                self.mismatch(at, "input should be a valid integer", value);
                None
            }
        }
    }

    fn u32(&mut self, value: &Value, at: Location) -> Option<u32> {
        let n = self.uint(value, at.clone())?;
        if let Ok(n) = u32::try_from(n) {
            Some(n)
        } else {
            self.fail(
                ModelError::new(
                    ErrorKind::ValueOutOfRange,
                    format!("input should be less than or equal to {}", u32::MAX),
                )
                .with_value(n)
                .at(at),
            );
            None
        }
    }

    fn string(&mut self, value: &Value, at: Location) -> Option<String> {
        if let Value::String(s) = value {
            Some(s.clone())
        } else {
            self.mismatch(at, "input should be a valid string", value);
            None
        }
    }

    fn strings(&mut self, value: &Value, at: Location) -> Option<Vec<String>> {
        self.list(value, at, Self::string)
    }

    fn list<T>(&mut self, value: &Value, at: Location, read: Reader<T>) -> Option<Vec<T>> {
        let Value::Array(values) = value else {
            self.mismatch(at, "input should be a valid list", value);
            return None;
        };
        let mut items = Vec::with_capacity(values.len());
        let mut complete = true;
        for (i, value) in values.iter().enumerate() {
            match read(self, value, at.join(i)) {
                Some(item) => items.push(item),
                None => complete = false,
            }
        }
        complete.then_some(items)
    }

    fn literal<T: std::str::FromStr>(&mut self, value: &Value, at: Location) -> Option<T>
    where
        T::Err: std::fmt::Display,
    {
        let literal = self.string(value, at.clone())?;
        match literal.parse() {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                self.fail(
                    ModelError::new(ErrorKind::UnknownEnumerator, err.to_string())
                        .with_value(literal)
                        .at(at),
                );
                None
            }
        }
    }

    fn access(&mut self, value: &Value, at: Location) -> Option<AccessMode> {
        self.literal(value, at)
    }

    fn hardware(&mut self, value: &Value, at: Location) -> Option<HardwareMode> {
        self.literal(value, at)
    }

    fn style(&mut self, value: &Value, at: Location) -> Option<MemoryStyle> {
        self.literal(value, at)
    }

    fn metadata(&mut self, value: &Value, at: Location) -> Option<Metadata> {
        if let Value::Object(entries) = value {
            Some(Metadata::new(entries.clone()))
        } else {
            self.mismatch(at, "input should be a valid dictionary", value);
            None
        }
    }

    fn initial_value(&mut self, value: &Value, at: Location) -> Option<(u64, u64)> {
        match value.as_array().map(Vec::as_slice) {
            Some([addr, data]) => {
                let addr = self.uint(addr, at.join(0));
                let data = self.uint(data, at.join(1));
                Some((addr?, data?))
            }
            _ => {
                self.mismatch(at, "input should be a pair [address, value]", value);
                None
            }
        }
    }

    fn object<'v>(&mut self, value: &'v Value, at: &Location) -> Option<&'v serde_json::Map<String, Value>> {
        if let Value::Object(entries) = value {
            Some(entries)
        } else {
            self.mismatch(at.clone(), "input should be a valid dictionary", value);
            None
        }
    }

    fn header(&mut self, obj: &mut Object<'_>) -> Option<Header> {
        let name = self.required(obj, "name", Self::string);
        let doc = self.required(obj, "doc", Self::string);
        let metadata = self.optional(obj, "metadata", Self::metadata);
        let (name, doc, metadata) = (name?, doc?, metadata?);
        let header = self.build(&obj.at, Header::new(&name, &doc))?;
        Some(header.with_metadata(metadata.unwrap_or_default()))
    }

    fn array_spec(&mut self, obj: &mut Object<'_>) -> Option<ArraySpec> {
        let num = self.required(obj, "num", Self::uint);
        let increment = self.required(obj, "increment", Self::uint);
        let indices = self.optional(obj, "indices", Self::strings);
        let naming = self.optional(obj, "naming", Self::string);
        Some(ArraySpec {
            num: num?,
            increment: increment?,
            indices: indices?.unwrap_or_default(),
            naming: naming?.unwrap_or_else(|| DEFAULT_NAMING.to_owned()),
        })
    }

    /// Binds a node through `params`, then constructs it with `make`.
    fn node<P, T>(
        &mut self,
        mut obj: Object<'_>,
        params: fn(&mut Self, &mut Object<'_>) -> Option<P>,
        make: fn(P) -> Result<T, ModelError>,
    ) -> Option<T> {
        let mark = self.errors.len();
        let bound = params(self, &mut obj);
        self.finish(&obj);
        if self.errors.len() > mark {
            return None;
        }
        let bound = bound?;
        self.build(&obj.at, make(bound))
    }

    /// Binds an array node: the template keys plus the repetition keys.
    fn array<P, T: Repeatable>(
        &mut self,
        mut obj: Object<'_>,
        params: fn(&mut Self, &mut Object<'_>) -> Option<P>,
        make: fn(P) -> Result<Arc<T>, ModelError>,
    ) -> Option<Arc<ArrayItem<T>>> {
        let mark = self.errors.len();
        let bound = params(self, &mut obj);
        let spec = self.array_spec(&mut obj);
        self.finish(&obj);
        if self.errors.len() > mark {
            return None;
        }
        let template = self.build(&obj.at, make(bound?))?;
        self.build(&obj.at, ArrayItem::new(template, spec?))
    }

    fn enum_member(&mut self, value: &Value, at: Location) -> Option<Arc<EnumMember>> {
        let entries = self.object(value, &at)?;
        self.node(
            Object::new(entries, at),
            |binder, obj| {
                let header = binder.header(obj);
                let value = binder.required(obj, "value", Self::uint);
                Some((header?, value?))
            },
            |(header, value)| Ok(EnumMember::new(header, value)),
        )
    }

    fn enumeration(&mut self, value: &Value, at: Location) -> Option<Arc<Enum>> {
        let entries = self.object(value, &at)?;
        self.node(
            Object::new(entries, at),
            |binder, obj| {
                let header = binder.header(obj);
                let members = binder.required(obj, "members", |binder, value, at| {
                    binder.list(value, at, Self::enum_member)
                });
                Some((header?, members?))
            },
            |(header, members)| Enum::new(header, members),
        )
    }

    fn field_params(&mut self, obj: &mut Object<'_>) -> Option<FieldParams> {
        let header = self.header(obj);
        let offset = self.required(obj, "offset", Self::u32);
        let width = self.required(obj, "width", Self::u32);
        let reset = self.nullable(obj, "reset", Self::uint);
        let access = self.required(obj, "access", Self::access);
        let hardware = self.required(obj, "hardware", Self::hardware);
        let enumeration = self.optional(obj, "enum", Self::enumeration);
        Some(FieldParams {
            header: header?,
            offset: offset?,
            width: width?,
            reset: reset?,
            access: access?,
            hardware: hardware?,
            enumeration: enumeration?,
        })
    }

    fn field_item(&mut self, value: &Value, at: Location) -> Option<FieldItem> {
        let entries = self.object(value, &at)?;
        let kind = self.kind(entries, &at, "field", &["field", Field::ARRAY_KIND])?;
        let obj = Object::tagged(entries, at.join(kind));
        if kind == Field::ARRAY_KIND {
            self.array(obj, Self::field_params, Field::new)
                .map(FieldItem::FieldArray)
        } else {
            self.node(obj, Self::field_params, Field::new)
                .map(FieldItem::Field)
        }
    }

    fn register_params(&mut self, obj: &mut Object<'_>) -> Option<RegisterParams> {
        let header = self.header(obj);
        let offset = self.required(obj, "offset", Self::uint);
        let fields = self.required(obj, "fields", |binder, value, at| {
            binder.list(value, at, Self::field_item)
        });
        Some(RegisterParams {
            header: header?,
            offset: offset?,
            fields: fields?,
        })
    }

    fn memory_params(&mut self, obj: &mut Object<'_>) -> Option<MemoryParams> {
        let header = self.header(obj);
        let offset = self.required(obj, "offset", Self::uint);
        let address_width = self.required(obj, "address_width", Self::u32);
        let data_width = self.required(obj, "data_width", Self::u32);
        let style = self.required(obj, "style", Self::style);
        let initial_values = self.optional(obj, "initial_values", |binder, value, at| {
            binder.list(value, at, Self::initial_value)
        });
        Some(MemoryParams {
            header: header?,
            offset: offset?,
            address_width: address_width?,
            data_width: data_width?,
            style: style?,
            initial_values: initial_values?.unwrap_or_default(),
        })
    }

    fn map_params(&mut self, obj: &mut Object<'_>) -> Option<MapParams> {
        let header = self.header(obj);
        let offset = self.required(obj, "offset", Self::uint);
        let address_width = self.required(obj, "address_width", Self::u32);
        let register_width = self.required(obj, "register_width", Self::u32);
        let items = self.required(obj, "items", |binder, value, at| {
            binder.list(value, at, Self::map_item)
        });
        Some(MapParams {
            header: header?,
            offset: offset?,
            address_width: address_width?,
            register_width: register_width?,
            items: items?,
        })
    }

    /// Reads the `kind` discriminator of an item, defaulting to `default`.
    fn kind(
        &mut self,
        entries: &serde_json::Map<String, Value>,
        at: &Location,
        default: &'static str,
        expected: &[&'static str],
    ) -> Option<&'static str> {
        let Some(value) = entries.get("kind") else {
            return Some(default);
        };
        let tag = self.string(value, at.join("kind"))?;
        if let Some(kind) = expected.iter().copied().find(|kind| *kind == tag) {
            Some(kind)
        } else {
            self.fail(
                ModelError::new(
                    ErrorKind::UnknownEnumerator,
                    format!(
                        "input tag '{tag}' does not match any of the expected tags: {}",
                        expected.join(", ")
                    ),
                )
                .with_value(&tag)
                .at(at.join("kind")),
            );
            None
        }
    }

    fn map_item(&mut self, value: &Value, at: Location) -> Option<MapItem> {
        const KINDS: [&str; 6] = [
            "register",
            "memory",
            "map",
            Register::ARRAY_KIND,
            Memory::ARRAY_KIND,
            Map::ARRAY_KIND,
        ];
        let entries = self.object(value, &at)?;
        let kind = self.kind(entries, &at, "register", &KINDS)?;
        let obj = Object::tagged(entries, at.join(kind));
        match kind {
            "memory" => self.node(obj, Self::memory_params, Memory::new).map(MapItem::Memory),
            "map" => self.node(obj, Self::map_params, Map::new).map(MapItem::Map),
            "register_array" => self
                .array(obj, Self::register_params, Register::new)
                .map(MapItem::RegisterArray),
            "memory_array" => self
                .array(obj, Self::memory_params, Memory::new)
                .map(MapItem::MemoryArray),
            "map_array" => self
                .array(obj, Self::map_params, Map::new)
                .map(MapItem::MapArray),
            _ => self
                .node(obj, Self::register_params, Register::new)
                .map(MapItem::Register),
        }
    }

    fn root(&mut self, input: &Value) -> Option<Arc<Map>> {
        let root = Location::root();
        let entries = self.object(input, &root)?;
        let kind = self.kind(entries, &root, "map", &["map"])?;
        log::trace!("root item of kind '{kind}'");
        self.node(Object::tagged(entries, root), Self::map_params, Map::new)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::item::MapableItem;

    fn field(name: &str, offset: u32, width: u32) -> Value {
        json!({
            "name": name,
            "doc": format!("Field {name}"),
            "offset": offset,
            "width": width,
            "reset": 0,
            "access": "rw",
            "hardware": "o",
        })
    }

    fn top(items: Value) -> Value {
        json!({
            "name": "top",
            "doc": "Top map",
            "offset": 0,
            "address_width": 8,
            "register_width": 32,
            "items": items,
        })
    }

    #[test]
    fn builds_nested_description() {
        let input = top(json!([
            {"name": "ctrl", "doc": "Control", "offset": 0, "fields": [field("en", 0, 1)]},
            {
                "kind": "memory", "name": "buf", "doc": "Buffer", "offset": 64,
                "address_width": 4, "data_width": 32, "style": "internal_rw",
                "initial_values": [[0, 1], [3, 255]]
            },
            {
                "kind": "map", "name": "sub", "doc": "Sub", "offset": 128,
                "address_width": 4, "register_width": 32,
                "items": [{"kind": "register", "name": "st", "doc": "Status", "offset": 4,
                           "fields": [field("busy", 0, 1)]}]
            }
        ]));
        let map = build_map(&input).unwrap();
        assert_eq!(map.items().len(), 3);
        assert_eq!(map.memories()[0].initial_values(), [(0, 1), (3, 255)]);
        assert_eq!(map.maps()[0].registers()[0].address(), 132);
        assert_eq!(map.maps()[0].registers()[0].fields()[0].path(), "top.sub.st.busy");
    }

    #[test]
    fn collects_every_shape_error() {
        let input = top(json!([
            {"name": "a", "doc": "", "offset": -4, "fields": [field("x", 0, 1)]},
            {"name": "b", "doc": "", "offset": 4, "fields": [field("y", 0, 1)], "colour": "red"},
            {"kind": "bogus", "name": "c"}
        ]));
        let errors = build_map(&input).unwrap_err();
        let summary: Vec<_> = errors
            .iter()
            .map(|e| (e.kind, e.schema_loc.to_string(), e.path_string()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (ErrorKind::ValueOutOfRange, "items[0].register.offset".into(), "top.a.offset".into()),
                (ErrorKind::TypeMismatch, "items[1].register.colour".into(), "top.b.colour".into()),
                (ErrorKind::UnknownEnumerator, "items[2].kind".into(), "top.c.kind".into()),
            ]
        );
    }

    #[test]
    fn reports_missing_keys() {
        let input = json!({"name": "top", "doc": "", "offset": 0, "register_width": 32, "items": []});
        let errors = build_map(&input).unwrap_err();
        let first = errors.first().unwrap();
        assert_eq!(first.kind, ErrorKind::TypeMismatch);
        assert_eq!(first.message, "field required");
        assert_eq!(first.path, vec!["top", "address_width"]);
    }

    #[test]
    fn rejects_non_integers() {
        let mut f = field("x", 0, 1);
        f["width"] = json!(1.5);
        f["offset"] = json!(true);
        let input = top(json!([{"name": "r", "doc": "", "offset": 0, "fields": [f]}]));
        let errors = build_map(&input).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.kind == ErrorKind::TypeMismatch));
        assert_eq!(
            errors.first().map(|e| e.schema_loc.to_string()).as_deref(),
            Some("items[0].register.fields[0].field.offset")
        );
    }

    #[test]
    fn unknown_literals() {
        let mut f = field("x", 0, 1);
        f["access"] = json!("rwx");
        f["hardware"] = json!("z");
        let input = top(json!([{"name": "r", "doc": "", "offset": 0, "fields": [f]}]));
        let errors = build_map(&input).unwrap_err();
        let kinds: Vec<_> = errors.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![ErrorKind::UnknownEnumerator, ErrorKind::UnknownEnumerator]);
        assert_eq!(errors.iter().nth(1).unwrap().path, vec!["top", "r", "x", "hardware"]);
    }

    #[test]
    fn root_kind_must_be_map() {
        let mut input = top(json!([{"name": "r", "doc": "", "offset": 0, "fields": [field("x", 0, 1)]}]));
        input["kind"] = json!("map");
        assert!(build_map(&input).is_ok());
        input["kind"] = json!("register");
        let err = build_map(&input).unwrap_err().into_single().unwrap();
        assert_eq!(err.kind, ErrorKind::UnknownEnumerator);
        assert_eq!(err.path, vec!["top", "kind"]);
    }

    #[test]
    fn options_hide_values_and_limit_errors() {
        let input = top(json!([
            {"name": "a", "doc": "", "offset": -1, "fields": []},
            {"name": "b", "doc": "", "offset": -2, "fields": []}
        ]));
        let all = build_map(&input).unwrap_err();
        assert_eq!(all.len(), 2);
        assert_eq!(all.first().and_then(|e| e.value.clone()).as_deref(), Some("-1"));

        let options: BuildOptions =
            serde_json::from_value(json!({"hide_input_in_errors": true, "max_errors": 1})).unwrap();
        let limited = build_map_with(&input, &options).unwrap_err();
        assert_eq!(limited.len(), 1);
        assert!(limited.first().unwrap().value.is_none());
    }

    #[test]
    fn constructor_errors_are_nested() {
        let input = top(json!([
            {"name": "r", "doc": "", "offset": 0, "fields": [field("x", 4, 4), field("y", 6, 4)]}
        ]));
        let err = build_map(&input).unwrap_err().into_single().unwrap();
        assert_eq!(err.kind, ErrorKind::OverlapViolation);
        assert_eq!(err.schema_loc.to_string(), "items[0].register.fields[0]");
        assert_eq!(err.path_string(), "top.r.x");
    }

    #[test]
    fn hidden_values_keep_messages() {
        let mut wide = field("f", 0, 8);
        wide["reset"] = json!(0x1ff);
        let input = top(json!([{"name": "r", "doc": "", "offset": 0, "fields": [wide]}]));
        let options = BuildOptions {
            hide_input_in_errors: true,
            ..BuildOptions::default()
        };
        let err = build_map_with(&input, &options).unwrap_err().into_single().unwrap();
        assert_eq!(err.value, None);
        assert_eq!(err.path_string(), "top.r.f.reset");
        assert!(err.message.starts_with("reset value 0x1ff requires 9 bits"), "{}", err.message);
    }

    #[rstest]
    #[case(
        json!({"kind": "register_array", "name": "r", "doc": "", "offset": 0,
               "num": 10_000_000_000_u64, "increment": 4, "fields": [field("x", 0, 1)]}),
        "items[0].register_array.num"
    )]
    #[case(
        json!({"name": "r", "doc": "", "offset": 0, "fields": [
            {"kind": "field_array", "num": 10_000_000_000_u64, "increment": 1,
             "name": "x", "doc": "", "offset": 0, "width": 1, "reset": null,
             "access": "rw", "hardware": "o"}
        ]}),
        "items[0].register.fields[0].field_array.num"
    )]
    fn huge_repetitions_are_out_of_range(#[case] item: Value, #[case] at: &str) {
        let err = build_map(&top(json!([item]))).unwrap_err().into_single().unwrap();
        assert_eq!(err.kind, ErrorKind::ValueOutOfRange);
        assert_eq!(err.schema_loc.to_string(), at);
        assert_eq!(err.value.as_deref(), Some("10000000000"));
    }

    #[test]
    fn arrays_bind_template_and_repetition() {
        let input = top(json!([
            {
                "kind": "register_array", "name": "ch", "doc": "Channel", "offset": 16,
                "num": 2, "increment": 4, "indices": ["a", "b"], "naming": "{name}_{index}",
                "fields": [
                    {"kind": "field_array", "num": 4, "increment": 2,
                     "name": "irq", "doc": "", "offset": 0, "width": 1, "reset": null,
                     "access": "ro", "hardware": "i"}
                ]
            }
        ]));
        let map = build_map(&input).unwrap();
        let names: Vec<_> = map.registers().iter().map(|r| r.path()).collect();
        assert_eq!(names, vec!["top.ch_a", "top.ch_b"]);
        let fields: Vec<_> = map.registers()[1].fields().iter().map(|f| f.path()).collect();
        assert_eq!(fields, vec!["top.ch_b.irq0", "top.ch_b.irq1", "top.ch_b.irq2", "top.ch_b.irq3"]);
        assert_eq!(map.registers()[1].reset_binstr(), "x0x0x0x");
    }

    #[test]
    fn serialization_round_trips() {
        let input = top(json!([
            {"name": "ctrl", "doc": "Control\n\nDetails", "offset": 0, "metadata": {"owner": "hw"},
             "fields": [field("en", 0, 1), {
                 "name": "mode", "doc": "", "offset": 4, "width": 2, "reset": null,
                 "access": "rw1c", "hardware": "ioe",
                 "enum": {"name": "modes", "doc": "", "members": [
                     {"name": "b", "doc": "", "value": 2}, {"name": "a", "doc": "", "value": 0}
                 ]}
             }]},
            {"kind": "memory_array", "name": "bank", "doc": "", "offset": 64, "num": 2, "increment": 64,
             "address_width": 4, "data_width": 32, "style": "external_ro"}
        ]));
        let map = build_map(&input).unwrap();
        let value = serde_json::to_value(&*map).unwrap();
        assert_eq!(value["items"][0]["fields"][1]["hardware"], "i-o-e");
        assert_eq!(value["items"][0]["fields"][1]["enum"]["members"][0]["name"], "a");
        let rebuilt = build_map(&value).unwrap();
        assert_eq!(rebuilt, map);
    }
}
