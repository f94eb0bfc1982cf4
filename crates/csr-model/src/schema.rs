//! JSON Schema of the description accepted by [`crate::loader::build_map`].

use serde_json::{json, Map as Object, Value};

use crate::access::AccessMode;
use crate::array::{DEFAULT_NAMING, MAX_ARRAY_ELEMENTS};
use crate::field::MAX_REGISTER_BITS;
use crate::hardware::HardwareFlag;
use crate::map::MIN_REGISTER_WIDTH;
use crate::memory::MAX_ADDRESS_WIDTH;
use crate::style::MemoryStyle;

const SCHEMA_DIALECT: &str = "https://json-schema.org/draft/2020-12/schema";

fn reference(def: &str) -> Value {
    json!({ "$ref": format!("#/$defs/{def}") })
}

fn uint() -> Value {
    json!({ "type": "integer", "minimum": 0 })
}

/// Object schema closed over `properties`, with the header keys mixed in.
fn node(description: &str, kind: Option<&str>, properties: Value, required: &[&str]) -> Value {
    let mut props = Object::new();
    props.insert("name".into(), reference("Identifier"));
    props.insert("doc".into(), json!({ "type": "string" }));
    props.insert("metadata".into(), json!({ "type": "object" }));
    if let Some(kind) = kind {
        props.insert("kind".into(), json!({ "const": kind }));
    }
    if let Value::Object(extra) = properties {
        props.extend(extra);
    }
    let mut keys = vec!["name", "doc"];
    keys.extend_from_slice(required);
    json!({
        "type": "object",
        "description": description,
        "properties": props,
        "required": keys,
        "additionalProperties": false,
    })
}

fn array_keys() -> Value {
    json!({
        "num": { "type": "integer", "minimum": 2, "maximum": MAX_ARRAY_ELEMENTS },
        "increment": { "type": "integer", "minimum": 1 },
        "indices": { "type": "array", "items": { "type": "string" } },
        "naming": { "type": "string", "default": DEFAULT_NAMING },
    })
}

fn merged(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a), Value::Object(b)) => {
            a.extend(b);
            Value::Object(a)
        }
        (a, _) => a,
    }
}

fn field_keys() -> Value {
    json!({
        "offset": { "type": "integer", "minimum": 0, "maximum": MAX_REGISTER_BITS - 1 },
        "width": { "type": "integer", "minimum": 1, "maximum": MAX_REGISTER_BITS },
        "reset": { "type": ["integer", "null"], "minimum": 0 },
        "access": reference("AccessMode"),
        "hardware": reference("HardwareMode"),
        "enum": { "oneOf": [reference("Enum"), { "type": "null" }] },
    })
}

fn register_keys() -> Value {
    json!({
        "offset": uint(),
        "fields": {
            "type": "array",
            "minItems": 1,
            "items": { "oneOf": [reference("Field"), reference("FieldArray")] },
        },
    })
}

fn memory_keys() -> Value {
    json!({
        "offset": uint(),
        "address_width": { "type": "integer", "minimum": 1, "maximum": MAX_ADDRESS_WIDTH },
        "data_width": { "type": "integer", "minimum": 1 },
        "style": reference("MemoryStyle"),
        "initial_values": {
            "type": "array",
            "items": { "type": "array", "prefixItems": [uint(), uint()], "minItems": 2, "maxItems": 2 },
        },
    })
}

fn map_keys() -> Value {
    json!({
        "offset": uint(),
        "address_width": { "type": "integer", "minimum": 1, "maximum": MAX_ADDRESS_WIDTH },
        "register_width": { "type": "integer", "minimum": MIN_REGISTER_WIDTH },
        "items": {
            "type": "array",
            "minItems": 1,
            "items": {
                "oneOf": [
                    reference("Register"),
                    reference("Memory"),
                    reference("Map"),
                    reference("RegisterArray"),
                    reference("MemoryArray"),
                    reference("MapArray"),
                ],
            },
        },
    })
}

/// JSON Schema (draft 2020-12) of a register map description.
///
/// The schema mirrors the shape checks of the loader; cross-item rules
/// such as overlap or alignment are only enforced by the model.
#[must_use]
pub fn map_schema() -> Value {
    const FIELD: &[&str] = &["offset", "width", "reset", "access", "hardware"];
    const ARRAY: &[&str] = &["num", "increment"];
    const REGISTER: &[&str] = &["offset", "fields"];
    const MEMORY: &[&str] = &["offset", "address_width", "data_width", "style"];
    const MAP: &[&str] = &["offset", "address_width", "register_width", "items"];

    let access: Vec<_> = AccessMode::ALL.iter().map(|mode| mode.as_str()).collect();
    let styles: Vec<_> = MemoryStyle::ALL.iter().map(|style| style.as_str()).collect();
    let letters: String = HardwareFlag::ALL.iter().map(|flag| flag.letter()).collect();
    let class = format!("[{letters}{}]", letters.to_uppercase());
    let with_array = |keys: &[&'static str]| [keys, ARRAY].concat();

    json!({
        "$schema": SCHEMA_DIALECT,
        "title": "Register map",
        "$ref": "#/$defs/RootMap",
        "$defs": {
            "Identifier": {
                "type": "string",
                "pattern": "^\\s*[A-Za-z_][A-Za-z0-9_]*\\s*$",
            },
            "AccessMode": { "enum": access },
            "MemoryStyle": { "enum": styles },
            "HardwareMode": {
                "type": "string",
                "description": format!("Hardware flags from '{letters}', dash separated or concatenated"),
                "pattern": format!("^({class}(-{class})*|{class}*)$"),
            },
            "EnumMember": node("Named enumeration value", None, json!({ "value": uint() }), &["value"]),
            "Enum": node(
                "Named set of field values",
                None,
                json!({
                    "members": { "type": "array", "minItems": 1, "items": reference("EnumMember") },
                }),
                &["members"],
            ),
            "Field": node("Bit field of a register", Some("field"), field_keys(), FIELD),
            "FieldArray": node(
                "Repeated bit field",
                Some("field_array"),
                merged(field_keys(), array_keys()),
                &with_array(FIELD),
            ),
            "Register": node("Register of fields", Some("register"), register_keys(), REGISTER),
            "RegisterArray": node(
                "Repeated register",
                Some("register_array"),
                merged(register_keys(), array_keys()),
                &with_array(REGISTER),
            ),
            "Memory": node("Memory block", Some("memory"), memory_keys(), MEMORY),
            "MemoryArray": node(
                "Repeated memory block",
                Some("memory_array"),
                merged(memory_keys(), array_keys()),
                &with_array(MEMORY),
            ),
            "Map": node("Nested register map", Some("map"), map_keys(), MAP),
            "MapArray": node(
                "Repeated register map",
                Some("map_array"),
                merged(map_keys(), array_keys()),
                &with_array(MAP),
            ),
            "RootMap": node("Top-level register map", Some("map"), map_keys(), MAP),
        },
    })
}
