//! Register-map model and validation pipeline for the CSR map compiler.
//!
//! A description (any deserialized mapping) is bound by [`build_map`] into
//! a tree of [`Map`], [`Register`], [`Field`], [`Enum`] and [`Memory`]
//! nodes. Every node validates itself on construction, and a parent
//! validates the relationships between its children, so a returned tree is
//! always consistent. Nodes are shared through [`std::sync::Arc`] and know
//! their parent, which lets addresses and dotted paths compose on demand.

/// Validated scalar primitives: identifiers, texts and powers of two.
pub mod types;
pub use types::{is_identifier, Identifier, Pow2Int, PrimitiveError, PyAttrPath, SingleLine, Text};

/// Software access modes of register fields.
pub mod access;
pub use access::{AccessCategory, AccessMode, UnknownLiteral};

/// Hardware interaction flags of register fields.
pub mod hardware;
pub use hardware::{HardwareFlag, HardwareMode, HardwareParseError};

/// Implementation styles of memory blocks.
pub mod style;
pub use style::MemoryStyle;

/// Shared naming, documentation and parent-link machinery.
pub mod item;
pub use item::{
    brief_of, description_of, Adoptable, Header, MapableItem, Memo, Metadata, NamedItem, ParentLink,
};

/// Field value enumerations.
pub mod enumeration;
pub use enumeration::{bit_width, Enum, EnumMember};

/// Bit fields.
pub mod field;
pub use field::{ByteLaneError, Field, FieldParams, MAX_REGISTER_BITS};

/// Registers.
pub mod register;
pub use register::{FieldItem, Register, RegisterParams};

/// Memory blocks.
pub mod memory;
pub use memory::{Memory, MemoryParams, MAX_ADDRESS_WIDTH};

/// Register maps and address layout checks.
pub mod map;
pub use map::{AddressRange, Map, MapItem, MapParams, MIN_REGISTER_WIDTH};

/// Repeated items.
pub mod array;
pub use array::{
    ArrayItem, ArraySpec, FieldArray, MapArray, MemoryArray, RegisterArray, Repeatable,
    DEFAULT_NAMING, MAX_ARRAY_ELEMENTS,
};

/// Error taxonomy and schema-to-path locator.
pub mod error;
pub use error::{
    convert_schema_loc_to_path_loc, ErrorKind, LocStep, Location, ModelError, ValidationError,
    ValidationErrors, DISCRIMINATORS, UNKNOWN_NAME,
};

/// Binding of deserialized descriptions into validated maps.
pub mod loader;
pub use loader::{build_map, build_map_with, BuildOptions};

/// JSON Schema of the accepted description.
pub mod schema;
pub use schema::map_schema;

#[cfg(test)]
use proptest as _;
