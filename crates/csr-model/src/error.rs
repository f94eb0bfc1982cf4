//! Structured validation failures for the register-map model.
//!
//! Every failure is a value. Node constructors return a single
//! [`ModelError`] whose [`Location`] is relative to the node being built;
//! the loader prefixes those locations while it descends, so that each
//! collected [`ValidationError`] carries an absolute *schema location*
//! (`items[0].register.fields[3].enum.name`) together with its *path
//! location* (`top.reg_a.field3.<unknown>.name`).
//!
//! # Error Format
//!
//! ```text
//! top.reg_a.x: error: field 'x' overlaps with other fields: y [overlap_violation]
//! ```

use std::fmt;

use serde::Serialize;
use serde_json::Value;

/// Placeholder used in path locations when a name is absent or invalid.
pub const UNKNOWN_NAME: &str = "<unknown>";

/// Input keys whose value is a list of named objects.
const NAMED_LIST_KEYS: [&str; 3] = ["items", "fields", "members"];

/// Input keys whose value is a single named object.
const NAMED_OBJECT_KEYS: [&str; 1] = ["enum"];

/// Discriminator literals that appear in schema locations but never in user paths.
pub const DISCRIMINATORS: [&str; 8] = [
    "register",
    "memory",
    "map",
    "field",
    "field_array",
    "register_array",
    "memory_array",
    "map_array",
];

/// Classification of validation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Value has the wrong shape, or a required key is missing.
    TypeMismatch,
    /// Integer constraint violated.
    ValueOutOfRange,
    /// String constraint violated.
    PatternMismatch,
    /// Duplicate name, value, offset, or index.
    UniquenessViolation,
    /// Bit or address ranges overlap.
    OverlapViolation,
    /// Offset is not a multiple of the container granularity.
    AlignmentViolation,
    /// Item does not fit into its container.
    ContainmentViolation,
    /// Unrecognized literal for an enumerated type.
    UnknownEnumerator,
    /// Illegal combination of hardware flags.
    HardwareCombinationError,
    /// Array naming pattern cannot be formatted.
    NamingPatternError,
}

impl ErrorKind {
    /// Stable snake-case identifier of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TypeMismatch => "type_mismatch",
            Self::ValueOutOfRange => "value_out_of_range",
            Self::PatternMismatch => "pattern_mismatch",
            Self::UniquenessViolation => "uniqueness_violation",
            Self::OverlapViolation => "overlap_violation",
            Self::AlignmentViolation => "alignment_violation",
            Self::ContainmentViolation => "containment_violation",
            Self::UnknownEnumerator => "unknown_enumerator",
            Self::HardwareCombinationError => "hardware_combination_error",
            Self::NamingPatternError => "naming_pattern_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step of a schema location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum LocStep {
    /// Object key.
    Key(String),
    /// List index.
    Index(usize),
}

impl From<&str> for LocStep {
    fn from(key: &str) -> Self {
        Self::Key(key.to_owned())
    }
}

impl From<usize> for LocStep {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

/// Schema location: the sequence of keys and indices naming where binding failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Location(Vec<LocStep>);

impl Location {
    /// Empty location (the root object).
    #[must_use]
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    /// Returns a new location extended by one step.
    #[must_use]
    pub fn join(&self, step: impl Into<LocStep>) -> Self {
        let mut steps = self.0.clone();
        steps.push(step.into());
        Self(steps)
    }

    /// Returns `prefix` followed by the steps of `self`.
    #[must_use]
    pub fn under(&self, prefix: &Self) -> Self {
        let mut steps = prefix.0.clone();
        steps.extend(self.0.iter().cloned());
        Self(steps)
    }

    /// Steps of this location.
    #[must_use]
    pub fn steps(&self) -> &[LocStep] {
        &self.0
    }

    /// Returns `true` for the root location.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<LocStep>> FromIterator<S> for Location {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.0.iter().enumerate() {
            match step {
                LocStep::Key(key) if i == 0 => write!(f, "{key}")?,
                LocStep::Key(key) => write!(f, ".{key}")?,
                LocStep::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

/// Failure raised while constructing one model node.
///
/// The location is relative to the node that raised it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ModelError {
    /// Failure classification.
    pub kind: ErrorKind,
    /// Location relative to the node being constructed.
    pub location: Location,
    /// Rendered offending value, when one exists.
    pub value: Option<String>,
    /// Human-readable reason.
    pub message: String,
}

impl ModelError {
    /// Creates an error located at the node itself.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            location: Location::root(),
            value: None,
            message: message.into(),
        }
    }

    /// Attaches the offending value.
    #[must_use]
    pub fn with_value(mut self, value: impl fmt::Display) -> Self {
        self.value = Some(value.to_string());
        self
    }

    /// Moves the error to `location`, relative to the node.
    #[must_use]
    pub fn at(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    /// Prefixes the location with the location of an enclosing node.
    #[must_use]
    pub fn nested(mut self, prefix: &Location) -> Self {
        self.location = self.location.under(prefix);
        self
    }
}

/// A located validation failure, as returned by the loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    /// Failure classification.
    pub kind: ErrorKind,
    /// Schema location of the failure.
    pub schema_loc: Location,
    /// Domain path location (names joined by `.` when displayed).
    pub path: Vec<String>,
    /// Rendered offending value, unless hidden by the caller.
    pub value: Option<String>,
    /// Human-readable reason.
    pub message: String,
}

impl ValidationError {
    /// Converts a model error into a located failure using the partial input tree.
    ///
    /// `hide_input` drops [`ValidationError::value`]; the message is kept as is.
    #[must_use]
    pub fn locate(error: ModelError, input: &Value, hide_input: bool) -> Self {
        let path = convert_schema_loc_to_path_loc(&error.location, input);
        Self {
            kind: error.kind,
            schema_loc: error.location,
            path,
            value: if hide_input { None } else { error.value },
            message: error.message,
        }
    }

    /// Path location joined with `.`.
    #[must_use]
    pub fn path_string(&self) -> String {
        self.path.join(".")
    }

    /// Formats the failure for stderr output.
    #[must_use]
    pub fn format_for_stderr(&self) -> String {
        format!(
            "{}: error: {} [{}]",
            self.path_string(),
            self.message,
            self.kind
        )
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.path_string(), self.kind, self.message)?;
        if let Some(value) = &self.value {
            write!(f, " (input: {value})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Ordered collection of validation failures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    /// Creates an empty collection.
    #[must_use]
    pub const fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Adds a failure to the collection.
    pub fn push(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Returns true if the collection is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of failures.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.errors.len()
    }

    /// Returns an iterator over the failures in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter()
    }

    /// Returns the first failure, if any.
    #[must_use]
    pub fn first(&self) -> Option<&ValidationError> {
        self.errors.first()
    }

    /// Converts into a single failure if there is exactly one.
    #[must_use]
    pub fn into_single(self) -> Option<ValidationError> {
        if self.errors.len() == 1 {
            self.errors.into_iter().next()
        } else {
            None
        }
    }

    /// Keeps at most `limit` failures.
    pub fn truncate(&mut self, limit: usize) {
        self.errors.truncate(limit);
    }

    /// Formats all failures for stderr output, one per line.
    #[must_use]
    pub fn format_for_stderr(&self) -> String {
        self.errors
            .iter()
            .map(ValidationError::format_for_stderr)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl FromIterator<ValidationError> for ValidationErrors {
    fn from_iter<T: IntoIterator<Item = ValidationError>>(iter: T) -> Self {
        Self {
            errors: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ValidationErrors {
    type Item = ValidationError;
    type IntoIter = std::vec::IntoIter<ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

/// Returns the name of an input object as written, trimmed, or [`UNKNOWN_NAME`].
///
/// Case is kept so that locations quote the input, while model paths use
/// the lowercase [`Identifier`](crate::Identifier).
fn name_of(value: Option<&Value>) -> String {
    value
        .and_then(|v| v.get("name"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| crate::types::is_identifier(name))
        .map_or_else(|| UNKNOWN_NAME.to_owned(), str::to_owned)
}

/// Translates a schema location into a path location over the partial input tree.
///
/// The first component is always the root map name. List keys of named
/// objects (`items`, `fields`, `members`) are replaced by the name of the
/// indexed element, named sub-objects (`enum`) by their own name, and
/// discriminator segments that follow an element are skipped. Names are
/// reported as written in the input, trimmed but not lowercased. Any name
/// that is absent or invalid at its step becomes [`UNKNOWN_NAME`].
#[must_use]
pub fn convert_schema_loc_to_path_loc(schema_loc: &Location, data: &Value) -> Vec<String> {
    let steps = schema_loc.steps();
    let mut path = vec![name_of(Some(data))];
    let mut current = Some(data);
    let mut at_element = false;

    for (i, step) in steps.iter().enumerate() {
        match step {
            LocStep::Key(key) => {
                if at_element && DISCRIMINATORS.contains(&key.as_str()) {
                    at_element = false;
                    continue;
                }
                at_element = false;
                let child = current.and_then(|v| v.get(key));
                let next_is_index = matches!(steps.get(i + 1), Some(LocStep::Index(_)));
                if NAMED_LIST_KEYS.contains(&key.as_str()) && next_is_index {
                    // The element name replaces the list key.
                } else if NAMED_OBJECT_KEYS.contains(&key.as_str())
                    && child.is_some_and(Value::is_object)
                {
                    path.push(name_of(child));
                } else {
                    path.push(key.clone());
                }
                current = child;
            }
            LocStep::Index(index) => {
                let previous_named = matches!(
                    i.checked_sub(1).and_then(|p| steps.get(p)),
                    Some(LocStep::Key(key)) if NAMED_LIST_KEYS.contains(&key.as_str())
                );
                let child = current.and_then(|v| v.get(*index));
                if previous_named {
                    path.push(name_of(child));
                    at_element = true;
                } else {
                    path.push(index.to_string());
                }
                current = child;
            }
        }
    }

    path
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn location_display_uses_dots_and_brackets() {
        let loc: Location = Location::root()
            .join("items")
            .join(0)
            .join("register")
            .join("fields")
            .join(3);
        assert_eq!(loc.to_string(), "items[0].register.fields[3]");
        assert_eq!(Location::root().to_string(), "");
    }

    #[test]
    fn nested_prefixes_relative_location() {
        let error = ModelError::new(ErrorKind::OverlapViolation, "overlap")
            .at(Location::root().join("fields").join(1));
        let prefix = Location::root().join("items").join(0).join("register");
        let nested = error.nested(&prefix);
        assert_eq!(nested.location.to_string(), "items[0].register.fields[1]");
    }

    #[test]
    fn locator_skips_discriminator_after_element() {
        let data = json!({
            "name": "top",
            "items": [{"name": "reg_a", "fields": [{"name": "f"}]}]
        });
        let loc = Location::root()
            .join("items")
            .join(0)
            .join("register")
            .join("fields");
        assert_eq!(
            convert_schema_loc_to_path_loc(&loc, &data),
            vec!["top", "reg_a", "fields"]
        );
    }

    #[test]
    fn locator_substitutes_unknown_for_invalid_names() {
        let data = json!({"name": "top", "items": [{"name": "9lives"}]});
        let loc = Location::root().join("items").join(0).join("name");
        assert_eq!(
            convert_schema_loc_to_path_loc(&loc, &data),
            vec!["top", UNKNOWN_NAME, "name"]
        );
    }

    #[test]
    fn locator_keeps_plain_list_indices() {
        let data = json!({
            "name": "top",
            "items": [{"name": "mem", "kind": "memory", "initial_values": [[0, 1], [9, 9]]}]
        });
        let loc = Location::root()
            .join("items")
            .join(0)
            .join("memory")
            .join("initial_values")
            .join(1);
        assert_eq!(
            convert_schema_loc_to_path_loc(&loc, &data),
            vec!["top", "mem", "initial_values", "1"]
        );
    }

    #[test]
    fn validation_error_hides_input_on_request() {
        let error = ModelError::new(ErrorKind::ValueOutOfRange, "too wide").with_value(300);
        let data = json!({"name": "top"});
        let shown = ValidationError::locate(error.clone(), &data, false);
        let hidden = ValidationError::locate(error, &data, true);
        assert_eq!(shown.value.as_deref(), Some("300"));
        assert!(hidden.value.is_none());
        assert_eq!(hidden.path, vec!["top"]);
    }

    #[test]
    fn collection_formats_one_failure_per_line() {
        let data = json!({"name": "top"});
        let errors: ValidationErrors = [
            ModelError::new(ErrorKind::TypeMismatch, "field required")
                .at(Location::root().join("doc")),
            ModelError::new(ErrorKind::TypeMismatch, "field required")
                .at(Location::root().join("items")),
        ]
        .into_iter()
        .map(|e| ValidationError::locate(e, &data, false))
        .collect();

        assert_eq!(errors.len(), 2);
        assert_eq!(
            errors.format_for_stderr(),
            "top.doc: error: field required [type_mismatch]\n\
             top.items: error: field required [type_mismatch]"
        );
        assert!(errors.clone().into_single().is_none());
    }
}
