//! Constrained string and integer refinements shared by every model node.

use std::fmt;
use std::ops::Deref;

use serde::Serialize;
use thiserror::Error;

use crate::error::{ErrorKind, ModelError};

/// Rejection reasons for primitive refinements.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrimitiveError {
    /// String is empty or does not match `^[A-Za-z_][A-Za-z0-9_]*$`.
    #[error("'{0}' is not a valid identifier")]
    NotIdentifier(String),
    /// String contains a line break.
    #[error("text must be a single line")]
    MultiLine,
    /// String is not of the form `<path>.<ext>::<attr>`.
    #[error("'{0}' is not a valid attribute path, expected '<file>.<ext>::<name>'")]
    NotAttrPath(String),
    /// Integer is zero or not a power of two.
    #[error("{0} is not a positive power of two")]
    NotPowerOfTwo(u64),
}

impl PrimitiveError {
    /// Error kind reported for this rejection.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotPowerOfTwo(_) => ErrorKind::ValueOutOfRange,
            _ => ErrorKind::PatternMismatch,
        }
    }
}

impl From<PrimitiveError> for ModelError {
    fn from(err: PrimitiveError) -> Self {
        let value = match &err {
            PrimitiveError::NotIdentifier(s) | PrimitiveError::NotAttrPath(s) => s.clone(),
            PrimitiveError::MultiLine => String::new(),
            PrimitiveError::NotPowerOfTwo(n) => n.to_string(),
        };
        let error = Self::new(err.kind(), err.to_string());
        if value.is_empty() {
            error
        } else {
            error.with_value(value)
        }
    }
}

/// Returns `true` if `s` matches `^[A-Za-z_][A-Za-z0-9_]*$`.
#[must_use]
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Lowercase identifier naming a model node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    /// Strips, validates and lowercases `raw`.
    ///
    /// # Errors
    ///
    /// Returns [`PrimitiveError::NotIdentifier`] if the stripped input is not an identifier.
    pub fn new(raw: &str) -> Result<Self, PrimitiveError> {
        let stripped = raw.trim();
        if is_identifier(stripped) {
            Ok(Self(stripped.to_ascii_lowercase()))
        } else {
            Err(PrimitiveError::NotIdentifier(raw.to_owned()))
        }
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for Identifier {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<&str> for Identifier {
    type Error = PrimitiveError;

    fn try_from(raw: &str) -> Result<Self, Self::Error> {
        Self::new(raw)
    }
}

/// Stripped single line of text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SingleLine(String);

impl SingleLine {
    /// Strips `raw` and rejects embedded line breaks.
    ///
    /// # Errors
    ///
    /// Returns [`PrimitiveError::MultiLine`] if the stripped input contains `\n` or `\r`.
    pub fn new(raw: &str) -> Result<Self, PrimitiveError> {
        let stripped = raw.trim();
        if stripped.contains(['\n', '\r']) {
            Err(PrimitiveError::MultiLine)
        } else {
            Ok(Self(stripped.to_owned()))
        }
    }

    /// Returns the line as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for SingleLine {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SingleLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stripped free-form text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Text(String);

impl Text {
    /// Strips surrounding whitespace from `raw`.
    #[must_use]
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_owned())
    }

    /// Returns the text as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for Text {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Text {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// Locator of an external plugin: `<path>.<ext>::<attribute>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PyAttrPath(String);

impl PyAttrPath {
    /// Strips and validates `raw`.
    ///
    /// # Errors
    ///
    /// Returns [`PrimitiveError::NotAttrPath`] if the input is not `<path>.<ext>::<attr>`.
    pub fn new(raw: &str) -> Result<Self, PrimitiveError> {
        let stripped = raw.trim();
        let reject = || PrimitiveError::NotAttrPath(raw.to_owned());
        let (file, attr) = stripped.rsplit_once("::").ok_or_else(reject)?;
        let (stem, ext) = file.rsplit_once('.').ok_or_else(reject)?;
        let word = |s: &str| {
            !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        };
        if stem.is_empty() || !word(ext) || !word(attr) {
            return Err(reject());
        }
        Ok(Self(stripped.to_owned()))
    }

    /// File part of the locator.
    #[must_use]
    pub fn file(&self) -> &str {
        self.0.rsplit_once("::").map_or("", |(file, _)| file)
    }

    /// Attribute part of the locator.
    #[must_use]
    pub fn attribute(&self) -> &str {
        self.0.rsplit_once("::").map_or("", |(_, attr)| attr)
    }
}

impl fmt::Display for PyAttrPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Positive power-of-two integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Pow2Int(u64);

impl Pow2Int {
    /// Validates that `n` is a positive power of two.
    ///
    /// # Errors
    ///
    /// Returns [`PrimitiveError::NotPowerOfTwo`] otherwise.
    pub const fn new(n: u64) -> Result<Self, PrimitiveError> {
        if n.is_power_of_two() {
            Ok(Self(n))
        } else {
            Err(PrimitiveError::NotPowerOfTwo(n))
        }
    }

    /// Returns the wrapped value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Pow2Int {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("reg_a", "reg_a")]
    #[case("  CTRL ", "ctrl")]
    #[case("_x9", "_x9")]
    #[case("A", "a")]
    fn identifier_accepts_and_lowercases(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(Identifier::new(raw).unwrap().as_str(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("9lives")]
    #[case("with space")]
    #[case("dash-ed")]
    #[case("ünï")]
    fn identifier_rejects(#[case] raw: &str) {
        let err = Identifier::new(raw).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PatternMismatch);
    }

    #[test]
    fn single_line_rejects_line_breaks() {
        assert_eq!(SingleLine::new("  brief  ").unwrap().as_str(), "brief");
        assert_eq!(SingleLine::new("a\nb"), Err(PrimitiveError::MultiLine));
        assert_eq!(SingleLine::new("a\rb"), Err(PrimitiveError::MultiLine));
        assert!(SingleLine::new("trailing\n").is_ok());
    }

    #[test]
    fn text_is_stripped() {
        assert_eq!(Text::new("\n  body \n").as_str(), "body");
    }

    #[rstest]
    #[case("plugins/gen.py::Generator", "plugins/gen.py", "Generator")]
    #[case(" a.b.py::run_1 ", "a.b.py", "run_1")]
    fn attr_path_accepts(#[case] raw: &str, #[case] file: &str, #[case] attr: &str) {
        let path = PyAttrPath::new(raw).unwrap();
        assert_eq!(path.file(), file);
        assert_eq!(path.attribute(), attr);
    }

    #[rstest]
    #[case("gen.py")]
    #[case("gen::Generator")]
    #[case(".py::Generator")]
    #[case("gen.py::")]
    #[case("gen.py::Gen-erator")]
    fn attr_path_rejects(#[case] raw: &str) {
        assert!(PyAttrPath::new(raw).is_err());
    }

    #[test]
    fn pow2_int_checks_power_of_two() {
        assert_eq!(Pow2Int::new(32).unwrap().get(), 32);
        assert_eq!(Pow2Int::new(1).unwrap().get(), 1);
        assert_eq!(Pow2Int::new(0), Err(PrimitiveError::NotPowerOfTwo(0)));
        let err = Pow2Int::new(24).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueOutOfRange);
        let model: ModelError = err.into();
        assert_eq!(model.value.as_deref(), Some("24"));
    }
}
