//! Identity, documentation and hierarchy shared by every model node.
//!
//! Parents own their children through [`Arc`]; children point back through
//! a [`ParentLink`], a set-once cell holding a [`Weak`] handle. Links are
//! installed while the parent is allocated (`Arc::new_cyclic`), so a node
//! handed out by a constructor is already fully linked below it. Paths and
//! addresses are computed through the links on demand and never go stale.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock, Weak};

use serde::Serialize;
use serde_json::Value;

use crate::error::{ErrorKind, Location, ModelError};
use crate::types::{Identifier, SingleLine, Text};

/// Free-form user metadata attached to a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Metadata(serde_json::Map<String, Value>);

impl Metadata {
    /// Wraps a JSON object.
    #[must_use]
    pub const fn new(entries: serde_json::Map<String, Value>) -> Self {
        Self(entries)
    }

    /// Metadata holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Looks up one entry.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Iterates over entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl Hash for Metadata {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Keys are kept sorted, so the rendering is canonical.
        Value::Object(self.0.clone()).to_string().hash(state);
    }
}

/// Name, documentation and metadata of a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Header {
    /// Lowercase name.
    pub name: Identifier,
    /// Docstring: a brief line, then optionally a detailed description.
    pub doc: Text,
    /// User metadata.
    #[serde(skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
}

impl Header {
    /// Validates `name` and strips `doc`.
    ///
    /// # Errors
    ///
    /// Returns a `pattern_mismatch` error located at `name` if the name is not an identifier.
    pub fn new(name: &str, doc: &str) -> Result<Self, ModelError> {
        let name = Identifier::new(name)
            .map_err(|err| ModelError::from(err).at(Location::root().join("name")))?;
        Ok(Self {
            name,
            doc: Text::new(doc),
            metadata: Metadata::default(),
        })
    }

    /// Replaces the metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Same header under another name.
    #[must_use]
    pub(crate) fn renamed(&self, name: Identifier) -> Self {
        Self {
            name,
            doc: self.doc.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

/// First line of a docstring.
#[must_use]
pub fn brief_of(doc: &str) -> SingleLine {
    let line = doc.split(['\n', '\r']).next().unwrap_or_default();
    SingleLine::new(line).unwrap_or_default()
}

/// Text following the first line of a docstring, or the first line itself.
#[must_use]
pub fn description_of(doc: &str) -> Text {
    match doc.split_once('\n') {
        Some((_, rest)) => Text::new(rest),
        None => Text::new(doc),
    }
}

/// Weak back-reference to the parent, installed once.
///
/// Equality and hashing ignore the link so that trees compare structurally.
pub struct ParentLink<P>(Arc<OnceLock<Weak<P>>>);

impl<P> ParentLink<P> {
    /// Link that is not installed yet.
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(OnceLock::new()))
    }

    /// Handle to the same cell. Generated array elements share the
    /// template's link so they resolve to the array's container.
    #[must_use]
    pub(crate) fn share(&self) -> Self {
        Self(Arc::clone(&self.0))
    }

    /// Installs the parent. Returns `false` if a parent was already installed.
    pub(crate) fn install(&self, parent: Weak<P>) -> bool {
        self.0.set(parent).is_ok()
    }

    /// Parent node, if installed and still alive.
    #[must_use]
    pub fn get(&self) -> Option<Arc<P>> {
        self.0.get().and_then(Weak::upgrade)
    }

    /// A parent was installed.
    #[must_use]
    pub fn is_linked(&self) -> bool {
        self.0.get().is_some()
    }
}

impl<P: NamedItem> ParentLink<P> {
    /// Path of the parent, if any.
    #[must_use]
    pub fn path(&self) -> Option<String> {
        self.get().map(|parent| parent.path())
    }
}

impl<P> Default for ParentLink<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> fmt::Debug for ParentLink<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.is_linked() { "ParentLink(linked)" } else { "ParentLink(unlinked)" })
    }
}

impl<P> PartialEq for ParentLink<P> {
    fn eq(&self, _: &Self) -> bool {
        true
    }
}

impl<P> Eq for ParentLink<P> {}

impl<P> Hash for ParentLink<P> {
    fn hash<H: Hasher>(&self, _: &mut H) {}
}

/// Lazily computed derived property.
///
/// Ignored by equality and hashing.
pub struct Memo<T>(OnceLock<T>);

impl<T> Memo<T> {
    /// Empty cache.
    #[must_use]
    pub const fn new() -> Self {
        Self(OnceLock::new())
    }

    /// Cached value, computing it on first access.
    pub fn get_or_init(&self, init: impl FnOnce() -> T) -> &T {
        self.0.get_or_init(init)
    }
}

impl<T> Default for Memo<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Memo<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Memo")
    }
}

impl<T> PartialEq for Memo<T> {
    fn eq(&self, _: &Self) -> bool {
        true
    }
}

impl<T> Eq for Memo<T> {}

impl<T> Hash for Memo<T> {
    fn hash<H: Hasher>(&self, _: &mut H) {}
}

/// Node with a name, documentation and a place in the hierarchy.
pub trait NamedItem {
    /// Name, documentation and metadata.
    fn header(&self) -> &Header;

    /// Path of the parent node, `None` for a detached or root node.
    fn parent_path(&self) -> Option<String>;

    /// Lowercase name.
    fn name(&self) -> &Identifier {
        &self.header().name
    }

    /// Full docstring.
    fn doc(&self) -> &Text {
        &self.header().doc
    }

    /// User metadata.
    fn metadata(&self) -> &Metadata {
        &self.header().metadata
    }

    /// First line of the docstring.
    fn brief(&self) -> SingleLine {
        brief_of(self.doc())
    }

    /// Detailed description, or the brief for a single-line docstring.
    fn description(&self) -> Text {
        description_of(self.doc())
    }

    /// Dot-separated names from the root down to this node.
    fn path(&self) -> String {
        match self.parent_path() {
            Some(parent) => format!("{parent}.{}", self.name()),
            None => self.name().to_string(),
        }
    }
}

/// Node placed in a byte address space.
pub trait MapableItem: NamedItem {
    /// Byte offset from the parent's address.
    fn offset(&self) -> u64;

    /// Address of the parent, `0` for a root or detached node.
    fn base_address(&self) -> u64;

    /// Absolute byte address.
    fn address(&self) -> u64 {
        self.base_address() + self.offset()
    }
}

/// Node that can be installed under a parent of type `Parent`.
pub trait Adoptable: Sized {
    /// Node type owning this one.
    type Parent;

    /// Back-reference to the owner.
    fn parent_link(&self) -> &ParentLink<Self::Parent>;

    /// Deep copy with a fresh, unlinked parent link.
    fn relinked(&self) -> Arc<Self>;
}

/// Installs `parent` on `child`, copying the child if it already belongs elsewhere.
pub(crate) fn adopt<T: Adoptable>(child: &Arc<T>, parent: &Weak<T::Parent>) -> Arc<T> {
    if child.parent_link().install(parent.clone()) {
        return Arc::clone(child);
    }
    let copy = child.relinked();
    copy.parent_link().install(parent.clone());
    copy
}

/// Error for a value that exceeds a limit, located at `key`.
pub(crate) fn out_of_range(key: &str, value: impl fmt::Display, message: String) -> ModelError {
    ModelError::new(ErrorKind::ValueOutOfRange, message)
        .with_value(value)
        .at(Location::root().join(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Node {
        header: Header,
        parent: ParentLink<Self>,
    }

    impl NamedItem for Node {
        fn header(&self) -> &Header {
            &self.header
        }

        fn parent_path(&self) -> Option<String> {
            self.parent.path()
        }
    }

    fn node(name: &str) -> Arc<Node> {
        Arc::new(Node {
            header: Header::new(name, "").unwrap(),
            parent: ParentLink::new(),
        })
    }

    #[test]
    fn brief_and_description() {
        let header = Header::new("x", "  Brief line.\nDetails\nmore  ").unwrap();
        assert_eq!(brief_of(&header.doc).as_str(), "Brief line.");
        assert_eq!(description_of(&header.doc).as_str(), "Details\nmore");

        let single = Header::new("x", "Only brief").unwrap();
        assert_eq!(brief_of(&single.doc).as_str(), "Only brief");
        assert_eq!(description_of(&single.doc).as_str(), "Only brief");

        assert_eq!(brief_of("").as_str(), "");
    }

    #[test]
    fn header_rejects_bad_names() {
        let err = Header::new("1x", "doc").unwrap_err();
        assert_eq!(err.kind, ErrorKind::PatternMismatch);
        assert_eq!(err.location.to_string(), "name");
        assert_eq!(Header::new(" Top ", "").unwrap().name.as_str(), "top");
    }

    #[test]
    fn link_installs_once_and_composes_paths() {
        let root = node("top");
        let child = node("reg");
        assert_eq!(child.path(), "reg");
        assert!(child.parent.install(Arc::downgrade(&root)));
        assert!(!child.parent.install(Arc::downgrade(&root)));
        assert!(child.parent.is_linked());
        assert_eq!(child.path(), "top.reg");
    }

    #[test]
    fn shared_link_follows_template() {
        let root = node("top");
        let template = ParentLink::<Node>::new();
        let shared = template.share();
        assert!(!shared.is_linked());
        assert!(template.install(Arc::downgrade(&root)));
        assert_eq!(shared.path().as_deref(), Some("top"));
    }

    #[test]
    fn links_and_memos_do_not_affect_equality() {
        let root = node("top");
        let linked = ParentLink::<Node>::new();
        linked.install(Arc::downgrade(&root));
        assert_eq!(linked, ParentLink::new());

        let warm = Memo::new();
        warm.get_or_init(|| 1);
        assert_eq!(warm, Memo::<i32>::new());
        assert_eq!(*warm.get_or_init(|| 2), 1);
    }

    #[test]
    fn metadata_hash_is_order_independent() {
        use std::collections::hash_map::DefaultHasher;

        let a: serde_json::Map<String, Value> =
            serde_json::from_str(r#"{"a": 1, "b": [true]}"#).unwrap();
        let b: serde_json::Map<String, Value> =
            serde_json::from_str(r#"{"b": [true], "a": 1}"#).unwrap();
        let hash = |m: &Metadata| {
            let mut hasher = DefaultHasher::new();
            m.hash(&mut hasher);
            hasher.finish()
        };
        assert_eq!(Metadata::new(a.clone()), Metadata::new(b.clone()));
        assert_eq!(hash(&Metadata::new(a)), hash(&Metadata::new(b)));
    }
}
