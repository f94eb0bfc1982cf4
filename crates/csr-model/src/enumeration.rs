//! Named values of a bit field.

use std::collections::HashSet;
use std::sync::{Arc, Weak};

use serde::Serialize;

use crate::error::{ErrorKind, Location, ModelError};
use crate::field::Field;
use crate::item::{adopt, Adoptable, Header, NamedItem, ParentLink};

/// Number of bits needed to represent `value`; zero needs one bit.
#[must_use]
pub const fn bit_width(value: u64) -> u32 {
    if value == 0 {
        1
    } else {
        u64::BITS - value.leading_zeros()
    }
}

/// One named value of an [`Enum`].
#[derive(Debug, PartialEq, Eq, Hash, Serialize)]
pub struct EnumMember {
    #[serde(flatten)]
    header: Header,
    value: u64,
    #[serde(skip)]
    parent: ParentLink<Enum>,
}

impl EnumMember {
    /// Creates a detached member.
    #[must_use]
    pub fn new(header: Header, value: u64) -> Arc<Self> {
        Arc::new(Self {
            header,
            value,
            parent: ParentLink::new(),
        })
    }

    /// Enumerated value.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.value
    }

    /// Minimum number of bits required to represent the value.
    #[must_use]
    pub const fn width(&self) -> u32 {
        bit_width(self.value)
    }

    /// Enumeration this member belongs to.
    #[must_use]
    pub fn parent_enum(&self) -> Option<Arc<Enum>> {
        self.parent.get()
    }
}

impl NamedItem for EnumMember {
    fn header(&self) -> &Header {
        &self.header
    }

    fn parent_path(&self) -> Option<String> {
        self.parent.path()
    }
}

impl Adoptable for EnumMember {
    type Parent = Enum;

    fn parent_link(&self) -> &ParentLink<Enum> {
        &self.parent
    }

    fn relinked(&self) -> Arc<Self> {
        Self::new(self.header.clone(), self.value)
    }
}

/// Enumeration of field values, sorted by value.
#[derive(Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Enum {
    #[serde(flatten)]
    header: Header,
    members: Vec<Arc<EnumMember>>,
    #[serde(skip)]
    parent: ParentLink<Field>,
}

impl Enum {
    /// Validates and sorts `members`.
    ///
    /// # Errors
    ///
    /// Returns `value_out_of_range` at `members` if there are no members, or
    /// `uniqueness_violation` at `members[i]` for the first member whose name
    /// or value repeats an earlier one.
    pub fn new(header: Header, members: Vec<Arc<EnumMember>>) -> Result<Arc<Self>, ModelError> {
        if members.is_empty() {
            return Err(ModelError::new(
                ErrorKind::ValueOutOfRange,
                "enum must have at least one member",
            )
            .at(Location::root().join("members")));
        }

        let mut names = HashSet::new();
        let mut values = HashSet::new();
        for (i, member) in members.iter().enumerate() {
            let at = Location::root().join("members").join(i);
            if !names.insert(member.name().clone()) {
                return Err(ModelError::new(
                    ErrorKind::UniquenessViolation,
                    format!("enum member name '{}' is not unique", member.name()),
                )
                .with_value(member.name())
                .at(at));
            }
            if !values.insert(member.value) {
                return Err(ModelError::new(
                    ErrorKind::UniquenessViolation,
                    format!(
                        "enum member '{}' has value {} that is already used",
                        member.name(),
                        member.value
                    ),
                )
                .with_value(member.value)
                .at(at));
            }
        }

        let mut members = members;
        members.sort_by_key(|member| member.value);
        log::trace!("enum '{}' with {} members", header.name, members.len());
        Ok(Self::assemble(header, &members))
    }

    fn assemble(header: Header, members: &[Arc<EnumMember>]) -> Arc<Self> {
        Arc::new_cyclic(|this: &Weak<Self>| Self {
            header,
            members: members.iter().map(|member| adopt(member, this)).collect(),
            parent: ParentLink::new(),
        })
    }

    /// Members sorted by value.
    #[must_use]
    pub fn members(&self) -> &[Arc<EnumMember>] {
        &self.members
    }

    /// Member names in value order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|member| member.name().as_str())
    }

    /// Member values in ascending order.
    pub fn values(&self) -> impl Iterator<Item = u64> + '_ {
        self.members.iter().map(|member| member.value)
    }

    /// Member with the given name.
    #[must_use]
    pub fn member(&self, name: &str) -> Option<&Arc<EnumMember>> {
        self.members.iter().find(|member| member.name().as_str() == name)
    }

    /// Widest member width.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.members.iter().map(|member| member.width()).max().unwrap_or(1)
    }

    /// Field this enumeration is attached to.
    #[must_use]
    pub fn parent_field(&self) -> Option<Arc<Field>> {
        self.parent.get()
    }
}

impl NamedItem for Enum {
    fn header(&self) -> &Header {
        &self.header
    }

    fn parent_path(&self) -> Option<String> {
        self.parent.path()
    }
}

impl Adoptable for Enum {
    type Parent = Field;

    fn parent_link(&self) -> &ParentLink<Field> {
        &self.parent
    }

    fn relinked(&self) -> Arc<Self> {
        Self::assemble(self.header.clone(), &self.members)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn member(name: &str, value: u64) -> Arc<EnumMember> {
        EnumMember::new(Header::new(name, "").unwrap(), value)
    }

    #[rstest]
    #[case(0, 1)]
    #[case(1, 1)]
    #[case(2, 2)]
    #[case(255, 8)]
    #[case(256, 9)]
    #[case(u64::MAX, 64)]
    fn member_width(#[case] value: u64, #[case] width: u32) {
        assert_eq!(member("m", value).width(), width);
    }

    #[test]
    fn members_are_sorted_and_linked() {
        let e = Enum::new(
            Header::new("mode", "Operating mode").unwrap(),
            vec![member("fast", 2), member("off", 0), member("slow", 1)],
        )
        .unwrap();
        assert_eq!(e.names().collect::<Vec<_>>(), vec!["off", "slow", "fast"]);
        assert_eq!(e.values().collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(e.width(), 2);
        assert_eq!(e.members()[0].path(), "mode.off");
        assert!(e.members()[0].parent_enum().is_some());
        assert_eq!(e.member("slow").map(|m| m.value()), Some(1));
    }

    #[test]
    fn duplicate_values_are_rejected() {
        let err = Enum::new(
            Header::new("e", "").unwrap(),
            vec![member("e1", 0), member("e2", 0)],
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::UniquenessViolation);
        assert_eq!(err.location.to_string(), "members[1]");
        assert_eq!(err.value.as_deref(), Some("0"));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = Enum::new(
            Header::new("e", "").unwrap(),
            vec![member("a", 0), member("A", 1)],
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::UniquenessViolation);
        assert_eq!(err.location.to_string(), "members[1]");
    }

    #[test]
    fn empty_enum_is_rejected() {
        let err = Enum::new(Header::new("e", "").unwrap(), vec![]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ValueOutOfRange);
        assert_eq!(err.location.to_string(), "members");
    }

    #[test]
    fn shared_members_are_copied_into_second_enum() {
        let shared = member("a", 3);
        let first = Enum::new(Header::new("first", "").unwrap(), vec![Arc::clone(&shared)]).unwrap();
        let second = Enum::new(Header::new("second", "").unwrap(), vec![shared]).unwrap();
        assert_eq!(first.members()[0].path(), "first.a");
        assert_eq!(second.members()[0].path(), "second.a");
        assert_eq!(first.members()[0], second.members()[0]);
    }
}
