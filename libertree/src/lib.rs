//! Liberty group/attribute tree for EDA applications.
//!
//! ## How to use
//! Build a [`Group`] by hand or with [`decode`] from the JSON
//! shape produced by `liberty2json`, then turn it into Liberty
//! text with [`encode`].
//!
//! The tree root is a plain mapping holding a `library` entry,
//! exactly like the JSON document it is decoded from.
//! A group without attributes is a *name layer*: every child key
//! becomes the identifier of a `parent (key) { ... }` header.

use compact_str::CompactString;
use indexmap::IndexMap;
use std::fmt;

/// Group kinds emitted as `kind () { ... }`, without an identifier.
pub const NAMELESS_GROUPS: [&str; 6] = [
    "timing", "memory", "memory_read", "memory_write",
    "internal_power", "leakage_power"
];

/// Attribute that always renders as a parenthesized call,
/// e.g. `capacitive_load_unit (1,pf);`.
pub const CALL_ATTRIBUTE: &str = "capacitive_load_unit";

/// Key never treated as an attribute.
pub const COMMENT_KEY: &str = "comment";

/// Default indentation width of nested groups.
pub const DEFAULT_INDENT: usize = 2;

/// One attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Str(CompactString),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Flat tuple of scalars, `key ("a, b");`.
    List(Vec<AttrValue>),
    /// Tuple of tuples, rendered as a continued multi-line list.
    Table(Vec<Vec<AttrValue>>)
}

/// A Liberty group: ordered attributes, then ordered child
/// collections. A collection may hold several instances.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Group {
    pub attributes: IndexMap<CompactString, AttrValue>,
    pub groups: IndexMap<CompactString, Vec<Group>>
}

mod decode;
pub use decode::decode;

mod encode;
pub use encode::{ encode, encode_with_indent };

impl AttrValue {
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s.as_str()),
            _ => None
        }
    }

    /// Numeric view; booleans count as 0/1 the way
    /// `liberty2json` writes them.
    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            AttrValue::Int(i) => Some(i as f64),
            AttrValue::Float(f) => Some(f),
            AttrValue::Bool(b) => Some(b as i64 as f64),
            _ => None
        }
    }

    #[inline]
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            AttrValue::Int(i) => Some(i),
            AttrValue::Float(f) if f.fract() == 0.0 => Some(f as i64),
            AttrValue::Bool(b) => Some(b as i64),
            _ => None
        }
    }

    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            AttrValue::Bool(b) => Some(b),
            AttrValue::Int(i) => Some(i != 0),
            _ => None
        }
    }

    #[inline]
    pub fn as_list(&self) -> Option<&[AttrValue]> {
        match self {
            AttrValue::List(l) => Some(&l[..]),
            _ => None
        }
    }

    #[inline]
    pub fn is_scalar(&self) -> bool {
        !matches!(self, AttrValue::List(_) | AttrValue::Table(_))
    }
}

/// Bare text of a value, without quoting.
impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Str(s) => write!(f, "{}", s),
            AttrValue::Int(i) => write!(f, "{}", i),
            AttrValue::Float(v) => write!(f, "{}", format!("{:?}", v).to_lowercase()),
            AttrValue::Bool(b) => write!(f, "{}", b),
            AttrValue::List(l) => write_joined(f, l),
            AttrValue::Table(rows) => {
                for (i, row) in rows.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "(")?;
                    write_joined(f, row)?;
                    write!(f, ")")?;
                }
                Ok(())
            }
        }
    }
}

#[inline]
pub(crate) fn write_joined(f: &mut impl fmt::Write, items: &[AttrValue]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 { write!(f, ", ")?; }
        write!(f, "{}", item)?;
    }
    Ok(())
}

macro_rules! impl_from {
    ($($t:ty => |$v:ident| $e:expr),+) => {
        $(impl From<$t> for AttrValue {
            #[inline]
            fn from($v: $t) -> Self { $e }
        })+
    }
}

impl_from! {
    &str => |v| AttrValue::Str(v.into()),
    String => |v| AttrValue::Str(v.into()),
    CompactString => |v| AttrValue::Str(v),
    i64 => |v| AttrValue::Int(v),
    usize => |v| AttrValue::Int(v as i64),
    f64 => |v| AttrValue::Float(v),
    bool => |v| AttrValue::Bool(v),
    Vec<f64> => |v| AttrValue::List(v.into_iter().map(AttrValue::Float).collect()),
    Vec<usize> => |v| AttrValue::List(
        v.into_iter().map(|i| AttrValue::Int(i as i64)).collect())
}

impl Group {
    #[inline]
    pub fn new() -> Group {
        Group::default()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.groups.is_empty()
    }

    #[inline]
    pub fn attr(&self, key: &str) -> Option<&AttrValue> {
        self.attributes.get(key)
    }

    /// Set an attribute. Re-setting a key keeps its position.
    #[inline]
    pub fn set_attr(&mut self, key: impl Into<CompactString>, value: impl Into<AttrValue>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Builder flavour of [`Group::set_attr`].
    #[inline]
    pub fn with_attr(mut self, key: impl Into<CompactString>, value: impl Into<AttrValue>) -> Group {
        self.set_attr(key, value);
        self
    }

    /// All instances of a child kind, empty when absent.
    #[inline]
    pub fn groups(&self, kind: &str) -> &[Group] {
        self.groups.get(kind).map(|g| &g[..]).unwrap_or(&[])
    }

    /// The first instance of a child kind.
    #[inline]
    pub fn group(&self, kind: &str) -> Option<&Group> {
        self.groups(kind).first()
    }

    /// Append one more instance to a child collection.
    #[inline]
    pub fn push_group(&mut self, kind: impl Into<CompactString>, group: Group) {
        self.groups.entry(kind.into()).or_default().push(group);
    }

    /// Replace a child collection by a single instance,
    /// keeping the collection's position.
    #[inline]
    pub fn set_group(&mut self, kind: impl Into<CompactString>, group: Group) {
        self.groups.insert(kind.into(), vec![group]);
    }

    /// Builder flavour of [`Group::set_group`].
    #[inline]
    pub fn with_group(mut self, kind: impl Into<CompactString>, group: Group) -> Group {
        self.set_group(kind, group);
        self
    }

    /// The name layer of a kind, created on first use.
    pub fn name_layer_mut(&mut self, kind: impl Into<CompactString>) -> &mut Group {
        let collection = self.groups.entry(kind.into()).or_default();
        if collection.is_empty() {
            collection.push(Group::default());
        }
        &mut collection[0]
    }

    /// Insert `kind (ident) { ... }` through the kind's name layer.
    #[inline]
    pub fn insert_named(&mut self, kind: impl Into<CompactString>,
                        ident: impl Into<CompactString>, group: Group) {
        self.name_layer_mut(kind).set_group(ident, group);
    }

    /// Iterate `(ident, group)` pairs of a kind's name layers.
    pub fn named<'a>(&'a self, kind: &str) -> impl Iterator<Item = (&'a str, &'a Group)> + 'a {
        self.groups(kind).iter()
            .flat_map(|layer| layer.groups.iter())
            .flat_map(|(ident, gs)| gs.iter().map(move |g| (ident.as_str(), g)))
    }

    /// Number of instances of `kind` anywhere below this group.
    pub fn count_kind(&self, kind: &str) -> usize {
        self.groups.iter().map(|(k, gs)| {
            let own = if k.as_str() == kind { gs.len() } else { 0 };
            own + gs.iter().map(|g| g.count_kind(kind)).sum::<usize>()
        }).sum()
    }
}
