//! Identifier and type-discriminator types shared across the client.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Discriminator of a content object type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObjectKind {
    /// A node; its own id doubles as a channel id.
    Node,
    /// A folder inside a node.
    Folder,
    /// A page inside a folder.
    Page,
    /// A binary file.
    File,
    /// An image file.
    Image,
    /// A page template.
    Template,
    /// A tag inside a page, reachable only through its page.
    Tag,
}

/// A method a content object type exposes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    /// `folder()`: the containing (or root) folder.
    Folder,
    /// `folders()`: child folders.
    Folders,
    /// `page(id)`: a page in this folder.
    Page,
    /// `pages()`: pages in this folder.
    Pages,
    /// `create_page()`
    CreatePage,
    /// `template()`
    Template,
    /// `tag(name)`
    Tag,
    /// `parent()`: the object a chained handle hangs off.
    Parent,
    /// `part(name)`
    Part,
    /// `render()`
    Render,
    /// `edit()`
    Edit,
    /// `save()`
    Save,
    /// `remove()`
    Remove,
    /// `unlock()`
    Unlock,
    /// `take_offline()`
    TakeOffline,
    /// `preview()`
    Preview,
    /// `publish()`
    Publish,
    /// `localize()` / `unlocalize()`
    Localize,
}

impl ObjectKind {
    /// All object kinds.
    pub const ALL: [ObjectKind; 7] = [
        ObjectKind::Node,
        ObjectKind::Folder,
        ObjectKind::Page,
        ObjectKind::File,
        ObjectKind::Image,
        ObjectKind::Template,
        ObjectKind::Tag,
    ];

    /// Type name as it appears in cache keys (`Page`, `Folder`, ...).
    pub fn name(self) -> &'static str {
        match self {
            ObjectKind::Node => "Node",
            ObjectKind::Folder => "Folder",
            ObjectKind::Page => "Page",
            ObjectKind::File => "File",
            ObjectKind::Image => "Image",
            ObjectKind::Template => "Template",
            ObjectKind::Tag => "Tag",
        }
    }

    /// REST path segment and response field (`page`, `folder`, ...).
    pub fn rest_name(self) -> &'static str {
        match self {
            ObjectKind::Node => "node",
            ObjectKind::Folder => "folder",
            ObjectKind::Page => "page",
            ObjectKind::File => "file",
            ObjectKind::Image => "image",
            ObjectKind::Template => "template",
            ObjectKind::Tag => "tag",
        }
    }

    /// Parses a REST name or type name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        let lower = s.to_ascii_lowercase();
        Self::ALL.into_iter().find(|k| k.rest_name() == lower)
    }

    /// Kinds whose cache key is scoped by the key of the object they hang off.
    pub fn needs_chained_hash(self) -> bool {
        matches!(self, ObjectKind::Tag)
    }

    /// The method surface of this kind. The typed wrappers expose exactly these.
    pub fn capabilities(self) -> &'static [Capability] {
        use Capability::*;
        match self {
            ObjectKind::Node => &[Folder],
            ObjectKind::Folder => &[
                Page, Pages, CreatePage, Folder, Folders, Save, Remove, Localize,
            ],
            ObjectKind::Page => &[
                Remove,
                Unlock,
                TakeOffline,
                Preview,
                Publish,
                Save,
                Folder,
                Template,
                Tag,
                Localize,
            ],
            ObjectKind::Tag => &[Remove, Parent, Part, Render, Edit, Save],
            ObjectKind::Template => &[Remove, Save, Folder, Localize],
            ObjectKind::File | ObjectKind::Image => &[Remove, Save, Folder, Localize],
        }
    }

    /// Whether this kind exposes `capability`.
    pub fn supports(self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    /// Attributes the backend owns; writing them is rejected locally.
    pub fn readonly_attributes(self) -> &'static [&'static str] {
        match self {
            ObjectKind::Tag => &["id", "constructId", "type"],
            ObjectKind::Node => &["id", "folderId", "creator", "cdate"],
            _ => &[
                "id", "globalId", "inherited", "creator", "editor", "cdate", "edate",
                "masterNode", "masterId", "inheritedFrom",
            ],
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Server-assigned identifier of a content object: numeric, or a name for tags.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObjectId {
    /// Numeric local id.
    Num(u64),
    /// Global id or tag name.
    Name(String),
}

impl ObjectId {
    /// Reads an id from a JSON value. Numeric strings normalize to `Num`.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_u64().map(ObjectId::Num),
            Value::String(s) => Some(ObjectId::from(s.as_str())),
            _ => None,
        }
    }

    /// The id as a JSON value.
    pub fn to_value(&self) -> Value {
        match self {
            ObjectId::Num(n) => Value::from(*n),
            ObjectId::Name(s) => Value::from(s.clone()),
        }
    }

    /// The numeric id, if it is one.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            ObjectId::Num(n) => Some(*n),
            ObjectId::Name(_) => None,
        }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectId::Num(n) => write!(f, "{}", n),
            ObjectId::Name(s) => f.write_str(s),
        }
    }
}

impl From<u64> for ObjectId {
    fn from(n: u64) -> Self {
        ObjectId::Num(n)
    }
}

impl From<u32> for ObjectId {
    fn from(n: u32) -> Self {
        ObjectId::Num(u64::from(n))
    }
}

impl From<&str> for ObjectId {
    fn from(s: &str) -> Self {
        match s.parse::<u64>() {
            Ok(n) => ObjectId::Num(n),
            Err(_) => ObjectId::Name(s.to_string()),
        }
    }
}

impl From<String> for ObjectId {
    fn from(s: String) -> Self {
        ObjectId::from(s.as_str())
    }
}

/// Channel (node) scope of a request. Zero means "no channel".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct ChannelId(pub u32);

impl ChannelId {
    /// No multichannelling in effect.
    pub const NONE: ChannelId = ChannelId(0);

    /// True when no channel is in effect.
    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    /// The channel as a `nodeId` query value, if one is in effect.
    pub fn as_query(self) -> Option<String> {
        (!self.is_none()).then(|| self.0.to_string())
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ChannelId {
    fn from(n: u32) -> Self {
        ChannelId(n)
    }
}

/// The authenticated user, as returned by login and `/user/me`.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct User {
    /// User id.
    pub id: u64,
    /// Login name.
    pub login: String,
    /// First name.
    pub first_name: String,
    /// Last name.
    pub last_name: String,
    /// E-mail address.
    pub email: String,
}
