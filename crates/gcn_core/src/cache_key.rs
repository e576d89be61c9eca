//! Composite cache keys and the rules that derive them from server responses.

use crate::types::{ChannelId, ObjectId, ObjectKind};
use std::fmt;

/// Identity of a cache slot: type, channel, id, and for chained types the
/// key of the object they hang off.
///
/// `Display` renders the legacy string form `[chain::]Type:channel/id`.
///
/// # Examples
///
/// ```
/// use gcn_core::{CacheKey, ChannelId, ObjectKind};
///
/// let page = CacheKey::derive(ObjectKind::Page, ChannelId(2), 42u64.into(), None);
/// assert_eq!(page.to_string(), "Page:2/42");
///
/// let tag = CacheKey::derive(ObjectKind::Tag, ChannelId(2), "content".into(), Some(&page));
/// assert_eq!(tag.to_string(), "Page:2/42::Tag:2/content");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    kind: ObjectKind,
    channel: ChannelId,
    id: ObjectId,
    chain: Option<Box<CacheKey>>,
}

impl CacheKey {
    /// Derives the key for `(kind, channel, id)`.
    ///
    /// `chain` is only kept for kinds that need chained hashing; for every
    /// other kind it is ignored so that the same object reached through
    /// different parents shares one slot.
    pub fn derive(
        kind: ObjectKind,
        channel: ChannelId,
        id: ObjectId,
        chain: Option<&CacheKey>,
    ) -> Self {
        let chain = if kind.needs_chained_hash() {
            chain.map(|c| Box::new(c.clone()))
        } else {
            None
        };
        Self {
            kind,
            channel,
            id,
            chain,
        }
    }

    /// Object type of this slot.
    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// Channel of this slot.
    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    /// Object id of this slot.
    pub fn id(&self) -> &ObjectId {
        &self.id
    }

    /// Key of the parent object, for chained kinds.
    pub fn chain(&self) -> Option<&CacheKey> {
        self.chain.as_deref()
    }

    /// The same slot with a different id.
    pub fn with_id(&self, id: ObjectId) -> Self {
        Self {
            id,
            ..self.clone()
        }
    }

    /// The same slot in a different channel.
    pub fn with_channel(&self, channel: ChannelId) -> Self {
        Self {
            channel,
            ..self.clone()
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(chain) = &self.chain {
            write!(f, "{}::", chain)?;
        }
        write!(f, "{}:{}/{}", self.kind, self.channel, self.id)
    }
}

/// True exactly when a channel was requested and the server answered with a
/// different id: the channel-local copy was substituted for the inherited
/// object.
pub fn is_localized_response(
    channel: ChannelId,
    requested: &ObjectId,
    responded: &ObjectId,
) -> bool {
    !channel.is_none() && requested != responded
}

/// Every key a fetched object must be reachable under.
///
/// Always the requested key. For a localized response additionally the
/// response id globally (channel 0) and in the requested channel.
pub fn key_variations(requested: &CacheKey, responded: &ObjectId) -> Vec<CacheKey> {
    let mut keys = vec![requested.clone()];
    if is_localized_response(requested.channel(), requested.id(), responded) {
        for key in [
            requested.with_channel(ChannelId::NONE).with_id(responded.clone()),
            requested.with_id(responded.clone()),
        ] {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
    }
    keys
}
