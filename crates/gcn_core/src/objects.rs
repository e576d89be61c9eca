//! Typed content objects.
//!
//! Each type wraps a [`Handle`] and exposes exactly the operations its kind
//! supports; [`ObjectKind::capabilities`] lists the same surface for
//! runtime inspection.

use crate::cache_key::CacheKey;
use crate::callback::Callbacks;
use crate::context::Gcn;
use crate::error::{GcnError, Result};
use crate::multichannel;
use crate::object::{extract_object, Handle};
use crate::pubsub::channels;
use crate::transport::HttpRequest;
use crate::types::{ChannelId, ObjectId, ObjectKind};
use serde_json::{json, Map, Value};
use std::rc::Weak;

/// Behaviour shared by every typed content object.
pub trait ContentObject: Sized + 'static {
    /// The object type this wrapper stands for.
    const KIND: ObjectKind;

    /// Wraps a handle of kind [`KIND`](Self::KIND).
    fn from_handle(handle: Handle) -> Self;

    /// The underlying cache-backed handle.
    fn handle(&self) -> &Handle;

    /// Current server id.
    fn id(&self) -> ObjectId {
        self.handle().id()
    }

    /// Channel scope.
    fn channel(&self) -> ChannelId {
        self.handle().channel()
    }

    /// Whether full server state is present.
    fn is_fetched(&self) -> bool {
        self.handle().is_fetched()
    }

    /// Snapshot of the object's data.
    fn data(&self) -> Value {
        self.handle().data()
    }

    /// Reads a field, scheduling a refetch on an unfetched object.
    fn prop(&self, name: &str) -> Option<Value> {
        self.handle().prop(name)
    }

    /// Writes a field for the next save.
    fn set_prop(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.handle().set_prop(name, value)
    }

    /// Drops all data but the id.
    fn clear(&self) {
        self.handle().clear()
    }

    /// Removes the object from under its own cache key.
    fn decache(&self) -> bool {
        self.handle().decache()
    }

    /// Fetches the object if needed, then calls back.
    fn load(&self, callbacks: Callbacks<Self>) {
        self.handle().load(callbacks.map(Self::from_handle))
    }

    /// Reference identity with another wrapper of the same type.
    fn same_instance(&self, other: &Self) -> bool {
        self.handle().ptr_eq(other.handle())
    }
}

macro_rules! content_object {
    ($(#[$meta:meta])* $name:ident, $kind:expr) => {
        $(#[$meta])*
        #[derive(Clone, Debug)]
        pub struct $name {
            handle: Handle,
        }

        impl ContentObject for $name {
            const KIND: ObjectKind = $kind;

            fn from_handle(handle: Handle) -> Self {
                Self { handle }
            }

            fn handle(&self) -> &Handle {
                &self.handle
            }
        }
    };
}

content_object!(
    /// A node or channel.
    Node,
    ObjectKind::Node
);
content_object!(
    /// A folder.
    Folder,
    ObjectKind::Folder
);
content_object!(
    /// A page.
    Page,
    ObjectKind::Page
);
content_object!(
    /// A tag inside a page. Its id is the tag name.
    Tag,
    ObjectKind::Tag
);
content_object!(
    /// A page template.
    Template,
    ObjectKind::Template
);
content_object!(
    /// A file.
    File,
    ObjectKind::File
);
content_object!(
    /// An image.
    Image,
    ObjectKind::Image
);

impl Gcn {
    /// Requests an object of type `T`. See [`Gcn::request`].
    pub fn object<T: ContentObject>(
        &self,
        id: impl Into<ObjectId>,
        channel: ChannelId,
        callbacks: Callbacks<T>,
    ) -> T {
        T::from_handle(self.request(T::KIND, id, channel, callbacks.map(T::from_handle)))
    }

    /// Requests a node.
    pub fn node(
        &self,
        id: impl Into<ObjectId>,
        channel: ChannelId,
        callbacks: Callbacks<Node>,
    ) -> Node {
        self.object(id, channel, callbacks)
    }

    /// Requests a folder.
    pub fn folder(
        &self,
        id: impl Into<ObjectId>,
        channel: ChannelId,
        callbacks: Callbacks<Folder>,
    ) -> Folder {
        self.object(id, channel, callbacks)
    }

    /// Requests a page.
    pub fn page(
        &self,
        id: impl Into<ObjectId>,
        channel: ChannelId,
        callbacks: Callbacks<Page>,
    ) -> Page {
        self.object(id, channel, callbacks)
    }

    /// Requests a template.
    pub fn template(
        &self,
        id: impl Into<ObjectId>,
        channel: ChannelId,
        callbacks: Callbacks<Template>,
    ) -> Template {
        self.object(id, channel, callbacks)
    }

    /// Requests a file.
    pub fn file(
        &self,
        id: impl Into<ObjectId>,
        channel: ChannelId,
        callbacks: Callbacks<File>,
    ) -> File {
        self.object(id, channel, callbacks)
    }

    /// Requests an image.
    pub fn image(
        &self,
        id: impl Into<ObjectId>,
        channel: ChannelId,
        callbacks: Callbacks<Image>,
    ) -> Image {
        self.object(id, channel, callbacks)
    }
}

fn missing(handle: &Handle, what: &str) -> GcnError {
    GcnError::Server {
        code: "NOTFOUND".into(),
        message: format!("{} has no {}", handle.hash(), what),
        data: None,
    }
}

/// Follows an id field of a loaded object to another object.
fn related<T: ContentObject>(handle: &Handle, field: &'static str, callbacks: Callbacks<T>) {
    handle.with_loaded(callbacks, move |gcn, handle, callbacks| {
        match handle.raw_prop(field).as_ref().and_then(ObjectId::from_value) {
            Some(id) => {
                gcn.object::<T>(id, handle.channel(), callbacks);
                Ok(())
            }
            None => gcn.fail(missing(&handle, field), callbacks),
        }
    });
}

/// Loads a listing below `handle` and registers every entry in the cache.
fn listing<T: ContentObject>(
    handle: &Handle,
    action: &str,
    field: &'static str,
    callbacks: Callbacks<Vec<T>>,
) {
    let gcn = match handle.context() {
        Ok(gcn) => gcn,
        Err(e) => {
            callbacks.reject(&e);
            return;
        }
    };
    let channel = handle.channel();
    let request = HttpRequest::get(handle.action_path(action))
        .with_query_opt("nodeId", channel.as_query());
    let g = gcn.clone();
    gcn.rest().call(
        request,
        Box::new(move |result| {
            let adopted = result.and_then(|body| {
                body.get(field)
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|entry| match entry {
                        Value::Object(data) => Some(data),
                        _ => None,
                    })
                    .map(|data| g.adopt(T::KIND, channel, data).map(T::from_handle))
                    .collect::<Result<Vec<T>>>()
            });
            match adopted {
                Ok(objects) => {
                    callbacks.succeed(objects);
                    Ok(())
                }
                Err(err) => g.fail(err, callbacks),
            }
        }),
    );
}

/// `save`, `remove` and the localization pair for a wrapper type.
macro_rules! persistable {
    ($name:ident) => {
        impl $name {
            /// Sends local changes to the backend.
            pub fn save(&self, callbacks: Callbacks<$name>) {
                self.handle.save(callbacks.map($name::from_handle))
            }

            /// Deletes the object and drops every cache key it was reachable under.
            pub fn remove(&self, callbacks: Callbacks<()>) {
                self.handle.remove(callbacks)
            }
        }
    };
}

macro_rules! localizable {
    ($name:ident) => {
        impl $name {
            /// Creates a channel-local copy of this inherited object.
            pub fn localize(&self, callbacks: Callbacks<$name>) {
                multichannel::localize(&self.handle, callbacks.map($name::from_handle))
            }

            /// Removes this channel-local copy, reverting to the inherited object.
            pub fn unlocalize(&self, callbacks: Callbacks<$name>) {
                multichannel::unlocalize(&self.handle, callbacks.map($name::from_handle))
            }

            /// The folder this object lives in.
            pub fn folder(&self, callbacks: Callbacks<Folder>) {
                related(&self.handle, "folderId", callbacks)
            }
        }
    };
}

persistable!(Folder);
persistable!(Page);
persistable!(Template);
persistable!(File);
persistable!(Image);

localizable!(Page);
localizable!(Template);
localizable!(File);
localizable!(Image);

impl Node {
    /// The node's root folder.
    pub fn folder(&self, callbacks: Callbacks<Folder>) {
        related(&self.handle, "folderId", callbacks)
    }
}

impl Folder {
    /// A page by id, in this folder's channel.
    pub fn page(&self, id: impl Into<ObjectId>, callbacks: Callbacks<Page>) -> Page {
        self.object_in_channel(id, callbacks)
    }

    /// A folder by id, in this folder's channel.
    pub fn folder(&self, id: impl Into<ObjectId>, callbacks: Callbacks<Folder>) -> Folder {
        self.object_in_channel(id, callbacks)
    }

    fn object_in_channel<T: ContentObject>(
        &self,
        id: impl Into<ObjectId>,
        callbacks: Callbacks<T>,
    ) -> T {
        match self.handle.context() {
            Ok(gcn) => gcn.object(id, self.channel(), callbacks),
            Err(err) => {
                let handle = Handle::detached(T::KIND, id.into(), self.channel());
                callbacks.reject(&err);
                T::from_handle(handle)
            }
        }
    }

    /// Pages directly in this folder.
    pub fn pages(&self, callbacks: Callbacks<Vec<Page>>) {
        listing(&self.handle, "getPages", "pages", callbacks)
    }

    /// Subfolders of this folder.
    pub fn folders(&self, callbacks: Callbacks<Vec<Folder>>) {
        listing(&self.handle, "getFolders", "folders", callbacks)
    }

    /// Creates a page from `template` in this folder.
    pub fn create_page(&self, template: impl Into<ObjectId>, callbacks: Callbacks<Page>) {
        let gcn = match self.handle.context() {
            Ok(gcn) => gcn,
            Err(e) => {
                callbacks.reject(&e);
                return;
            }
        };
        let channel = self.channel();
        let mut body = json!({
            "folderId": self.id().to_value(),
            "templateId": template.into().to_value(),
        });
        if !channel.is_none() {
            body["nodeId"] = json!(channel.0);
        }
        let g = gcn.clone();
        gcn.rest().call(
            HttpRequest::post("/page/create", body),
            Box::new(move |result| {
                match result
                    .and_then(|body| extract_object(ObjectKind::Page, &body))
                    .and_then(|data| g.adopt(ObjectKind::Page, channel, data))
                {
                    Ok(handle) => {
                        callbacks.succeed(Page::from_handle(handle));
                        Ok(())
                    }
                    Err(err) => g.fail(err, callbacks),
                }
            }),
        );
    }

    /// Creates a channel-local copy of this inherited folder.
    pub fn localize(&self, callbacks: Callbacks<Folder>) {
        multichannel::localize(&self.handle, callbacks.map(Folder::from_handle))
    }

    /// Removes this channel-local copy.
    pub fn unlocalize(&self, callbacks: Callbacks<Folder>) {
        multichannel::unlocalize(&self.handle, callbacks.map(Folder::from_handle))
    }
}

impl Page {
    fn action(&self, action: &'static str, callbacks: Callbacks<Page>) {
        let page = self.clone();
        self.handle.post_action(
            action,
            json!({}),
            callbacks.map(move |_body: Value| {
                // server-side state changed; refetch lazily
                page.handle.clear();
                page
            }),
        );
    }

    /// Releases the edit lock.
    pub fn unlock(&self, callbacks: Callbacks<Page>) {
        self.action("cancel", callbacks)
    }

    /// Takes the page offline.
    pub fn take_offline(&self, callbacks: Callbacks<Page>) {
        self.action("takeOffline", callbacks)
    }

    /// Publishes the page.
    pub fn publish(&self, callbacks: Callbacks<Page>) {
        self.action("publish", callbacks)
    }

    /// Renders a preview of the page including unsaved changes, then runs it
    /// through the `page.rendered` pipeline.
    pub fn preview(&self, callbacks: Callbacks<String>) {
        self.handle.with_loaded(callbacks, |gcn, handle, callbacks| {
            let request = HttpRequest::post("/preview/page", json!({ "page": handle.data() }))
                .with_query_opt("nodeId", handle.channel().as_query());
            let g = gcn.clone();
            gcn.rest().call(
                request,
                Box::new(move |result| {
                    let html = result.and_then(|body| {
                        body.get("preview")
                            .and_then(Value::as_str)
                            .map(str::to_string)
                            .ok_or_else(|| missing(&handle, "preview"))
                    });
                    match html {
                        Ok(html) => {
                            g.events().render(channels::PAGE_RENDERED, html, &handle, move |html| {
                                callbacks.succeed(html)
                            });
                            Ok(())
                        }
                        Err(err) => g.fail(err, callbacks),
                    }
                }),
            );
            Ok(())
        });
    }

    /// The page's template.
    pub fn template(&self, callbacks: Callbacks<Template>) {
        related(&self.handle, "templateId", callbacks)
    }

    /// A tag of this page, chained to it.
    pub fn tag(&self, name: &str, callbacks: Callbacks<Tag>) -> Tag {
        let parent = self.handle.requested_key();
        let key = CacheKey::derive(
            ObjectKind::Tag,
            self.channel(),
            ObjectId::Name(name.to_string()),
            Some(&parent),
        );
        let callbacks = callbacks.map(Tag::from_handle);
        match self.handle.context() {
            Ok(gcn) => Tag::from_handle(gcn.request_key(key, Some(parent), callbacks)),
            Err(_) => {
                let handle = Handle::new(Weak::new(), key, Some(parent));
                handle.load(callbacks);
                Tag::from_handle(handle)
            }
        }
    }
}

impl Tag {
    /// Tag name.
    pub fn name(&self) -> String {
        self.id().to_string()
    }

    /// The page this tag was obtained from, looked up in the cache.
    pub fn parent(&self) -> Option<Page> {
        let gcn = self.handle.context().ok()?;
        let key = self.handle.chain_parent()?;
        gcn.cache().get(&key).map(Page::from_handle)
    }

    /// A part (property) of the tag.
    pub fn part(&self, name: &str) -> Option<Value> {
        self.prop("properties")
            .and_then(|props| props.get(name).cloned())
    }

    /// Replaces a part; saved with the next [`save`](Self::save).
    pub fn set_part(&self, name: &str, value: Value) -> Result<()> {
        let mut properties = match self.handle.raw_prop("properties") {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        properties.insert(name.to_string(), value);
        self.set_prop("properties", Value::Object(properties))
    }

    fn parent_or_fail<T: 'static>(&self, callbacks: Callbacks<T>) -> Option<(Page, Callbacks<T>)> {
        match self.parent() {
            Some(page) => Some((page, callbacks)),
            None => {
                let err = missing(&self.handle, "cached parent page");
                match self.handle.context() {
                    Ok(gcn) => gcn.fail_later(err, callbacks),
                    Err(e) => {
                        callbacks.reject(&e);
                    }
                }
                None
            }
        }
    }

    fn render_through(&self, edit: bool, callbacks: Callbacks<String>) {
        let Some((page, callbacks)) = self.parent_or_fail(callbacks) else {
            return;
        };
        let tag = self.handle.clone();
        page.handle.with_loaded(callbacks, move |gcn, page, callbacks| {
            let mut request = HttpRequest::get(format!("/page/renderTag/{}", tag.id()))
                .with_query("pageId", page.id().to_string())
                .with_query_opt("nodeId", page.channel().as_query());
            if edit {
                request = request.with_query("edit", "true");
            }
            let channel = if edit {
                channels::CONTENT_RENDERED
            } else {
                channels::TAG_RENDERED
            };
            let g = gcn.clone();
            gcn.rest().call(
                request,
                Box::new(move |result| {
                    let html = result.and_then(|body| {
                        body.get("content")
                            .and_then(Value::as_str)
                            .map(str::to_string)
                            .ok_or_else(|| missing(&tag, "rendered content"))
                    });
                    match html {
                        Ok(html) => {
                            g.events()
                                .render(channel, html, &tag, move |html| callbacks.succeed(html));
                            Ok(())
                        }
                        Err(err) => g.fail(err, callbacks),
                    }
                }),
            );
            Ok(())
        });
    }

    /// Renders the tag and runs the markup through `tag.rendered`.
    pub fn render(&self, callbacks: Callbacks<String>) {
        self.render_through(false, callbacks)
    }

    /// Renders the tag for editing and runs the markup through `content-rendered`.
    pub fn edit(&self, callbacks: Callbacks<String>) {
        self.render_through(true, callbacks)
    }

    /// Saves the tag as part of its page.
    pub fn save(&self, callbacks: Callbacks<Tag>) {
        let Some((page, callbacks)) = self.parent_or_fail(callbacks) else {
            return;
        };
        let name = self.name();
        let body = json!({
            "page": {
                "id": page.id().to_value(),
                "tags": { name.clone(): self.data() },
            }
        });
        let tag = self.clone();
        let parent = page.handle.clone();
        page.handle.post_action(
            "save",
            body,
            callbacks.map(move |_body: Value| {
                let data = tag.data();
                parent.update_data(|page| {
                    if let Some(Value::Object(tags)) = page.get_mut("tags") {
                        tags.insert(name, data);
                    }
                });
                tag.handle.clear_changes();
                tag
            }),
        );
    }

    /// Deletes the tag from its page.
    pub fn remove(&self, callbacks: Callbacks<()>) {
        let Some((page, callbacks)) = self.parent_or_fail(callbacks) else {
            return;
        };
        let name = self.name();
        let body = json!({
            "page": { "id": page.id().to_value() },
            "delete": [name.clone()],
        });
        let tag = self.handle.clone();
        let parent = page.handle.clone();
        page.handle.post_action(
            "save",
            body,
            callbacks.map(move |_body: Value| {
                parent.update_data(|page| {
                    if let Some(Value::Object(tags)) = page.get_mut("tags") {
                        tags.remove(&name);
                    }
                });
                if let Ok(gcn) = tag.context() {
                    gcn.cache().remove_all(&tag);
                }
                tag.clear();
                tag.mark_stale();
            }),
        );
    }
}
