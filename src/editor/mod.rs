//! Edit operations
//!
//! The write surface of the system. Every operation here mutates content
//! through the store gateway, runs the asset lifecycle when an image
//! changed, and finishes by invalidating the mutated concern's dependent
//! views.
//!
//! Asset replacement always runs upload-new, then write-record, then
//! delete-old, so a record never points at a deleted asset if a step
//! fails. A failed delete-old is logged and swallowed: the orphan is
//! collected later by the sweep.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::assets::{AssetError, AssetStore, Bucket, SweepReport};
use crate::invalidate::Invalidator;
use crate::store::{
    AboutIntro, CollectionRecord, ContactSubmission, ContactSubmissionNew, ContentStore, Filter,
    ImagePatch, Partner, Project, SingletonRecord, SiteIdentity, StoreError, TeamMember,
};

/// Failure of an edit operation, with a human-readable reason
#[derive(Error, Debug)]
pub enum EditError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Asset(#[from] AssetError),
}

pub type EditResult<T> = Result<T, EditError>;

/// An inline image accompanying an edit: base64 payload (optionally with a
/// `data:` header), original file name, and content type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageUpload {
    pub payload: String,
    pub file_name: String,
    pub content_type: String,
}

#[derive(Serialize)]
struct ReadFlagPatch {
    is_read: bool,
}

/// The admin-facing edit API.
///
/// Cheap to clone; clones share the store, asset manager, and invalidator.
#[derive(Clone)]
pub struct Editor {
    store: ContentStore,
    assets: AssetStore,
    invalidator: Arc<Invalidator>,
}

impl Editor {
    pub fn new(store: ContentStore, assets: AssetStore, invalidator: Arc<Invalidator>) -> Self {
        Self {
            store,
            assets,
            invalidator,
        }
    }

    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    pub fn assets(&self) -> &AssetStore {
        &self.assets
    }

    pub fn invalidator(&self) -> &Arc<Invalidator> {
        &self.invalidator
    }

    /// Create-or-update a singleton concern
    pub async fn edit_singleton<R, P>(&self, patch: &P) -> EditResult<R>
    where
        R: SingletonRecord,
        P: Serialize + Sync,
    {
        let record = self.store.upsert_singleton::<R, _>(patch).await?;
        self.invalidator.invalidate(R::CONCERN);
        Ok(record)
    }

    /// Create-or-update a singleton concern, replacing its image when one
    /// is supplied
    pub async fn edit_singleton_with_image<R, P>(
        &self,
        mut patch: P,
        image: Option<ImageUpload>,
    ) -> EditResult<R>
    where
        R: SingletonRecord,
        P: Serialize + ImagePatch + Send + Sync,
    {
        let bucket = R::IMAGE_BUCKET;
        let superseded = match (&image, bucket) {
            (Some(_), Some(_)) => self
                .store
                .singleton::<R>()
                .await?
                .and_then(|record| record.image_url().map(String::from)),
            _ => None,
        };

        if let (Some(image), Some(bucket)) = (image, bucket) {
            let stored = self
                .assets
                .upload(&image.payload, &image.file_name, bucket, &image.content_type)
                .await?;
            patch.set_image_url(stored.url);
        }

        let record = self.store.upsert_singleton::<R, _>(&patch).await?;

        if let (Some(old_url), Some(bucket)) = (superseded, bucket) {
            self.cleanup_asset(&old_url, bucket).await;
        }
        self.invalidator.invalidate(R::CONCERN);
        Ok(record)
    }

    /// Append a collection row
    pub async fn add_item<R, P>(&self, fields: &P) -> EditResult<R>
    where
        R: CollectionRecord,
        P: Serialize + Sync,
    {
        let record = self.store.add::<R, _>(fields).await?;
        self.invalidator.invalidate(R::CONCERN);
        Ok(record)
    }

    /// Append a collection row with an uploaded image
    pub async fn add_item_with_image<R, P>(
        &self,
        mut fields: P,
        image: Option<ImageUpload>,
    ) -> EditResult<R>
    where
        R: CollectionRecord,
        P: Serialize + ImagePatch + Send + Sync,
    {
        if let (Some(image), Some(bucket)) = (image, R::IMAGE_BUCKET) {
            let stored = self
                .assets
                .upload(&image.payload, &image.file_name, bucket, &image.content_type)
                .await?;
            fields.set_image_url(stored.url);
        }
        let record = self.store.add::<R, _>(&fields).await?;
        self.invalidator.invalidate(R::CONCERN);
        Ok(record)
    }

    /// Patch a collection row
    pub async fn update_item<R, P>(&self, id: Uuid, patch: &P) -> EditResult<R>
    where
        R: CollectionRecord,
        P: Serialize + Sync,
    {
        let record = self.store.update_in::<R, _>(id, patch).await?;
        self.invalidator.invalidate(R::CONCERN);
        Ok(record)
    }

    /// Patch a collection row, replacing its image when one is supplied.
    ///
    /// The new asset is uploaded and the record updated before the old
    /// asset is touched, so the stored URL never points at a deleted
    /// object.
    pub async fn update_item_with_image<R, P>(
        &self,
        id: Uuid,
        mut patch: P,
        image: Option<ImageUpload>,
    ) -> EditResult<R>
    where
        R: CollectionRecord,
        P: Serialize + ImagePatch + Send + Sync,
    {
        let bucket = R::IMAGE_BUCKET;
        let superseded = match (&image, bucket) {
            (Some(_), Some(_)) => self
                .store
                .get_one::<R>(id)
                .await?
                .and_then(|record| record.image_url().map(String::from)),
            _ => None,
        };

        if let (Some(image), Some(bucket)) = (image, bucket) {
            let stored = self
                .assets
                .upload(&image.payload, &image.file_name, bucket, &image.content_type)
                .await?;
            patch.set_image_url(stored.url);
        }

        let record = self.store.update_in::<R, _>(id, &patch).await?;

        if let (Some(old_url), Some(bucket)) = (superseded, bucket) {
            self.cleanup_asset(&old_url, bucket).await;
        }
        self.invalidator.invalidate(R::CONCERN);
        Ok(record)
    }

    /// Delete a collection row and best-effort delete its asset
    pub async fn remove_item<R: CollectionRecord>(&self, id: Uuid) -> EditResult<()> {
        let removed = self.store.get_one::<R>(id).await?;
        self.store.remove::<R>(id).await?;

        if let (Some(record), Some(bucket)) = (removed, R::IMAGE_BUCKET) {
            if let Some(url) = record.image_url() {
                self.cleanup_asset(url, bucket).await;
            }
        }
        self.invalidator.invalidate(R::CONCERN);
        Ok(())
    }

    /// Reassign display order; see [`ContentStore::reorder`] for the
    /// partial-failure window
    pub async fn reorder<R: CollectionRecord>(&self, ordered_ids: &[Uuid]) -> EditResult<()> {
        self.store.reorder::<R>(ordered_ids).await?;
        self.invalidator.invalidate(R::CONCERN);
        Ok(())
    }

    /// Record a message from the public contact form
    pub async fn submit_contact_message(
        &self,
        message: &ContactSubmissionNew,
    ) -> EditResult<ContactSubmission> {
        let record = self.store.add::<ContactSubmission, _>(message).await?;
        self.invalidator.invalidate(ContactSubmission::CONCERN);
        Ok(record)
    }

    /// Toggle a contact message's read flag
    pub async fn set_message_read(
        &self,
        id: Uuid,
        is_read: bool,
    ) -> EditResult<ContactSubmission> {
        let record = self
            .store
            .update_in::<ContactSubmission, _>(id, &ReadFlagPatch { is_read })
            .await?;
        self.invalidator.invalidate(ContactSubmission::CONCERN);
        Ok(record)
    }

    /// Every asset URL currently referenced by a content record
    pub async fn referenced_asset_urls(&self) -> EditResult<HashSet<String>> {
        let mut urls = HashSet::new();

        if let Some(identity) = self.store.singleton::<SiteIdentity>().await? {
            urls.extend(identity.image_url().map(String::from));
        }
        if let Some(about) = self.store.singleton::<AboutIntro>().await? {
            urls.extend(about.image_url().map(String::from));
        }
        for member in self.store.list::<TeamMember>(Filter::default()).await? {
            urls.extend(member.image_url().map(String::from));
        }
        for project in self.store.list::<Project>(Filter::default()).await? {
            urls.extend(project.image_url().map(String::from));
        }
        for partner in self.store.list::<Partner>(Filter::default()).await? {
            urls.extend(partner.image_url().map(String::from));
        }
        Ok(urls)
    }

    /// Delete aged, unreferenced objects from `bucket`
    pub async fn sweep_orphans(
        &self,
        bucket: Bucket,
        grace: Duration,
        dry_run: bool,
    ) -> EditResult<SweepReport> {
        let referenced = self.referenced_asset_urls().await?;
        Ok(self.assets.sweep(bucket, &referenced, grace, dry_run).await?)
    }

    /// Best-effort deletion of a superseded asset. Failure is logged and
    /// swallowed so cleanup never blocks or rolls back a content update.
    async fn cleanup_asset(&self, url: &str, bucket: Bucket) {
        if let Err(err) = self.assets.delete_by_url(url, bucket).await {
            tracing::warn!("failed to delete superseded asset {}: {}", url, err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{AssetResult, MemoryObjectBackend, ObjectBackend};
    use crate::store::{
        AboutIntroPatch, MemoryBackend, Order, StoreBackend, StoreResult, TeamMemberPatch,
    };
    use base64::Engine;
    use serde_json::Value;
    use std::sync::Mutex;

    type EventLog = Arc<Mutex<Vec<String>>>;

    fn push(log: &EventLog, event: String) {
        log.lock().unwrap().push(event);
    }

    /// Store backend that mirrors calls into a shared event log, so tests
    /// can assert ordering across the store and the object store.
    struct LoggedStore {
        inner: Arc<MemoryBackend>,
        log: EventLog,
    }

    #[async_trait::async_trait]
    impl StoreBackend for LoggedStore {
        async fn select(
            &self,
            table: &str,
            filter: &Filter,
            order: &[Order],
        ) -> StoreResult<Vec<Value>> {
            self.inner.select(table, filter, order).await
        }

        async fn insert(&self, table: &str, row: Value) -> StoreResult<Value> {
            push(&self.log, format!("store:insert {table}"));
            self.inner.insert(table, row).await
        }

        async fn update(&self, table: &str, id: Uuid, patch: Value) -> StoreResult<Vec<Value>> {
            push(&self.log, format!("store:update {table}"));
            self.inner.update(table, id, patch).await
        }

        async fn delete(&self, table: &str, id: Uuid) -> StoreResult<()> {
            push(&self.log, format!("store:delete {table}"));
            self.inner.delete(table, id).await
        }
    }

    /// Object backend mirroring calls into the same event log; optionally
    /// fails every remove.
    struct LoggedObjects {
        inner: Arc<MemoryObjectBackend>,
        log: EventLog,
        fail_removes: bool,
    }

    #[async_trait::async_trait]
    impl ObjectBackend for LoggedObjects {
        async fn put(
            &self,
            bucket: Bucket,
            path: &str,
            bytes: Vec<u8>,
            content_type: &str,
        ) -> AssetResult<()> {
            push(&self.log, format!("assets:put {path}"));
            self.inner.put(bucket, path, bytes, content_type).await
        }

        async fn remove(&self, bucket: Bucket, paths: &[String]) -> AssetResult<()> {
            for path in paths {
                push(&self.log, format!("assets:remove {path}"));
            }
            if self.fail_removes {
                return Err(AssetError::Backend {
                    status: 500,
                    message: "remove disabled".to_string(),
                });
            }
            self.inner.remove(bucket, paths).await
        }

        async fn list(&self, bucket: Bucket) -> AssetResult<Vec<String>> {
            self.inner.list(bucket).await
        }
    }

    struct Harness {
        editor: Editor,
        objects: Arc<MemoryObjectBackend>,
        log: EventLog,
    }

    fn harness(fail_removes: bool) -> Harness {
        let log: EventLog = Arc::default();
        let store_inner = Arc::new(MemoryBackend::new());
        let objects_inner = Arc::new(MemoryObjectBackend::new());

        let store = ContentStore::new(Arc::new(LoggedStore {
            inner: store_inner,
            log: log.clone(),
        }));
        let assets = AssetStore::new(
            Arc::new(LoggedObjects {
                inner: objects_inner.clone(),
                log: log.clone(),
                fail_removes,
            }),
            "https://store.example.com",
        );
        let editor = Editor::new(store, assets, Arc::new(Invalidator::new()));
        Harness {
            editor,
            objects: objects_inner,
            log,
        }
    }

    fn image(name: &str, bytes: &[u8]) -> ImageUpload {
        ImageUpload {
            payload: base64::engine::general_purpose::STANDARD.encode(bytes),
            file_name: name.to_string(),
            content_type: "image/png".to_string(),
        }
    }

    fn index_of(log: &[String], event: &str) -> usize {
        log.iter()
            .position(|entry| entry == event)
            .unwrap_or_else(|| panic!("event {event:?} not in {log:?}"))
    }

    #[tokio::test]
    async fn test_singleton_edit_merges_across_calls() {
        let h = harness(false);

        h.editor
            .edit_singleton::<AboutIntro, _>(&AboutIntroPatch {
                heading: Some("X".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        h.editor
            .edit_singleton::<AboutIntro, _>(&AboutIntroPatch {
                subheading: Some("new subheading".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        let about = h
            .editor
            .store()
            .singleton::<AboutIntro>()
            .await
            .unwrap()
            .unwrap();
        assert_eq!(about.heading, "X");
        assert_eq!(about.subheading, "new subheading");
    }

    #[tokio::test]
    async fn test_photo_replacement_order_and_single_delete() {
        let h = harness(false);

        let member: TeamMember = h
            .editor
            .add_item_with_image(
                TeamMemberPatch {
                    name: Some("Alex".to_string()),
                    ..Default::default()
                },
                Some(image("first.png", b"first")),
            )
            .await
            .unwrap();
        let old_url = member.photo_url.clone().unwrap();
        let old_path = crate::assets::extract_path(&old_url).unwrap();

        let updated: TeamMember = h
            .editor
            .update_item_with_image(
                member.id,
                TeamMemberPatch::default(),
                Some(image("second.png", b"second")),
            )
            .await
            .unwrap();
        let new_url = updated.photo_url.clone().unwrap();
        let new_path = crate::assets::extract_path(&new_url).unwrap();

        assert_ne!(new_url, old_url);
        assert!(h.objects.contains(Bucket::TeamPhotos, &new_path));
        assert!(!h.objects.contains(Bucket::TeamPhotos, &old_path));

        // The old path was deleted exactly once.
        let log = h.log.lock().unwrap().clone();
        let removes: Vec<_> = log
            .iter()
            .filter(|e| e.starts_with("assets:remove"))
            .collect();
        assert_eq!(removes.len(), 1);
        assert_eq!(*removes[0], format!("assets:remove {old_path}"));

        // Upload-new before record write, delete-old strictly after: the
        // stored record never points at a deleted asset.
        let put_new = index_of(&log, &format!("assets:put {new_path}"));
        let record_write = index_of(&log, "store:update team_members");
        let remove_old = index_of(&log, &format!("assets:remove {old_path}"));
        assert!(put_new < record_write);
        assert!(record_write < remove_old);
    }

    #[tokio::test]
    async fn test_failed_cleanup_is_swallowed() {
        let h = harness(true);

        let member: TeamMember = h
            .editor
            .add_item_with_image(
                TeamMemberPatch {
                    name: Some("Alex".to_string()),
                    ..Default::default()
                },
                Some(image("first.png", b"first")),
            )
            .await
            .unwrap();

        // Replacement succeeds even though deleting the old asset fails.
        let updated: TeamMember = h
            .editor
            .update_item_with_image(
                member.id,
                TeamMemberPatch::default(),
                Some(image("second.png", b"second")),
            )
            .await
            .unwrap();

        assert_ne!(updated.photo_url, member.photo_url);
        let new_path = crate::assets::extract_path(updated.photo_url.as_deref().unwrap()).unwrap();
        assert!(h.objects.contains(Bucket::TeamPhotos, &new_path));
    }

    #[tokio::test]
    async fn test_remove_item_deletes_asset() {
        let h = harness(false);

        let member: TeamMember = h
            .editor
            .add_item_with_image(
                TeamMemberPatch {
                    name: Some("Alex".to_string()),
                    ..Default::default()
                },
                Some(image("photo.png", b"bytes")),
            )
            .await
            .unwrap();
        let path = crate::assets::extract_path(member.photo_url.as_deref().unwrap()).unwrap();

        h.editor.remove_item::<TeamMember>(member.id).await.unwrap();

        assert!(h
            .editor
            .store()
            .get_one::<TeamMember>(member.id)
            .await
            .unwrap()
            .is_none());
        assert!(!h.objects.contains(Bucket::TeamPhotos, &path));
    }

    #[tokio::test]
    async fn test_mutations_invalidate_dependents() {
        let h = harness(false);

        h.editor
            .add_item::<TeamMember, _>(&TeamMemberPatch {
                name: Some("Alex".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(h.editor.invalidator().is_stale("staff"));
        assert!(h.editor.invalidator().is_stale("about"));
        assert!(!h.editor.invalidator().is_stale("jobs"));
    }

    #[tokio::test]
    async fn test_contact_message_lifecycle() {
        let h = harness(false);

        let submitted = h
            .editor
            .submit_contact_message(&ContactSubmissionNew {
                name: "Visitor".to_string(),
                email: "visitor@example.com".to_string(),
                subject: None,
                message: "Hello".to_string(),
            })
            .await
            .unwrap();
        assert!(!submitted.is_read);

        let read = h
            .editor
            .set_message_read(submitted.id, true)
            .await
            .unwrap();
        assert!(read.is_read);
        assert!(h.editor.invalidator().is_stale("admin/messages"));
    }

    #[tokio::test]
    async fn test_sweep_spares_referenced_assets() {
        let h = harness(false);

        let member: TeamMember = h
            .editor
            .add_item_with_image(
                TeamMemberPatch {
                    name: Some("Alex".to_string()),
                    ..Default::default()
                },
                Some(image("photo.png", b"bytes")),
            )
            .await
            .unwrap();
        let referenced_path =
            crate::assets::extract_path(member.photo_url.as_deref().unwrap()).unwrap();

        // Plant an old orphan next to the referenced photo.
        let orphan = "1000000000000-stale.png".to_string();
        h.objects
            .put(Bucket::TeamPhotos, &orphan, vec![1], "image/png")
            .await
            .unwrap();

        let report = h
            .editor
            .sweep_orphans(Bucket::TeamPhotos, Duration::from_secs(3600), false)
            .await
            .unwrap();

        assert_eq!(report.deleted, vec![orphan.clone()]);
        assert!(h.objects.contains(Bucket::TeamPhotos, &referenced_path));
        assert!(!h.objects.contains(Bucket::TeamPhotos, &orphan));
    }
}
