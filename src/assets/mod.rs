//! Asset lifecycle
//!
//! Uploads binary payloads into a fixed set of buckets, resolves stored
//! paths to public URLs, and deletes assets whose owning record moved on.
//! The public URL shape is the contract: any URL not matching it is treated
//! as externally hosted and never touched.

mod backend;

pub use backend::{
    AssetError, AssetResult, MemoryObjectBackend, ObjectBackend, RestObjectBackend,
};

use base64::Engine;
use chrono::Utc;
use lazy_static::lazy_static;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Hard upload limit, checked before any network call
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// URL segment every public asset URL carries
const PUBLIC_SEGMENT: &str = "/storage/v1/object/public/";

/// The closed set of asset buckets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Bucket {
    Logos,
    HeroImages,
    ProjectImages,
    TeamPhotos,
    Collaborations,
    OfficeGallery,
    General,
}

impl Bucket {
    pub const ALL: [Bucket; 7] = [
        Bucket::Logos,
        Bucket::HeroImages,
        Bucket::ProjectImages,
        Bucket::TeamPhotos,
        Bucket::Collaborations,
        Bucket::OfficeGallery,
        Bucket::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Logos => "logos",
            Bucket::HeroImages => "hero-images",
            Bucket::ProjectImages => "project-images",
            Bucket::TeamPhotos => "team-photos",
            Bucket::Collaborations => "collaborations",
            Bucket::OfficeGallery => "office-gallery",
            Bucket::General => "general",
        }
    }

    pub fn from_name(name: &str) -> Option<Bucket> {
        Bucket::ALL.iter().copied().find(|b| b.as_str() == name)
    }
}

/// A successfully stored asset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredAsset {
    /// Public URL to store on the owning record
    pub url: String,
    /// Path within the bucket
    pub path: String,
}

/// Outcome of an orphan sweep over one bucket
#[derive(Debug, Default, Clone, Serialize)]
pub struct SweepReport {
    pub scanned: usize,
    pub retained: usize,
    pub skipped_recent: usize,
    pub deleted: Vec<String>,
}

lazy_static! {
    // Anything outside [A-Za-z0-9.-] becomes an underscore in stored names.
    static ref UNSAFE_NAME_CHARS: Regex = Regex::new(r"[^A-Za-z0-9.-]").unwrap();
}

// Characters percent-encoded in public URL paths. '/' separates segments
// and the unreserved set stays raw so stored names read naturally.
const PATH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

static LAST_UPLOAD_TOKEN: AtomicI64 = AtomicI64::new(0);

/// Millisecond timestamp token, strictly increasing within the process so
/// two uploads in the same millisecond still get distinct, ordered paths.
fn upload_token() -> i64 {
    let mut now = Utc::now().timestamp_millis();
    loop {
        let last = LAST_UPLOAD_TOKEN.load(Ordering::Acquire);
        let next = if now > last { now } else { last + 1 };
        if LAST_UPLOAD_TOKEN
            .compare_exchange(last, next, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            return next;
        }
        now = Utc::now().timestamp_millis();
    }
}

/// Replace every character outside `[A-Za-z0-9.-]` with `_`
pub fn sanitize_file_name(name: &str) -> String {
    UNSAFE_NAME_CHARS.replace_all(name, "_").into_owned()
}

/// Drop an optional `data:<mime>;base64,` header from an upload payload
fn strip_data_header(payload: &str) -> &str {
    if payload.starts_with("data:") {
        payload
            .split_once(',')
            .map(|(_, rest)| rest)
            .unwrap_or(payload)
    } else {
        payload
    }
}

/// The upload timestamp embedded in a stored path, if the path carries one
fn upload_timestamp(path: &str) -> Option<i64> {
    path.split_once('-')?.0.parse().ok()
}

/// Inverse of [`AssetStore::resolve_public_url`].
///
/// Returns `None` for any URL that does not match the public asset URL
/// shape: externally hosted images resolve to `None`, never to an error.
pub fn extract_path(url: &str) -> Option<String> {
    let (_, after_segment) = url.split_once(PUBLIC_SEGMENT)?;
    let (_bucket, encoded_path) = after_segment.split_once('/')?;
    if encoded_path.is_empty() {
        return None;
    }
    percent_decode_str(encoded_path)
        .decode_utf8()
        .ok()
        .map(|path| path.into_owned())
}

/// Asset manager over an object store backend.
///
/// Cheap to clone; all clones share the backend.
#[derive(Clone)]
pub struct AssetStore {
    backend: Arc<dyn ObjectBackend>,
    public_base: String,
}

impl AssetStore {
    pub fn new(backend: Arc<dyn ObjectBackend>, public_base: &str) -> Self {
        Self {
            backend,
            public_base: public_base.trim_end_matches('/').to_string(),
        }
    }

    /// Decode and store a base64 payload.
    ///
    /// The payload may carry a `data:<mime>;base64,` header. The 5 MiB
    /// limit is enforced before the backend is contacted. The stored path
    /// is `{token}-{sanitized name}` where the token orders uploads by
    /// time and guarantees a fresh path.
    pub async fn upload(
        &self,
        payload: &str,
        file_name: &str,
        bucket: Bucket,
        content_type: &str,
    ) -> AssetResult<StoredAsset> {
        let encoded = strip_data_header(payload);

        // Cheap size estimate rejects grossly oversized payloads without
        // decoding them; the exact check follows the decode.
        let estimated = encoded.len() / 4 * 3;
        if estimated > MAX_UPLOAD_BYTES + 3 {
            return Err(AssetError::PayloadTooLarge {
                size: estimated,
                limit: MAX_UPLOAD_BYTES,
            });
        }

        let bytes = base64::engine::general_purpose::STANDARD.decode(encoded)?;
        if bytes.len() > MAX_UPLOAD_BYTES {
            return Err(AssetError::PayloadTooLarge {
                size: bytes.len(),
                limit: MAX_UPLOAD_BYTES,
            });
        }

        let path = format!("{}-{}", upload_token(), sanitize_file_name(file_name));
        self.backend
            .put(bucket, &path, bytes, content_type)
            .await?;

        tracing::debug!("stored asset {}/{}", bucket.as_str(), path);
        Ok(StoredAsset {
            url: self.resolve_public_url(&path, bucket),
            path,
        })
    }

    /// Public URL for a stored path. Pure; no network involved.
    pub fn resolve_public_url(&self, path: &str, bucket: Bucket) -> String {
        format!(
            "{}{}{}/{}",
            self.public_base,
            PUBLIC_SEGMENT,
            bucket.as_str(),
            utf8_percent_encode(path, PATH_ENCODE_SET)
        )
    }

    /// Delete the asset a URL points at.
    ///
    /// A URL that does not resolve to a stored path is externally hosted:
    /// that is a success with nothing to delete, so cleanup of foreign
    /// references never blocks a content mutation.
    pub async fn delete_by_url(&self, url: &str, bucket: Bucket) -> AssetResult<()> {
        match extract_path(url) {
            Some(path) => self.backend.remove(bucket, &[path]).await,
            None => {
                tracing::debug!("skipping delete of externally hosted asset: {}", url);
                Ok(())
            }
        }
    }

    /// Best-effort batch delete by URL.
    ///
    /// Unresolvable URLs are dropped silently; the remainder goes to the
    /// backend as a single batch.
    pub async fn delete_many_by_url(&self, urls: &[String], bucket: Bucket) -> AssetResult<()> {
        let paths: Vec<String> = urls.iter().filter_map(|url| extract_path(url)).collect();
        if paths.is_empty() {
            return Ok(());
        }
        self.backend.remove(bucket, &paths).await
    }

    /// Delete objects in `bucket` that no content record references.
    ///
    /// Objects uploaded within the grace window are skipped, so an upload
    /// whose record write has not landed yet is never collected; so are
    /// paths without a parseable upload token. Runs as one listing plus
    /// one batch delete; a partial batch failure leaves the rest for the
    /// next run.
    pub async fn sweep(
        &self,
        bucket: Bucket,
        referenced_urls: &HashSet<String>,
        grace: Duration,
        dry_run: bool,
    ) -> AssetResult<SweepReport> {
        let referenced_paths: HashSet<String> = referenced_urls
            .iter()
            .filter_map(|url| extract_path(url))
            .collect();

        let cutoff = Utc::now().timestamp_millis() - grace.as_millis() as i64;
        let mut report = SweepReport::default();
        let mut orphans = Vec::new();

        for path in self.backend.list(bucket).await? {
            report.scanned += 1;
            if referenced_paths.contains(&path) {
                report.retained += 1;
                continue;
            }
            match upload_timestamp(&path) {
                Some(token) if token >= cutoff => report.skipped_recent += 1,
                Some(_) => orphans.push(path),
                // No token: not one of ours, leave it alone.
                None => report.skipped_recent += 1,
            }
        }

        if !dry_run && !orphans.is_empty() {
            self.backend.remove(bucket, &orphans).await?;
        }
        if !orphans.is_empty() {
            tracing::info!(
                "{} {} orphaned asset(s) in {}",
                if dry_run { "found" } else { "deleted" },
                orphans.len(),
                bucket.as_str()
            );
        }
        report.deleted = orphans;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (AssetStore, Arc<MemoryObjectBackend>) {
        let backend = Arc::new(MemoryObjectBackend::new());
        (
            AssetStore::new(backend.clone(), "https://store.example.com"),
            backend,
        )
    }

    fn encode(bytes: &[u8]) -> String {
        base64::engine::general_purpose::STANDARD.encode(bytes)
    }

    #[test]
    fn test_resolve_extract_roundtrip() {
        let (assets, _) = store();
        let paths = [
            "1700000000000-logo.png",
            "with space.png",
            "percent%sign.jpg",
            "tilde~and_underscore",
            "quotes\"and'brackets[].webp",
        ];
        for bucket in Bucket::ALL {
            for path in paths {
                let url = assets.resolve_public_url(path, bucket);
                assert_eq!(extract_path(&url).as_deref(), Some(path), "url: {url}");
            }
        }
    }

    #[test]
    fn test_extract_rejects_foreign_urls() {
        assert_eq!(extract_path("https://cdn.example.com/images/logo.png"), None);
        assert_eq!(
            extract_path("https://store.example.com/storage/v1/object/sign/logos/x.png"),
            None
        );
        assert_eq!(
            extract_path("https://store.example.com/storage/v1/object/public/logos/"),
            None
        );
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(
            sanitize_file_name("team photo (final).png"),
            "team_photo__final_.png"
        );
        assert_eq!(sanitize_file_name("ok-name.jpg"), "ok-name.jpg");
    }

    #[test]
    fn test_upload_tokens_strictly_increase() {
        let first = upload_token();
        let second = upload_token();
        assert!(second > first);
    }

    #[tokio::test]
    async fn test_upload_stores_and_resolves() {
        let (assets, backend) = store();
        let stored = assets
            .upload(&encode(b"png-bytes"), "logo.png", Bucket::Logos, "image/png")
            .await
            .unwrap();

        assert!(stored.path.ends_with("-logo.png"));
        assert!(backend.contains(Bucket::Logos, &stored.path));
        assert_eq!(extract_path(&stored.url).as_deref(), Some(stored.path.as_str()));
    }

    #[tokio::test]
    async fn test_upload_strips_data_header() {
        let (assets, backend) = store();
        let payload = format!("data:image/png;base64,{}", encode(b"bytes"));
        let stored = assets
            .upload(&payload, "x.png", Bucket::General, "image/png")
            .await
            .unwrap();
        assert!(backend.contains(Bucket::General, &stored.path));
    }

    #[tokio::test]
    async fn test_oversized_upload_never_reaches_backend() {
        let (assets, backend) = store();
        let payload = encode(&vec![0u8; MAX_UPLOAD_BYTES + 1]);
        let result = assets
            .upload(&payload, "big.bin", Bucket::General, "application/octet-stream")
            .await;
        assert!(matches!(result, Err(AssetError::PayloadTooLarge { .. })));
        assert!(backend.ops().is_empty());
    }

    #[tokio::test]
    async fn test_delete_external_url_skips_backend() {
        let (assets, backend) = store();
        assets
            .delete_by_url("https://cdn.example.com/logo.png", Bucket::Logos)
            .await
            .unwrap();
        assert!(backend.ops().is_empty());
    }

    #[tokio::test]
    async fn test_delete_many_drops_unresolvable() {
        let (assets, backend) = store();
        let stored = assets
            .upload(&encode(b"a"), "a.png", Bucket::Logos, "image/png")
            .await
            .unwrap();

        assets
            .delete_many_by_url(
                &[
                    stored.url.clone(),
                    "https://cdn.example.com/external.png".to_string(),
                ],
                Bucket::Logos,
            )
            .await
            .unwrap();

        assert!(!backend.contains(Bucket::Logos, &stored.path));
        let removes: Vec<_> = backend
            .ops()
            .into_iter()
            .filter(|op| op.starts_with("remove"))
            .collect();
        assert_eq!(removes.len(), 1);
    }

    #[tokio::test]
    async fn test_sweep_deletes_only_aged_orphans() {
        let (assets, backend) = store();

        // Referenced and recent objects must both survive.
        let referenced = assets
            .upload(&encode(b"keep"), "keep.png", Bucket::General, "image/png")
            .await
            .unwrap();
        let recent = assets
            .upload(&encode(b"fresh"), "fresh.png", Bucket::General, "image/png")
            .await
            .unwrap();

        // An orphan old enough to be past any grace window.
        let old_path = "1000000000000-orphan.png".to_string();
        backend
            .put(Bucket::General, &old_path, vec![1], "image/png")
            .await
            .unwrap();

        let mut referenced_urls = HashSet::new();
        referenced_urls.insert(referenced.url.clone());

        let report = assets
            .sweep(
                Bucket::General,
                &referenced_urls,
                Duration::from_secs(3600),
                false,
            )
            .await
            .unwrap();

        assert_eq!(report.scanned, 3);
        assert_eq!(report.retained, 1);
        assert_eq!(report.skipped_recent, 1);
        assert_eq!(report.deleted, vec![old_path.clone()]);
        assert!(backend.contains(Bucket::General, &referenced.path));
        assert!(backend.contains(Bucket::General, &recent.path));
        assert!(!backend.contains(Bucket::General, &old_path));
    }

    #[tokio::test]
    async fn test_sweep_dry_run_deletes_nothing() {
        let (assets, backend) = store();
        let old_path = "1000000000000-orphan.png".to_string();
        backend
            .put(Bucket::General, &old_path, vec![1], "image/png")
            .await
            .unwrap();

        let report = assets
            .sweep(
                Bucket::General,
                &HashSet::new(),
                Duration::from_secs(3600),
                true,
            )
            .await
            .unwrap();

        assert_eq!(report.deleted, vec![old_path.clone()]);
        assert!(backend.contains(Bucket::General, &old_path));
    }
}
