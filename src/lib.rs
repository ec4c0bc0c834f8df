//! curator-rs: content synchronization and asset lifecycle backend
//!
//! This crate manages the editable content of a public-facing informational
//! site: singleton page sections, ordered collections, uploaded image
//! assets, and the invalidation of rendered views that depend on them.

pub mod assets;
pub mod config;
pub mod editor;
pub mod invalidate;
pub mod server;
pub mod sitemap;
pub mod store;
pub mod theme;

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

use assets::{AssetStore, RestObjectBackend};
use editor::Editor;
use invalidate::Invalidator;
use store::{ContentStore, RestBackend};

/// The main Curator application
#[derive(Clone)]
pub struct Curator {
    /// Site configuration
    pub config: config::CuratorConfig,
}

impl Curator {
    /// Create a new Curator instance from a directory containing
    /// `curator.yml` (defaults apply when the file is missing)
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let config_path = base_dir.as_ref().join("curator.yml");

        let config = if config_path.exists() {
            config::CuratorConfig::load(&config_path)?
        } else {
            config::CuratorConfig::default()
        };

        Ok(Self { config })
    }

    /// Content store gateway against the configured remote store
    pub fn store(&self) -> Result<ContentStore> {
        let backend = RestBackend::new(
            &self.config.store_url,
            self.config.store_api_key.clone(),
            self.config.request_timeout(),
        )?;
        Ok(ContentStore::new(Arc::new(backend)))
    }

    /// Asset manager against the configured object store
    pub fn assets(&self) -> Result<AssetStore> {
        let backend = RestObjectBackend::new(
            &self.config.store_url,
            self.config.store_api_key.clone(),
            self.config.request_timeout(),
        )?;
        Ok(AssetStore::new(Arc::new(backend), self.config.asset_base()))
    }

    /// The edit-operation layer wired to fresh store and asset handles
    pub fn editor(&self) -> Result<Editor> {
        Ok(Editor::new(
            self.store()?,
            self.assets()?,
            Arc::new(Invalidator::new()),
        ))
    }
}
