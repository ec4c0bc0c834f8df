//! View invalidation
//!
//! Owns the one table mapping each content concern to the rendered views
//! that embed it. Mutating a concern marks its whole dependency set stale;
//! there is no partial invalidation, a single-field edit stales every
//! dependent view.

use indexmap::IndexMap;
use lazy_static::lazy_static;
use std::collections::HashSet;
use std::sync::Mutex;

use crate::store::Concern;

lazy_static! {
    /// Concern → rendered views embedding it. The admin surface refetches
    /// on every visit, so only its inbox-style views appear here.
    static ref DEPENDENT_VIEWS: IndexMap<Concern, &'static [&'static str]> = {
        let mut table: IndexMap<Concern, &'static [&'static str]> = IndexMap::new();
        // Identity and theme color every page.
        table.insert(Concern::SiteTheme, ALL_PUBLIC_VIEWS);
        table.insert(Concern::SiteIdentity, ALL_PUBLIC_VIEWS);
        table.insert(Concern::AboutIntro, &["home", "about"]);
        table.insert(Concern::StaffIntro, &["staff"]);
        table.insert(Concern::JoinCta, &["staff", "jobs"]);
        table.insert(Concern::ContactInfo, &["home", "contact"]);
        table.insert(Concern::TeamMembers, &["about", "staff"]);
        table.insert(Concern::Projects, &["home", "projects"]);
        table.insert(Concern::JobPositions, &["jobs"]);
        table.insert(Concern::Partners, &["home", "about"]);
        table.insert(Concern::ContactSubmissions, &["admin/messages"]);
        table
    };
}

/// Every public rendered view
pub const ALL_PUBLIC_VIEWS: &[&str] = &["home", "about", "staff", "projects", "jobs", "contact"];

/// The views embedding a concern
pub fn views_for(concern: Concern) -> &'static [&'static str] {
    DEPENDENT_VIEWS.get(&concern).copied().unwrap_or(&[])
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Tracks which rendered views are stale
#[derive(Default)]
pub struct Invalidator {
    stale: Mutex<HashSet<String>>,
}

impl Invalidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark every view depending on `concern` stale
    pub fn invalidate(&self, concern: Concern) {
        let views = views_for(concern);
        tracing::debug!("invalidating {} view(s) for {}", views.len(), concern.as_str());
        let mut stale = lock(&self.stale);
        for view in views {
            stale.insert((*view).to_string());
        }
    }

    /// Whether `view` is currently stale
    pub fn is_stale(&self, view: &str) -> bool {
        lock(&self.stale).contains(view)
    }

    /// Clear and report `view`'s staleness.
    ///
    /// Called at the start of a render: `true` means the cached render must
    /// not be served and the view re-fetches from the content store.
    pub fn begin_render(&self, view: &str) -> bool {
        lock(&self.stale).remove(view)
    }
}
