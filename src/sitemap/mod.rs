//! Sitemap and robots generation
//!
//! Canonical URLs come from the static route list plus one entry per
//! project row. A store failure degrades to the static list; sitemap
//! generation never surfaces an error.

use chrono::{DateTime, Utc};

use crate::store::{ContentStore, Filter, Project};

/// Public routes that always exist
pub const STATIC_ROUTES: &[&str] = &["/", "/about", "/staff", "/projects", "/jobs", "/contact"];

/// One sitemap URL
#[derive(Debug, Clone)]
pub struct SitemapEntry {
    pub loc: String,
    pub lastmod: Option<DateTime<Utc>>,
}

/// Canonical URLs for the site: static routes plus `/projects/{id}` per
/// project, stamped with the project's update time.
pub async fn entries(store: &ContentStore, site_url: &str) -> Vec<SitemapEntry> {
    let base = site_url.trim_end_matches('/');

    let mut entries: Vec<SitemapEntry> = STATIC_ROUTES
        .iter()
        .map(|route| SitemapEntry {
            loc: format!("{}{}", base, route),
            lastmod: None,
        })
        .collect();

    match store.list::<Project>(Filter::default()).await {
        Ok(projects) => {
            for project in projects {
                entries.push(SitemapEntry {
                    loc: format!("{}/projects/{}", base, project.id),
                    lastmod: Some(project.updated_at),
                });
            }
        }
        Err(err) => {
            tracing::warn!("sitemap: falling back to static routes: {}", err);
        }
    }

    entries
}

/// Render entries as sitemap XML
pub fn render_sitemap(entries: &[SitemapEntry]) -> String {
    let mut xml = String::new();
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    xml.push('\n');
    xml.push_str(r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">"#);
    xml.push('\n');

    for entry in entries {
        xml.push_str("  <url>\n");
        xml.push_str(&format!("    <loc>{}</loc>\n", escape_xml(&entry.loc)));
        if let Some(lastmod) = entry.lastmod {
            xml.push_str(&format!("    <lastmod>{}</lastmod>\n", lastmod.to_rfc3339()));
        }
        xml.push_str("  </url>\n");
    }

    xml.push_str("</urlset>\n");
    xml
}

/// Render robots.txt, pointing crawlers at the sitemap and away from the
/// admin surface
pub fn render_robots(site_url: &str) -> String {
    let base = site_url.trim_end_matches('/');
    format!(
        "User-agent: *\nAllow: /\nDisallow: /admin/\n\nSitemap: {}/sitemap.xml\n",
        base
    )
}

/// Escape XML special characters
fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
