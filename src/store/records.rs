//! Content record models
//!
//! Singleton concerns hold at most one row each; collection concerns hold
//! many ordered rows. Patch types carry only the fields a caller wants to
//! change, so a partial update never clobbers unset fields.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::assets::Bucket;
use crate::theme::{DEFAULT_ACCENT_COLOR, DEFAULT_BACKGROUND_COLOR};

/// Whether a concern holds one row or many
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Singleton,
    Collection,
}

/// A named content area, mapped to exactly one store table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Concern {
    SiteTheme,
    SiteIdentity,
    AboutIntro,
    StaffIntro,
    JoinCta,
    ContactInfo,
    TeamMembers,
    Projects,
    JobPositions,
    Partners,
    ContactSubmissions,
}

impl Concern {
    /// Every concern, singletons first
    pub const ALL: [Concern; 11] = [
        Concern::SiteTheme,
        Concern::SiteIdentity,
        Concern::AboutIntro,
        Concern::StaffIntro,
        Concern::JoinCta,
        Concern::ContactInfo,
        Concern::TeamMembers,
        Concern::Projects,
        Concern::JobPositions,
        Concern::Partners,
        Concern::ContactSubmissions,
    ];

    /// The store table backing this concern
    pub fn table(&self) -> &'static str {
        match self {
            Concern::SiteTheme => "site_theme",
            Concern::SiteIdentity => "site_identity",
            Concern::AboutIntro => "about_intro",
            Concern::StaffIntro => "staff_intro",
            Concern::JoinCta => "join_cta",
            Concern::ContactInfo => "contact_info",
            Concern::TeamMembers => "team_members",
            Concern::Projects => "projects",
            Concern::JobPositions => "job_positions",
            Concern::Partners => "partners",
            Concern::ContactSubmissions => "contact_submissions",
        }
    }

    /// Stable name, identical to the table name
    pub fn as_str(&self) -> &'static str {
        self.table()
    }

    pub fn kind(&self) -> ContentKind {
        match self {
            Concern::SiteTheme
            | Concern::SiteIdentity
            | Concern::AboutIntro
            | Concern::StaffIntro
            | Concern::JoinCta
            | Concern::ContactInfo => ContentKind::Singleton,
            _ => ContentKind::Collection,
        }
    }

    /// Collections carrying a caller-managed display order.
    ///
    /// Contact submissions are the exception: an inbox, listed newest first.
    pub fn is_ordered(&self) -> bool {
        matches!(
            self,
            Concern::TeamMembers | Concern::Projects | Concern::JobPositions | Concern::Partners
        )
    }

    /// Parse a concern from its table name (admin route segments)
    pub fn from_name(name: &str) -> Option<Concern> {
        Concern::ALL.iter().copied().find(|c| c.table() == name)
    }
}

/// A record with an at-most-one-row-per-concern invariant
pub trait SingletonRecord:
    Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static
{
    const CONCERN: Concern;

    /// Bucket owning this record's image asset, if the concern carries one
    const IMAGE_BUCKET: Option<Bucket> = None;

    fn record_id(&self) -> Uuid;

    /// URL of the currently referenced image asset, if any
    fn image_url(&self) -> Option<&str> {
        None
    }
}

/// One of many ordered rows under a concern
pub trait CollectionRecord:
    Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static
{
    const CONCERN: Concern;
    const IMAGE_BUCKET: Option<Bucket> = None;

    fn id(&self) -> Uuid;

    fn image_url(&self) -> Option<&str> {
        None
    }
}

/// A patch able to receive a freshly uploaded image URL
pub trait ImagePatch {
    fn set_image_url(&mut self, url: String);
}

fn now() -> DateTime<Utc> {
    Utc::now()
}

// ---------------------------------------------------------------------------
// Singleton concerns
// ---------------------------------------------------------------------------

/// Base colors the whole site derives its presentation from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteTheme {
    pub id: Uuid,
    pub primary_color: String,
    pub accent_color: String,
    pub background_color: String,
    pub text_color: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for SiteTheme {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            primary_color: "#1f2937".to_string(),
            accent_color: DEFAULT_ACCENT_COLOR.to_string(),
            background_color: DEFAULT_BACKGROUND_COLOR.to_string(),
            text_color: "#111827".to_string(),
            created_at: now(),
            updated_at: now(),
        }
    }
}

impl SingletonRecord for SiteTheme {
    const CONCERN: Concern = Concern::SiteTheme;

    fn record_id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct SiteThemePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accent_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
}

/// Site name, tagline and logo
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteIdentity {
    pub id: Uuid,
    pub site_name: String,
    pub tagline: String,
    pub logo_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for SiteIdentity {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            site_name: String::new(),
            tagline: String::new(),
            logo_url: None,
            created_at: now(),
            updated_at: now(),
        }
    }
}

impl SingletonRecord for SiteIdentity {
    const CONCERN: Concern = Concern::SiteIdentity;
    const IMAGE_BUCKET: Option<Bucket> = Some(Bucket::Logos);

    fn record_id(&self) -> Uuid {
        self.id
    }

    fn image_url(&self) -> Option<&str> {
        self.logo_url.as_deref()
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct SiteIdentityPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tagline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
}

impl ImagePatch for SiteIdentityPatch {
    fn set_image_url(&mut self, url: String) {
        self.logo_url = Some(url);
    }
}

/// Introduction block on the home and about pages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AboutIntro {
    pub id: Uuid,
    pub heading: String,
    pub subheading: String,
    pub body: String,
    pub hero_image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for AboutIntro {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            heading: String::new(),
            subheading: String::new(),
            body: String::new(),
            hero_image_url: None,
            created_at: now(),
            updated_at: now(),
        }
    }
}

impl SingletonRecord for AboutIntro {
    const CONCERN: Concern = Concern::AboutIntro;
    const IMAGE_BUCKET: Option<Bucket> = Some(Bucket::HeroImages);

    fn record_id(&self) -> Uuid {
        self.id
    }

    fn image_url(&self) -> Option<&str> {
        self.hero_image_url.as_deref()
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AboutIntroPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subheading: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hero_image_url: Option<String>,
}

impl ImagePatch for AboutIntroPatch {
    fn set_image_url(&mut self, url: String) {
        self.hero_image_url = Some(url);
    }
}

/// Introduction block on the staff page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffIntro {
    pub id: Uuid,
    pub heading: String,
    pub subheading: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for StaffIntro {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            heading: String::new(),
            subheading: String::new(),
            created_at: now(),
            updated_at: now(),
        }
    }
}

impl SingletonRecord for StaffIntro {
    const CONCERN: Concern = Concern::StaffIntro;

    fn record_id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct StaffIntroPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subheading: Option<String>,
}

/// Call-to-action block inviting applications
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinCta {
    pub id: Uuid,
    pub heading: String,
    pub body: String,
    pub button_label: String,
    pub button_target: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for JoinCta {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            heading: String::new(),
            body: String::new(),
            button_label: String::new(),
            button_target: "/jobs".to_string(),
            created_at: now(),
            updated_at: now(),
        }
    }
}

impl SingletonRecord for JoinCta {
    const CONCERN: Concern = Concern::JoinCta;

    fn record_id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct JoinCtaPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub button_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub button_target: Option<String>,
}

/// Address, phone and opening hours
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactInfo {
    pub id: Uuid,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub opening_hours: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for ContactInfo {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            email: String::new(),
            phone: String::new(),
            address: String::new(),
            opening_hours: String::new(),
            created_at: now(),
            updated_at: now(),
        }
    }
}

impl SingletonRecord for ContactInfo {
    const CONCERN: Concern = Concern::ContactInfo;

    fn record_id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ContactInfoPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opening_hours: Option<String>,
}

// ---------------------------------------------------------------------------
// Collection concerns
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamMember {
    pub id: Uuid,
    pub name: String,
    pub role: String,
    pub bio: String,
    pub photo_url: Option<String>,
    pub display_order: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for TeamMember {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            name: String::new(),
            role: String::new(),
            bio: String::new(),
            photo_url: None,
            display_order: 0,
            is_active: true,
            created_at: now(),
            updated_at: now(),
        }
    }
}

impl CollectionRecord for TeamMember {
    const CONCERN: Concern = Concern::TeamMembers;
    const IMAGE_BUCKET: Option<Bucket> = Some(Bucket::TeamPhotos);

    fn id(&self) -> Uuid {
        self.id
    }

    fn image_url(&self) -> Option<&str> {
        self.photo_url.as_deref()
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct TeamMemberPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl ImagePatch for TeamMemberPatch {
    fn set_image_url(&mut self, url: String) {
        self.photo_url = Some(url);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub title: String,
    pub summary: String,
    pub body: String,
    pub image_url: Option<String>,
    pub display_order: i64,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for Project {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            title: String::new(),
            summary: String::new(),
            body: String::new(),
            image_url: None,
            display_order: 0,
            is_featured: false,
            created_at: now(),
            updated_at: now(),
        }
    }
}

impl CollectionRecord for Project {
    const CONCERN: Concern = Concern::Projects;
    const IMAGE_BUCKET: Option<Bucket> = Some(Bucket::ProjectImages);

    fn id(&self) -> Uuid {
        self.id
    }

    fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ProjectPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_featured: Option<bool>,
}

impl ImagePatch for ProjectPatch {
    fn set_image_url(&mut self, url: String) {
        self.image_url = Some(url);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPosition {
    pub id: Uuid,
    pub title: String,
    pub department: String,
    pub body: String,
    pub display_order: i64,
    pub is_open: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for JobPosition {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            title: String::new(),
            department: String::new(),
            body: String::new(),
            display_order: 0,
            is_open: true,
            created_at: now(),
            updated_at: now(),
        }
    }
}

impl CollectionRecord for JobPosition {
    const CONCERN: Concern = Concern::JobPositions;

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct JobPositionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_open: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Partner {
    pub id: Uuid,
    pub name: String,
    pub website_url: Option<String>,
    pub logo_url: Option<String>,
    pub display_order: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for Partner {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            name: String::new(),
            website_url: None,
            logo_url: None,
            display_order: 0,
            is_active: true,
            created_at: now(),
            updated_at: now(),
        }
    }
}

impl CollectionRecord for Partner {
    const CONCERN: Concern = Concern::Partners;
    const IMAGE_BUCKET: Option<Bucket> = Some(Bucket::Collaborations);

    fn id(&self) -> Uuid {
        self.id
    }

    fn image_url(&self) -> Option<&str> {
        self.logo_url.as_deref()
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct PartnerPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl ImagePatch for PartnerPatch {
    fn set_image_url(&mut self, url: String) {
        self.logo_url = Some(url);
    }
}

/// A message submitted through the public contact form.
///
/// Created only by the public surface; the admin side may only toggle the
/// read flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactSubmission {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub subject: Option<String>,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for ContactSubmission {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            name: String::new(),
            email: String::new(),
            subject: None,
            message: String::new(),
            is_read: false,
            created_at: now(),
            updated_at: now(),
        }
    }
}

impl CollectionRecord for ContactSubmission {
    const CONCERN: Concern = Concern::ContactSubmissions;

    fn id(&self) -> Uuid {
        self.id
    }
}

/// Fields a public visitor provides when submitting the contact form
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ContactSubmissionNew {
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub message: String,
}
