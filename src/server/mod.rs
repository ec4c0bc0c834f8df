//! HTTP surface
//!
//! Public read endpoints serve aggregated view payloads from a per-view
//! render cache that honors the invalidation state; admin write endpoints
//! return structured `{success, reason}` results and never retry on the
//! caller's behalf. Authentication is a deployment concern: layer an axum
//! middleware over [`router`]; none ships here.

use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::config::CuratorConfig;
use crate::editor::{Editor, ImageUpload};
use crate::invalidate::ALL_PUBLIC_VIEWS;
use crate::sitemap;
use crate::store::{
    AboutIntro, AboutIntroPatch, Concern, ContactInfo, ContactInfoPatch, ContactSubmission,
    ContactSubmissionNew, Filter, JobPosition, JobPositionPatch, JoinCta, JoinCtaPatch, Partner,
    PartnerPatch, Project, ProjectPatch, SiteIdentity, SiteIdentityPatch, SiteTheme,
    SiteThemePatch, StaffIntro, StaffIntroPatch, TeamMember, TeamMemberPatch,
};
use crate::theme::{ThemeScope, ThemeValues};

type AdminResult = std::result::Result<Value, (StatusCode, String)>;

/// Shared server state
pub struct ServerState {
    editor: Editor,
    site_url: String,
    render_cache: Mutex<HashMap<String, Value>>,
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn to_json<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

impl ServerState {
    pub fn new(editor: Editor, config: &CuratorConfig) -> Self {
        Self {
            editor,
            site_url: config.url.clone(),
            render_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Render a public view, serving the cached payload unless the view
    /// was invalidated since the last render. Unknown views are `None`.
    pub async fn render_view(&self, view: &str) -> Option<Value> {
        if !ALL_PUBLIC_VIEWS.contains(&view) {
            return None;
        }

        let must_refetch = self.editor.invalidator().begin_render(view);
        if !must_refetch {
            if let Some(cached) = lock(&self.render_cache).get(view) {
                return Some(cached.clone());
            }
        }

        let payload = self.build_view(view).await;
        lock(&self.render_cache).insert(view.to_string(), payload.clone());
        Some(payload)
    }

    /// Assemble a view payload from current content. Every fetch falls
    /// back to defaults: the public surface never surfaces an internal
    /// failure.
    async fn build_view(&self, view: &str) -> Value {
        let store = self.editor.store();

        let theme = store
            .singleton::<SiteTheme>()
            .await
            .ok()
            .flatten()
            .unwrap_or_default();
        let derived = ThemeValues::derive(&theme.background_color, &theme.accent_color);
        // Presentation state is scoped to this render; the scope reverts it
        // on every exit path.
        let _scope = ThemeScope::apply(derived.clone());

        let mut payload = json!({
            "view": view,
            "theme": {
                "primary_color": theme.primary_color,
                "accent_color": theme.accent_color,
                "background_color": theme.background_color,
                "text_color": theme.text_color,
                "secondary_background": derived.secondary_background,
                "hover_accent": derived.hover_accent,
            },
        });

        let sections = match view {
            "home" => {
                json!({
                    "identity": self.singleton_or_default::<SiteIdentity>().await,
                    "about_intro": self.singleton_or_default::<AboutIntro>().await,
                    "featured_projects": self.list_or_empty::<Project>(
                        Filter::new().eq("is_featured", true)).await,
                    "partners": self.list_or_empty::<Partner>(
                        Filter::new().eq("is_active", true)).await,
                })
            }
            "about" => {
                json!({
                    "about_intro": self.singleton_or_default::<AboutIntro>().await,
                    "team_members": self.list_or_empty::<TeamMember>(
                        Filter::new().eq("is_active", true)).await,
                    "partners": self.list_or_empty::<Partner>(
                        Filter::new().eq("is_active", true)).await,
                })
            }
            "staff" => {
                json!({
                    "staff_intro": self.singleton_or_default::<StaffIntro>().await,
                    "team_members": self.list_or_empty::<TeamMember>(
                        Filter::new().eq("is_active", true)).await,
                    "join_cta": self.singleton_or_default::<JoinCta>().await,
                })
            }
            "projects" => {
                json!({ "projects": self.list_or_empty::<Project>(Filter::default()).await })
            }
            "jobs" => {
                json!({
                    "join_cta": self.singleton_or_default::<JoinCta>().await,
                    "positions": self.list_or_empty::<JobPosition>(
                        Filter::new().eq("is_open", true)).await,
                })
            }
            "contact" => {
                json!({ "contact_info": self.singleton_or_default::<ContactInfo>().await })
            }
            _ => json!({}),
        };

        if let (Value::Object(payload_map), Value::Object(sections_map)) = (&mut payload, sections)
        {
            payload_map.extend(sections_map);
        }
        payload
    }

    async fn singleton_or_default<R: crate::store::SingletonRecord>(&self) -> Value {
        let record = self
            .editor
            .store()
            .singleton::<R>()
            .await
            .ok()
            .flatten()
            .unwrap_or_default();
        to_json(&record)
    }

    async fn list_or_empty<R: crate::store::CollectionRecord>(&self, filter: Filter) -> Value {
        let records = self
            .editor
            .store()
            .list::<R>(filter)
            .await
            .unwrap_or_default();
        to_json(&records)
    }

    // -- admin dispatch -----------------------------------------------------

    async fn edit_singleton_by_name(&self, name: &str, req: SingletonEditRequest) -> AdminResult {
        let SingletonEditRequest { fields, image } = req;
        match Concern::from_name(name) {
            Some(Concern::SiteTheme) => {
                let patch: SiteThemePatch = parse_fields(fields)?;
                self.editor
                    .edit_singleton::<SiteTheme, _>(&patch)
                    .await
                    .map(|r| to_json(&r))
                    .map_err(edit_failure)
            }
            Some(Concern::SiteIdentity) => {
                let patch: SiteIdentityPatch = parse_fields(fields)?;
                self.editor
                    .edit_singleton_with_image::<SiteIdentity, _>(patch, image)
                    .await
                    .map(|r| to_json(&r))
                    .map_err(edit_failure)
            }
            Some(Concern::AboutIntro) => {
                let patch: AboutIntroPatch = parse_fields(fields)?;
                self.editor
                    .edit_singleton_with_image::<AboutIntro, _>(patch, image)
                    .await
                    .map(|r| to_json(&r))
                    .map_err(edit_failure)
            }
            Some(Concern::StaffIntro) => {
                let patch: StaffIntroPatch = parse_fields(fields)?;
                self.editor
                    .edit_singleton::<StaffIntro, _>(&patch)
                    .await
                    .map(|r| to_json(&r))
                    .map_err(edit_failure)
            }
            Some(Concern::JoinCta) => {
                let patch: JoinCtaPatch = parse_fields(fields)?;
                self.editor
                    .edit_singleton::<JoinCta, _>(&patch)
                    .await
                    .map(|r| to_json(&r))
                    .map_err(edit_failure)
            }
            Some(Concern::ContactInfo) => {
                let patch: ContactInfoPatch = parse_fields(fields)?;
                self.editor
                    .edit_singleton::<ContactInfo, _>(&patch)
                    .await
                    .map(|r| to_json(&r))
                    .map_err(edit_failure)
            }
            Some(_) => Err((
                StatusCode::BAD_REQUEST,
                format!("{name} is not a singleton concern"),
            )),
            None => Err((StatusCode::NOT_FOUND, format!("unknown concern {name}"))),
        }
    }

    async fn list_by_name(&self, name: &str) -> AdminResult {
        let store = self.editor.store();
        match Concern::from_name(name) {
            Some(Concern::TeamMembers) => store
                .list::<TeamMember>(Filter::default())
                .await
                .map(|r| to_json(&r))
                .map_err(|e| edit_failure(e.into())),
            Some(Concern::Projects) => store
                .list::<Project>(Filter::default())
                .await
                .map(|r| to_json(&r))
                .map_err(|e| edit_failure(e.into())),
            Some(Concern::JobPositions) => store
                .list::<JobPosition>(Filter::default())
                .await
                .map(|r| to_json(&r))
                .map_err(|e| edit_failure(e.into())),
            Some(Concern::Partners) => store
                .list::<Partner>(Filter::default())
                .await
                .map(|r| to_json(&r))
                .map_err(|e| edit_failure(e.into())),
            _ => Err(not_a_collection(name)),
        }
    }

    async fn add_by_name(&self, name: &str, req: ItemEditRequest) -> AdminResult {
        let ItemEditRequest { fields, image } = req;
        match Concern::from_name(name) {
            Some(Concern::TeamMembers) => {
                let patch: TeamMemberPatch = parse_fields(fields)?;
                self.editor
                    .add_item_with_image::<TeamMember, _>(patch, image)
                    .await
                    .map(|r| to_json(&r))
                    .map_err(edit_failure)
            }
            Some(Concern::Projects) => {
                let patch: ProjectPatch = parse_fields(fields)?;
                self.editor
                    .add_item_with_image::<Project, _>(patch, image)
                    .await
                    .map(|r| to_json(&r))
                    .map_err(edit_failure)
            }
            Some(Concern::JobPositions) => {
                let patch: JobPositionPatch = parse_fields(fields)?;
                self.editor
                    .add_item::<JobPosition, _>(&patch)
                    .await
                    .map(|r| to_json(&r))
                    .map_err(edit_failure)
            }
            Some(Concern::Partners) => {
                let patch: PartnerPatch = parse_fields(fields)?;
                self.editor
                    .add_item_with_image::<Partner, _>(patch, image)
                    .await
                    .map(|r| to_json(&r))
                    .map_err(edit_failure)
            }
            _ => Err(not_a_collection(name)),
        }
    }

    async fn update_by_name(&self, name: &str, id: Uuid, req: ItemEditRequest) -> AdminResult {
        let ItemEditRequest { fields, image } = req;
        match Concern::from_name(name) {
            Some(Concern::TeamMembers) => {
                let patch: TeamMemberPatch = parse_fields(fields)?;
                self.editor
                    .update_item_with_image::<TeamMember, _>(id, patch, image)
                    .await
                    .map(|r| to_json(&r))
                    .map_err(edit_failure)
            }
            Some(Concern::Projects) => {
                let patch: ProjectPatch = parse_fields(fields)?;
                self.editor
                    .update_item_with_image::<Project, _>(id, patch, image)
                    .await
                    .map(|r| to_json(&r))
                    .map_err(edit_failure)
            }
            Some(Concern::JobPositions) => {
                let patch: JobPositionPatch = parse_fields(fields)?;
                self.editor
                    .update_item::<JobPosition, _>(id, &patch)
                    .await
                    .map(|r| to_json(&r))
                    .map_err(edit_failure)
            }
            Some(Concern::Partners) => {
                let patch: PartnerPatch = parse_fields(fields)?;
                self.editor
                    .update_item_with_image::<Partner, _>(id, patch, image)
                    .await
                    .map(|r| to_json(&r))
                    .map_err(edit_failure)
            }
            _ => Err(not_a_collection(name)),
        }
    }

    async fn remove_by_name(&self, name: &str, id: Uuid) -> AdminResult {
        match Concern::from_name(name) {
            Some(Concern::TeamMembers) => self.editor.remove_item::<TeamMember>(id).await,
            Some(Concern::Projects) => self.editor.remove_item::<Project>(id).await,
            Some(Concern::JobPositions) => self.editor.remove_item::<JobPosition>(id).await,
            Some(Concern::Partners) => self.editor.remove_item::<Partner>(id).await,
            _ => return Err(not_a_collection(name)),
        }
        .map(|_| Value::Null)
        .map_err(edit_failure)
    }

    async fn reorder_by_name(&self, name: &str, ids: &[Uuid]) -> AdminResult {
        match Concern::from_name(name) {
            Some(Concern::TeamMembers) => self.editor.reorder::<TeamMember>(ids).await,
            Some(Concern::Projects) => self.editor.reorder::<Project>(ids).await,
            Some(Concern::JobPositions) => self.editor.reorder::<JobPosition>(ids).await,
            Some(Concern::Partners) => self.editor.reorder::<Partner>(ids).await,
            _ => return Err(not_a_collection(name)),
        }
        .map(|_| Value::Null)
        .map_err(edit_failure)
    }
}

/// Body of a singleton edit: concern fields plus an optional inline image
#[derive(Debug, Default, Deserialize)]
struct SingletonEditRequest {
    #[serde(default)]
    fields: Value,
    #[serde(default)]
    image: Option<ImageUpload>,
}

/// Body of a collection create/update
#[derive(Debug, Default, Deserialize)]
struct ItemEditRequest {
    #[serde(default)]
    fields: Value,
    #[serde(default)]
    image: Option<ImageUpload>,
}

#[derive(Debug, Deserialize)]
struct ReorderRequest {
    ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
struct ReadFlagRequest {
    is_read: bool,
}

fn parse_fields<P: serde::de::DeserializeOwned>(
    fields: Value,
) -> std::result::Result<P, (StatusCode, String)> {
    // An omitted fields block is an empty patch, not a malformed one.
    let fields = if fields.is_null() { json!({}) } else { fields };
    serde_json::from_value(fields).map_err(|err| {
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("invalid fields: {err}"),
        )
    })
}

fn edit_failure(err: crate::editor::EditError) -> (StatusCode, String) {
    tracing::error!("edit operation failed: {}", err);
    (StatusCode::BAD_GATEWAY, err.to_string())
}

fn not_a_collection(name: &str) -> (StatusCode, String) {
    (
        StatusCode::NOT_FOUND,
        format!("{name} is not an editable collection"),
    )
}

fn respond(result: AdminResult) -> (StatusCode, Json<Value>) {
    match result {
        Ok(Value::Null) => (StatusCode::OK, Json(json!({ "success": true }))),
        Ok(data) => (
            StatusCode::OK,
            Json(json!({ "success": true, "data": data })),
        ),
        Err((status, reason)) => (status, Json(json!({ "success": false, "reason": reason }))),
    }
}

/// Build the full router over shared state
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        // public surface
        .route("/api/site", get(site_handler))
        .route("/api/views/:view", get(view_handler))
        .route("/api/contact", post(contact_handler))
        .route("/sitemap.xml", get(sitemap_handler))
        .route("/robots.txt", get(robots_handler))
        // admin surface
        .route("/admin/api/content/:concern", put(admin_content_handler))
        .route("/admin/api/messages", get(admin_messages_handler))
        .route(
            "/admin/api/messages/:id/read",
            put(admin_message_read_handler),
        )
        .route(
            "/admin/api/:collection",
            get(admin_list_handler).post(admin_create_handler),
        )
        .route("/admin/api/:collection/reorder", post(admin_reorder_handler))
        .route(
            "/admin/api/:collection/:id",
            put(admin_update_handler).delete(admin_delete_handler),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the content API server
pub async fn start(editor: Editor, config: &CuratorConfig) -> Result<()> {
    let state = Arc::new(ServerState::new(editor, config));
    let app = router(state);

    // Parse address - handle "localhost" specially
    let bind_ip = if config.server_ip == "localhost" {
        "127.0.0.1"
    } else {
        &config.server_ip
    };
    let addr: SocketAddr = format!("{}:{}", bind_ip, config.server_port).parse()?;

    println!(
        "Content API running at http://{}:{}",
        config.server_ip, config.server_port
    );
    println!("Press Ctrl+C to stop.");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// -- public handlers --------------------------------------------------------

/// The logo/name singleton as structured data; missing rows come back as
/// nulls, never as an error status
async fn site_handler(State(state): State<Arc<ServerState>>) -> Json<Value> {
    match state.editor.store().singleton::<SiteIdentity>().await {
        Ok(Some(identity)) => Json(json!({
            "site_name": identity.site_name,
            "tagline": identity.tagline,
            "logo_url": identity.logo_url,
        })),
        Ok(None) => Json(json!({
            "site_name": null,
            "tagline": null,
            "logo_url": null,
        })),
        Err(err) => {
            tracing::warn!("site endpoint falling back to nulls: {}", err);
            Json(json!({
                "site_name": null,
                "tagline": null,
                "logo_url": null,
            }))
        }
    }
}

async fn view_handler(
    State(state): State<Arc<ServerState>>,
    Path(view): Path<String>,
) -> impl IntoResponse {
    match state.render_view(&view).await {
        Some(payload) => (StatusCode::OK, Json(payload)),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "reason": format!("unknown view {view}") })),
        ),
    }
}

async fn contact_handler(
    State(state): State<Arc<ServerState>>,
    Json(message): Json<ContactSubmissionNew>,
) -> (StatusCode, Json<Value>) {
    match state.editor.submit_contact_message(&message).await {
        Ok(_) => (StatusCode::OK, Json(json!({ "success": true }))),
        Err(err) => {
            // Internal detail stays internal on the public surface.
            tracing::error!("contact submission failed: {}", err);
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({
                    "success": false,
                    "reason": "message could not be delivered",
                })),
            )
        }
    }
}

async fn sitemap_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let entries = sitemap::entries(state.editor.store(), &state.site_url).await;
    let xml = sitemap::render_sitemap(&entries);
    ([(header::CONTENT_TYPE, "application/xml")], xml)
}

async fn robots_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain")],
        sitemap::render_robots(&state.site_url),
    )
}

// -- admin handlers ---------------------------------------------------------

async fn admin_content_handler(
    State(state): State<Arc<ServerState>>,
    Path(concern): Path<String>,
    Json(req): Json<SingletonEditRequest>,
) -> (StatusCode, Json<Value>) {
    respond(state.edit_singleton_by_name(&concern, req).await)
}

async fn admin_list_handler(
    State(state): State<Arc<ServerState>>,
    Path(collection): Path<String>,
) -> (StatusCode, Json<Value>) {
    respond(state.list_by_name(&collection).await)
}

async fn admin_create_handler(
    State(state): State<Arc<ServerState>>,
    Path(collection): Path<String>,
    Json(req): Json<ItemEditRequest>,
) -> (StatusCode, Json<Value>) {
    respond(state.add_by_name(&collection, req).await)
}

async fn admin_update_handler(
    State(state): State<Arc<ServerState>>,
    Path((collection, id)): Path<(String, Uuid)>,
    Json(req): Json<ItemEditRequest>,
) -> (StatusCode, Json<Value>) {
    respond(state.update_by_name(&collection, id, req).await)
}

async fn admin_delete_handler(
    State(state): State<Arc<ServerState>>,
    Path((collection, id)): Path<(String, Uuid)>,
) -> (StatusCode, Json<Value>) {
    respond(state.remove_by_name(&collection, id).await)
}

async fn admin_reorder_handler(
    State(state): State<Arc<ServerState>>,
    Path(collection): Path<String>,
    Json(req): Json<ReorderRequest>,
) -> (StatusCode, Json<Value>) {
    respond(state.reorder_by_name(&collection, &req.ids).await)
}

async fn admin_messages_handler(
    State(state): State<Arc<ServerState>>,
) -> (StatusCode, Json<Value>) {
    let result = state
        .editor
        .store()
        .list::<ContactSubmission>(Filter::default())
        .await
        .map(|messages| to_json(&messages))
        .map_err(|e| edit_failure(e.into()));
    respond(result)
}

async fn admin_message_read_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<ReadFlagRequest>,
) -> (StatusCode, Json<Value>) {
    let result = state
        .editor
        .set_message_read(id, req.is_read)
        .await
        .map(|message| to_json(&message))
        .map_err(edit_failure);
    respond(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{AssetStore, MemoryObjectBackend};
    use crate::invalidate::Invalidator;
    use crate::store::{ContentStore, MemoryBackend};

    fn test_state() -> Arc<ServerState> {
        let store = ContentStore::new(Arc::new(MemoryBackend::new()));
        let assets = AssetStore::new(
            Arc::new(MemoryObjectBackend::new()),
            "https://store.example.com",
        );
        let editor = Editor::new(store, assets, Arc::new(Invalidator::new()));
        let config = CuratorConfig {
            title: "Test Site".to_string(),
            url: "https://example.com".to_string(),
            ..Default::default()
        };
        Arc::new(ServerState::new(editor, &config))
    }

    #[tokio::test]
    async fn test_unknown_view_is_none() {
        let state = test_state();
        assert!(state.render_view("no-such-view").await.is_none());
    }

    #[tokio::test]
    #[serial_test::serial(theme_state)]
    async fn test_view_payload_carries_derived_theme() {
        let state = test_state();
        state
            .edit_singleton_by_name(
                "site_theme",
                SingletonEditRequest {
                    fields: json!({ "background_color": "#000000", "accent_color": "#100000" }),
                    image: None,
                },
            )
            .await
            .unwrap();

        let payload = state.render_view("home").await.unwrap();
        // 0x00 lightened by 15% is 0x26; 0x10 brightened by 10% is 0x12.
        assert_eq!(payload["theme"]["secondary_background"], "#262626");
        assert_eq!(payload["theme"]["hover_accent"], "#120000");
    }

    #[tokio::test]
    #[serial_test::serial(theme_state)]
    async fn test_render_cache_serves_until_invalidated() {
        let state = test_state();

        state
            .edit_singleton_by_name(
                "about_intro",
                SingletonEditRequest {
                    fields: json!({ "heading": "first" }),
                    image: None,
                },
            )
            .await
            .unwrap();
        let first = state.render_view("about").await.unwrap();
        assert_eq!(first["about_intro"]["heading"], "first");

        // A fresh edit invalidates the view, so the next render refetches
        // instead of serving the cached payload.
        state
            .edit_singleton_by_name(
                "about_intro",
                SingletonEditRequest {
                    fields: json!({ "heading": "second" }),
                    image: None,
                },
            )
            .await
            .unwrap();
        let second = state.render_view("about").await.unwrap();
        assert_eq!(second["about_intro"]["heading"], "second");
    }

    #[tokio::test]
    async fn test_singleton_edit_merges_fields() {
        let state = test_state();
        state
            .edit_singleton_by_name(
                "about_intro",
                SingletonEditRequest {
                    fields: json!({ "heading": "X" }),
                    image: None,
                },
            )
            .await
            .unwrap();
        state
            .edit_singleton_by_name(
                "about_intro",
                SingletonEditRequest {
                    fields: json!({ "subheading": "fresh" }),
                    image: None,
                },
            )
            .await
            .unwrap();

        let about = state
            .editor
            .store()
            .singleton::<AboutIntro>()
            .await
            .unwrap()
            .unwrap();
        assert_eq!(about.heading, "X");
        assert_eq!(about.subheading, "fresh");
    }

    #[tokio::test]
    async fn test_collection_concern_rejected_as_singleton() {
        let state = test_state();
        let result = state
            .edit_singleton_by_name("team_members", SingletonEditRequest::default())
            .await;
        assert_eq!(result.unwrap_err().0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_concern_is_not_found() {
        let state = test_state();
        let result = state
            .edit_singleton_by_name("mystery", SingletonEditRequest::default())
            .await;
        assert_eq!(result.unwrap_err().0, StatusCode::NOT_FOUND);

        let result = state.add_by_name("mystery", ItemEditRequest::default()).await;
        assert_eq!(result.unwrap_err().0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_fields_are_unprocessable() {
        let state = test_state();
        let result = state
            .edit_singleton_by_name(
                "site_theme",
                SingletonEditRequest {
                    fields: json!({ "primary_color": 42 }),
                    image: None,
                },
            )
            .await;
        assert_eq!(result.unwrap_err().0, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_collection_crud_and_reorder_by_name() {
        let state = test_state();

        let a = state
            .add_by_name(
                "projects",
                ItemEditRequest {
                    fields: json!({ "title": "a" }),
                    image: None,
                },
            )
            .await
            .unwrap();
        let b = state
            .add_by_name(
                "projects",
                ItemEditRequest {
                    fields: json!({ "title": "b" }),
                    image: None,
                },
            )
            .await
            .unwrap();

        let id = |v: &Value| Uuid::parse_str(v["id"].as_str().unwrap()).unwrap();
        state
            .reorder_by_name("projects", &[id(&b), id(&a)])
            .await
            .unwrap();

        let listed = state.list_by_name("projects").await.unwrap();
        let titles: Vec<&str> = listed
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["title"].as_str().unwrap())
            .collect();
        assert_eq!(titles, vec!["b", "a"]);

        state.remove_by_name("projects", id(&a)).await.unwrap();
        let listed = state.list_by_name("projects").await.unwrap();
        assert_eq!(listed.as_array().unwrap().len(), 1);
    }
}
