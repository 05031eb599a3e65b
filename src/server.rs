//! HTTP surface.
//!
//! An axum router over the [`Gallery`] service, the static [`Pages`], and the
//! uploads directory.
//!
//! ## Routes
//!
//! | Method | Path                              | Access |
//! |--------|-----------------------------------|--------|
//! | GET    | `/`, `/projects`, `/contact`, `/experience` | anyone |
//! | GET    | `/gallery/login`                  | anyone |
//! | POST   | `/gallery/login`                  | anyone |
//! | GET    | `/gallery`                        | public or admin |
//! | GET    | `/gallery/logout`                 | anyone |
//! | POST   | `/gallery/add_card`               | admin  |
//! | POST   | `/gallery/edit_card/:card_id`     | admin  |
//! | POST   | `/gallery/upload_image`           | admin  |
//! | POST   | `/gallery/upload_folder`          | admin  |
//! | POST   | `/gallery/delete_card/:card_id`   | admin  |
//! | POST   | `/gallery/delete_image/:image_id` | admin  |
//! | GET    | `/uploads/*`                      | anyone |
//!
//! ## Request flow
//!
//! The session middleware resolves the `gallery_session` cookie (issuing a
//! new id when there is none) and stores the [`SessionId`] in the request
//! extensions. Handlers snapshot the session, call the gallery on the
//! blocking pool, push the outcome as flash messages, and answer
//! `303 See Other` to `/gallery`. Unknown card or image ids in the path
//! answer 404, and so do ids that are not integers.

use crate::access::{AccessError, AccessGate};
use crate::catalog::{Catalog, CatalogError};
use crate::config::SiteConfig;
use crate::files::DiskStore;
use crate::gallery::{Gallery, GalleryError, Upload};
use crate::pages::{PageKind, Pages};
use crate::render;
use crate::session::{Flash, SessionId, SessionStore};
use axum::{
    Extension, Form, Router,
    extract::{
        DefaultBodyLimit, Multipart, Path, Request, State, multipart::MultipartError,
        rejection::PathRejection,
    },
    http::{HeaderValue, StatusCode, header},
    middleware::{Next, from_fn},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Deserialize;
use std::io;
use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
}

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub gallery: Arc<Gallery>,
    pub sessions: Arc<SessionStore>,
    pub pages: Arc<Pages>,
    pub uploads_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl AppState {
    /// Open the catalog, uploads directory, and pages a config points at.
    pub fn from_config(config: &SiteConfig, site_dir: &FsPath) -> Result<Self, ServerError> {
        let paths = config.resolve_paths(site_dir);
        let catalog = Catalog::open(&paths.database)?;
        let files = DiskStore::open(&paths.uploads)?;
        let pages = Pages::load(&paths.content_root)?;
        let gallery = Gallery::new(
            catalog,
            Arc::new(files),
            AccessGate::new(config.gallery.passwords.clone()),
            config.gallery.allowed_extensions.clone(),
        );
        Ok(Self {
            gallery: Arc::new(gallery),
            sessions: Arc::new(SessionStore::with_idle_timeout(
                config.gallery.session_idle_timeout(),
            )),
            pages: Arc::new(pages),
            uploads_dir: paths.uploads,
            max_upload_bytes: config.gallery.max_upload_bytes,
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/projects", get(projects))
        .route("/contact", get(contact))
        .route("/experience", get(experience))
        .route("/gallery", get(gallery_page))
        .route("/gallery/login", get(login_form).post(login))
        .route("/gallery/logout", get(logout))
        .route("/gallery/add_card", post(add_card))
        .route("/gallery/edit_card/:card_id", post(edit_card))
        .route("/gallery/upload_image", post(upload_image))
        .route("/gallery/upload_folder", post(upload_folder))
        .route("/gallery/delete_card/:card_id", post(delete_card))
        .route("/gallery/delete_image/:image_id", post(delete_image))
        .nest_service("/uploads", ServeDir::new(&state.uploads_dir))
        .fallback(not_found)
        .layer(from_fn(session_middleware))
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind the configured address and serve until Ctrl+C or SIGTERM.
pub async fn serve(config: &SiteConfig, site_dir: &FsPath) -> Result<(), ServerError> {
    let state = AppState::from_config(config, site_dir)?;
    let app = build_router(state);

    let address = config.server.address();
    let listener = TcpListener::bind(&address).await?;
    info!("Server running on http://{address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                warn!(error = %e, "Failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

// ============================================================================
// Middleware
// ============================================================================

async fn session_middleware(mut req: Request, next: Next) -> Response {
    let existing = req
        .headers()
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(SessionId::from_cookie_header);
    let id = existing.unwrap_or_else(SessionId::generate);
    req.extensions_mut().insert(id);

    let mut resp = next.run(req).await;
    if existing.is_none() {
        if let Ok(cookie) = HeaderValue::from_str(&id.set_cookie()) {
            resp.headers_mut().append(header::SET_COOKIE, cookie);
        }
    }
    resp
}

// ============================================================================
// Site pages
// ============================================================================

async fn home(
    State(state): State<AppState>,
    Extension(sid): Extension<SessionId>,
) -> Html<String> {
    site_page(&state, sid, PageKind::Home)
}

async fn projects(
    State(state): State<AppState>,
    Extension(sid): Extension<SessionId>,
) -> Html<String> {
    site_page(&state, sid, PageKind::Projects)
}

async fn contact(
    State(state): State<AppState>,
    Extension(sid): Extension<SessionId>,
) -> Html<String> {
    site_page(&state, sid, PageKind::Contact)
}

async fn experience(
    State(state): State<AppState>,
    Extension(sid): Extension<SessionId>,
) -> Html<String> {
    site_page(&state, sid, PageKind::Experience)
}

fn site_page(state: &AppState, sid: SessionId, kind: PageKind) -> Html<String> {
    let flashes = state.sessions.take_flashes(sid);
    Html(render::render_page(state.pages.get(kind), &flashes).into_string())
}

async fn not_found() -> Response {
    not_found_page()
}

fn not_found_page() -> Response {
    (
        StatusCode::NOT_FOUND,
        Html(render::render_not_found().into_string()),
    )
        .into_response()
}

// ============================================================================
// Login
// ============================================================================

#[derive(Debug, Deserialize)]
struct LoginForm {
    #[serde(default)]
    password: String,
}

async fn login_form(
    State(state): State<AppState>,
    Extension(sid): Extension<SessionId>,
) -> Html<String> {
    let flashes = state.sessions.take_flashes(sid);
    Html(render::render_login(&flashes).into_string())
}

async fn login(
    State(state): State<AppState>,
    Extension(sid): Extension<SessionId>,
    Form(form): Form<LoginForm>,
) -> Response {
    match state.gallery.gate().authenticate(&form.password) {
        Some(level) => {
            info!(%level, "login");
            state.sessions.set_access(sid, level);
            state
                .sessions
                .flash(sid, Flash::success(format!("Logged in with {level} access.")));
            gallery_redirect()
        }
        None => {
            info!("rejected login");
            state.sessions.flash(sid, Flash::error("Incorrect password."));
            let flashes = state.sessions.take_flashes(sid);
            Html(render::render_login(&flashes).into_string()).into_response()
        }
    }
}

async fn logout(State(state): State<AppState>, Extension(sid): Extension<SessionId>) -> Redirect {
    state.sessions.clear_access(sid);
    Redirect::to("/")
}

// ============================================================================
// Gallery
// ============================================================================

async fn gallery_page(
    State(state): State<AppState>,
    Extension(sid): Extension<SessionId>,
) -> Response {
    let session = state.sessions.get(sid);
    match with_gallery(&state, move |g| g.tree(&session)).await {
        Ok(view) => {
            let flashes = state.sessions.take_flashes(sid);
            Html(render::render_gallery(&view, &flashes).into_string()).into_response()
        }
        Err(GalleryError::Access(_)) => Redirect::to("/gallery/login").into_response(),
        Err(e) => {
            warn!(error = %e, "failed to load gallery");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct CardForm {
    #[serde(default)]
    card_name: String,
    parent_id: Option<String>,
}

async fn add_card(
    State(state): State<AppState>,
    Extension(sid): Extension<SessionId>,
    Form(form): Form<CardForm>,
) -> Response {
    let session = state.sessions.get(sid);
    let result = with_gallery(&state, move |g| {
        g.add_card(&session, &form.card_name, form.parent_id.as_deref())
    })
    .await;
    respond(&state, sid, result, |card| {
        vec![Flash::success(format!("Card \"{}\" created.", card.name))]
    })
}

async fn edit_card(
    State(state): State<AppState>,
    Extension(sid): Extension<SessionId>,
    card_id: Result<Path<i64>, PathRejection>,
    Form(form): Form<CardForm>,
) -> Response {
    let Ok(Path(card_id)) = card_id else {
        return not_found_page();
    };
    let session = state.sessions.get(sid);
    let result = with_gallery(&state, move |g| {
        g.edit_card(&session, card_id, &form.card_name)
    })
    .await;
    respond(&state, sid, result, |card| {
        vec![Flash::success(format!("Card renamed to \"{}\".", card.name))]
    })
}

async fn upload_image(
    State(state): State<AppState>,
    Extension(sid): Extension<SessionId>,
    multipart: Multipart,
) -> Response {
    let form = match read_upload_form(multipart, "image").await {
        Ok(form) => form,
        Err(e) => return e.into_response(),
    };
    let card_id = form.card_id.and_then(|raw| raw.trim().parse().ok());
    let session = state.sessions.get(sid);
    let result = with_gallery(&state, move |g| {
        g.upload_image(&session, card_id, form.files)
    })
    .await;
    // An unknown card id comes from a form field, not the path: flash it.
    let result = result.map_err(|e| match e {
        GalleryError::CardNotFound(_) => GalleryError::NoCardSelected,
        other => other,
    });
    respond(&state, sid, result, |report| report.flashes())
}

async fn upload_folder(
    State(state): State<AppState>,
    Extension(sid): Extension<SessionId>,
    multipart: Multipart,
) -> Response {
    let form = match read_upload_form(multipart, "folder_files").await {
        Ok(form) => form,
        Err(e) => return e.into_response(),
    };
    let session = state.sessions.get(sid);
    let result = with_gallery(&state, move |g| g.upload_folder(&session, form.files)).await;
    respond(&state, sid, result, |report| vec![report.flash()])
}

async fn delete_card(
    State(state): State<AppState>,
    Extension(sid): Extension<SessionId>,
    card_id: Result<Path<i64>, PathRejection>,
) -> Response {
    let Ok(Path(card_id)) = card_id else {
        return not_found_page();
    };
    let session = state.sessions.get(sid);
    let result = with_gallery(&state, move |g| g.delete_card(&session, card_id)).await;
    respond(&state, sid, result, |deletion| vec![deletion.flash()])
}

async fn delete_image(
    State(state): State<AppState>,
    Extension(sid): Extension<SessionId>,
    image_id: Result<Path<i64>, PathRejection>,
) -> Response {
    let Ok(Path(image_id)) = image_id else {
        return not_found_page();
    };
    let session = state.sessions.get(sid);
    let result = with_gallery(&state, move |g| g.delete_image(&session, image_id)).await;
    respond(&state, sid, result, |_| vec![Flash::success("Image deleted.")])
}

// ============================================================================
// Helpers
// ============================================================================

/// Run a gallery operation on the blocking pool.
async fn with_gallery<T, F>(state: &AppState, f: F) -> Result<T, GalleryError>
where
    T: Send + 'static,
    F: FnOnce(&Gallery) -> Result<T, GalleryError> + Send + 'static,
{
    let gallery = Arc::clone(&state.gallery);
    tokio::task::spawn_blocking(move || f(&gallery))
        .await
        .unwrap_or_else(|e| Err(GalleryError::Io(io::Error::other(e))))
}

/// Turn a mutation outcome into flashes plus a redirect, or a 404.
fn respond<T>(
    state: &AppState,
    sid: SessionId,
    result: Result<T, GalleryError>,
    flashes: impl FnOnce(T) -> Vec<Flash>,
) -> Response {
    match result {
        Ok(value) => {
            state.sessions.flash_all(sid, flashes(value));
            gallery_redirect()
        }
        Err(e) if e.is_not_found() => {
            info!(error = %e, "not found");
            not_found_page()
        }
        Err(GalleryError::Access(_)) => {
            state
                .sessions
                .flash(sid, Flash::error(AccessError::Forbidden.to_string()));
            gallery_redirect()
        }
        Err(e) => {
            if matches!(e, GalleryError::Storage(_) | GalleryError::Io(_)) {
                warn!(error = %e, "gallery operation failed");
            }
            state.sessions.flash(sid, Flash::error(e.to_string()));
            gallery_redirect()
        }
    }
}

fn gallery_redirect() -> Response {
    Redirect::to("/gallery").into_response()
}

/// Decoded multipart upload form.
#[derive(Debug, Default)]
struct UploadForm {
    card_id: Option<String>,
    files: Vec<Upload>,
}

/// Collect every part named `file_field` as an upload, plus `card_id`.
async fn read_upload_form(
    mut multipart: Multipart,
    file_field: &str,
) -> Result<UploadForm, MultipartError> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        if name == file_field {
            let filename = field.file_name().unwrap_or_default().to_string();
            let bytes = field.bytes().await?;
            form.files.push(Upload::new(filename, bytes.to_vec()));
        } else if name == "card_id" {
            form.card_id = Some(field.text().await?);
        }
    }
    Ok(form)
}
