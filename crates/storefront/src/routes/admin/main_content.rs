//! Admin editor for the main screen (hero) content.

use axum::{
    Json,
    extract::{Multipart, State},
};
use serde::Serialize;
use tower_sessions::Session;
use tracing::instrument;

use boardquest_core::{MainContent, MainContentDraft};

use super::form::AdminForm;
use super::refresh_main_content;
use crate::error::{NoticeExt, Result, add_breadcrumb};
use crate::middleware::RequireAdmin;
use crate::models::WithNotice;
use crate::state::AppState;

/// The editor's current values.
#[derive(Debug, Serialize)]
pub struct MainContentView {
    pub main_content: Option<MainContent>,
}

/// Load the saved content, if any.
#[instrument(skip(state, session, admin), fields(admin_id = %admin.id))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
) -> Result<Json<MainContentView>> {
    let caller = state.auth(&session).caller().await?;
    let main_content = state
        .main_content()
        .load(&caller)
        .await
        .or_notice("Failed to load content")?;
    Ok(Json(MainContentView { main_content }))
}

/// Save the content, overwriting the existing row.
///
/// `remove_image` clears the hero image; otherwise a new upload replaces it
/// and no upload keeps the current one.
#[instrument(skip(state, session, admin, multipart), fields(admin_id = %admin.id))]
pub async fn save(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
    multipart: Multipart,
) -> Result<Json<WithNotice<MainContentView>>> {
    let form = AdminForm::read(multipart).await?;
    let draft = MainContentDraft::parse(
        form.text("big_title"),
        form.text("paragraph"),
        form.text("button_text"),
    )?;
    let caller = state.auth(&session).caller().await?;

    let existing = state
        .main_content()
        .load(&caller)
        .await
        .or_notice("Failed to load content")?;

    let hero_image = if form.flag("remove_image") {
        None
    } else if let Some(image) = form.image {
        Some(
            state
                .uploads()
                .upload_hero_image(&caller, image)
                .await
                .or_notice("Failed to upload image")?,
        )
    } else {
        existing.as_ref().and_then(|c| c.hero_image.clone())
    };

    let draft = draft
        .for_existing(existing.map(|c| c.id))
        .with_hero_image(hero_image);
    let saved = state
        .main_content()
        .save(&caller, &draft)
        .await
        .or_notice("Failed to update content")?;
    add_breadcrumb("admin", "Main content saved", None);
    refresh_main_content(&state).await;

    Ok(Json(WithNotice::success(
        "Main screen content updated successfully",
        MainContentView {
            main_content: Some(saved),
        },
    )))
}
