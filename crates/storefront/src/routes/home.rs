//! Home page route handler.

use axum::{Json, extract::State};
use serde::Serialize;
use tracing::instrument;

use boardquest_core::MainContent;

use crate::error::{NoticeExt, Result};
use crate::state::AppState;

/// Home page data: the hero banner, if one has been saved.
#[derive(Debug, Serialize)]
pub struct HomeView {
    pub main_content: Option<MainContent>,
}

/// Display the main screen content.
#[instrument(skip(state))]
pub async fn home(State(state): State<AppState>) -> Result<Json<HomeView>> {
    let catalog = state.catalog();
    if !catalog.is_ready() {
        catalog
            .reload_main_content(state.tables())
            .await
            .or_notice("Failed to load content")?;
    }

    Ok(Json(HomeView {
        main_content: catalog.main_content().await,
    }))
}
