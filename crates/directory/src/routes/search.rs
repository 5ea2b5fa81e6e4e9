//! Shop search endpoint.

use axum::{
    Json,
    extract::{RawQuery, State},
};
use tracing::instrument;

use crate::error::Result;
use crate::search::{Page, ShopView};
use crate::state::AppState;

/// `GET /api/shops/search`
///
/// The raw query string is handed to the filter registry as-is so repeated
/// and bracketed keys (`filter[city]`) survive, and so pagination links can
/// rebuild it.
#[instrument(skip(state))]
pub async fn search(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Json<Page<ShopView>>> {
    let page = state.search().search_query(query.as_deref()).await?;
    Ok(Json(page))
}
