//! Shop management endpoints.
//!
//! Every handler receives the acting user explicitly and checks ownership
//! with [`Actor::can_manage`]. Admins see and manage every shop.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::instrument;

use shopmap_core::{Email, ShopId};

use crate::error::{AppError, Result};
use crate::models::{Actor, NewShop, Shop, ShopFields};
use crate::state::AppState;

/// JSON body for creating or updating a shop.
///
/// On update, absent fields keep their current value and an empty string
/// clears an optional field.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShopPayload {
    pub label: Option<String>,
    pub email: Option<String>,
    pub description: Option<String>,
    pub address_line_1: Option<String>,
    pub address_line_2: Option<String>,
    pub address_line_3: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub zip: Option<String>,
    pub website: Option<String>,
    pub digital_goods: Option<bool>,
}

impl ShopPayload {
    /// Apply the payload on top of `fields`.
    fn merge_into(self, mut fields: ShopFields) -> Result<ShopFields> {
        if let Some(label) = self.label {
            let label = label.trim();
            if label.is_empty() {
                return Err(AppError::BadRequest("The label field is required.".to_string()));
            }
            label.clone_into(&mut fields.label);
        }
        if let Some(email) = self.email {
            fields.email = Email::parse_optional(Some(&email))
                .map_err(|e| AppError::BadRequest(format!("Invalid email: {e}")))?;
        }

        merge_text(&mut fields.description, self.description);
        merge_text(&mut fields.address_line_1, self.address_line_1);
        merge_text(&mut fields.address_line_2, self.address_line_2);
        merge_text(&mut fields.address_line_3, self.address_line_3);
        merge_text(&mut fields.city, self.city);
        merge_text(&mut fields.country, self.country);
        merge_text(&mut fields.zip, self.zip);
        merge_text(&mut fields.website, self.website);
        if let Some(digital_goods) = self.digital_goods {
            fields.digital_goods = digital_goods;
        }

        Ok(fields)
    }

    fn into_new_fields(self) -> Result<ShopFields> {
        if self.label.as_deref().is_none_or(|l| l.trim().is_empty()) {
            return Err(AppError::BadRequest("The label field is required.".to_string()));
        }
        self.merge_into(ShopFields::default())
    }
}

fn merge_text(target: &mut Option<String>, update: Option<String>) {
    if let Some(value) = update {
        let value = value.trim();
        *target = (!value.is_empty()).then(|| value.to_string());
    }
}

/// Load a shop the actor is allowed to manage.
async fn load_managed(state: &AppState, actor: &Actor, id: ShopId) -> Result<Shop> {
    let shop = state
        .store()
        .find_shop(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("shop {id}")))?;

    if !actor.can_manage(&shop) {
        return Err(AppError::Forbidden(format!("shop {id}")));
    }
    Ok(shop)
}

/// `GET /shops`
#[instrument(skip(state), fields(user_id = %actor.user_id))]
pub async fn index(State(state): State<AppState>, actor: Actor) -> Result<Json<Vec<Shop>>> {
    let shops = state.store().list_shops(actor.listing_scope()).await?;
    Ok(Json(shops))
}

/// `POST /shops`
#[instrument(skip(state, payload), fields(user_id = %actor.user_id))]
pub async fn create(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<ShopPayload>,
) -> Result<(StatusCode, Json<Shop>)> {
    let fields = payload.into_new_fields()?;
    let shop = state
        .store()
        .create_shop(&NewShop {
            owner: actor.user_id,
            fields,
            external_key: None,
        })
        .await?;

    tracing::info!(shop_id = %shop.id, "Shop created");
    Ok((StatusCode::CREATED, Json(shop)))
}

/// `GET /shops/{id}`
#[instrument(skip(state), fields(user_id = %actor.user_id))]
pub async fn show(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<ShopId>,
) -> Result<Json<Shop>> {
    Ok(Json(load_managed(&state, &actor, id).await?))
}

/// `PUT /shops/{id}`
#[instrument(skip(state, payload), fields(user_id = %actor.user_id))]
pub async fn update(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<ShopId>,
    Json(payload): Json<ShopPayload>,
) -> Result<Json<Shop>> {
    let shop = load_managed(&state, &actor, id).await?;
    let fields = payload.merge_into(shop.fields)?;
    let updated = state.store().update_shop(id, &fields).await?;
    Ok(Json(updated))
}

/// `DELETE /shops/{id}`
#[instrument(skip(state), fields(user_id = %actor.user_id))]
pub async fn destroy(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<ShopId>,
) -> Result<StatusCode> {
    load_managed(&state, &actor, id).await?;
    state.store().delete_shop(id).await?;

    tracing::info!(shop_id = %id, "Shop deleted");
    Ok(StatusCode::NO_CONTENT)
}
