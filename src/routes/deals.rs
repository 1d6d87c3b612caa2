use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::error;
use utoipa::ToSchema;

use crate::entities::deals::Model;
use crate::error::AppError;
use crate::store::{self, deals::DealCreate};
use crate::AppState;

/// A deal as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Deal {
    /// HubSpot object id, or the creation time in epoch milliseconds for locally created deals
    pub id: i64,
    pub dealname: Option<String>,
    pub amount: Option<f64>,
    pub pipeline: Option<String>,
    pub dealstage: Option<String>,
    pub createdate: Option<DateTime<Utc>>,
    pub hs_lastmodifieddate: Option<DateTime<Utc>>,
    pub closedate: Option<DateTime<Utc>>,
    /// Read from the properties blob; not stored as a column
    pub deal_owner_id: Option<String>,
    /// Raw HubSpot properties
    #[schema(value_type = Object)]
    pub properties: Value,
}

impl From<Model> for Deal {
    fn from(model: Model) -> Self {
        let deal_owner_id = model
            .properties
            .get("deal_owner_id")
            .and_then(Value::as_str)
            .map(str::to_string);

        Self {
            id: model.id,
            dealname: model.dealname,
            amount: model.amount,
            pipeline: model.pipeline,
            dealstage: model.dealstage,
            createdate: model.createdate,
            hs_lastmodifieddate: model.hs_lastmodifieddate,
            closedate: model.closedate,
            deal_owner_id,
            properties: model.properties,
        }
    }
}

async fn connect(state: &AppState) -> Result<DatabaseConnection, AppError> {
    state.connector.connect().await.map_err(|e| {
        error!("FATAL: Could not connect to the database: {}", e);
        AppError::ServiceUnavailable("Database connection is currently unavailable.".to_string())
    })
}

/// Create a deal from user-provided fields
#[utoipa::path(
    post,
    path = "/deals",
    tag = "Deals",
    request_body = DealCreate,
    responses(
        (status = 201, description = "Deal created", body = Deal),
        (status = 422, description = "Missing or mistyped fields"),
        (status = 500, description = "Database error"),
        (status = 503, description = "Database unreachable")
    )
)]
#[tracing::instrument(skip(state, payload), fields(dealname = %payload.dealname))]
pub async fn create_deal(
    State(state): State<AppState>,
    Json(payload): Json<DealCreate>,
) -> Result<(StatusCode, Json<Deal>), AppError> {
    let db = connect(&state).await?;
    let result = store::deals::insert_deal(&db, &payload).await;
    store::release(db).await;

    let model = result.map_err(|e| {
        error!(error = ?e, "Database error during deal creation");
        AppError::from(e)
    })?;
    Ok((StatusCode::CREATED, Json(Deal::from(model))))
}

/// List every stored deal, newest first
#[utoipa::path(
    get,
    path = "/deals",
    tag = "Deals",
    responses(
        (status = 200, description = "All deals ordered by creation date, newest first", body = [Deal]),
        (status = 500, description = "Database error"),
        (status = 503, description = "Database unreachable")
    )
)]
#[tracing::instrument(skip(state))]
pub async fn list_deals(State(state): State<AppState>) -> Result<Json<Vec<Deal>>, AppError> {
    let db = connect(&state).await?;
    let result = store::deals::list_deals(&db).await;
    store::release(db).await;

    let models = result.map_err(|e| {
        error!(error = ?e, "Database error while fetching all deals");
        AppError::from(e)
    })?;
    Ok(Json(models.into_iter().map(Deal::from).collect()))
}

/// Fetch one deal by id
#[utoipa::path(
    get,
    path = "/deals/{id}",
    tag = "Deals",
    params(
        ("id" = i64, Path, description = "Deal id")
    ),
    responses(
        (status = 200, description = "The deal", body = Deal),
        (status = 404, description = "No deal with this id"),
        (status = 500, description = "Database error"),
        (status = 503, description = "Database unreachable")
    )
)]
#[tracing::instrument(skip(state))]
pub async fn get_deal(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Deal>, AppError> {
    let db = connect(&state).await?;
    let result = store::deals::find_deal(&db, id).await;
    store::release(db).await;

    match result {
        Ok(Some(model)) => Ok(Json(Deal::from(model))),
        Ok(None) => Err(AppError::NotFound(format!("deal {}", id))),
        Err(e) => {
            error!(error = ?e, deal_id = id, "Database error while fetching deal");
            Err(AppError::from(e))
        }
    }
}
