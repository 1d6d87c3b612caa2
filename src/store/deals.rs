use std::collections::hash_map::{Entry, HashMap};

use chrono::{DateTime, NaiveDate, SecondsFormat, SubsecRound, TimeZone, Utc};
use sea_orm::sea_query::{NullOrdering, OnConflict};
use sea_orm::{
    ActiveModelTrait, DatabaseConnection, DbErr, EntityTrait, Order, QueryOrder, Select, Set,
    TransactionTrait,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::entities::deals::{ActiveModel, Column, Model};
use crate::entities::Deals;
use crate::hubspot::RawDeal;

/// Body of `POST /deals`. Every field is required.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct DealCreate {
    /// Display name of the deal
    pub dealname: String,
    /// Deal value
    pub amount: f64,
    /// Pipeline the deal belongs to
    pub pipeline: String,
    /// Stage within the pipeline
    pub dealstage: String,
}

// ─── Field parsing ───────────────────────────────────────────────────────────

/// Lenient amount parsing: anything that is not a finite number becomes `None`.
pub fn parse_amount(value: Option<&Value>) -> Option<f64> {
    let amount = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    amount.is_finite().then_some(amount)
}

/// Accepts RFC 3339, a bare `YYYY-MM-DD` date, or epoch milliseconds.
pub fn parse_timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    match value? {
        Value::Number(n) => n.as_i64().and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
                return Some(ts.with_timezone(&Utc));
            }
            if s.bytes().all(|b| b.is_ascii_digit()) {
                return s
                    .parse::<i64>()
                    .ok()
                    .and_then(|ms| Utc.timestamp_millis_opt(ms).single());
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|naive| naive.and_utc())
        }
        _ => None,
    }
}

fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

// ─── Load / upsert ───────────────────────────────────────────────────────────

/// Maps a HubSpot record onto the `deals` row shape.
///
/// Returns `None` when the record id is not an integer; such records cannot
/// be keyed and are skipped by the caller.
pub fn deal_row(raw: &RawDeal) -> Option<ActiveModel> {
    let id = raw.id.as_i64()?;
    let props = &raw.properties;

    if props.get("amount").is_some_and(|v| !v.is_null()) && parse_amount(props.get("amount")).is_none() {
        debug!(deal_id = id, amount = ?props.get("amount"), "amount is not numeric; storing NULL");
    }

    Some(ActiveModel {
        id: Set(id),
        dealname: Set(text(props.get("dealname"))),
        amount: Set(parse_amount(props.get("amount"))),
        pipeline: Set(text(props.get("pipeline"))),
        dealstage: Set(text(props.get("dealstage"))),
        createdate: Set(parse_timestamp(props.get("createdate"))),
        hs_lastmodifieddate: Set(parse_timestamp(props.get("hs_lastmodifieddate"))),
        closedate: Set(parse_timestamp(props.get("closedate"))),
        properties: Set(Value::Object(props.clone())),
    })
}

/// `ON CONFLICT (id)` overwrites every non-key column.
pub(crate) fn upsert_on_conflict() -> OnConflict {
    OnConflict::column(Column::Id)
        .update_columns([
            Column::Dealname,
            Column::Amount,
            Column::Pipeline,
            Column::Dealstage,
            Column::Createdate,
            Column::HsLastmodifieddate,
            Column::Closedate,
            Column::Properties,
        ])
        .to_owned()
}

/// Rows per `INSERT` statement. Each row binds nine parameters and Postgres
/// caps a statement at 65535.
pub(crate) const UPSERT_CHUNK_ROWS: usize = 1000;

/// Writes a batch of HubSpot records in one transaction.
///
/// Records sharing an id collapse to the last one seen, since Postgres
/// refuses to update the same row twice in one `ON CONFLICT` statement. The
/// rows are sent in chunks of [`UPSERT_CHUNK_ROWS`] and committed together.
///
/// Empty input is a no-op and never touches the store. On error the
/// transaction is dropped, which rolls it back; nothing from the batch is
/// committed.
///
/// # Errors
/// Returns the underlying `DbErr` from begin, insert or commit.
pub async fn upsert_deals(db: &DatabaseConnection, deals: &[RawDeal]) -> Result<u64, DbErr> {
    let mut rows: Vec<ActiveModel> = Vec::with_capacity(deals.len());
    let mut positions: HashMap<i64, usize> = HashMap::with_capacity(deals.len());

    for raw in deals {
        let (Some(id), Some(row)) = (raw.id.as_i64(), deal_row(raw)) else {
            warn!(raw_id = %raw.id, "skipping deal with non-integer id");
            continue;
        };
        match positions.entry(id) {
            Entry::Occupied(slot) => {
                debug!(deal_id = id, "duplicate deal in batch; keeping the later record");
                rows[*slot.get()] = row;
            }
            Entry::Vacant(slot) => {
                slot.insert(rows.len());
                rows.push(row);
            }
        }
    }

    if rows.is_empty() {
        info!("No deals to load; skipping database write");
        return Ok(0);
    }

    let count = rows.len();
    let txn = db.begin().await?;
    let mut affected = 0;
    for chunk in rows.chunks(UPSERT_CHUNK_ROWS) {
        affected += Deals::insert_many(chunk.to_vec())
            .on_conflict(upsert_on_conflict())
            .exec_without_returning(&txn)
            .await?;
    }
    txn.commit().await?;

    info!(rows = count, affected, "Inserted or updated deals");
    Ok(affected)
}

// ─── Read ────────────────────────────────────────────────────────────────────

/// Newest first; deals without a creation date sort last.
pub fn list_query() -> Select<Deals> {
    Deals::find()
        .order_by_with_nulls(Column::Createdate, Order::Desc, NullOrdering::Last)
        .order_by_desc(Column::Id)
}

pub async fn list_deals(db: &DatabaseConnection) -> Result<Vec<Model>, DbErr> {
    list_query().all(db).await
}

pub async fn find_deal(db: &DatabaseConnection, id: i64) -> Result<Option<Model>, DbErr> {
    Deals::find_by_id(id).one(db).await
}

// ─── Create ──────────────────────────────────────────────────────────────────

/// Builds the row for a locally created deal.
///
/// The id is `now` in epoch milliseconds. Both timestamps are `now`, and the
/// properties blob carries the submitted fields plus the synthesized values
/// as strings.
pub fn new_deal(input: &DealCreate, now: DateTime<Utc>) -> ActiveModel {
    let id = now.timestamp_millis();
    let stamp = now.to_rfc3339_opts(SecondsFormat::Millis, true);

    let properties = json!({
        "dealname": input.dealname,
        "amount": input.amount,
        "pipeline": input.pipeline,
        "dealstage": input.dealstage,
        "hs_object_id": id.to_string(),
        "createdate": stamp,
        "hs_lastmodifieddate": stamp,
    });

    ActiveModel {
        id: Set(id),
        dealname: Set(Some(input.dealname.clone())),
        amount: Set(Some(input.amount)),
        pipeline: Set(Some(input.pipeline.clone())),
        dealstage: Set(Some(input.dealstage.clone())),
        createdate: Set(Some(now)),
        hs_lastmodifieddate: Set(Some(now)),
        closedate: Set(None),
        properties: Set(properties),
    }
}

/// Inserts one new deal and returns the stored row. No collision check.
pub async fn insert_deal(db: &DatabaseConnection, input: &DealCreate) -> Result<Model, DbErr> {
    // Millisecond precision keeps the column equal to the string in `properties`.
    let now = Utc::now().trunc_subsecs(3);
    let model = new_deal(input, now).insert(db).await?;
    info!(deal_id = model.id, "Created deal");
    Ok(model)
}
