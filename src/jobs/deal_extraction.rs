//! HubSpot deals → `deals` table.
//!
//! [`deal_pages`] is the single pagination discipline: a lazy, finite,
//! non-restartable stream of pages. Both load modes are thin wrappers over
//! it. Any page failure ends the run and is returned to the caller.

use futures::stream::{self, Stream, StreamExt, TryStreamExt};
use sea_orm::{DatabaseConnection, DbErr};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::config::AppConfig;
use crate::hubspot::{DealSource, HubSpotClient, RawDeal, SourceError, DEAL_PROPERTIES};
use crate::store::{self, PostgresConnector, StoreConnector};

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("database unavailable: {0}")]
    StoreUnavailable(DbErr),

    #[error("database write failed: {0}")]
    Store(DbErr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadMode {
    /// Fetch every page, then write everything in one transaction.
    #[default]
    Eager,
    /// Write each page in its own transaction as it arrives.
    Streaming,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExtractionSummary {
    pub fetched: usize,
    pub written: u64,
}

enum Cursor {
    Next(Option<String>),
    Exhausted,
}

/// Pages of deals, starting at `start_after` (or the first page).
///
/// The stream ends without yielding when a page has no results, and after
/// yielding a page that carries no next cursor. The first error is yielded
/// and ends the stream.
pub fn deal_pages<'a, S>(
    source: &'a S,
    properties: &'a [&'a str],
    start_after: Option<String>,
) -> impl Stream<Item = Result<Vec<RawDeal>, SourceError>> + 'a
where
    S: DealSource + ?Sized,
{
    stream::try_unfold(Cursor::Next(start_after), move |cursor| {
        next_page(source, properties, cursor)
    })
}

async fn next_page<S>(
    source: &S,
    properties: &[&str],
    cursor: Cursor,
) -> Result<Option<(Vec<RawDeal>, Cursor)>, SourceError>
where
    S: DealSource + ?Sized,
{
    let after = match cursor {
        Cursor::Next(after) => after,
        Cursor::Exhausted => return Ok(None),
    };

    let page = source.fetch_page(properties, after.as_deref()).await?;
    if page.results.is_empty() {
        debug!("HubSpot returned an empty page; stopping");
        return Ok(None);
    }

    let next = match page.next_cursor() {
        Some(cursor) => Cursor::Next(Some(cursor.to_string())),
        None => {
            info!("No more pages to fetch from HubSpot.");
            Cursor::Exhausted
        }
    };
    Ok(Some((page.results, next)))
}

/// Drains [`deal_pages`] into memory.
///
/// On failure the deals gathered so far are dropped; only their count is logged.
pub async fn collect_all_deals<S>(
    source: &S,
    start_after: Option<String>,
) -> Result<Vec<RawDeal>, SourceError>
where
    S: DealSource + ?Sized,
{
    let pages = deal_pages(source, DEAL_PROPERTIES, start_after);
    futures::pin_mut!(pages);

    let mut deals = Vec::new();
    while let Some(page) = pages.next().await {
        match page {
            Ok(mut results) => deals.append(&mut results),
            Err(e) => {
                error!(
                    retrieved = deals.len(),
                    error = %e,
                    "An API error occurred while fetching from HubSpot; aborting run"
                );
                return Err(e);
            }
        }
    }

    info!("Successfully fetched a total of {} deals from HubSpot.", deals.len());
    Ok(deals)
}

/// Runs one extraction against `source`, writing through `connector`.
///
/// The store is only connected once there is something to write.
#[tracing::instrument(skip(source, connector))]
pub async fn extract_and_load<S>(
    source: &S,
    connector: &dyn StoreConnector,
    start_after: Option<String>,
    mode: LoadMode,
) -> Result<ExtractionSummary, ExtractionError>
where
    S: DealSource + ?Sized,
{
    match mode {
        LoadMode::Eager => load_eager(source, connector, start_after).await,
        LoadMode::Streaming => load_streaming(source, connector, start_after).await,
    }
}

async fn load_eager<S>(
    source: &S,
    connector: &dyn StoreConnector,
    start_after: Option<String>,
) -> Result<ExtractionSummary, ExtractionError>
where
    S: DealSource + ?Sized,
{
    let deals = collect_all_deals(source, start_after).await?;
    let mut summary = ExtractionSummary {
        fetched: deals.len(),
        written: 0,
    };

    if deals.is_empty() {
        info!("No deals were fetched, so nothing will be loaded into the database.");
        return Ok(summary);
    }

    info!("Connecting to the PostgreSQL database...");
    let db = connector
        .connect()
        .await
        .map_err(ExtractionError::StoreUnavailable)?;
    let result = store::deals::upsert_deals(&db, &deals).await;
    store::release(db).await;
    info!("Database connection closed.");

    summary.written = result.map_err(ExtractionError::Store)?;
    Ok(summary)
}

async fn load_streaming<S>(
    source: &S,
    connector: &dyn StoreConnector,
    start_after: Option<String>,
) -> Result<ExtractionSummary, ExtractionError>
where
    S: DealSource + ?Sized,
{
    let mut summary = ExtractionSummary::default();
    let mut db: Option<DatabaseConnection> = None;

    let result = load_pages(
        deal_pages(source, DEAL_PROPERTIES, start_after),
        connector,
        &mut db,
        &mut summary,
    )
    .await;

    if let Some(conn) = db {
        store::release(conn).await;
        info!("Database connection closed.");
    }

    if let Err(e) = &result {
        error!(
            fetched = summary.fetched,
            written = summary.written,
            error = %e,
            "Streaming extraction aborted; earlier pages remain committed"
        );
    }
    result.map(|()| summary)
}

async fn load_pages<St>(
    pages: St,
    connector: &dyn StoreConnector,
    db: &mut Option<DatabaseConnection>,
    summary: &mut ExtractionSummary,
) -> Result<(), ExtractionError>
where
    St: Stream<Item = Result<Vec<RawDeal>, SourceError>>,
{
    futures::pin_mut!(pages);

    while let Some(page) = pages.try_next().await? {
        summary.fetched += page.len();

        let conn = match db {
            Some(conn) => conn,
            None => {
                info!("Connecting to the PostgreSQL database...");
                let conn = connector
                    .connect()
                    .await
                    .map_err(ExtractionError::StoreUnavailable)?;
                db.insert(conn)
            }
        };

        summary.written += store::deals::upsert_deals(conn, &page)
            .await
            .map_err(ExtractionError::Store)?;
        debug!(page_len = page.len(), total = summary.fetched, "Page loaded");
    }

    info!(
        fetched = summary.fetched,
        written = summary.written,
        "Streaming extraction finished"
    );
    Ok(())
}

/// Production wiring: HubSpot in, Postgres out.
///
/// A missing access token is logged and yields an empty summary rather than
/// an error.
pub async fn run_deal_extraction(
    config: &AppConfig,
    mode: LoadMode,
) -> Result<ExtractionSummary, ExtractionError> {
    let Some(token) = config.hubspot.access_token.as_deref() else {
        error!("FATAL: HUBSPOT_ACCESS_TOKEN is not set. Aborting extraction.");
        return Ok(ExtractionSummary::default());
    };

    let client = HubSpotClient::new(&config.hubspot, token)?;
    let connector = PostgresConnector::new(config.database.clone());

    if let Some(cursor) = &config.extraction.checkpoint_after {
        info!(cursor = %cursor, "Resuming extraction from checkpoint");
    }

    extract_and_load(
        &client,
        &connector,
        config.extraction.checkpoint_after.clone(),
        mode,
    )
    .await
}
