// Planning service: per-event budget, guests/seating, finance summary and
// contract uploads.

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::json;

use crate::assistant::snapshot::{build_finance_snapshot, FinanceSnapshot};
use crate::backend::{select_or_empty, select_rows, BackendClient, DataSource, Query};
use crate::crm::{BudgetItem, FinanceEntry, Guest, SeatingTable};
use crate::error::ApiError;
use crate::planning::budget::{summarize_budget, BudgetSummary};
use crate::planning::guests::{build_seating_chart, move_guest, SeatingChart, SeatingMove};

/// Lifetime of contract download links.
const SIGNED_URL_SECS: u64 = 3600;

pub async fn budget(source: &dyn DataSource, event_id: &str) -> BudgetSummary {
    let items: Vec<BudgetItem> = select_or_empty(
        source,
        "budget_items",
        &Query::new().eq("event_id", event_id),
    )
    .await;
    summarize_budget(&items)
}

pub async fn seating_chart(source: &dyn DataSource, event_id: &str) -> SeatingChart {
    let by_event = Query::new().eq("event_id", event_id);
    let tables: Vec<SeatingTable> =
        select_or_empty(source, "tables", &by_event.clone().order("label", true)).await;
    let guests: Vec<Guest> =
        select_or_empty(source, "guests", &by_event.order("name", true)).await;
    build_seating_chart(&tables, &guests)
}

/// Validate and apply a seating move, then return the refreshed chart.
///
/// Unlike the read paths, a failed load here is an error: the capacity check
/// must not run against an empty list.
pub async fn move_guest_to_table(
    source: &dyn DataSource,
    event_id: &str,
    guest_id: &str,
    target: Option<&str>,
) -> Result<SeatingChart, ApiError> {
    let by_event = Query::new().eq("event_id", event_id);
    let tables: Vec<SeatingTable> = select_rows(source, "tables", &by_event).await?;
    let guests: Vec<Guest> = select_rows(source, "guests", &by_event).await?;

    match move_guest(guest_id, target, &tables, &guests)? {
        SeatingMove::Unchanged => {
            log::debug!("Seating: guest {} already at {:?}", guest_id, target);
        }
        SeatingMove::Assign(table_id) => {
            source
                .update(
                    "guests",
                    &Query::new().eq("id", guest_id),
                    json!({ "table_id": table_id }),
                )
                .await?;
            log::info!("Seating: moved guest {} to {:?}", guest_id, table_id);
        }
    }

    Ok(seating_chart(source, event_id).await)
}

pub async fn finance_summary(source: &dyn DataSource, today: NaiveDate) -> FinanceSnapshot {
    let entries: Vec<FinanceEntry> =
        select_or_empty(source, "finance_entries", &Query::new()).await;
    build_finance_snapshot(&entries, today)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractUpload {
    pub path: String,
    pub signed_url: String,
}

/// Event ids become the first segment of the storage key, so only plain
/// identifier characters are allowed.
pub fn is_safe_segment(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= 128
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
}

/// Keep a safe subset of the client-supplied file name.
pub fn sanitize_filename(raw: &str) -> Option<String> {
    let name = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches(|c| c == '.' || c == '_').to_string();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

pub async fn upload_contract(
    client: &BackendClient,
    bucket: &str,
    event_id: &str,
    filename: &str,
    bytes: Vec<u8>,
    content_type: &str,
) -> Result<ContractUpload, ApiError> {
    if !is_safe_segment(event_id) {
        return Err(ApiError::bad_request(format!("Invalid event id: {}", event_id)));
    }
    let name = sanitize_filename(filename)
        .ok_or_else(|| ApiError::bad_request("filename is missing or invalid"))?;
    if bytes.is_empty() {
        return Err(ApiError::bad_request("contract file is empty"));
    }

    let object = format!("{}/{}-{}", event_id, &uuid::Uuid::new_v4().simple().to_string()[..8], name);
    client.upload_object(bucket, &object, bytes, content_type).await?;
    let signed_url = client
        .create_signed_url(bucket, &object, SIGNED_URL_SECS)
        .await?;
    log::info!("Uploaded contract {}/{}", bucket, object);

    Ok(ContractUpload {
        path: format!("{}/{}", bucket, object),
        signed_url,
    })
}
