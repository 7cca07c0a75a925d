// Pipeline service: loads CRM rows from the backend and runs the pure
// ranking / follow-up / board logic over them.

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use serde_json::json;

use crate::backend::{select_or_empty, BackendError, DataSource, Query};
use crate::crm::{Interaction, Lead};
use crate::pipeline::board::{build_board, PipelineBoard};
use crate::pipeline::followups::{generate_follow_ups, FollowUp};
use crate::pipeline::priority::{rank_leads, PriorityItem, RankingParams};
use crate::state::AppState;
use crate::types::Config;

/// Follow-ups due within this many days are turned into tasks by the sweep.
const SYNC_LOOKAHEAD_DAYS: i64 = 7;

/// Hard cap on `?limit=` for the priority list.
pub const MAX_PRIORITY_LIMIT: usize = 100;

pub struct PipelineRows {
    pub leads: Vec<Lead>,
    pub interactions: Vec<Interaction>,
}

/// Leads oldest-first (ranking ties keep this order) and all interactions.
/// Failed queries render as empty lists.
pub async fn load_rows(source: &dyn DataSource) -> PipelineRows {
    let leads = select_or_empty(source, "leads", &Query::new().order("created_at", true)).await;
    let interactions = select_or_empty(
        source,
        "interactions",
        &Query::new().order("occurred_at", false),
    )
    .await;
    PipelineRows {
        leads,
        interactions,
    }
}

pub fn ranking_params(config: &Config, today: NaiveDate, limit: Option<usize>) -> RankingParams {
    let pipeline = &config.pipeline;
    RankingParams {
        weights: pipeline.weights,
        today,
        event_horizon_days: pipeline.event_horizon_days,
        stale_after_days: pipeline.stale_after_days,
        limit: limit
            .unwrap_or(pipeline.priority_limit)
            .min(MAX_PRIORITY_LIMIT),
    }
}

pub async fn priorities(
    source: &dyn DataSource,
    config: &Config,
    today: NaiveDate,
    limit: Option<usize>,
) -> Vec<PriorityItem> {
    let rows = load_rows(source).await;
    let follow_ups = generate_follow_ups(&rows.leads, &rows.interactions, today);
    let params = ranking_params(config, today, limit);
    rank_leads(&rows.leads, &rows.interactions, &follow_ups, &params)
}

pub async fn follow_ups(source: &dyn DataSource, today: NaiveDate) -> Vec<FollowUp> {
    let rows = load_rows(source).await;
    let mut items = generate_follow_ups(&rows.leads, &rows.interactions, today);
    items.sort_by_key(|f| f.due_date);
    items
}

pub async fn board(source: &dyn DataSource) -> PipelineBoard {
    let leads: Vec<Lead> = select_or_empty(source, "leads", &Query::new()).await;
    build_board(&leads)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub generated: usize,
    pub emitted: usize,
    pub skipped_recent: usize,
    pub skipped_future: usize,
}

/// Turn due follow-ups into `tasks` rows, skipping any emitted within the
/// dedup window. Needs the local store to dedup; without it nothing is written.
pub async fn sync_follow_ups(state: &AppState, today: NaiveDate) -> Result<SyncReport, BackendError> {
    // Dedup check, insert and record must not interleave with another sweep.
    let _sweep = state.sweep_lock.lock().await;
    let rows = load_rows(state.backend.as_ref()).await;
    let follow_ups = generate_follow_ups(&rows.leads, &rows.interactions, today);
    let mut report = SyncReport {
        generated: follow_ups.len(),
        ..Default::default()
    };

    let horizon = today + Duration::days(SYNC_LOOKAHEAD_DAYS);
    let mut pending: Vec<&FollowUp> = Vec::new();
    {
        let guard = state.db.lock();
        let Some(db) = guard.as_ref() else {
            log::warn!("Follow-up sync: local store unavailable, skipping");
            return Ok(report);
        };
        for follow_up in &follow_ups {
            if follow_up.due_date > horizon {
                report.skipped_future += 1;
            } else if db.is_recently_emitted(&follow_up.fingerprint) {
                report.skipped_recent += 1;
            } else {
                pending.push(follow_up);
            }
        }
    }

    if pending.is_empty() {
        log::info!("Follow-up sync: nothing new ({} generated)", report.generated);
        return Ok(report);
    }

    let tasks: Vec<serde_json::Value> = pending
        .iter()
        .map(|f| {
            json!({
                "id": uuid::Uuid::new_v4().to_string(),
                "lead_id": f.lead_id,
                "title": f.title,
                "due_date": f.due_date.to_string(),
                "done": false,
            })
        })
        .collect();
    state.backend.insert("tasks", tasks).await?;

    let recorded = state.with_db(|db| {
        for f in &pending {
            db.record_follow_up(&f.fingerprint, &f.lead_id, f.kind.as_str(), &f.due_date.to_string())?;
        }
        db.prune_follow_up_emissions()
    });
    if let Some(Err(e)) = recorded {
        log::warn!("Follow-up sync: tasks written but dedup record failed: {}", e);
    }

    report.emitted = pending.len();
    log::info!(
        "Follow-up sync: emitted {} tasks ({} recent, {} not yet due)",
        report.emitted,
        report.skipped_recent,
        report.skipped_future
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::backend::memory::MemoryBackend;
    use crate::state::test_utils::test_state;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 10).unwrap()
    }

    fn seeded() -> Arc<MemoryBackend> {
        let backend = Arc::new(MemoryBackend::new());
        backend.seed(
            "leads",
            vec![
                json!({ "id": "l1", "name": "Ana", "stage": "prospecting",
                        "stage_entered_at": "2026-03-01T10:00:00Z", "created_at": "2026-03-01" }),
                json!({ "id": "l2", "name": "Bia", "stage": "contract_signature",
                        "stage_entered_at": "2026-03-09", "event_date": "2026-04-01",
                        "created_at": "2026-02-01" }),
                json!({ "id": "l3", "name": "Caio", "stage": "closed",
                        "event_date": "2026-12-20", "created_at": "2026-01-01" }),
                json!({ "id": "l4", "name": "Duda", "stage": "lost", "created_at": "2026-01-05" }),
            ],
        );
        backend.seed(
            "interactions",
            vec![json!({ "id": "i1", "lead_id": "l2", "occurred_at": "2026-03-09T15:00:00Z" })],
        );
        backend
    }

    #[tokio::test]
    async fn priorities_rank_active_leads_only() {
        let backend = seeded();
        let items = priorities(backend.as_ref(), &Config::default(), today(), None).await;
        let ids: Vec<&str> = items.iter().map(|i| i.lead_id.as_str()).collect();
        assert_eq!(ids, vec!["l1", "l2"]);
        assert!(items[0].reason.contains("overdue"));
        for pair in items.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[tokio::test]
    async fn priorities_limit_is_capped() {
        let backend = seeded();
        let items = priorities(backend.as_ref(), &Config::default(), today(), Some(1)).await;
        assert_eq!(items.len(), 1);
        let params = ranking_params(&Config::default(), today(), Some(10_000));
        assert_eq!(params.limit, MAX_PRIORITY_LIMIT);
    }

    #[tokio::test]
    async fn failed_backend_renders_empty() {
        let backend = MemoryBackend::new();
        backend.fail_table("leads");
        assert!(priorities(&backend, &Config::default(), today(), None).await.is_empty());
        assert!(follow_ups(&backend, today()).await.is_empty());
        assert_eq!(board(&backend).await.active_count, 0);
    }

    #[tokio::test]
    async fn sync_emits_once_within_window() {
        let backend = seeded();
        let state = test_state(backend.clone(), None);

        let first = sync_follow_ups(&state, today()).await.unwrap();
        // l1 overdue cadence, l2 due in 2 days; l3's final-details is months out.
        assert_eq!(first.generated, 3);
        assert_eq!(first.emitted, 2);
        assert_eq!(first.skipped_future, 1);
        assert_eq!(backend.rows("tasks").len(), 2);

        let second = sync_follow_ups(&state, today()).await.unwrap();
        assert_eq!(second.emitted, 0);
        assert_eq!(second.skipped_recent, 2);
        assert_eq!(backend.rows("tasks").len(), 2);
    }

    /// Delays inserts so overlapping sweeps would both pass the dedup check.
    struct SlowInsert(Arc<MemoryBackend>);

    #[async_trait::async_trait]
    impl DataSource for SlowInsert {
        async fn select(&self, table: &str, query: &Query) -> Result<Vec<serde_json::Value>, BackendError> {
            self.0.select(table, query).await
        }

        async fn insert(&self, table: &str, rows: Vec<serde_json::Value>) -> Result<(), BackendError> {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            self.0.insert(table, rows).await
        }

        async fn update(
            &self,
            table: &str,
            query: &Query,
            patch: serde_json::Value,
        ) -> Result<(), BackendError> {
            self.0.update(table, query, patch).await
        }

        async fn rpc(&self, function: &str, args: serde_json::Value) -> Result<serde_json::Value, BackendError> {
            self.0.rpc(function, args).await
        }
    }

    #[tokio::test]
    async fn concurrent_syncs_emit_once() {
        let backend = seeded();
        let state = test_state(Arc::new(SlowInsert(backend.clone())), None);

        let (a, b) = tokio::join!(
            sync_follow_ups(&state, today()),
            sync_follow_ups(&state, today())
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(a.emitted + b.emitted, 2);
        assert_eq!(a.skipped_recent + b.skipped_recent, 2);
        assert_eq!(backend.rows("tasks").len(), 2);
    }

    #[tokio::test]
    async fn sync_failure_records_nothing() {
        let backend = seeded();
        backend.fail_table("tasks");
        let state = test_state(backend.clone(), None);
        assert!(sync_follow_ups(&state, today()).await.is_err());

        let fresh = state
            .with_db(|db| Ok(db.is_recently_emitted("anything")))
            .unwrap()
            .unwrap();
        assert!(!fresh);
        let stats = state
            .with_db(|db| {
                db.conn_ref()
                    .query_row("SELECT COUNT(*) FROM follow_up_emissions", [], |r| r.get::<_, i64>(0))
                    .map_err(Into::into)
            })
            .unwrap()
            .unwrap();
        assert_eq!(stats, 0);
    }
}
