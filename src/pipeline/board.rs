//! Pipeline board aggregates: per-stage counts and value, conversion rate.

use serde::Serialize;

use crate::crm::{Lead, Stage};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageColumn {
    pub stage: Stage,
    pub label: &'static str,
    pub count: usize,
    pub estimated_value: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineBoard {
    pub columns: Vec<StageColumn>,
    pub active_count: usize,
    pub active_value: f64,
    /// closed / (closed + lost); `None` until something has been decided.
    pub conversion_rate: Option<f64>,
}

pub fn build_board(leads: &[Lead]) -> PipelineBoard {
    let columns: Vec<StageColumn> = Stage::ALL
        .iter()
        .map(|stage| {
            let in_stage = leads.iter().filter(|l| l.stage == *stage);
            let (count, value) = in_stage.fold((0usize, 0.0f64), |(c, v), l| {
                (c + 1, v + l.estimated_value.unwrap_or(0.0))
            });
            StageColumn {
                stage: *stage,
                label: stage.label(),
                count,
                estimated_value: value,
            }
        })
        .collect();

    let active: Vec<&StageColumn> = columns.iter().filter(|c| c.stage.is_active()).collect();
    let active_count = active.iter().map(|c| c.count).sum();
    let active_value = active.iter().map(|c| c.estimated_value).sum();

    let count_of = |stage: Stage| {
        columns
            .iter()
            .find(|c| c.stage == stage)
            .map(|c| c.count)
            .unwrap_or(0)
    };
    let closed = count_of(Stage::Closed);
    let decided = closed + count_of(Stage::Lost);
    let conversion_rate = if decided == 0 {
        None
    } else {
        Some(closed as f64 / decided as f64)
    };

    PipelineBoard {
        columns,
        active_count,
        active_value,
        conversion_rate,
    }
}
