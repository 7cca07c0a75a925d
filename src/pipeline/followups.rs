//! Follow-up generation.
//!
//! Derives reminder tasks from stage-entry timestamps and interaction history.
//! Pure functions over rows already loaded from the backend; the poller turns
//! the result into `tasks` rows.

use std::collections::HashMap;

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::crm::{Interaction, Lead, Stage};
use crate::helpers::{self, parse_date, parse_opt_date};

/// Days before the event when a closed lead gets a final-details reminder.
const FINAL_DETAILS_LEAD_DAYS: i64 = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowUpKind {
    /// Planner-set follow-up date on the lead.
    Scheduled,
    /// Cadence reminder derived from the stage.
    StageCadence,
    /// Confirm final details ahead of a contracted event.
    FinalDetails,
}

impl FollowUpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FollowUpKind::Scheduled => "scheduled",
            FollowUpKind::StageCadence => "stage_cadence",
            FollowUpKind::FinalDetails => "final_details",
        }
    }
}

/// A derived reminder for one lead.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUp {
    pub lead_id: String,
    pub lead_name: String,
    pub kind: FollowUpKind,
    pub title: String,
    pub due_date: NaiveDate,
    pub reason: String,
    pub overdue: bool,
    /// Stable identity for dedup across sweeps.
    pub fingerprint: String,
}

/// Days to wait after the last touch before chasing a lead in this stage.
pub fn stage_cadence_days(stage: Stage) -> Option<i64> {
    match stage {
        Stage::Prospecting => Some(3),
        Stage::Budgeting => Some(5),
        Stage::ContractSignature => Some(2),
        Stage::Closed | Stage::Lost => None,
    }
}

/// Latest interaction date per lead.
pub fn last_interactions(interactions: &[Interaction]) -> HashMap<&str, NaiveDate> {
    let mut latest: HashMap<&str, NaiveDate> = HashMap::new();
    for interaction in interactions {
        let Some(date) = parse_date(&interaction.occurred_at) else {
            continue;
        };
        latest
            .entry(interaction.lead_id.as_str())
            .and_modify(|d| {
                if date > *d {
                    *d = date;
                }
            })
            .or_insert(date);
    }
    latest
}

/// Generate follow-ups for every lead, in lead order.
pub fn generate_follow_ups(
    leads: &[Lead],
    interactions: &[Interaction],
    today: NaiveDate,
) -> Vec<FollowUp> {
    let latest = last_interactions(interactions);
    leads
        .iter()
        .filter_map(|lead| follow_up_for(lead, latest.get(lead.id.as_str()).copied(), today))
        .collect()
}

/// Follow-ups due strictly before `today` for one lead.
pub fn overdue_for<'a>(lead_id: &str, follow_ups: &'a [FollowUp]) -> Vec<&'a FollowUp> {
    follow_ups
        .iter()
        .filter(|f| f.lead_id == lead_id && f.overdue)
        .collect()
}

fn follow_up_for(
    lead: &Lead,
    last_interaction: Option<NaiveDate>,
    today: NaiveDate,
) -> Option<FollowUp> {
    if lead.stage == Stage::Lost {
        return None;
    }

    if lead.stage == Stage::Closed {
        return final_details_for(lead, today);
    }

    if let Some(scheduled) = parse_opt_date(lead.next_follow_up.as_deref()) {
        return Some(build(
            lead,
            FollowUpKind::Scheduled,
            format!("Follow up with {}", lead.name),
            scheduled,
            "Follow-up date set on the lead".to_string(),
            today,
        ));
    }

    let cadence = stage_cadence_days(lead.stage)?;
    let stage_entered = parse_opt_date(lead.stage_entered_at.as_deref())
        .or_else(|| parse_opt_date(lead.created_at.as_deref()));

    let (anchor, anchor_label) = match (stage_entered, last_interaction) {
        (Some(entered), Some(touched)) if touched >= entered => (touched, "last contact"),
        (Some(entered), _) => (entered, "entering this stage"),
        (None, Some(touched)) => (touched, "last contact"),
        (None, None) => return None,
    };

    let due = anchor + Duration::days(cadence);
    Some(build(
        lead,
        FollowUpKind::StageCadence,
        format!("{}: check in with {}", lead.stage.label(), lead.name),
        due,
        format!(
            "{} after {} ({})",
            helpers::plural_days(cadence),
            anchor_label,
            anchor
        ),
        today,
    ))
}

fn final_details_for(lead: &Lead, today: NaiveDate) -> Option<FollowUp> {
    let event_date = parse_opt_date(lead.event_date.as_deref())?;
    if event_date < today {
        return None;
    }
    let due = event_date - Duration::days(FINAL_DETAILS_LEAD_DAYS);
    Some(build(
        lead,
        FollowUpKind::FinalDetails,
        format!("Confirm final details with {}", lead.name),
        due,
        format!(
            "Event on {}; confirm vendors and headcount {} before",
            event_date,
            helpers::plural_days(FINAL_DETAILS_LEAD_DAYS)
        ),
        today,
    ))
}

fn build(
    lead: &Lead,
    kind: FollowUpKind,
    title: String,
    due_date: NaiveDate,
    reason: String,
    today: NaiveDate,
) -> FollowUp {
    FollowUp {
        fingerprint: fingerprint(&[kind.as_str(), &lead.id, &due_date.to_string()]),
        lead_id: lead.id.clone(),
        lead_name: lead.name.clone(),
        kind,
        title,
        due_date,
        reason,
        overdue: due_date < today,
    }
}

/// Compute a dedup fingerprint from key components.
pub fn fingerprint(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update(b"|");
    }
    hex::encode(hasher.finalize())
}
