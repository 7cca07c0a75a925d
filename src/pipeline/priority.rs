use chrono::NaiveDate;
use serde::Serialize;

use crate::crm::{Interaction, Lead, Stage};
use crate::helpers::{self, parse_opt_date};
use crate::pipeline::followups::{self, FollowUp};
use crate::types::PriorityWeights;

/// Knobs for one ranking pass.
#[derive(Debug, Clone, Copy)]
pub struct RankingParams {
    pub weights: PriorityWeights,
    pub today: NaiveDate,
    pub event_horizon_days: i64,
    pub stale_after_days: i64,
    pub limit: usize,
}

/// A lead with its computed score and justification.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityItem {
    pub lead_id: String,
    pub lead_name: String,
    pub stage: Stage,
    pub score: f64,
    pub reason: String,
    pub days_to_event: Option<i64>,
    pub overdue_follow_ups: usize,
    pub days_since_contact: Option<i64>,
}

/// Rank active leads by next-best-action score, capped at `params.limit`.
///
/// Sorted descending by score. The sort is stable, so leads with equal scores
/// keep the order the backend returned them in.
pub fn rank_leads(
    leads: &[Lead],
    interactions: &[Interaction],
    follow_ups: &[FollowUp],
    params: &RankingParams,
) -> Vec<PriorityItem> {
    let latest = followups::last_interactions(interactions);

    let mut scored: Vec<PriorityItem> = leads
        .iter()
        .filter(|lead| lead.stage.is_active())
        .map(|lead| {
            let overdue = followups::overdue_for(&lead.id, follow_ups).len();
            score_lead(lead, latest.get(lead.id.as_str()).copied(), overdue, params)
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(params.limit);
    scored
}

/// Score a single lead.
///
/// Each rule contributes `weight × factor` with the factor in `[0, 1]`:
/// - stage: 0.4 prospecting, 0.7 budgeting, 1.0 contract signature
/// - overdue follow-up: 1.0 when any follow-up is past due
/// - upcoming event: linear ramp from 0 at the horizon to 1 on the day
/// - stale interaction: 1.0 when the last contact is older than the
///   threshold, or there has never been one
pub fn score_lead(
    lead: &Lead,
    last_interaction: Option<NaiveDate>,
    overdue_follow_ups: usize,
    params: &RankingParams,
) -> PriorityItem {
    let weights = params.weights.clamped();
    let today = params.today;
    let mut reason_parts: Vec<String> = Vec::new();

    let stage_factor = match lead.stage {
        Stage::Prospecting => 0.4,
        Stage::Budgeting => 0.7,
        Stage::ContractSignature => 1.0,
        Stage::Closed | Stage::Lost => 0.0,
    };
    let stage_points = weights.stage * stage_factor;
    if stage_points > 0.0 {
        reason_parts.push(format!("{} stage", lead.stage.label()));
    }

    let mut overdue_points = 0.0;
    if overdue_follow_ups > 0 {
        overdue_points = weights.overdue_follow_up;
        reason_parts.push(if overdue_follow_ups == 1 {
            "follow-up overdue".to_string()
        } else {
            format!("{} follow-ups overdue", overdue_follow_ups)
        });
    }

    let days_to_event = parse_opt_date(lead.event_date.as_deref()).map(|d| (d - today).num_days());
    let mut event_points = 0.0;
    if let Some(days) = days_to_event {
        let horizon = params.event_horizon_days.max(1);
        if (0..=horizon).contains(&days) {
            let factor = 1.0 - days as f64 / horizon as f64;
            event_points = weights.upcoming_event * factor;
            reason_parts.push(match days {
                0 => "event today".to_string(),
                _ => format!("event in {}", helpers::plural_days(days)),
            });
        }
    }

    let days_since_contact = last_interaction.map(|d| (today - d).num_days());
    let mut stale_points = 0.0;
    match days_since_contact {
        Some(days) if days > params.stale_after_days => {
            stale_points = weights.stale_interaction;
            reason_parts.push(format!("no contact for {}", helpers::plural_days(days)));
        }
        None => {
            stale_points = weights.stale_interaction;
            reason_parts.push("never contacted".to_string());
        }
        _ => {}
    }

    let score = stage_points + overdue_points + event_points + stale_points;
    let reason = if score > 0.0 && !reason_parts.is_empty() {
        reason_parts.join("; ")
    } else {
        "No pressing signals".to_string()
    };

    PriorityItem {
        lead_id: lead.id.clone(),
        lead_name: lead.name.clone(),
        stage: lead.stage,
        score: (score * 100.0).round() / 100.0,
        reason,
        days_to_event,
        overdue_follow_ups,
        days_since_contact,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::followups::generate_follow_ups;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn params(today: NaiveDate) -> RankingParams {
        RankingParams {
            weights: PriorityWeights::default(),
            today,
            event_horizon_days: 90,
            stale_after_days: 14,
            limit: 10,
        }
    }

    fn lead(id: &str, stage: Stage, event_date: Option<&str>) -> Lead {
        Lead {
            id: id.to_string(),
            name: id.to_uppercase(),
            stage,
            event_date: event_date.map(ToString::to_string),
            ..Lead::default()
        }
    }

    fn touch(lead_id: &str, at: &str) -> Interaction {
        Interaction {
            id: format!("i-{}", lead_id),
            lead_id: lead_id.to_string(),
            occurred_at: at.to_string(),
            ..Interaction::default()
        }
    }

    #[test]
    fn contract_stage_outranks_prospecting_all_else_equal() {
        let today = day(2026, 3, 10);
        let leads = vec![
            lead("p", Stage::Prospecting, None),
            lead("c", Stage::ContractSignature, None),
        ];
        let interactions = vec![touch("p", "2026-03-09"), touch("c", "2026-03-09")];
        let ranked = rank_leads(&leads, &interactions, &[], &params(today));
        assert_eq!(ranked[0].lead_id, "c");
        assert_eq!(ranked[0].score, 20.0);
        assert_eq!(ranked[1].score, 8.0);
    }

    #[test]
    fn closed_and_lost_leads_are_not_ranked() {
        let today = day(2026, 3, 10);
        let leads = vec![
            lead("won", Stage::Closed, None),
            lead("gone", Stage::Lost, None),
            lead("open", Stage::Budgeting, None),
        ];
        let ranked = rank_leads(&leads, &[], &[], &params(today));
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].lead_id, "open");
    }

    #[test]
    fn upcoming_event_ramps_linearly() {
        let today = day(2026, 3, 10);
        let p = params(today);
        let near = score_lead(&lead("n", Stage::Prospecting, Some("2026-03-10")), Some(today), 0, &p);
        let mid = score_lead(
            &lead("m", Stage::Prospecting, Some("2026-04-24")),
            Some(today),
            0,
            &p,
        );
        let far = score_lead(&lead("f", Stage::Prospecting, Some("2027-01-01")), Some(today), 0, &p);
        assert_eq!(near.score, 8.0 + 25.0);
        assert_eq!(mid.score, 8.0 + 12.5);
        assert_eq!(far.score, 8.0);
        assert!(near.reason.contains("event today"));
        assert!(mid.reason.contains("event in 45 days"));
    }

    #[test]
    fn overdue_follow_up_and_stale_contact_add_weight() {
        let today = day(2026, 3, 10);
        let mut l = lead("l1", Stage::Budgeting, None);
        l.stage_entered_at = Some("2026-02-01".to_string());
        let interactions = vec![touch("l1", "2026-02-01")];
        let follow_ups = generate_follow_ups(&[l.clone()], &interactions, today);

        let ranked = rank_leads(&[l], &interactions, &follow_ups, &params(today));
        let item = &ranked[0];
        assert_eq!(item.overdue_follow_ups, 1);
        assert_eq!(item.days_since_contact, Some(37));
        assert_eq!(item.score, 14.0 + 30.0 + 15.0);
        assert_eq!(
            item.reason,
            "Budgeting stage; follow-up overdue; no contact for 37 days"
        );
    }

    #[test]
    fn zero_weights_give_no_pressing_signals() {
        let today = day(2026, 3, 10);
        let mut p = params(today);
        p.weights = PriorityWeights {
            stage: 0.0,
            overdue_follow_up: 0.0,
            upcoming_event: 0.0,
            stale_interaction: 0.0,
        };
        let item = score_lead(&lead("x", Stage::Budgeting, None), None, 2, &p);
        assert_eq!(item.score, 0.0);
        assert_eq!(item.reason, "No pressing signals");
    }

    #[test]
    fn ties_keep_input_order_and_limit_caps() {
        let today = day(2026, 3, 10);
        let leads: Vec<Lead> = (0..6)
            .map(|i| lead(&format!("l{}", i), Stage::Budgeting, None))
            .collect();
        let mut p = params(today);
        p.limit = 4;
        let ranked = rank_leads(&leads, &[], &[], &p);
        let ids: Vec<&str> = ranked.iter().map(|r| r.lead_id.as_str()).collect();
        assert_eq!(ids, vec!["l0", "l1", "l2", "l3"]);
    }

    #[test]
    fn ranking_is_sorted_descending_for_many_weight_sets() {
        let today = day(2026, 3, 10);
        let stages = [Stage::Prospecting, Stage::Budgeting, Stage::ContractSignature];
        let event_dates = [None, Some("2026-03-12"), Some("2026-05-01"), Some("2025-12-01")];
        let contact = [None, Some("2026-03-09"), Some("2026-01-15")];

        let mut leads = Vec::new();
        let mut interactions = Vec::new();
        let mut n = 0;
        for stage in stages {
            for event in event_dates {
                for c in contact {
                    let id = format!("l{}", n);
                    let mut l = lead(&id, stage, event);
                    l.stage_entered_at = Some("2026-02-20".to_string());
                    if let Some(at) = c {
                        interactions.push(touch(&id, at));
                    }
                    leads.push(l);
                    n += 1;
                }
            }
        }
        let follow_ups = generate_follow_ups(&leads, &interactions, today);

        let weight_sets = [
            PriorityWeights::default(),
            PriorityWeights { stage: 100.0, overdue_follow_up: 0.0, upcoming_event: 1.0, stale_interaction: 3.0 },
            PriorityWeights { stage: 0.0, overdue_follow_up: 5.0, upcoming_event: 50.0, stale_interaction: 0.0 },
            PriorityWeights { stage: -10.0, overdue_follow_up: 7.5, upcoming_event: -2.0, stale_interaction: 40.0 },
        ];
        for weights in weight_sets {
            let mut p = params(today);
            p.weights = weights;
            p.limit = leads.len();
            let ranked = rank_leads(&leads, &interactions, &follow_ups, &p);
            assert_eq!(ranked.len(), leads.len());
            for pair in ranked.windows(2) {
                assert!(
                    pair[0].score >= pair[1].score,
                    "not descending: {} then {}",
                    pair[0].score,
                    pair[1].score
                );
            }
        }
    }
}
