//! Deterministic answers used when the model is unavailable.
//!
//! Each bucket has a fixed template interpolating snapshot figures. A template
//! that references a value the snapshot can't provide fails to render, and the
//! bucket's static sentence is used instead.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use super::classify::Bucket;
use super::snapshot::{EventSnapshot, FinanceSnapshot};
use crate::helpers::{format_money, plural_days};

#[derive(Debug, Error, PartialEq)]
pub enum TemplateError {
    #[error("Unresolved placeholder: {{{0}}}")]
    Unresolved(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuggestedAction {
    pub label: String,
    pub route: String,
}

impl SuggestedAction {
    fn new(label: &str, route: impl Into<String>) -> Self {
        Self {
            label: label.to_string(),
            route: route.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FallbackAnswer {
    pub answer: String,
    pub suggested_actions: Vec<SuggestedAction>,
}

const FINANCE_TEMPLATE: &str = "Here's where your finances stand: {income_received} received and \
{income_pending} still expected from clients. You've paid {expenses_paid} in expenses with \
{expenses_pending} pending, leaving a balance of {balance}.";

const FINANCE_OVERDUE_TEMPLATE: &str =
    " Heads up: {income_overdue} in receivables and {expenses_overdue} in payments are overdue.";

const VENDORS_TEMPLATE: &str = "{event_name} has {vendors_confirmed} of {vendors_total} vendors \
confirmed. {guests_confirmed} of {guests_total} guests have confirmed so far.";

const EVENT_DATE_TEMPLATE: &str = " The event is in {days_to_event}.";

const GENERIC_TEMPLATE: &str = "I can't reach the assistant right now, but here's a quick \
summary: your balance is {balance} and {income_pending} is still expected from clients.";

const GENERIC_EVENT_TEMPLATE: &str =
    " For {event_name}, {tasks_open} tasks are open ({tasks_overdue} overdue).";

const FINANCE_STATIC: &str =
    "I can't reach the assistant right now. Open the finance page for your latest figures.";
const VENDORS_STATIC: &str =
    "I can't reach the assistant right now. Open an event to review its vendors and guests.";
const GENERIC_STATIC: &str =
    "I can't reach the assistant right now. Please try again in a moment.";
const SMALLTALK_ANSWER: &str =
    "You're welcome! Ask me about finances, vendors or guests whenever you need.";

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER_RE: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER_RE.get_or_init(|| {
        Regex::new(r"\{([a-z_]+)\}").expect("placeholder regex should compile")
    })
}

/// True if `text` still contains a `{name}` placeholder.
pub fn has_placeholder(text: &str) -> bool {
    placeholder_regex().is_match(text)
}

/// Interpolate `{name}` placeholders. Any name missing from `vars` fails.
///
/// Braces are stripped from substituted values so user-entered names can't
/// smuggle a placeholder into the output.
pub fn render(template: &str, vars: &HashMap<&str, String>) -> Result<String, TemplateError> {
    let re = placeholder_regex();
    if let Some(missing) = re
        .captures_iter(template)
        .filter_map(|c| c.get(1))
        .find(|name| !vars.contains_key(name.as_str()))
    {
        return Err(TemplateError::Unresolved(missing.as_str().to_string()));
    }

    let rendered = re.replace_all(template, |caps: &regex::Captures| {
        vars.get(&caps[1])
            .map(|v| v.replace(['{', '}'], ""))
            .unwrap_or_default()
    });
    Ok(rendered.into_owned())
}

fn finance_vars(finance: &FinanceSnapshot, currency: &str) -> HashMap<&'static str, String> {
    let money = |v: f64| format_money(v, currency);
    HashMap::from([
        ("income_received", money(finance.income_received)),
        ("income_pending", money(finance.income_pending)),
        ("income_overdue", money(finance.income_overdue)),
        ("expenses_paid", money(finance.expenses_paid)),
        ("expenses_pending", money(finance.expenses_pending)),
        ("expenses_overdue", money(finance.expenses_overdue)),
        ("balance", money(finance.balance)),
    ])
}

fn event_vars(event: &EventSnapshot) -> HashMap<&'static str, String> {
    let mut vars = HashMap::from([
        ("event_name", event.event_name.clone()),
        ("vendors_total", event.vendors_total.to_string()),
        ("vendors_confirmed", event.vendors_confirmed.to_string()),
        ("guests_total", event.guests_total.to_string()),
        ("guests_confirmed", event.guests_confirmed.to_string()),
        ("tasks_open", event.tasks_open.to_string()),
        ("tasks_overdue", event.tasks_overdue.to_string()),
    ]);
    if let Some(days) = event.days_to_event.filter(|d| *d >= 0) {
        vars.insert("days_to_event", plural_days(days));
    }
    vars
}

fn actions(bucket: Bucket, event: Option<&EventSnapshot>) -> Vec<SuggestedAction> {
    match bucket {
        Bucket::Finance => vec![
            SuggestedAction::new("Open finances", "/finance"),
            SuggestedAction::new("Review overdue entries", "/finance?status=overdue"),
        ],
        Bucket::Vendors => match event {
            Some(e) => vec![
                SuggestedAction::new("Open vendors", format!("/events/{}/vendors", e.event_id)),
                SuggestedAction::new("Open guest list", format!("/events/{}/guests", e.event_id)),
            ],
            None => vec![SuggestedAction::new("Open events", "/events")],
        },
        Bucket::Generic => vec![
            SuggestedAction::new("View pipeline", "/pipeline"),
            SuggestedAction::new("Open tasks", "/tasks"),
        ],
        Bucket::Smalltalk => vec![SuggestedAction::new("Go to dashboard", "/dashboard")],
    }
}

/// Build the template for `bucket` from the parts that apply to this snapshot.
fn template_for(
    bucket: Bucket,
    finance: &FinanceSnapshot,
    event: Option<&EventSnapshot>,
) -> Option<String> {
    match bucket {
        Bucket::Finance => {
            let mut t = FINANCE_TEMPLATE.to_string();
            if finance.has_overdue() {
                t.push_str(FINANCE_OVERDUE_TEMPLATE);
            }
            Some(t)
        }
        Bucket::Vendors => {
            let event = event?;
            let mut t = VENDORS_TEMPLATE.to_string();
            if event.days_to_event.is_some_and(|d| d >= 0) {
                t.push_str(EVENT_DATE_TEMPLATE);
            }
            Some(t)
        }
        Bucket::Generic => {
            let mut t = GENERIC_TEMPLATE.to_string();
            if event.is_some() {
                t.push_str(GENERIC_EVENT_TEMPLATE);
            }
            Some(t)
        }
        Bucket::Smalltalk => None,
    }
}

fn static_sentence(bucket: Bucket) -> &'static str {
    match bucket {
        Bucket::Finance => FINANCE_STATIC,
        Bucket::Vendors => VENDORS_STATIC,
        Bucket::Generic => GENERIC_STATIC,
        Bucket::Smalltalk => SMALLTALK_ANSWER,
    }
}

/// Compose the fallback answer for a classified question.
pub fn compose(
    bucket: Bucket,
    finance: &FinanceSnapshot,
    event: Option<&EventSnapshot>,
    currency: &str,
) -> FallbackAnswer {
    let answer = match template_for(bucket, finance, event) {
        Some(template) => {
            let mut vars = finance_vars(finance, currency);
            if let Some(event) = event {
                vars.extend(event_vars(event));
            }
            match render(&template, &vars) {
                Ok(text) => text,
                Err(e) => {
                    log::warn!("Fallback template for {} failed: {}", bucket.as_str(), e);
                    static_sentence(bucket).to_string()
                }
            }
        }
        None => static_sentence(bucket).to_string(),
    };

    FallbackAnswer {
        answer,
        suggested_actions: actions(bucket, event),
    }
}
