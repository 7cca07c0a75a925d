//! The assistant function: classify, snapshot, race the model, fall back.

use std::time::{Duration, Instant};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::classify::{classify, Bucket};
use super::fallback::{compose, SuggestedAction};
use super::provider::{CompletionRequest, InferenceProvider};
use super::snapshot::{build_event_snapshot, build_finance_snapshot, EventSnapshot, FinanceSnapshot};
use crate::backend::{select_or_empty, DataSource, Query};
use crate::crm::{Event, FinanceEntry, Guest, Task, Vendor};
use crate::error::AssistantError;

/// Longest question accepted, in characters.
pub const MAX_QUESTION_CHARS: usize = 2000;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantRequest {
    #[serde(default)]
    pub question: String,
    #[serde(default, alias = "event_id")]
    pub event_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerSource {
    Model,
    Fallback,
}

impl AnswerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerSource::Model => "model",
            AnswerSource::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerMeta {
    pub source: AnswerSource,
    pub bucket: Bucket,
    pub model: Option<String>,
    pub latency_ms: u64,
    pub fallback_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerContext {
    pub finance: FinanceSnapshot,
    pub event: Option<EventSnapshot>,
}

/// Response envelope of the assistant function.
#[derive(Debug, Clone, Serialize)]
pub struct AssistantAnswer {
    pub answer: String,
    pub suggested_actions: Vec<SuggestedAction>,
    pub meta: AnswerMeta,
    pub context: AnswerContext,
}

#[derive(Debug, Clone)]
pub struct AnswerSettings {
    pub timeout: Duration,
    pub max_tokens: u32,
    pub currency_symbol: String,
}

/// Trim and bound the question. Errors are user-facing messages.
pub fn validate_question(question: &str) -> Result<&str, String> {
    let trimmed = question.trim();
    if trimmed.is_empty() {
        return Err("Question must not be empty".to_string());
    }
    if trimmed.chars().count() > MAX_QUESTION_CHARS {
        return Err(format!(
            "Question is too long (max {} characters)",
            MAX_QUESTION_CHARS
        ));
    }
    Ok(trimmed)
}

/// Load the finance snapshot and, when `event_id` names an event, its event
/// snapshot. Query failures degrade to empty snapshots.
pub async fn load_context(
    source: &dyn DataSource,
    event_id: Option<&str>,
    today: NaiveDate,
) -> AnswerContext {
    let entries: Vec<FinanceEntry> =
        select_or_empty(source, "finance_entries", &Query::new()).await;
    let finance = build_finance_snapshot(&entries, today);

    let event = match event_id.map(str::trim).filter(|id| !id.is_empty()) {
        Some(id) => load_event_snapshot(source, id, today).await,
        None => None,
    };

    AnswerContext { finance, event }
}

async fn load_event_snapshot(
    source: &dyn DataSource,
    event_id: &str,
    today: NaiveDate,
) -> Option<EventSnapshot> {
    let events: Vec<Event> =
        select_or_empty(source, "events", &Query::new().eq("id", event_id).limit(1)).await;
    let Some(event) = events.into_iter().next() else {
        log::warn!("Assistant: event {} not found, answering without it", event_id);
        return None;
    };

    let by_event = Query::new().eq("event_id", event_id);
    let vendors: Vec<Vendor> = select_or_empty(source, "vendors", &by_event).await;
    let guests: Vec<Guest> = select_or_empty(source, "guests", &by_event).await;
    let tasks: Vec<Task> = select_or_empty(source, "tasks", &by_event).await;

    Some(build_event_snapshot(&event, &vendors, &guests, &tasks, today))
}

fn build_request(question: &str, context: &AnswerContext, settings: &AnswerSettings) -> CompletionRequest {
    let system = format!(
        "You are the assistant inside a wedding and event planning dashboard. \
         Answer in the same language as the question, in at most four sentences. \
         Use only the figures in the context; amounts are in {}. \
         If the context doesn't cover the question, say so briefly.",
        settings.currency_symbol
    );
    let context_json = serde_json::to_string(context).unwrap_or_else(|_| "{}".to_string());
    CompletionRequest {
        system,
        user: format!("Context: {}\n\nQuestion: {}", context_json, question),
        max_tokens: settings.max_tokens,
    }
}

/// Answer a question. The model gets `settings.timeout` to respond; anything
/// else (error, timeout, no provider) yields the templated fallback.
pub async fn answer(
    source: &dyn DataSource,
    provider: &dyn InferenceProvider,
    settings: &AnswerSettings,
    question: &str,
    event_id: Option<&str>,
    today: NaiveDate,
) -> AssistantAnswer {
    let started = Instant::now();
    let bucket = classify(question);
    let context = load_context(source, event_id, today).await;

    let outcome: Result<String, String> = if bucket == Bucket::Smalltalk {
        Err("smalltalk".to_string())
    } else {
        let request = build_request(question, &context, settings);
        let raced = tokio::select! {
            res = provider.complete(&request) => res,
            _ = tokio::time::sleep(settings.timeout) => {
                Err(AssistantError::Timeout(settings.timeout.as_secs()))
            }
        };
        raced.map_err(|e| {
            log::warn!("Assistant: model call failed ({}), using fallback: {}", e.reason_code(), e);
            e.reason_code().to_string()
        })
    };

    // Suggested actions come from the bucket either way.
    let fallback = compose(
        bucket,
        &context.finance,
        context.event.as_ref(),
        &settings.currency_symbol,
    );
    let (answer, source_kind, fallback_reason) = match outcome {
        Ok(text) => (text, AnswerSource::Model, None),
        Err(reason) => (fallback.answer, AnswerSource::Fallback, Some(reason)),
    };
    let suggested_actions = fallback.suggested_actions;

    let latency_ms = started.elapsed().as_millis() as u64;
    log::info!(
        "Assistant: answered {} question via {} in {}ms",
        bucket.as_str(),
        source_kind.as_str(),
        latency_ms
    );

    AssistantAnswer {
        answer,
        suggested_actions,
        meta: AnswerMeta {
            source: source_kind,
            bucket,
            model: match source_kind {
                AnswerSource::Model => provider.model().map(str::to_string),
                AnswerSource::Fallback => None,
            },
            latency_ms,
            fallback_reason,
        },
        context,
    }
}
