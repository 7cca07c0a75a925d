// Assistant service: wires the assistant function to app state and records
// each answer in the local store.

use std::time::Duration;

use crate::assistant::service::{answer, validate_question, AnswerSettings, AssistantAnswer};
use crate::state::AppState;

/// Answer a question using the configured backend and provider.
///
/// Returns the validation message when the question is rejected.
pub async fn ask(
    state: &AppState,
    question: &str,
    event_id: Option<&str>,
) -> Result<AssistantAnswer, String> {
    let question = validate_question(question)?;
    let config = state.config();
    let settings = AnswerSettings {
        timeout: Duration::from_secs(config.ai.timeout_secs.max(1)),
        max_tokens: config.ai.max_tokens,
        currency_symbol: config.currency_symbol.clone(),
    };

    let out = answer(
        state.backend.as_ref(),
        state.provider.as_ref(),
        &settings,
        question,
        event_id,
        config.today(),
    )
    .await;

    if let Some(Err(e)) = state.with_db(|db| {
        db.log_assistant_answer(
            out.meta.bucket.as_str(),
            out.meta.source.as_str(),
            out.meta.fallback_reason.as_deref(),
            out.meta.latency_ms,
        )
    }) {
        log::warn!("Failed to record assistant answer: {}", e);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::assistant::provider::InferenceProvider;
    use crate::assistant::service::test_support::ScriptedProvider;
    use crate::backend::memory::MemoryBackend;
    use crate::state::test_utils::test_state;

    #[tokio::test]
    async fn answers_are_logged() {
        let provider: Arc<dyn InferenceProvider> = Arc::new(ScriptedProvider::answering("All good."));
        let state = test_state(Arc::new(MemoryBackend::new()), Some(provider));

        ask(&state, "thanks!", None).await.unwrap();
        let out = ask(&state, "what is my balance", None).await.unwrap();
        assert_eq!(out.answer, "All good.");

        let stats = state.with_db(|db| db.assistant_stats()).unwrap().unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.model_answers, 1);
        assert_eq!(stats.fallback_answers, 1);
    }

    #[tokio::test]
    async fn blank_question_is_rejected() {
        let state = test_state(Arc::new(MemoryBackend::new()), None);
        assert!(ask(&state, "   ", None).await.is_err());
        let stats = state.with_db(|db| db.assistant_stats()).unwrap().unwrap();
        assert_eq!(stats.total, 0);
    }
}
