//! Question classification for the assistant.
//!
//! Matching runs on `helpers::normalize_text`, so it ignores case, accents and
//! punctuation. Keywords cover English and Portuguese, the two languages the
//! dashboard is used in.

use serde::Serialize;

use crate::helpers::normalize_text;

/// Minimum token length before typo tolerance kicks in.
const FUZZY_MIN_LEN: usize = 6;
/// Jaro-Winkler similarity a token needs to count as a misspelled keyword.
const FUZZY_THRESHOLD: f64 = 0.93;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Finance,
    Vendors,
    Generic,
    Smalltalk,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Finance => "finance",
            Bucket::Vendors => "vendors",
            Bucket::Generic => "generic",
            Bucket::Smalltalk => "smalltalk",
        }
    }
}

/// Greeting / thank-you phrases, already in normalized form.
const SMALLTALK_PHRASES: &[&str] = &[
    "thank you very much",
    "thank you so much",
    "thanks a lot",
    "thanks so much",
    "many thanks",
    "thank you",
    "thanks",
    "thx",
    "ty",
    "cheers",
    "muito obrigado",
    "muito obrigada",
    "obrigadao",
    "obrigado",
    "obrigada",
    "valeu",
    "brigado",
    "brigada",
    "hello",
    "hi",
    "hey",
    "oi",
    "ola",
    "good morning",
    "good afternoon",
    "good evening",
    "bom dia",
    "boa tarde",
    "boa noite",
    "ok",
    "okay",
    "perfect",
    "perfeito",
    "great",
    "otimo",
];

const FINANCE_KEYWORDS: &[&str] = &[
    "financ",
    "finance",
    "financial",
    "financeiro",
    "payment",
    "pagamento",
    "pago",
    "paid",
    "pay",
    "invoice",
    "fatura",
    "boleto",
    "money",
    "dinheiro",
    "balance",
    "saldo",
    "income",
    "receita",
    "recebi",
    "receivable",
    "expense",
    "despesa",
    "gasto",
    "cash",
    "caixa",
    "revenue",
    "faturamento",
    "lucro",
    "profit",
];

const VENDOR_KEYWORDS: &[&str] = &[
    "vendor",
    "supplier",
    "fornecedor",
    "fornecedores",
    "photographer",
    "fotografo",
    "videographer",
    "caterer",
    "catering",
    "buffet",
    "florist",
    "florista",
    "decorator",
    "decoracao",
    "band",
    "banda",
    "dj",
    "musician",
    "cerimonialista",
    "contractor",
    "prestador",
];

/// Bucket a free-text question.
///
/// Smalltalk wins only when nothing but greeting/thank-you phrases remain.
/// Finance is checked before vendors.
pub fn classify(question: &str) -> Bucket {
    let normalized = normalize_text(question);
    let tokens: Vec<&str> = normalized.split_whitespace().collect();

    if is_smalltalk(&tokens) {
        return Bucket::Smalltalk;
    }
    if matches_any(&normalized, &tokens, FINANCE_KEYWORDS) {
        return Bucket::Finance;
    }
    if matches_any(&normalized, &tokens, VENDOR_KEYWORDS) {
        return Bucket::Vendors;
    }
    Bucket::Generic
}

/// True when the tokens are a non-empty sequence of known phrases and nothing else.
fn is_smalltalk(tokens: &[&str]) -> bool {
    if tokens.is_empty() {
        return false;
    }

    let mut phrases: Vec<Vec<&str>> = SMALLTALK_PHRASES
        .iter()
        .map(|p| p.split(' ').collect())
        .collect();
    // Longest first, so "thank you so much" is consumed whole.
    phrases.sort_by(|a, b| b.len().cmp(&a.len()));

    let mut i = 0;
    while i < tokens.len() {
        let rest = &tokens[i..];
        match phrases.iter().find(|p| rest.starts_with(p)) {
            Some(phrase) => i += phrase.len(),
            None => return false,
        }
    }
    true
}

/// Keyword hit: a word starting with the keyword, or a long token within
/// typo distance of a long keyword.
fn matches_any(normalized: &str, tokens: &[&str], keywords: &[&str]) -> bool {
    let padded = format!(" {}", normalized);
    if keywords
        .iter()
        .any(|kw| padded.contains(&format!(" {}", kw)))
    {
        return true;
    }

    tokens
        .iter()
        .filter(|t| t.chars().count() >= FUZZY_MIN_LEN)
        .any(|token| {
            keywords
                .iter()
                .filter(|kw| kw.chars().count() >= FUZZY_MIN_LEN)
                .any(|kw| strsim::jaro_winkler(token, kw) >= FUZZY_THRESHOLD)
        })
}
