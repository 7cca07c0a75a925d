//! Row types for the tables this service reads from the backend.
//!
//! The schema belongs to the hosted backend. These structs only name the
//! columns we use; unknown columns are ignored and optional ones default, so a
//! schema change upstream degrades instead of failing deserialization.
//! Timestamps stay as strings (the backend's formats vary by column type) and
//! are parsed at the point of use with `helpers::parse_date`.

use serde::{Deserialize, Deserializer, Serialize};

use crate::helpers::{normalize_key, normalize_text};

/// Discrete pipeline state of a lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Prospecting,
    Budgeting,
    ContractSignature,
    Closed,
    Lost,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Prospecting,
        Stage::Budgeting,
        Stage::ContractSignature,
        Stage::Closed,
        Stage::Lost,
    ];

    /// Lenient parse: accepts snake_case keys, display labels and the
    /// Portuguese labels the dashboard was first built with. Anything
    /// unrecognised is treated as a fresh lead.
    pub fn parse(raw: &str) -> Self {
        // Separators vary between exports ("contract_signature", "Contract Signature").
        match normalize_key(raw).as_str() {
            "budgeting" | "budget" | "orcamento" | "orcamentos" => Stage::Budgeting,
            "contractsignature" | "contract" | "contrato" | "assinatura"
            | "assinaturacontrato" | "assinaturadecontrato" => Stage::ContractSignature,
            "closed" | "won" | "fechado" | "fechados" | "ganho" => Stage::Closed,
            "lost" | "perdido" | "perdidos" => Stage::Lost,
            _ => Stage::Prospecting,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Prospecting => "prospecting",
            Stage::Budgeting => "budgeting",
            Stage::ContractSignature => "contract_signature",
            Stage::Closed => "closed",
            Stage::Lost => "lost",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Stage::Prospecting => "Prospecting",
            Stage::Budgeting => "Budgeting",
            Stage::ContractSignature => "Contract signature",
            Stage::Closed => "Closed",
            Stage::Lost => "Lost",
        }
    }

    /// Closed and lost leads drop out of the working pipeline.
    pub fn is_active(&self) -> bool {
        !matches!(self, Stage::Closed | Stage::Lost)
    }
}

impl<'de> Deserialize<'de> for Stage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map(Stage::parse).unwrap_or(Stage::Prospecting))
    }
}

/// Guest response to an invitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rsvp {
    Confirmed,
    Declined,
    #[default]
    Pending,
}

impl Rsvp {
    pub fn parse(raw: &str) -> Self {
        match normalize_text(raw).as_str() {
            "confirmed" | "yes" | "accepted" | "attending" | "confirmado" | "confirmada"
            | "sim" => Rsvp::Confirmed,
            "declined" | "no" | "not attending" | "recusado" | "recusada" | "nao" => {
                Rsvp::Declined
            }
            _ => Rsvp::Pending,
        }
    }
}

impl<'de> Deserialize<'de> for Rsvp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map(Rsvp::parse).unwrap_or_default())
    }
}

/// Income or expense row in the finance ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    #[default]
    Income,
    Expense,
}

impl<'de> Deserialize<'de> for EntryKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        Ok(match normalize_text(&raw).as_str() {
            "expense" | "expenses" | "despesa" | "saida" | "cost" => EntryKind::Expense,
            _ => EntryKind::Income,
        })
    }
}

/// A row from `leads`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Lead {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub stage: Stage,
    /// When the lead entered its current stage.
    #[serde(default)]
    pub stage_entered_at: Option<String>,
    #[serde(default)]
    pub event_date: Option<String>,
    /// Follow-up date set manually by the planner, if any.
    #[serde(default)]
    pub next_follow_up: Option<String>,
    #[serde(default)]
    pub estimated_value: Option<f64>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// A row from `interactions` (calls, messages, meetings with a lead).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Interaction {
    pub id: String,
    pub lead_id: String,
    #[serde(default)]
    pub kind: Option<String>,
    pub occurred_at: String,
    #[serde(default)]
    pub note: Option<String>,
}

/// A row from `events`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub lead_id: Option<String>,
    #[serde(default)]
    pub event_date: Option<String>,
    #[serde(default)]
    pub venue: Option<String>,
}

/// A row from `vendors`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Vendor {
    pub id: String,
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub cost: Option<f64>,
}

impl Vendor {
    pub fn is_confirmed(&self) -> bool {
        matches!(
            self.status.as_deref().map(normalize_text).as_deref(),
            Some("confirmed" | "contracted" | "booked" | "confirmado" | "contratado")
        )
    }
}

/// A row from `guests`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Guest {
    pub id: String,
    pub event_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub rsvp: Rsvp,
    #[serde(default)]
    pub table_id: Option<String>,
    /// Seats the invitation covers (guest plus companions).
    #[serde(default = "default_party_size")]
    pub party_size: u32,
}

fn default_party_size() -> u32 {
    1
}

/// A row from `tables` (seating chart).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeatingTable {
    pub id: String,
    pub event_id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub capacity: u32,
}

/// A row from `tasks`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub lead_id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub done: bool,
}

/// A row from `finance_entries`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FinanceEntry {
    pub id: String,
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub kind: EntryKind,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A row from `budget_items`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BudgetItem {
    pub id: String,
    pub event_id: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub planned: f64,
    #[serde(default)]
    pub actual: f64,
}
