//! Finance and event snapshots handed to the model as context and used by the
//! fallback composer.
//!
//! Both serialize snake_case, like the rest of the assistant envelope.

use chrono::NaiveDate;
use serde::Serialize;

use crate::crm::{EntryKind, Event, FinanceEntry, Guest, Task, Vendor};
use crate::helpers::{normalize_text, parse_date, parse_opt_date};
use crate::planning::guests::{summarize_rsvps, RsvpSummary};

/// Settlement state of a finance entry after leniently parsing its status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    /// Received (income) or paid (expense).
    Settled,
    Pending,
    Overdue,
}

impl EntryStatus {
    /// Unknown or missing statuses count as pending.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(normalize_text).as_deref() {
            Some("paid" | "pago" | "paga" | "received" | "recebido" | "recebida" | "settled"
            | "done" | "quitado") => EntryStatus::Settled,
            Some("overdue" | "atrasado" | "atrasada" | "late" | "vencido" | "vencida") => {
                EntryStatus::Overdue
            }
            _ => EntryStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FinanceSnapshot {
    pub income_received: f64,
    pub income_pending: f64,
    pub income_overdue: f64,
    pub expenses_paid: f64,
    pub expenses_pending: f64,
    pub expenses_overdue: f64,
    /// Received income minus paid expenses.
    pub balance: f64,
    pub entry_count: usize,
}

impl FinanceSnapshot {
    pub fn has_overdue(&self) -> bool {
        self.income_overdue > 0.0 || self.expenses_overdue > 0.0
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn build_finance_snapshot(entries: &[FinanceEntry], today: NaiveDate) -> FinanceSnapshot {
    let mut snap = FinanceSnapshot {
        entry_count: entries.len(),
        ..Default::default()
    };

    for entry in entries {
        let mut status = EntryStatus::parse(entry.status.as_deref());
        if status == EntryStatus::Pending
            && parse_opt_date(entry.due_date.as_deref()).is_some_and(|due| due < today)
        {
            status = EntryStatus::Overdue;
        }
        let amount = entry.amount.abs();
        let bucket = match (entry.kind, status) {
            (EntryKind::Income, EntryStatus::Settled) => &mut snap.income_received,
            (EntryKind::Income, EntryStatus::Pending) => &mut snap.income_pending,
            (EntryKind::Income, EntryStatus::Overdue) => &mut snap.income_overdue,
            (EntryKind::Expense, EntryStatus::Settled) => &mut snap.expenses_paid,
            (EntryKind::Expense, EntryStatus::Pending) => &mut snap.expenses_pending,
            (EntryKind::Expense, EntryStatus::Overdue) => &mut snap.expenses_overdue,
        };
        *bucket += amount;
    }

    snap.income_received = round2(snap.income_received);
    snap.income_pending = round2(snap.income_pending);
    snap.income_overdue = round2(snap.income_overdue);
    snap.expenses_paid = round2(snap.expenses_paid);
    snap.expenses_pending = round2(snap.expenses_pending);
    snap.expenses_overdue = round2(snap.expenses_overdue);
    snap.balance = round2(snap.income_received - snap.expenses_paid);
    snap
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EventSnapshot {
    pub event_id: String,
    pub event_name: String,
    pub event_date: Option<NaiveDate>,
    pub days_to_event: Option<i64>,
    pub vendors_total: usize,
    pub vendors_confirmed: usize,
    pub guests_total: usize,
    pub guests_confirmed: usize,
    pub guests_declined: usize,
    pub guests_pending: usize,
    pub confirmed_headcount: u32,
    pub tasks_total: usize,
    pub tasks_done: usize,
    pub tasks_open: usize,
    pub tasks_overdue: usize,
}

pub fn build_event_snapshot(
    event: &Event,
    vendors: &[Vendor],
    guests: &[Guest],
    tasks: &[Task],
    today: NaiveDate,
) -> EventSnapshot {
    let event_date = parse_opt_date(event.event_date.as_deref());
    let rsvps: RsvpSummary = summarize_rsvps(guests);
    let tasks_done = tasks.iter().filter(|t| t.done).count();
    let tasks_overdue = tasks
        .iter()
        .filter(|t| !t.done)
        .filter(|t| {
            t.due_date
                .as_deref()
                .and_then(parse_date)
                .is_some_and(|due| due < today)
        })
        .count();

    EventSnapshot {
        event_id: event.id.clone(),
        event_name: event.name.clone(),
        event_date,
        days_to_event: event_date.map(|d| (d - today).num_days()),
        vendors_total: vendors.len(),
        vendors_confirmed: vendors.iter().filter(|v| v.is_confirmed()).count(),
        guests_total: rsvps.total,
        guests_confirmed: rsvps.confirmed,
        guests_declined: rsvps.declined,
        guests_pending: rsvps.pending,
        confirmed_headcount: rsvps.confirmed_headcount,
        tasks_total: tasks.len(),
        tasks_done,
        tasks_open: tasks.len() - tasks_done,
        tasks_overdue,
    }
}
