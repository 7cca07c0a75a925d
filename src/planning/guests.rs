//! Guest list and seating chart.

use serde::Serialize;
use thiserror::Error;

use crate::crm::{Guest, Rsvp, SeatingTable};

#[derive(Debug, Error, PartialEq)]
pub enum SeatingError {
    #[error("Guest not found: {0}")]
    GuestNotFound(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Table {table} belongs to another event")]
    WrongEvent { table: String },

    #[error("Table {table} has {free} free seats, {needed} needed")]
    OverCapacity { table: String, free: u32, needed: u32 },
}

/// RSVP counts for one event. Headcounts weigh each invitation by party size.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RsvpSummary {
    pub total: usize,
    pub confirmed: usize,
    pub declined: usize,
    pub pending: usize,
    pub confirmed_headcount: u32,
    /// Confirmed plus pending seats.
    pub expected_headcount: u32,
}

pub fn summarize_rsvps(guests: &[Guest]) -> RsvpSummary {
    let mut summary = RsvpSummary {
        total: guests.len(),
        ..Default::default()
    };
    for guest in guests {
        match guest.rsvp {
            Rsvp::Confirmed => {
                summary.confirmed += 1;
                summary.confirmed_headcount += guest.party_size;
                summary.expected_headcount += guest.party_size;
            }
            Rsvp::Declined => summary.declined += 1,
            Rsvp::Pending => {
                summary.pending += 1;
                summary.expected_headcount += guest.party_size;
            }
        }
    }
    summary
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableOccupancy {
    pub table_id: String,
    pub label: String,
    pub capacity: u32,
    pub seated: u32,
    pub free: u32,
    pub guest_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatingChart {
    pub tables: Vec<TableOccupancy>,
    /// Guests not seated anywhere (declined guests excluded).
    pub unseated: Vec<String>,
    pub rsvp: RsvpSummary,
}

/// Seats currently used at `table_id`, optionally ignoring one guest.
fn seats_used(table_id: &str, guests: &[Guest], except: Option<&str>) -> u32 {
    guests
        .iter()
        .filter(|g| g.table_id.as_deref() == Some(table_id))
        .filter(|g| Some(g.id.as_str()) != except)
        .filter(|g| g.rsvp != Rsvp::Declined)
        .map(|g| g.party_size)
        .sum()
}

pub fn build_seating_chart(tables: &[SeatingTable], guests: &[Guest]) -> SeatingChart {
    let occupancy = tables
        .iter()
        .map(|table| {
            let seated = seats_used(&table.id, guests, None);
            TableOccupancy {
                table_id: table.id.clone(),
                label: table.label.clone(),
                capacity: table.capacity,
                seated,
                free: table.capacity.saturating_sub(seated),
                guest_ids: guests
                    .iter()
                    .filter(|g| g.table_id.as_deref() == Some(table.id.as_str()))
                    .map(|g| g.id.clone())
                    .collect(),
            }
        })
        .collect();

    let unseated = guests
        .iter()
        .filter(|g| g.rsvp != Rsvp::Declined)
        .filter(|g| {
            g.table_id
                .as_deref()
                .map(|id| !tables.iter().any(|t| t.id == id))
                .unwrap_or(true)
        })
        .map(|g| g.id.clone())
        .collect();

    SeatingChart {
        tables: occupancy,
        unseated,
        rsvp: summarize_rsvps(guests),
    }
}

/// Result of a validated move: the new `table_id` for the guest, or `None`
/// when nothing needs to be written.
#[derive(Debug, Clone, PartialEq)]
pub enum SeatingMove {
    Unchanged,
    Assign(Option<String>),
}

/// Validate a drag-and-drop move of `guest_id` onto `target` (`None` unseats).
pub fn move_guest(
    guest_id: &str,
    target: Option<&str>,
    tables: &[SeatingTable],
    guests: &[Guest],
) -> Result<SeatingMove, SeatingError> {
    let guest = guests
        .iter()
        .find(|g| g.id == guest_id)
        .ok_or_else(|| SeatingError::GuestNotFound(guest_id.to_string()))?;

    if guest.table_id.as_deref() == target {
        return Ok(SeatingMove::Unchanged);
    }

    let Some(target) = target else {
        return Ok(SeatingMove::Assign(None));
    };

    let table = tables
        .iter()
        .find(|t| t.id == target)
        .ok_or_else(|| SeatingError::TableNotFound(target.to_string()))?;

    if table.event_id != guest.event_id {
        return Err(SeatingError::WrongEvent {
            table: table.id.clone(),
        });
    }

    let free = table
        .capacity
        .saturating_sub(seats_used(&table.id, guests, Some(guest_id)));
    if guest.party_size > free {
        return Err(SeatingError::OverCapacity {
            table: table.id.clone(),
            free,
            needed: guest.party_size,
        });
    }

    Ok(SeatingMove::Assign(Some(table.id.clone())))
}
