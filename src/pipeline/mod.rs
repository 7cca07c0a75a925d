//! CRM pipeline: priority queue, follow-ups, board aggregates and the
//! background follow-up sweep.

pub mod board;
pub mod followups;
pub mod poller;
pub mod priority;
