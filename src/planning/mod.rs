//! Per-event planning views: budget and guests/seating.

pub mod budget;
pub mod guests;
