// Row structs mirror backend columns; not every field is read by every screen.
#![allow(dead_code)]

pub mod api;
pub mod assistant;
pub mod backend;
pub mod crm;
pub mod db;
pub mod error;
pub mod helpers;
mod migrations;
pub mod pipeline;
pub mod planning;
pub mod services;
pub mod state;
pub mod types;
