//! Chat assistant: question classification, snapshots, the fallback composer
//! and the model call that ties them together.

pub mod classify;
pub mod fallback;
pub mod provider;
pub mod service;
pub mod snapshot;

pub use classify::{classify, Bucket};
pub use service::{answer, AssistantAnswer, AssistantRequest};
