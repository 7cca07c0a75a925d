// Service layer: loads rows through the backend and hands them to the pure
// domain modules. Handlers in `api` stay thin.

pub mod assistant;
pub mod pipeline;
pub mod planning;
