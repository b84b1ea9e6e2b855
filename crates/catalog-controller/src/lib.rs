//! catalog-controller
//!
//! Event-driven controller tying the filter model, the dispatcher, the facet
//! panel and the result views together. Everything runs on one task.
pub mod controller;
pub mod dispatcher;
pub mod session;

pub use controller::{Draft, Event, SearchController, SearchFailure};
pub use dispatcher::{Debounce, QueryDispatcher, RequestId, Snapshot};
pub use session::{LocalStore, SessionState};
