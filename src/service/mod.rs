//! Query planning and validated mutations on top of a `Store`.

mod mutation;
mod planner;
pub mod validation;

pub use mutation::MutationExecutor;
pub use planner::{populate, Filter, PageInfo, QueryPlanner, QuerySpec, Records, ResolvedQuery, RESERVED_PARAMS};
pub use validation::RequestValidator;

/// One record: field name to JSON value.
pub type RecordPayload = serde_json::Map<String, serde_json::Value>;
