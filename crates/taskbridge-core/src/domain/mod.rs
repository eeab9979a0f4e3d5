//! Domain model (ids, entities, relation kinds, repeat policy, filters, errors).

pub mod date;
pub mod envelope;
pub mod errors;
pub mod filter;
pub mod ids;
pub mod query;
pub mod relation;
pub mod repeat;
pub mod task;

pub use envelope::ResponseEnvelope;
pub use errors::{ErrorKind, ErrorReport, PartialFailure, ToolError};
pub use filter::{FilterExpr, FilterParseError};
pub use ids::{LabelId, ProjectId, TaskId, UserId};
pub use query::{Paging, Sort, SortField, SortOrder};
pub use relation::RelationKind;
pub use repeat::{RemoteRepeat, RepeatMode, RepeatPolicy, RepeatUnit};
pub use task::{Label, Project, Task, TaskDraft};
