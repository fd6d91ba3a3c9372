pub mod error_classifier;
pub mod lessons;
pub mod memory;
pub mod schema_catalog;

pub use error_classifier::{classify_error, ErrorKind};
pub use lessons::lesson_for_error;
pub use memory::{
    AgentMemory, ColumnInfo, MemoryHandle, QueryFailure, QueryPattern, QuerySuccess, TableSchema,
};
