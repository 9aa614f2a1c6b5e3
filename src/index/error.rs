use crate::{db::DbError, models::IndexTable};

/// A failure that aborted an index expiry run.
///
/// Tables already deleted before the failure stay deleted.
#[derive(Debug, thiserror::Error)]
pub enum IndexDeleteError {
    #[error("failed to acquire index connection: {0}")]
    Acquire(#[source] DbError),

    #[error("failed to select expired rows from {table}: {source}")]
    Select {
        table: IndexTable,
        #[source]
        source: DbError,
    },

    #[error("failed to look up endpoint {endpoint_id} for counter {counter_id}: {source}")]
    Enrich {
        endpoint_id: i64,
        counter_id: i64,
        #[source]
        source: DbError,
    },

    #[error("failed to delete expired rows from {table}: {source}")]
    Delete {
        table: IndexTable,
        #[source]
        source: DbError,
    },
}

impl IndexDeleteError {
    /// Which step of the run failed.
    pub fn phase(&self) -> &'static str {
        match self {
            IndexDeleteError::Acquire(_) => "acquire",
            IndexDeleteError::Select { .. } => "select",
            IndexDeleteError::Enrich { .. } => "enrich",
            IndexDeleteError::Delete { .. } => "delete",
        }
    }

    /// The table involved, if the failure was table-specific.
    pub fn table(&self) -> Option<IndexTable> {
        match self {
            IndexDeleteError::Select { table, .. } | IndexDeleteError::Delete { table, .. } => {
                Some(*table)
            }
            IndexDeleteError::Enrich { .. } => Some(IndexTable::EndpointCounter),
            IndexDeleteError::Acquire(_) => None,
        }
    }
}
