use std::path::PathBuf;

/// Failures that abort processing of a file (and, under the default policy,
/// the whole run).
///
/// A play event whose song cannot be found in the catalog is not an error;
/// it resolves to empty dimension keys instead.
#[derive(Debug, thiserror::Error)]
pub enum EtlError {
    #[error("Failed to discover files under {root}: {reason}")]
    Discovery { root: PathBuf, reason: String },

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed record in {path} at line {line}: {reason}")]
    Parse {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("Database error during {operation}: {source}")]
    Load {
        operation: &'static str,
        #[source]
        source: sea_orm::DbErr,
    },
}

impl EtlError {
    pub fn parse(path: impl Into<PathBuf>, line: usize, reason: impl ToString) -> Self {
        EtlError::Parse {
            path: path.into(),
            line,
            reason: reason.to_string(),
        }
    }

    /// Adapter for `map_err` on storage calls
    pub fn load(operation: &'static str) -> impl FnOnce(sea_orm::DbErr) -> Self {
        move |source| EtlError::Load { operation, source }
    }
}
