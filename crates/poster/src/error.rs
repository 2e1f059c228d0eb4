//! CLI error types.

use poster_config::ConfigError;
use poster_confluence::SessionError;
use poster_renderer::DocumentError;

/// Errors that abort a run before any document is published.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Session(#[from] SessionError),

    #[error("{0}")]
    Documents(#[from] DocumentError),

    #[error("failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Why a single document was not published. The run carries on with the
/// remaining documents.
#[derive(Debug, thiserror::Error)]
pub(crate) enum FileError {
    #[error("{0}")]
    Document(#[from] DocumentError),

    #[error("{0}")]
    Upsert(#[from] poster_confluence::UpsertError),
}
