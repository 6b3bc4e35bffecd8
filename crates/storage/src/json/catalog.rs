use quiz_core::model::{Catalog, CatalogDraft, CatalogError};
use std::io;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogLoadError {
    #[error("cannot read catalog: {0}")]
    Io(#[from] io::Error),

    #[error("catalog is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Invalid(#[from] CatalogError),
}

/// Parse and validate a catalog document.
///
/// # Errors
///
/// Returns `CatalogLoadError::Parse` for malformed JSON and `Invalid` when
/// the catalog breaks a content rule.
pub fn parse_catalog(text: &str) -> Result<Catalog, CatalogLoadError> {
    let draft: CatalogDraft = serde_json::from_str(text)?;
    let catalog = draft.validate()?;
    tracing::debug!(
        questions = catalog.len(),
        topics = catalog.topics().count(),
        "catalog loaded"
    );
    Ok(catalog)
}

/// Read a catalog file from disk.
///
/// # Errors
///
/// Returns `CatalogLoadError` if the file cannot be read, parsed or validated.
pub async fn load_catalog(path: &Path) -> Result<Catalog, CatalogLoadError> {
    let text = tokio::fs::read_to_string(path).await?;
    parse_catalog(&text)
}
