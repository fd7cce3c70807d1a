use std::path::PathBuf;

#[derive(thiserror::Error, Debug, serde::Deserialize, serde::Serialize)]
pub enum Error {
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    #[error("Not a PDF file: {0}")]
    NotAPdf(PathBuf),

    #[error("Refusing to overwrite the source document: {0}")]
    WouldOverwriteSource(PathBuf),
}
