use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub mod db;
pub mod deck;
pub mod package;
pub mod question;
pub mod template;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot read input file {path:?}: {source}")]
    ReadInput { path: PathBuf, source: io::Error },
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("cannot write archive: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("cannot encode collection metadata: {0}")]
    Json(#[from] serde_json::Error),
    #[error("cannot move package into place: {0}")]
    Persist(#[from] tempfile::PersistError),
}
