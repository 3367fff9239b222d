use thiserror::Error;

use modforge_data::ParseError;
use modforge_overlay::{LogicalPath, OverlayError};
use modforge_schema::SchemaError;

use crate::mutations::MutationError;

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("document '{path}' is not open")]
    DocumentNotOpen { path: LogicalPath },

    #[error("overlay error: {0}")]
    Overlay(#[from] OverlayError),

    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("mutation rejected: {0}")]
    Mutation(#[from] MutationError),
}
