use thiserror::Error;

use crate::fault::Exception;

/// Core configuration and scope errors
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Exception handler declares no exception kinds: {handler}")]
    EmptyKindSet { handler: String },

    #[error("Scope entry failed and the failure was suppressed while rolling back")]
    EntryAborted,
}

impl Exception for CoreError {}

pub type Result<T> = std::result::Result<T, CoreError>;
