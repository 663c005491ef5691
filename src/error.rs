use openai_api::ApiError;
use thiserror::Error;

use crate::budget::BudgetError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("conversation has no turns")]
    EmptyConversation,

    #[error("image prompt is empty")]
    EmptyPrompt,

    #[error("requested {requested} images; at most {max} per call")]
    TooManyImages { requested: u32, max: u32 },

    #[error(transparent)]
    Budget(#[from] BudgetError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl Error {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Api(ApiError::Cancelled))
    }
}
