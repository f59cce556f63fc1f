use thiserror::Error;

pub const USAGE: &str = "Usage: grok-search \"<your query>\"\n\
Example: grok-search \"What are the latest AI developments?\"";

/// Failures that end a search invocation. None of them are retried.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error(
        "XAI_API_KEY environment variable is not set. \
         Set it before searching: export XAI_API_KEY=\"your-api-key\""
    )]
    Configuration,

    #[error("{message}")]
    Request { message: String },

    #[error("empty query\n{usage}", usage = USAGE)]
    Usage,
}

impl SearchError {
    pub(crate) fn request(err: &anyhow::Error) -> Self {
        Self::Request {
            message: format!("{err:#}"),
        }
    }
}
