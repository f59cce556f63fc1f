use std::error::Error as StdError;
use std::io::ErrorKind;

fn error_chain_matches(err: &(dyn StdError + 'static), kind: ErrorKind, needle: &str) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(source) = current {
        if let Some(io_err) = source.downcast_ref::<std::io::Error>()
            && io_err.kind() == kind
        {
            return true;
        }

        if source.to_string().to_ascii_lowercase().contains(needle) {
            return true;
        }

        current = source.source();
    }

    false
}

fn error_chain_has_connection_refused(err: &(dyn StdError + 'static)) -> bool {
    error_chain_matches(err, ErrorKind::ConnectionRefused, "connection refused")
}

fn error_chain_has_timeout(err: &(dyn StdError + 'static)) -> bool {
    error_chain_matches(err, ErrorKind::TimedOut, "timed out")
}

/// Turns a transport failure into a message that names the setting to check.
/// The transport error stays in the chain as the cause.
pub(crate) fn xai_request_error(
    err: reqwest::Error,
    api_url: &str,
    timeout_secs: Option<u64>,
) -> anyhow::Error {
    let hint = if err.is_timeout() || error_chain_has_timeout(&err) {
        let waited = timeout_secs
            .map(|secs| format!(" after {secs}s"))
            .unwrap_or_default();
        format!(
            "xAI request timed out{waited} while calling '{api_url}'. \
             Raise XAI_TIMEOUT_SECS or retry later."
        )
    } else if err.is_connect() && error_chain_has_connection_refused(&err) {
        format!("Connection refused by xAI API at '{api_url}'. Check XAI_BASE_URL.")
    } else if err.is_connect() {
        format!(
            "Failed to connect to xAI API at '{api_url}'. \
             Check XAI_BASE_URL and network connectivity."
        )
    } else {
        format!("Failed to call xAI API at '{api_url}'")
    };

    anyhow::Error::new(err).context(hint)
}
