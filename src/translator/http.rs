//! Response handling shared by the HTTP backends.

use reqwest::{Response, StatusCode};

use crate::translator::error::{TranslatorError, TranslatorResult};

/// DeepL answers with this status once the character quota is spent.
const QUOTA_EXCEEDED: u16 = 456;

/// Pass successful responses through and map the others onto the
/// translator error taxonomy.
pub(crate) async fn check_status(response: Response, provider: &str) -> TranslatorResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    Err(classify(status, provider, &error_text))
}

fn classify(status: StatusCode, provider: &str, error_text: &str) -> TranslatorError {
    if status == StatusCode::TOO_MANY_REQUESTS
        || status.as_u16() == QUOTA_EXCEEDED
        || (status == StatusCode::FORBIDDEN && error_text.contains("Limit"))
    {
        TranslatorError::RateLimited
    } else if status.is_client_error() {
        TranslatorError::ConfigError(format!(
            "{} client error ({}): {}",
            provider, status, error_text
        ))
    } else {
        TranslatorError::TranslationError(format!(
            "{} server error ({}): {}",
            provider, status, error_text
        ))
    }
}
