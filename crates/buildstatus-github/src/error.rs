//! Mapping from reqwest failures onto the publisher's `ApiError`.

use buildstatus_core::ApiError;
use reqwest::{Response, StatusCode};

/// Longest response body kept in an error message.
const MAX_ERROR_BODY: usize = 512;

/// A request that never produced a usable response.
pub(crate) fn transport(err: reqwest::Error) -> ApiError {
    if err.is_decode() {
        ApiError::Decode(err.to_string())
    } else {
        ApiError::Transport(err.to_string())
    }
}

/// Pass a 2xx response through; turn anything else into `ApiError::Status`.
pub(crate) async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(status_error(status, &body))
}

pub(crate) fn status_error(status: StatusCode, body: &str) -> ApiError {
    let mut body = body.trim().to_string();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push_str("...");
    }
    ApiError::Status {
        status: status.as_u16(),
        body,
    }
}
