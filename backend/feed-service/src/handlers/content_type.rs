use actix_web::http::header::CONTENT_TYPE;
use actix_web::{FromRequest, HttpRequest};
use futures::future::{ready, Ready};

use crate::error::AppError;

/// Guard that the request body is declared as UTF-8 JSON.
///
/// Accepts `application/json` with no charset or `charset=utf-8`, compared
/// case-insensitively. Anything else, including a missing header, is a 400.
#[derive(Debug, Clone, Copy)]
pub struct JsonContentType;

fn is_utf8_json(value: &str) -> bool {
    let mut parts = value.split(';').map(str::trim);
    let media_type = parts.next().unwrap_or_default();
    if !media_type.eq_ignore_ascii_case("application/json") {
        return false;
    }

    parts.filter(|p| !p.is_empty()).all(|param| match param.split_once('=') {
        Some((name, charset)) if name.trim().eq_ignore_ascii_case("charset") => {
            let charset = charset.trim().trim_matches('"');
            charset.eq_ignore_ascii_case("utf-8") || charset.eq_ignore_ascii_case("utf8")
        }
        _ => true,
    })
}

impl FromRequest for JsonContentType {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
        let valid = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(is_utf8_json)
            .unwrap_or(false);

        if valid {
            ready(Ok(JsonContentType))
        } else {
            ready(Err(AppError::bad_request(
                "Content-Type must be application/json; charset=utf-8",
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepted_content_types() {
        assert!(is_utf8_json("application/json; charset=utf-8"));
        assert!(is_utf8_json("application/json"));
        assert!(is_utf8_json("Application/JSON;charset=\"UTF-8\""));
    }

    #[test]
    fn test_rejected_content_types() {
        assert!(!is_utf8_json("text/plain"));
        assert!(!is_utf8_json("application/x-www-form-urlencoded"));
        assert!(!is_utf8_json("application/json; charset=latin1"));
        assert!(!is_utf8_json(""));
    }
}
