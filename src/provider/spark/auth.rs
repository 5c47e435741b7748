//! Signed connection URL for the Spark WebSocket endpoint.
//!
//! The service authenticates the upgrade request through three query
//! parameters: `host`, `date` and a base64 `authorization` blob carrying an
//! HMAC-SHA256 signature over the host, date and request line.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Url;
use sha2::Sha256;

use crate::error::ParleyError;

type HmacSha256 = Hmac<Sha256>;

/// RFC 1123 date as the service expects it.
pub fn format_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// `host: ..\ndate: ..\nGET /path HTTP/1.1`
pub fn signature_origin(host: &str, date: &str, path: &str) -> String {
    format!("host: {host}\ndate: {date}\nGET {path} HTTP/1.1")
}

/// Base64 HMAC-SHA256 of `data` under `secret`.
pub fn sign(secret: &str, data: &str) -> Result<String, ParleyError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ParleyError::Configuration(format!("Invalid Spark API secret: {e}")))?;
    mac.update(data.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Build the signed URL for `host_url` at time `at`.
pub fn build_auth_url(host_url: &str, api_key: &str, api_secret: &str, at: DateTime<Utc>) -> Result<Url, ParleyError> {
    let mut url = Url::parse(host_url)
        .map_err(|e| ParleyError::Configuration(format!("Invalid Spark URL '{host_url}': {e}")))?;
    let host = match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        (None, _) => {
            return Err(ParleyError::Configuration(format!(
                "Spark URL '{host_url}' has no host"
            )))
        }
    };

    let date = format_date(at);
    let signature = sign(api_secret, &signature_origin(&host, &date, url.path()))?;
    let authorization = STANDARD.encode(format!(
        "hmac username=\"{api_key}\", algorithm=\"hmac-sha256\", headers=\"host date request-line\", signature=\"{signature}\""
    ));

    url.query_pairs_mut()
        .clear()
        .append_pair("host", &host)
        .append_pair("date", &date)
        .append_pair("authorization", &authorization);
    Ok(url)
}
