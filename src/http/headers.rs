//! Browser-like header set expected by the market front end

use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, CONNECTION,
    CONTENT_TYPE, HOST, ORIGIN, PRAGMA, REFERER, USER_AGENT,
};

use super::config::ClientConfig;
use super::request::MarketRequest;

const X_PROTOTYPE_VERSION: HeaderName = HeaderName::from_static("x-prototype-version");
const X_REQUESTED_WITH: HeaderName = HeaderName::from_static("x-requested-with");

/// Content type of every form post.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=UTF-8";

/// Build the headers for `request`.
///
/// Accept-Encoding is left to the HTTP client so it can decode gzip/deflate
/// bodies itself. Cookies are added by the client's cookie provider.
pub fn build_headers(config: &ClientConfig, request: &MarketRequest) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));

    insert_str(&mut headers, HOST, &config.host_header());
    insert_str(&mut headers, ORIGIN, &config.origin());
    insert_str(&mut headers, USER_AGENT, &config.user_agent);

    let referer = request
        .referer_header()
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}/market/", config.origin()));
    insert_str(&mut headers, REFERER, &referer);

    if request.options().ajax {
        headers.insert(X_PROTOTYPE_VERSION, HeaderValue::from_static("1.7"));
        headers.insert(X_REQUESTED_WITH, HeaderValue::from_static("XMLHttpRequest"));
    }
    if request.is_write() {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE));
    }
    headers
}

fn insert_str(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(_) => tracing::warn!(header = %name, "Skipping header with invalid value"),
    }
}
