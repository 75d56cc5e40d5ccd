//! Request descriptions handed to the executor

use percent_encoding::percent_decode_str;
use url::form_urlencoded::byte_serialize;
use url::Url;

use super::session::SESSION_COOKIE;

/// HTTP verb. Only form posts mutate state on the remote side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Read, goes through the rate governor
    Get,
    /// Form submission, bypasses the rate governor
    Post,
}

/// Per-request switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestOptions {
    /// Refuse to send without a session token; posts also get `sessionid` appended
    pub session_required: bool,
    /// Percent-encode form values; when off, values are assumed already encoded
    pub reencode: bool,
    /// Send the ajax marker headers
    pub ajax: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            session_required: false,
            reencode: true,
            ajax: false,
        }
    }
}

/// One request against the market front end.
#[derive(Debug, Clone)]
pub struct MarketRequest {
    method: Method,
    url: Url,
    referer: Option<String>,
    form: Vec<(String, String)>,
    options: RequestOptions,
}

impl MarketRequest {
    /// Read request.
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::Get,
            url,
            referer: None,
            form: Vec::new(),
            options: RequestOptions::default(),
        }
    }

    /// Form post. Field order is kept on the wire. Posts are always ajax calls.
    pub fn post<K, V>(url: Url, form: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            method: Method::Post,
            url,
            referer: None,
            form: form.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            options: RequestOptions {
                ajax: true,
                ..RequestOptions::default()
            },
        }
    }

    /// Set the Referer header.
    pub fn referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    /// Toggle the ajax marker headers.
    pub fn ajax(mut self, ajax: bool) -> Self {
        self.options.ajax = ajax;
        self
    }

    /// Require a session token.
    pub fn session_required(mut self, required: bool) -> Self {
        self.options.session_required = required;
        self
    }

    /// Toggle percent-encoding of form values.
    pub fn reencode(mut self, reencode: bool) -> Self {
        self.options.reencode = reencode;
        self
    }

    /// Verb of this request.
    pub fn method(&self) -> Method {
        self.method
    }

    /// Target URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Referer, if one was set.
    pub fn referer_header(&self) -> Option<&str> {
        self.referer.as_deref()
    }

    /// Switches for this request.
    pub fn options(&self) -> RequestOptions {
        self.options
    }

    /// Form fields in wire order.
    pub fn form(&self) -> &[(String, String)] {
        &self.form
    }

    /// Whether this request mutates state (and therefore skips the governor).
    pub fn is_write(&self) -> bool {
        self.method == Method::Post
    }

    /// Serialize the form as `application/x-www-form-urlencoded`.
    ///
    /// With re-encoding off, values are decoded first and spaces are sent as `+`,
    /// so already-encoded input goes out unchanged. `sessionid` is appended last
    /// when the request requires a session.
    pub fn encode_form(&self, session_token: Option<&str>) -> String {
        let mut pairs: Vec<String> = self
            .form
            .iter()
            .map(|(key, value)| {
                let value = if self.options.reencode {
                    byte_serialize(value.as_bytes()).collect::<String>()
                } else {
                    percent_decode_str(value).decode_utf8_lossy().replace(' ', "+")
                };
                format!("{key}={value}")
            })
            .collect();

        if self.options.session_required {
            pairs.push(format!("{SESSION_COOKIE}={}", session_token.unwrap_or_default()));
        }
        pairs.join("&")
    }
}
