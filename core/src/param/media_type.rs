use std::fmt;

use crate::error::ApiError;

const DEFAULT_CHARSET: &str = "UTF-8";

/// A parsed `Content-Type` value: `type/subtype` plus its charset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    mime: String,
    charset: String,
}

impl MediaType {
    pub const APPLICATION_JSON: &'static str = "application/json;charset=UTF-8";
    pub const APPLICATION_FORM_URLENCODED: &'static str = "application/x-www-form-urlencoded;charset=UTF-8";
    pub const APPLICATION_OCTET_STREAM: &'static str = "application/octet-stream";
    pub const APPLICATION_XML: &'static str = "application/xml;charset=UTF-8";
    pub const MULTIPART_FORM_DATA: &'static str = "multipart/form-data;charset=UTF-8";
    pub const TEXT_HTML: &'static str = "text/html;charset=UTF-8";
    pub const TEXT_PLAIN: &'static str = "text/plain;charset=UTF-8";

    /// The default request content type.
    pub fn json() -> Self {
        Self {
            mime: "application/json".to_string(),
            charset: DEFAULT_CHARSET.to_string(),
        }
    }

    /// Parse a `Content-Type` header value.
    ///
    /// The charset defaults to UTF-8 when the value carries none. A value
    /// without a well-formed `type/subtype` is a configuration error.
    pub fn parse(value: &str) -> Result<Self, ApiError> {
        let mut parts = value.split(';');
        let mime = parts.next().unwrap_or_default().trim();
        if !is_valid_mime(mime) {
            return Err(ApiError::config(format!(
                "failed to parse content type {value:?}"
            )));
        }

        let mut charset = DEFAULT_CHARSET.to_string();
        for param in parts {
            let Some((name, val)) = param.split_once('=') else {
                continue;
            };
            if name.trim().eq_ignore_ascii_case("charset") {
                let val = val.trim().trim_matches('"');
                if val.is_empty() {
                    return Err(ApiError::config(format!(
                        "empty charset in content type {value:?}"
                    )));
                }
                charset = val.to_string();
            }
        }

        Ok(Self {
            mime: mime.to_ascii_lowercase(),
            charset,
        })
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn charset(&self) -> &str {
        &self.charset
    }

    pub fn is_json(&self) -> bool {
        self.mime == "application/json"
    }
}

fn is_valid_mime(mime: &str) -> bool {
    let Some((ty, sub)) = mime.split_once('/') else {
        return false;
    };
    let token = |s: &str| {
        !s.is_empty()
            && s.chars()
                .all(|c| c.is_ascii_alphanumeric() || "!#$&-^_.+*".contains(c))
    };
    token(ty) && token(sub)
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{};charset={}", self.mime, self.charset)
    }
}
