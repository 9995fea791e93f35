//! Response decoders and the registry that selects them.
//!
//! # Design
//! A decoder turns a raw `HttpResponse` into a `Decoded` value or an error.
//! The status check is shared: responses with status >= 300 are never
//! converted, they become `ApiError::Remote` with the body kept verbatim.
//! Only success bodies reach a decoder's `convert`.
//!
//! Callers name the decoder they want with a `ResultType`. The registry
//! resolves it in three steps: a decoder registered under exactly that type,
//! then the text decoder for `ResultType::Void`, then the typed decoder.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::error::{ApiError, HeaderMultiMap};
use crate::http::HttpResponse;
use crate::param::MediaType;
use crate::types::ApiResult;

/// Declared result type of a call, used as the decoder registry key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResultType {
    /// The call declares no result type.
    Void,
    /// Body as text in the response charset.
    Text,
    /// Body as a `{code, msg, data}` envelope merged with the response headers.
    Envelope,
    /// Body as JSON for the caller's own type.
    Typed,
    /// Body saved to a temporary file; the result is its path.
    File,
    /// Any other key a caller registers a decoder under.
    Custom(Cow<'static, str>),
}

impl ResultType {
    pub fn key(&self) -> &str {
        match self {
            ResultType::Void => "void",
            ResultType::Text => "text",
            ResultType::Envelope => "envelope",
            ResultType::Typed => "typed",
            ResultType::File => "file",
            ResultType::Custom(key) => key.as_ref(),
        }
    }
}

/// Output of a decoder before it is bound to the caller's type.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// Success without an entity.
    Absent,
    Text(String),
    Json(Value),
    File(PathBuf),
}

impl Decoded {
    /// Bind to `T`; an absent entity is `Ok(None)`.
    pub fn into_typed<T: DeserializeOwned>(self) -> Result<Option<T>, ApiError> {
        let value = match self {
            Decoded::Absent => return Ok(None),
            Decoded::Text(text) => Value::String(text),
            Decoded::Json(value) => value,
            Decoded::File(path) => Value::String(path.to_string_lossy().into_owned()),
        };
        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| ApiError::Deserialization(e.to_string()))
    }
}

/// Converts raw responses into results.
pub trait ResponseDecoder: Send + Sync {
    /// Convert the non-empty body of a success response.
    fn convert(&self, response: &HttpResponse, body: &[u8]) -> Result<Decoded, ApiError>;

    fn decode(&self, response: &HttpResponse) -> Result<Decoded, ApiError> {
        if response.is_error() {
            return Err(remote_error(response));
        }
        match response.body.as_deref() {
            None | Some([]) => Ok(Decoded::Absent),
            Some(body) => self.convert(response, body),
        }
    }
}

/// Build the error for a redirection or error response.
///
/// Decoding is skipped; a body that is not valid UTF-8 is dropped rather than
/// masking the status and headers.
pub fn remote_error(response: &HttpResponse) -> ApiError {
    let body = response.body.as_ref().and_then(|bytes| {
        String::from_utf8(bytes.clone())
            .map_err(|e| warn!(status = response.status, error = %e, "dropping undecodable error body"))
            .ok()
    });
    ApiError::Remote {
        status: response.status,
        reason: response.reason.clone(),
        headers: group_headers(&response.headers),
        body,
    }
}

fn group_headers(headers: &[(String, String)]) -> HeaderMultiMap {
    let mut grouped = HeaderMultiMap::new();
    for (name, value) in headers {
        grouped.entry(name.clone()).or_default().push(value.clone());
    }
    grouped
}

/// Body as text in the charset of the response `Content-Type`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextDecoder;

impl ResponseDecoder for TextDecoder {
    fn convert(&self, response: &HttpResponse, body: &[u8]) -> Result<Decoded, ApiError> {
        let charset = response
            .header("Content-Type")
            .and_then(|ct| MediaType::parse(ct).ok())
            .map(|mt| mt.charset().to_string())
            .unwrap_or_else(|| "UTF-8".to_string());
        decode_text(body, &charset).map(Decoded::Text)
    }
}

fn decode_text(body: &[u8], charset: &str) -> Result<String, ApiError> {
    match charset.to_ascii_uppercase().as_str() {
        "UTF-8" | "UTF8" => String::from_utf8(body.to_vec())
            .map_err(|e| ApiError::Deserialization(format!("invalid UTF-8 body: {e}"))),
        "US-ASCII" | "ASCII" => {
            if body.is_ascii() {
                Ok(body.iter().map(|&b| b as char).collect())
            } else {
                Err(ApiError::Deserialization("non-ASCII byte in US-ASCII body".to_string()))
            }
        }
        "ISO-8859-1" | "LATIN1" => Ok(body.iter().map(|&b| b as char).collect()),
        other => Err(ApiError::Deserialization(format!("unsupported charset {other}"))),
    }
}

/// Body as JSON, later bound to the caller's type.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypedDecoder;

impl ResponseDecoder for TypedDecoder {
    fn convert(&self, _response: &HttpResponse, body: &[u8]) -> Result<Decoded, ApiError> {
        serde_json::from_slice(body)
            .map(Decoded::Json)
            .map_err(|e| ApiError::Deserialization(e.to_string()))
    }
}

/// Body as an [`ApiResult`] envelope whose `headers` are replaced by the
/// headers the transport actually received.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvelopeDecoder;

impl ResponseDecoder for EnvelopeDecoder {
    fn convert(&self, response: &HttpResponse, body: &[u8]) -> Result<Decoded, ApiError> {
        let parsed: ApiResult<Value> =
            serde_json::from_slice(body).map_err(|e| ApiError::Deserialization(e.to_string()))?;

        let headers: HashMap<String, String> = response.headers.iter().cloned().collect();
        let result = ApiResult {
            code: parsed.code,
            msg: parsed.msg,
            data: parsed.data,
            request_id: parsed.request_id,
            headers: Some(headers),
        };
        serde_json::to_value(result)
            .map(Decoded::Json)
            .map_err(|e| ApiError::Deserialization(e.to_string()))
    }
}

/// Body written to a temporary file named after `Content-Disposition`.
///
/// `attachment; filename="report.csv"` yields a file like
/// `report-XXXXXX.csv`; without a usable filename the prefix is `download-`.
/// The file is kept after decoding and belongs to the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileDecoder;

const DOWNLOAD_PREFIX: &str = "download-";

impl ResponseDecoder for FileDecoder {
    fn convert(&self, response: &HttpResponse, body: &[u8]) -> Result<Decoded, ApiError> {
        let filename = response
            .header("Content-Disposition")
            .and_then(disposition_filename);
        let (prefix, suffix) = temp_name_parts(filename);

        let store_err =
            |e: std::io::Error| ApiError::Deserialization(format!("failed to store download: {e}"));
        let mut file = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(&suffix)
            .tempfile()
            .map_err(store_err)?;
        file.write_all(body).map_err(store_err)?;
        let (_, path) = file.keep().map_err(|e| store_err(e.error))?;
        Ok(Decoded::File(path))
    }
}

/// The `filename=` parameter of a `Content-Disposition` value, quotes and
/// any directory part stripped.
fn disposition_filename(value: &str) -> Option<&str> {
    let start = value.find("filename=")? + "filename=".len();
    let rest = value[start..].trim_start_matches(['"', '\'']);
    let end = rest
        .find(|c: char| c == '"' || c == '\'' || c == ';' || c.is_whitespace())
        .unwrap_or(rest.len());
    let name = rest[..end].rsplit(['/', '\\']).next().unwrap_or_default();
    (!name.is_empty()).then_some(name)
}

/// Split a filename into a temp-file prefix and suffix around its last dot.
fn temp_name_parts(filename: Option<&str>) -> (String, String) {
    let Some(name) = filename else {
        return (DOWNLOAD_PREFIX.to_string(), String::new());
    };
    let (stem, suffix) = match name.rfind('.') {
        Some(pos) => (&name[..pos], &name[pos..]),
        None => (name, ""),
    };
    let prefix = format!("{stem}-");
    if prefix.len() < 3 {
        return (DOWNLOAD_PREFIX.to_string(), suffix.to_string());
    }
    (prefix, suffix.to_string())
}

/// Decoders by result type.
#[derive(Clone)]
pub struct DecoderRegistry {
    decoders: HashMap<String, Arc<dyn ResponseDecoder>>,
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        let mut registry = Self {
            decoders: HashMap::new(),
        };
        registry.register(ResultType::Text, Arc::new(TextDecoder));
        registry.register(ResultType::Envelope, Arc::new(EnvelopeDecoder));
        registry.register(ResultType::Typed, Arc::new(TypedDecoder));
        registry.register(ResultType::File, Arc::new(FileDecoder));
        registry
    }
}

impl fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&str> = self.decoders.keys().map(String::as_str).collect();
        keys.sort_unstable();
        f.debug_struct("DecoderRegistry").field("decoders", &keys).finish()
    }
}

impl DecoderRegistry {
    /// Register `decoder` for `result_type`, replacing any earlier one.
    pub fn register(&mut self, result_type: ResultType, decoder: Arc<dyn ResponseDecoder>) {
        self.decoders.insert(result_type.key().to_string(), decoder);
    }

    pub fn contains(&self, result_type: &ResultType) -> bool {
        self.decoders.contains_key(result_type.key())
    }

    pub fn select(&self, result_type: &ResultType) -> Arc<dyn ResponseDecoder> {
        if let Some(decoder) = self.decoders.get(result_type.key()) {
            return Arc::clone(decoder);
        }
        let fallback = match result_type {
            ResultType::Void => ResultType::Text,
            _ => ResultType::Typed,
        };
        match self.decoders.get(fallback.key()) {
            Some(decoder) => Arc::clone(decoder),
            None if fallback == ResultType::Text => Arc::new(TextDecoder),
            None => Arc::new(TypedDecoder),
        }
    }
}
