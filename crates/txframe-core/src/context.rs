//! The neutral, framework-agnostic request/response carrier (§4.1).

use std::any::Any;
use std::collections::HashMap;
use std::net::SocketAddr;

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use serde::Serialize;
use serde::de::DeserializeOwned;
use txframe_errors::Problem;

/// Outcome recorded on the context after a terminal write, consumed by the
/// Logger and Metrics middleware once the handler chain has unwound.
#[derive(Debug, Clone, Copy)]
pub struct WriteOutcome {
    pub status: StatusCode,
}

/// A per-request value owned exclusively by the bridge for the lifetime of one
/// request. Never `Clone`, never stored past the handler invocation that
/// receives it.
pub struct RequestContext {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    path_params: HashMap<String, String>,
    client_addr: Option<SocketAddr>,
    content_language: Option<String>,
    request_id: Option<String>,
    raw: Option<Box<dyn Any + Send>>,

    written: bool,
    response_status: StatusCode,
    response_headers: HeaderMap,
    response_body: Bytes,
}

impl RequestContext {
    /// Constructed by a bridge when it receives a native request. Path
    /// parameters are populated by the bridge before the handler chain runs
    /// and are immutable afterward.
    #[must_use]
    pub fn new(
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        body: Bytes,
        path_params: HashMap<String, String>,
        client_addr: Option<SocketAddr>,
    ) -> Self {
        let content_language = headers
            .get(http::header::ACCEPT_LANGUAGE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_owned());

        Self {
            method,
            uri,
            headers,
            body,
            path_params,
            client_addr,
            content_language,
            request_id: None,
            raw: None,
            written: false,
            response_status: StatusCode::OK,
            response_headers: HeaderMap::new(),
            response_body: Bytes::new(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Query-string accessor with a default fallback, per §4.1.
    pub fn query(&self, name: &str, default: &str) -> String {
        self.uri
            .query()
            .and_then(|q| {
                url_query_pairs(q)
                    .find(|(k, _)| k == name)
                    .map(|(_, v)| v)
            })
            .unwrap_or_else(|| default.to_owned())
    }

    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).map(String::as_str)
    }

    pub fn path_params(&self) -> &HashMap<String, String> {
        &self.path_params
    }

    pub fn client_addr(&self) -> Option<SocketAddr> {
        self.client_addr
    }

    pub fn content_language(&self) -> Option<&str> {
        self.content_language.as_deref()
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// Set by the RequestID middleware; downstream middleware/handlers read
    /// it back through this accessor.
    pub fn set_request_id(&mut self, id: impl Into<String>) {
        self.request_id = Some(id.into());
    }

    /// Escape hatch: the native framework context, for advanced integrations
    /// bridges attach during request conversion.
    pub fn raw(&self) -> Option<&(dyn Any + Send)> {
        self.raw.as_deref()
    }

    pub fn set_raw(&mut self, raw: Box<dyn Any + Send>) {
        self.raw = Some(raw);
    }

    pub fn written(&self) -> bool {
        self.written
    }

    pub fn response_status(&self) -> StatusCode {
        self.response_status
    }

    pub fn response_headers(&self) -> &HeaderMap {
        &self.response_headers
    }

    pub fn response_body(&self) -> &Bytes {
        &self.response_body
    }

    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.response_headers.insert(name, value);
    }

    /// Decode the request body into `T`. Per §4.1, JSON is the only decoding
    /// discipline the core contract guarantees: an unspecified or JSON media
    /// type decodes as JSON, and any other media type is still attempted as
    /// JSON as a last resort.
    pub fn bind<T: DeserializeOwned>(&self) -> Result<T, Problem> {
        serde_json::from_slice(&self.body).map_err(|e| {
            Problem::new(
                StatusCode::BAD_REQUEST,
                "invalid_body",
                format!("failed to decode request body as JSON: {e}"),
            )
        })
    }

    /// `Validate(target)` (§4.1): runs an application-supplied [`Validator`]
    /// against an already-decoded value.
    pub fn validate<T>(&self, validator: &dyn Validator<T>, value: &T) -> Result<(), Problem> {
        validator.validate(value)
    }

    /// `ShouldBindAndValidate(target)` (§4.1): decodes the body with
    /// [`Self::bind`], then runs `validator` against the decoded value,
    /// short-circuiting on the first failure.
    pub fn should_bind_and_validate<T: DeserializeOwned>(
        &self,
        validator: &dyn Validator<T>,
    ) -> Result<T, Problem> {
        let value: T = self.bind()?;
        validator.validate(&value)?;
        Ok(value)
    }

    fn commit(&mut self, status: StatusCode) -> WriteOutcome {
        self.written = true;
        self.response_status = status;
        WriteOutcome { status }
    }

    /// Each terminal write flips `written` to true exactly once; repeated
    /// calls are no-ops that return the original outcome without panicking.
    pub fn json<T: Serialize>(&mut self, status: StatusCode, value: &T) -> WriteOutcome {
        if self.written {
            return WriteOutcome {
                status: self.response_status,
            };
        }
        match serde_json::to_vec(value) {
            Ok(body) => {
                self.response_body = Bytes::from(body);
                self.set_header(
                    http::header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json; charset=utf-8"),
                );
                self.commit(status)
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize JSON response body");
                self.response_body = Bytes::from_static(b"{\"code\":\"internal_error\"}");
                self.commit(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }

    pub fn text(&mut self, status: StatusCode, body: impl Into<String>) -> WriteOutcome {
        if self.written {
            return WriteOutcome {
                status: self.response_status,
            };
        }
        self.response_body = Bytes::from(body.into());
        self.set_header(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        self.commit(status)
    }

    pub fn bytes(
        &mut self,
        status: StatusCode,
        content_type: HeaderValue,
        body: Bytes,
    ) -> WriteOutcome {
        if self.written {
            return WriteOutcome {
                status: self.response_status,
            };
        }
        self.response_body = body;
        self.set_header(http::header::CONTENT_TYPE, content_type);
        self.commit(status)
    }

    pub fn no_content(&mut self) -> WriteOutcome {
        if self.written {
            return WriteOutcome {
                status: self.response_status,
            };
        }
        self.commit(StatusCode::NO_CONTENT)
    }

    pub fn redirect(&mut self, status: StatusCode, location: &str) -> WriteOutcome {
        if self.written {
            return WriteOutcome {
                status: self.response_status,
            };
        }
        if let Ok(value) = HeaderValue::from_str(location) {
            self.set_header(http::header::LOCATION, value);
        }
        self.commit(status)
    }

    /// Idempotent error write: writes the problem body only if nothing has
    /// been written yet. Never panics if the response is already committed,
    /// matching the `written == true` invariant. Unlike [`Self::json`], the
    /// content type is `application/problem+json` (RFC 9457) rather than
    /// plain `application/json`.
    pub fn try_write_problem(&mut self, problem: Problem) -> WriteOutcome {
        if self.written {
            return WriteOutcome {
                status: self.response_status,
            };
        }
        let status = problem.status;
        match serde_json::to_vec(&problem) {
            Ok(body) => {
                self.response_body = Bytes::from(body);
                self.set_header(
                    http::header::CONTENT_TYPE,
                    HeaderValue::from_static(txframe_errors::APPLICATION_PROBLEM_JSON),
                );
                self.commit(status)
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize problem response body");
                self.response_body = Bytes::from_static(b"{\"code\":\"internal_error\"}");
                self.commit(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

/// Minimal `application/x-www-form-urlencoded`-shaped query parser, used only
/// for the query-string accessor so the core has no dependency on a full URL
/// crate.
fn url_query_pairs(query: &str) -> impl Iterator<Item = (String, String)> + '_ {
    query.split('&').filter(|s| !s.is_empty()).map(|pair| {
        let mut it = pair.splitn(2, '=');
        let k = it.next().unwrap_or_default();
        let v = it.next().unwrap_or_default();
        (decode_component(k), decode_component(v))
    })
}

fn decode_component(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        match c {
            '+' => out.push(' '),
            '%' => {
                let hi = chars.next();
                let lo = chars.next();
                if let (Some(hi), Some(lo)) = (hi, lo) {
                    if let Ok(byte) = u8::from_str_radix(&format!("{hi}{lo}"), 16) {
                        out.push(byte as char);
                        continue;
                    }
                }
                out.push('%');
            }
            other => out.push(other),
        }
    }
    out
}

/// An external validator seam for `ShouldBindAndValidate`/`Validate` (§4.1).
/// The core ships this trait but no implementation; applications register
/// their own validator out of band.
pub trait Validator<T>: Send + Sync {
    fn validate(&self, value: &T) -> Result<(), Problem>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn ctx(uri: &str) -> RequestContext {
        RequestContext::new(
            Method::GET,
            uri.parse().unwrap(),
            HeaderMap::new(),
            Bytes::new(),
            HashMap::new(),
            None,
        )
    }

    #[test]
    fn query_falls_back_to_default() {
        let c = ctx("/x?a=1");
        assert_eq!(c.query("a", "0"), "1");
        assert_eq!(c.query("b", "0"), "0");
    }

    #[test]
    fn only_first_write_commits() {
        let mut c = ctx("/x");
        let first = c.json(StatusCode::OK, &serde_json::json!({"ok": true}));
        assert_eq!(first.status, StatusCode::OK);
        let second = c.json(StatusCode::INTERNAL_SERVER_ERROR, &serde_json::json!({}));
        assert_eq!(second.status, StatusCode::OK);
        assert!(c.written());
    }

    #[test]
    fn try_write_problem_is_idempotent() {
        let mut c = ctx("/x");
        c.text(StatusCode::OK, "hi");
        let outcome = c.try_write_problem(Problem::internal("boom"));
        assert_eq!(outcome.status, StatusCode::OK);
    }

    #[test]
    fn should_bind_and_validate_rejects_an_invalid_body() {
        #[derive(serde::Deserialize)]
        struct Body {
            name: String,
        }
        struct NonEmpty;
        impl Validator<Body> for NonEmpty {
            fn validate(&self, value: &Body) -> Result<(), Problem> {
                if value.name.is_empty() {
                    Err(Problem::new(StatusCode::BAD_REQUEST, "invalid_body", "name is empty"))
                } else {
                    Ok(())
                }
            }
        }

        let c = RequestContext::new(
            Method::POST,
            "/x".parse().unwrap(),
            HeaderMap::new(),
            Bytes::from_static(br#"{"name":""}"#),
            HashMap::new(),
            None,
        );
        let err = c.should_bind_and_validate(&NonEmpty).unwrap_err();
        assert_eq!(err.code, "invalid_body");
    }

    #[test]
    fn bind_decodes_json_body() {
        let c = RequestContext::new(
            Method::POST,
            "/x".parse().unwrap(),
            HeaderMap::new(),
            Bytes::from_static(br#"{"name":"a"}"#),
            HashMap::new(),
            None,
        );
        #[derive(serde::Deserialize)]
        struct Body {
            name: String,
        }
        let b: Body = c.bind().unwrap();
        assert_eq!(b.name, "a");
    }
}
