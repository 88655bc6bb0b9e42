use crate::{error::KeyError, key::RequestKey, method::Method};
use getset::Getters;
use serde::Serialize;
use std::time::Duration;

/// Headers whose presence marks a request as authenticated.
const AUTHORIZATION_HEADERS: [&str; 1] = ["authorization"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Body {
    Absent,
    Json(String),
    Unserializable(String),
}

/// Describes one logical request for key derivation.
///
/// Header values are inspected only for the presence of an authorization
/// header and are never kept.
#[derive(Clone, Debug, Getters)]
pub struct RequestInfo {
    #[get = "pub"]
    method: Method,
    #[get = "pub"]
    url: String,
    #[get = "pub"]
    authenticated: bool,
    #[get = "pub"]
    principal: Option<String>,
    pub(crate) body: Body,
}

impl RequestInfo {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            authenticated: false,
            principal: None,
            body: Body::Absent,
        }
    }

    /// Builds a request from a verb string such as `"get"` or `"PATCH"`.
    pub fn with_verb(verb: &str, url: impl Into<String>) -> Self {
        Self::new(Method::parse(verb), url)
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    /// Attaches a body. It is serialized through `serde_json::Value`, so
    /// object keys end up sorted and field order does not affect the key.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Self {
        self.body = match serde_json::to_value(body) {
            Ok(value) => Body::Json(value.to_string()),
            Err(e) => Body::Unserializable(e.to_string()),
        };
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        if AUTHORIZATION_HEADERS
            .iter()
            .any(|h| h.eq_ignore_ascii_case(name.trim()))
            && !value.trim().is_empty()
        {
            self.authenticated = true;
        }
        self
    }

    pub fn headers<'a, I>(self, headers: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        headers
            .into_iter()
            .fold(self, |request, (name, value)| request.header(name, value))
    }

    /// Scopes the key to a specific principal instead of the bare
    /// authenticated/anonymous flag.
    pub fn for_principal(mut self, principal: impl Into<String>) -> Self {
        self.principal = Some(principal.into());
        self
    }

    pub fn key(&self) -> Result<RequestKey, KeyError> {
        RequestKey::derive(self)
    }
}

/// Per-call knobs for [`RequestDeduplicator::execute`](crate::RequestDeduplicator::execute).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecuteOptions {
    pub ttl: Option<Duration>,
    pub skip_cache: bool,
}

impl ExecuteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn skip_cache(mut self) -> Self {
        self.skip_cache = true;
        self
    }
}
