use std::fmt;
use strum_macros::EnumString;

/// HTTP request method as seen by the deduplicator.
///
/// Parsing is case-insensitive; unknown verbs are kept as [`Method::Custom`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum Method {
    #[strum(serialize = "GET")]
    Get,
    #[strum(serialize = "POST")]
    Post,
    #[strum(serialize = "PUT")]
    Put,
    #[strum(serialize = "DELETE")]
    Delete,
    #[strum(serialize = "HEAD")]
    Head,
    #[strum(serialize = "OPTIONS")]
    Options,
    #[strum(serialize = "PATCH")]
    Patch,
    #[strum(serialize = "CONNECT")]
    Connect,
    #[strum(serialize = "TRACE")]
    Trace,
    #[strum(default)]
    Custom(String),
}

impl Method {
    /// Parses a verb, never failing: anything unknown becomes an uppercased `Custom`.
    pub fn parse(verb: &str) -> Self {
        match verb.trim().parse::<Method>() {
            Ok(Method::Custom(other)) => Method::Custom(other.to_ascii_uppercase()),
            Ok(method) => method,
            Err(_) => Method::Custom(verb.trim().to_ascii_uppercase()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Patch => "PATCH",
            Self::Connect => "CONNECT",
            Self::Trace => "TRACE",
            Self::Custom(s) => s.as_str(),
        }
    }

    /// Whether successful responses to this method may be cached.
    ///
    /// Only the read-only verbs GET and HEAD qualify.
    pub fn is_cacheable(&self) -> bool {
        matches!(self, Self::Get | Self::Head)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
