use crate::{
    error::KeyError,
    method::Method,
    request::{Body, RequestInfo},
};
use getset::Getters;
use lazy_static::lazy_static;
use sha2::{Digest, Sha256};
use url::{form_urlencoded, Url};

lazy_static! {
    /// Origin used only to parse relative URLs; it never ends up in a key.
    static ref PARSE_BASE: Option<Url> = Url::parse("http://request-dedup.invalid/").ok();
}

/// Identity of a logical request for caching and in-flight sharing.
///
/// Built from the base URL, the normalized method, the sorted query
/// parameters, the serialized body and the authenticated flag (plus the
/// principal when one was supplied). Credentials never enter the key.
#[derive(Hash, Eq, PartialEq, Clone, Debug, Getters)]
#[get = "pub"]
pub struct RequestKey {
    digest: String,
    method: Method,
    base_url: String,
}

impl RequestKey {
    pub fn derive(request: &RequestInfo) -> Result<Self, KeyError> {
        let raw = request.url().trim();
        if raw.is_empty() {
            return Err(KeyError::EmptyUrl);
        }

        let parsed = Url::options().base_url((*PARSE_BASE).as_ref()).parse(raw)?;
        let base_url = raw
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string();
        let method = Method::parse(request.method().as_str());

        let mut pairs: Vec<(String, String)> = parsed
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        pairs.sort();
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish();

        let mut hasher = Sha256::new();
        update_field(&mut hasher, method.as_str().as_bytes());
        update_field(&mut hasher, base_url.as_bytes());
        update_field(&mut hasher, query.as_bytes());
        match &request.body {
            Body::Absent => update_field(&mut hasher, b"-"),
            Body::Json(json) => {
                update_field(&mut hasher, b"json");
                update_field(&mut hasher, json.as_bytes());
            }
            Body::Unserializable(reason) => {
                return Err(KeyError::UnserializableBody(reason.clone()));
            }
        }
        update_field(
            &mut hasher,
            if *request.authenticated() {
                b"auth"
            } else {
                b"anon"
            },
        );
        if let Some(principal) = request.principal() {
            update_field(&mut hasher, principal.as_bytes());
        }

        Ok(Self {
            digest: hex::encode(hasher.finalize()),
            method,
            base_url,
        })
    }
}

// Length-prefixed so that adjacent fields cannot run into each other.
fn update_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
}
