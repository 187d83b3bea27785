//! Pagination aggregator
//!
//! Collection endpoints return one JSON array per page and announce the next
//! page in the `Link` response header (`<url>; rel="next"`). The aggregator
//! follows those links until none is left and lifts every item into a literal
//! [`Resource`].
//!
//! Pages are appended in fetch order with no de-duplication: a server that
//! returns overlapping pages (say, because the list changed between requests)
//! produces duplicate entries.

use super::lazy::Resource;
use super::registry::Entity;
use crate::api::client::ClientHandle;
use crate::api::http::{same_origin, HttpClient, HttpResponse};
use crate::error::{Error, Result};
use serde_json::Value;
use std::collections::HashSet;
use std::ops::Deref;
use std::sync::Arc;
use url::Url;

/// One entry of a `Link` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub target: String,
    pub rels: Vec<String>,
}

impl Link {
    pub fn has_rel(&self, rel: &str) -> bool {
        self.rels.iter().any(|r| r.eq_ignore_ascii_case(rel))
    }
}

/// Split at the first `delimiter` that is not inside double quotes
fn split_unquoted(input: &str, delimiter: char) -> (&str, &str) {
    let mut quoted = false;
    for (idx, c) in input.char_indices() {
        match c {
            '"' => quoted = !quoted,
            c if c == delimiter && !quoted => {
                return (&input[..idx], &input[idx + c.len_utf8()..]);
            }
            _ => {}
        }
    }
    (input, "")
}

/// Parse a `Link` header value (RFC 8288) into its entries
pub fn parse_link_header(value: &str) -> Vec<Link> {
    let mut links = Vec::new();
    let mut rest = value;

    while let Some(start) = rest.find('<') {
        let after = &rest[start + 1..];
        let Some(end) = after.find('>') else {
            break;
        };
        let target = after[..end].trim().to_string();
        let (params, remainder) = split_unquoted(&after[end + 1..], ',');

        let mut rels = Vec::new();
        let mut params = params;
        while !params.is_empty() {
            let (param, next) = split_unquoted(params, ';');
            params = next;
            let Some((name, value)) = param.split_once('=') else {
                continue;
            };
            if name.trim().eq_ignore_ascii_case("rel") {
                let value = value.trim().trim_matches('"');
                rels.extend(value.split_whitespace().map(str::to_ascii_lowercase));
            }
        }

        links.push(Link { target, rels });
        rest = remainder;
    }

    links
}

/// Turn a link target into a request key relative to `base`.
///
/// The link must stay on the base endpoint (same origin, path under the base
/// path); anything else is an invalid payload rather than a guess.
pub fn relative_to_base(target: &str, base: &Url) -> Result<String> {
    let url = base
        .join(target)
        .map_err(|e| Error::invalid_payload(format!("unparseable pagination link {target:?}: {e}")))?;

    let Some(path) = url.path().strip_prefix(base.path()) else {
        return Err(Error::invalid_payload(format!(
            "pagination link {url} lies outside the API base {base}"
        )));
    };
    if !same_origin(&url, base) {
        return Err(Error::invalid_payload(format!(
            "pagination link {url} lies outside the API base {base}"
        )));
    }

    let mut relative = path.to_string();
    if let Some(query) = url.query() {
        relative.push('?');
        relative.push_str(query);
    }
    Ok(relative)
}

/// The `next` cursor of a page, relative to `base`; `None` on the last page
pub fn next_cursor(response: &HttpResponse, base: &Url) -> Result<Option<String>> {
    let next = response
        .links()
        .flat_map(parse_link_header)
        .find(|link| link.has_rel("next"));

    next.map(|link| relative_to_base(&link.target, base)).transpose()
}

/// Decode one page body into its raw items
fn decode_page(response: &HttpResponse) -> Result<Vec<Value>> {
    if !response.is_success() {
        return Err(Error::rejected(response.status()));
    }
    match response.json()? {
        Value::Array(items) => Ok(items),
        other => Err(Error::invalid_payload(format!(
            "expected a JSON array page, found {}",
            json_type(&other)
        ))),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// A fully materialized, ordered collection of resources
#[derive(Debug)]
pub struct Collection<T: Entity> {
    items: Vec<Arc<Resource<T>>>,
}

impl<T: Entity> Collection<T> {
    pub fn new(items: Vec<Arc<Resource<T>>>) -> Self {
        Self { items }
    }

    /// The entities themselves; every item of a collection is literal
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.items.iter().filter_map(|item| item.peek())
    }

    pub fn into_items(self) -> Vec<Arc<Resource<T>>> {
        self.items
    }

    /// Export every item as a record
    pub fn export(&self) -> Result<Value> {
        self.values()
            .map(Entity::export)
            .collect::<Result<Vec<_>>>()
            .map(Value::Array)
    }
}

impl<T: Entity> Deref for Collection<T> {
    type Target = [Arc<Resource<T>>];

    fn deref(&self) -> &Self::Target {
        &self.items
    }
}

/// Fetch every page starting at `first` and merge them in order.
///
/// A failed page fails the whole aggregation; nothing is retried. A `next`
/// link pointing at a page already fetched is an invalid payload.
pub async fn fetch_all<T: Entity>(
    http: &HttpClient,
    first: &str,
    client: ClientHandle,
) -> Result<Collection<T>> {
    let mut raw = Vec::new();
    let mut cursor = Some(first.to_string());
    let mut visited = HashSet::new();
    let mut pages = 0usize;

    while let Some(path) = cursor.take() {
        if !visited.insert(path.clone()) {
            return Err(Error::invalid_payload(format!(
                "pagination link cycles back to {path}"
            )));
        }
        let response = http.get(&path).await?;
        let page = decode_page(&response)?;
        pages += 1;
        tracing::debug!(kind = %T::KIND, page = pages, items = page.len(), "fetched page");

        raw.extend(page);
        cursor = next_cursor(&response, http.base_url())?;
    }

    let items = raw
        .into_iter()
        .map(|item| {
            T::hydrate(item).map(|value| Arc::new(Resource::from_literal(value, client.clone())))
        })
        .collect::<Result<Vec<_>>>()?;

    tracing::debug!(kind = %T::KIND, pages, items = items.len(), "aggregated collection");
    Ok(Collection::new(items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue, LINK};
    use reqwest::StatusCode;

    fn base() -> Url {
        Url::parse("https://example.org/api/v1/").unwrap()
    }

    #[test]
    fn test_parse_mastodon_link_header() {
        let header = "<https://example.org/api/v1/accounts/1/followers?max_id=7>; rel=\"next\", \
                      <https://example.org/api/v1/accounts/1/followers?since_id=9>; rel=\"prev\"";
        let links = parse_link_header(header);
        assert_eq!(links.len(), 2);
        assert!(links[0].has_rel("next"));
        assert_eq!(
            links[0].target,
            "https://example.org/api/v1/accounts/1/followers?max_id=7"
        );
        assert!(links[1].has_rel("prev"));
    }

    #[test]
    fn test_parse_link_header_with_extra_params_and_multiple_rels() {
        let header = "<https://a/p?x=1,2>; title=\"a, b; c\"; rel=\"next last\"";
        let links = parse_link_header(header);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].target, "https://a/p?x=1,2");
        assert!(links[0].has_rel("next"));
        assert!(links[0].has_rel("last"));
    }

    #[test]
    fn test_parse_link_header_unquoted_rel_and_garbage() {
        let links = parse_link_header("<https://a/p>;rel=next");
        assert!(links[0].has_rel("next"));
        assert!(parse_link_header("").is_empty());
        assert!(parse_link_header("no links here").is_empty());
        assert!(parse_link_header("<unterminated").is_empty());
    }

    #[test]
    fn test_relative_to_base() {
        assert_eq!(
            relative_to_base("https://example.org/api/v1/accounts/1/followers?max_id=7", &base())
                .unwrap(),
            "accounts/1/followers?max_id=7"
        );
        assert_eq!(
            relative_to_base("/api/v1/timelines/home?max_id=3", &base()).unwrap(),
            "timelines/home?max_id=3"
        );
    }

    #[test]
    fn test_relative_to_base_rejects_foreign_links() {
        let err = relative_to_base("https://evil.example/api/v1/accounts?max_id=1", &base()).unwrap_err();
        assert!(err.is_invalid_payload());
        let err = relative_to_base("https://example.org/other/accounts", &base()).unwrap_err();
        assert!(err.is_invalid_payload());
        let err = relative_to_base("http://example.org/api/v1/accounts", &base()).unwrap_err();
        assert!(err.is_invalid_payload());
    }

    #[test]
    fn test_next_cursor() {
        let mut headers = HeaderMap::new();
        headers.insert(
            LINK,
            HeaderValue::from_static(
                "<https://example.org/api/v1/follows?since_id=2>; rel=\"prev\", \
                 <https://example.org/api/v1/follows?max_id=1>; rel=\"next\"",
            ),
        );
        let response = HttpResponse::new(StatusCode::OK, headers, "[]");
        assert_eq!(
            next_cursor(&response, &base()).unwrap().as_deref(),
            Some("follows?max_id=1")
        );

        let last = HttpResponse::new(StatusCode::OK, HeaderMap::new(), "[]");
        assert_eq!(next_cursor(&last, &base()).unwrap(), None);
    }

    #[test]
    fn test_decode_page() {
        let ok = HttpResponse::new(StatusCode::OK, HeaderMap::new(), "[{\"a\":1},{\"a\":2}]");
        assert_eq!(decode_page(&ok).unwrap().len(), 2);

        let object = HttpResponse::new(StatusCode::OK, HeaderMap::new(), "{\"a\":1}");
        let err = decode_page(&object).unwrap_err();
        assert!(err.to_string().contains("found an object"));

        let rejected = HttpResponse::new(StatusCode::INTERNAL_SERVER_ERROR, HeaderMap::new(), "");
        assert!(decode_page(&rejected).unwrap_err().is_status(500));
    }
}
