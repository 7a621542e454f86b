//! Route matching logic.
//!
//! # Responsibilities
//! - Match a concrete path against a template, segment by segment
//! - Bind variable segments into path variables
//! - Evaluate header and query discriminators after the template matched
//! - Pick the most specific candidate for a method + path
//!
//! # Design Decisions
//! - Header names are case-insensitive (RFC 9110), values are exact
//! - Path matching is case-sensitive, after percent-decoding each segment
//! - Empty condition set = always matches
//! - No regex to guarantee O(n) matching

use std::fmt;
use std::sync::Arc;

use axum::http::header::HeaderName;
use axum::http::{HeaderMap, Method};
use percent_encoding::percent_decode_str;

use crate::routing::router::{Operation, RouteTable};
use crate::routing::template::{PathTemplate, Segment};
use crate::routing::{PathVariables, QueryParams};

/// The parts of a request discriminators may inspect.
#[derive(Debug, Clone, Copy)]
pub struct MatchInput<'a> {
    pub headers: &'a HeaderMap,
    pub query: &'a QueryParams,
}

/// Trait for matching requests against conditions.
pub trait Matcher: Send + Sync + fmt::Debug {
    /// Returns true if the request matches this condition.
    fn matches(&self, input: &MatchInput<'_>) -> bool;

    /// Canonical text of the condition, used to detect duplicate bindings.
    fn describe(&self) -> String;
}

/// Matches a header by name, and optionally by exact value.
#[derive(Debug, Clone)]
pub struct HeaderMatcher {
    name: HeaderName,
    value: Option<String>,
}

impl HeaderMatcher {
    pub fn new(name: HeaderName, value: Option<String>) -> Self {
        Self { name, value }
    }
}

impl Matcher for HeaderMatcher {
    fn matches(&self, input: &MatchInput<'_>) -> bool {
        let mut values = input.headers.get_all(&self.name).iter();
        match &self.value {
            None => values.next().is_some(),
            Some(expected) => values.any(|v| v.to_str().map(|v| v == expected.as_str()).unwrap_or(false)),
        }
    }

    fn describe(&self) -> String {
        match &self.value {
            Some(v) => format!("header:{}={}", self.name, v),
            None => format!("header:{}", self.name),
        }
    }
}

/// Matches a query parameter by name, and optionally by exact value.
#[derive(Debug, Clone)]
pub struct QueryParamMatcher {
    name: String,
    value: Option<String>,
}

impl QueryParamMatcher {
    pub fn new(name: impl Into<String>, value: Option<String>) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

impl Matcher for QueryParamMatcher {
    fn matches(&self, input: &MatchInput<'_>) -> bool {
        match (input.query.get(&self.name), &self.value) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(values), Some(expected)) => values.iter().any(|v| v == expected),
        }
    }

    fn describe(&self) -> String {
        match &self.value {
            Some(v) => format!("query:{}={}", self.name, v),
            None => format!("query:{}", self.name),
        }
    }
}

/// Combines multiple matchers with AND semantics.
#[derive(Debug, Default)]
pub struct AndMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl AndMatcher {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }

    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}

impl Matcher for AndMatcher {
    fn matches(&self, input: &MatchInput<'_>) -> bool {
        // All matchers must pass (AND)
        self.matchers.iter().all(|m| m.matches(input))
    }

    fn describe(&self) -> String {
        let mut parts: Vec<String> = self.matchers.iter().map(|m| m.describe()).collect();
        parts.sort();
        parts.join("&")
    }
}

/// Split a request path into percent-decoded segments.
///
/// `/` yields no segments; empty segments (`//`, trailing `/`) are kept so
/// that no template matches them.
pub fn split_path(path: &str) -> Vec<String> {
    let rest = path.strip_prefix('/').unwrap_or(path);
    if rest.is_empty() {
        return Vec::new();
    }
    rest.split('/')
        .map(|seg| percent_decode_str(seg).decode_utf8_lossy().into_owned())
        .collect()
}

/// Match path segments against a template, binding variables.
pub fn match_template(template: &PathTemplate, segments: &[String]) -> Option<PathVariables> {
    if template.segments().len() != segments.len() {
        return None;
    }
    let mut variables = PathVariables::new();
    for (pattern, actual) in template.segments().iter().zip(segments) {
        match pattern {
            Segment::Literal(lit) if lit == actual => {}
            Segment::Literal(_) => return None,
            Segment::Variable(_) if actual.is_empty() => return None,
            Segment::Variable(name) => {
                variables.insert(name.clone(), actual.clone());
            }
        }
    }
    Some(variables)
}

/// An HTTP request resolved to exactly one operation.
#[derive(Debug, Clone)]
pub struct ResolvedRoute {
    pub operation: Arc<Operation>,
    pub path_variables: PathVariables,
}

/// Resolve an HTTP method + path against the table's templates.
///
/// Candidates come pre-sorted from most to least specific, so the first one
/// whose template and discriminators both match is the answer.
pub fn resolve_http(
    table: &RouteTable,
    method: &Method,
    path: &str,
    input: &MatchInput<'_>,
) -> Option<ResolvedRoute> {
    let segments = split_path(path);
    table
        .candidates(method, segments.len())
        .iter()
        .find_map(|operation| {
            let rule = operation.http.as_ref()?;
            let path_variables = match_template(&rule.template, &segments)?;
            if !rule.conditions.matches(input) {
                return None;
            }
            Some(ResolvedRoute {
                operation: Arc::clone(operation),
                path_variables,
            })
        })
}
