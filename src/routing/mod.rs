//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! gRPC call (method name)
//!     → router.rs (direct lookup)
//!     → Return: Operation or NoMatch
//!
//! HTTP request (method, path, query, headers)
//!     → router.rs (candidates for method + segment count)
//!     → matcher.rs (template match, variable binding, discriminators)
//!     → Return: Operation + path variables, or NoMatch
//!
//! Route Compilation (at startup):
//!     OperationConfig[]
//!     → template.rs (parse path templates)
//!     → Reject duplicate bindings
//!     → Sort candidates by specificity
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (segment comparison only)
//! - Deterministic: same input always matches same route
//! - Most specific template wins (leftmost literal beats variable)

use std::collections::BTreeMap;

pub mod matcher;
pub mod router;
pub mod template;

pub use matcher::{resolve_http, MatchInput, ResolvedRoute};
pub use router::{BodySelector, HttpRule, Operation, RouteTable, RouteTableError};
pub use template::{PathTemplate, TemplateError};

/// Variables bound by a path template, by name.
pub type PathVariables = BTreeMap<String, String>;

/// Query parameters; repeated keys keep every value in order.
pub type QueryParams = BTreeMap<String, Vec<String>>;

/// Parse a raw (still percent-encoded) query string.
pub fn parse_query(query: &str) -> QueryParams {
    let mut params = QueryParams::new();
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        params.entry(key.into_owned()).or_default().push(value.into_owned());
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query() {
        let q = parse_query("a=1&b=x%20y&a=2&flag");
        assert_eq!(q["a"], vec!["1", "2"]);
        assert_eq!(q["b"], vec!["x y"]);
        assert_eq!(q["flag"], vec![""]);
        assert!(parse_query("").is_empty());
    }
}
