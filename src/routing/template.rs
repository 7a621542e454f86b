//! Path template grammar.
//!
//! A template is a `/`-separated list of segments. Each segment is either a
//! literal (`shelves`) or a single-segment variable (`{shelf_id}`, or the
//! equivalent `{shelf_id=*}`). Variable names may be dotted (`book.id`) to
//! bind nested message fields.

use std::cmp::Ordering;
use std::fmt;

use thiserror::Error;

/// Reasons a path template is rejected at load time.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template `{0}` must start with '/'")]
    MissingLeadingSlash(String),

    #[error("template `{0}` contains an empty segment")]
    EmptySegment(String),

    #[error("template `{template}` has a malformed variable `{segment}`")]
    MalformedVariable { template: String, segment: String },

    #[error("template `{template}` binds `{name}` more than once")]
    DuplicateVariable { template: String, name: String },

    #[error("template `{0}` uses a wildcard outside a named variable")]
    AnonymousWildcard(String),

    #[error("template `{0}` uses a multi-segment wildcard, which is not supported")]
    MultiSegmentWildcard(String),
}

/// One segment of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Literal(String),
    Variable(String),
}

impl Segment {
    pub fn is_literal(&self) -> bool {
        matches!(self, Segment::Literal(_))
    }
}

/// A parsed HTTP path template such as `/v1/shelves/{shelf_id}/books`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl PathTemplate {
    /// Parse a template string.
    pub fn parse(raw: &str) -> Result<Self, TemplateError> {
        let rest = raw
            .strip_prefix('/')
            .ok_or_else(|| TemplateError::MissingLeadingSlash(raw.to_string()))?;

        let mut segments = Vec::new();
        if !rest.is_empty() {
            for part in rest.split('/') {
                segments.push(parse_segment(raw, part)?);
            }
        }

        let mut names: Vec<&str> = segments
            .iter()
            .filter_map(|s| match s {
                Segment::Variable(name) => Some(name.as_str()),
                Segment::Literal(_) => None,
            })
            .collect();
        names.sort_unstable();
        if let Some(pair) = names.windows(2).find(|w| w[0] == w[1]) {
            return Err(TemplateError::DuplicateVariable {
                template: raw.to_string(),
                name: pair[0].to_string(),
            });
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Template with variable names erased, e.g. `/v1/shelves/*`.
    ///
    /// Two templates with the same shape match exactly the same paths.
    pub fn shape(&self) -> String {
        let mut shape = String::new();
        for segment in &self.segments {
            shape.push('/');
            match segment {
                Segment::Literal(lit) => shape.push_str(lit),
                Segment::Variable(_) => shape.push('*'),
            }
        }
        if shape.is_empty() {
            shape.push('/');
        }
        shape
    }

    /// Orders templates from most to least specific.
    ///
    /// At the first position where one template has a literal and the other a
    /// variable, the literal wins. Templates of equal shape compare equal.
    pub fn specificity_cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.segments.iter().zip(other.segments.iter()) {
            match (a.is_literal(), b.is_literal()) {
                (true, false) => return Ordering::Less,
                (false, true) => return Ordering::Greater,
                _ => {}
            }
        }
        Ordering::Equal
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn parse_segment(template: &str, part: &str) -> Result<Segment, TemplateError> {
    if part.is_empty() {
        return Err(TemplateError::EmptySegment(template.to_string()));
    }
    if part == "**" {
        return Err(TemplateError::MultiSegmentWildcard(template.to_string()));
    }
    if part == "*" {
        return Err(TemplateError::AnonymousWildcard(template.to_string()));
    }

    let malformed = || TemplateError::MalformedVariable {
        template: template.to_string(),
        segment: part.to_string(),
    };

    match part.strip_prefix('{') {
        Some(inner) => {
            let inner = inner.strip_suffix('}').ok_or_else(malformed)?;
            let name = match inner.split_once('=') {
                Some((name, "*")) => name,
                Some((_, "**")) => {
                    return Err(TemplateError::MultiSegmentWildcard(template.to_string()))
                }
                Some(_) => return Err(malformed()),
                None => inner,
            };
            if !is_field_path(name) {
                return Err(malformed());
            }
            Ok(Segment::Variable(name.to_string()))
        }
        None if part.contains(['{', '}']) => Err(malformed()),
        None => Ok(Segment::Literal(part.to_string())),
    }
}

fn is_field_path(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|ident| {
            !ident.is_empty() && ident.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_literals_and_variables() {
        let t = PathTemplate::parse("/v1/shelves/{shelf_id}/books/{book_id=*}").unwrap();
        assert_eq!(
            t.segments(),
            &[
                Segment::Literal("v1".into()),
                Segment::Literal("shelves".into()),
                Segment::Variable("shelf_id".into()),
                Segment::Literal("books".into()),
                Segment::Variable("book_id".into()),
            ]
        );
        assert_eq!(t.shape(), "/v1/shelves/*/books/*");
        assert_eq!(t.to_string(), "/v1/shelves/{shelf_id}/books/{book_id=*}");
    }

    #[test]
    fn test_root_template() {
        let t = PathTemplate::parse("/").unwrap();
        assert!(t.segments().is_empty());
        assert_eq!(t.shape(), "/");
    }

    #[test]
    fn test_dotted_variable() {
        let t = PathTemplate::parse("/v1/books/{book.id}").unwrap();
        assert_eq!(t.segments()[2], Segment::Variable("book.id".into()));
    }

    #[test]
    fn test_rejects_bad_templates() {
        assert!(matches!(
            PathTemplate::parse("v1/shelves"),
            Err(TemplateError::MissingLeadingSlash(_))
        ));
        assert!(matches!(
            PathTemplate::parse("/v1//shelves"),
            Err(TemplateError::EmptySegment(_))
        ));
        assert!(matches!(
            PathTemplate::parse("/v1/shelves/"),
            Err(TemplateError::EmptySegment(_))
        ));
        assert!(matches!(
            PathTemplate::parse("/v1/{shelf"),
            Err(TemplateError::MalformedVariable { .. })
        ));
        assert!(matches!(
            PathTemplate::parse("/v1/{}"),
            Err(TemplateError::MalformedVariable { .. })
        ));
        assert!(matches!(
            PathTemplate::parse("/v1/{a.}"),
            Err(TemplateError::MalformedVariable { .. })
        ));
        assert!(matches!(
            PathTemplate::parse("/v1/x{id}"),
            Err(TemplateError::MalformedVariable { .. })
        ));
        assert!(matches!(
            PathTemplate::parse("/v1/{id}/x/{id}"),
            Err(TemplateError::DuplicateVariable { .. })
        ));
        assert!(matches!(
            PathTemplate::parse("/v1/*"),
            Err(TemplateError::AnonymousWildcard(_))
        ));
        assert!(matches!(
            PathTemplate::parse("/v1/{path=**}"),
            Err(TemplateError::MultiSegmentWildcard(_))
        ));
    }

    #[test]
    fn test_literal_beats_variable_at_first_difference() {
        let literal = PathTemplate::parse("/v1/shelves/125").unwrap();
        let variable = PathTemplate::parse("/v1/shelves/{id}").unwrap();
        assert_eq!(literal.specificity_cmp(&variable), Ordering::Less);
        assert_eq!(variable.specificity_cmp(&literal), Ordering::Greater);

        // Longest literal prefix decides, even if the other has more literals later.
        let a = PathTemplate::parse("/v1/shelves/{id}/books/latest").unwrap();
        let b = PathTemplate::parse("/v1/{kind}/125/books/latest").unwrap();
        assert_eq!(a.specificity_cmp(&b), Ordering::Less);

        let c = PathTemplate::parse("/v1/shelves/{other}").unwrap();
        assert_eq!(variable.specificity_cmp(&c), Ordering::Equal);
    }
}
