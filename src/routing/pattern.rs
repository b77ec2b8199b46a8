//! Route templates with named segments, e.g. `/{resource}/{language}/{id}`.

use crate::error::ConfigError;
use std::collections::HashMap;
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoutePattern {
    raw: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    pub fn parse(template: &str) -> Result<Self, ConfigError> {
        if !template.starts_with('/') {
            return Err(ConfigError::Validation(format!("route template must start with '/': {}", template)));
        }
        let mut segments = Vec::new();
        for part in template.split('/').filter(|s| !s.is_empty()) {
            let seg = match part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                Some(name) if !name.is_empty() && !name.contains(['{', '}']) => {
                    if segments.iter().any(|s| matches!(s, Segment::Param(n) if n == name)) {
                        return Err(ConfigError::Validation(format!(
                            "route template repeats parameter '{}': {}",
                            name, template
                        )));
                    }
                    Segment::Param(name.to_string())
                }
                Some(_) => {
                    return Err(ConfigError::Validation(format!("bad route parameter in {}", template)));
                }
                None if part.contains(['{', '}']) => {
                    return Err(ConfigError::Validation(format!("bad route parameter in {}", template)));
                }
                None => Segment::Literal(part.to_string()),
            };
            segments.push(seg);
        }
        Ok(RoutePattern {
            raw: template.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn params(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(n) => Some(n.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Named parameters when `path` has exactly this pattern's shape. Empty segments never match.
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let parts: Vec<&str> = path.trim_end_matches('/').split('/').skip(1).collect();
        if parts.len() != self.segments.len() || !path.starts_with('/') {
            return None;
        }
        let mut params = HashMap::new();
        for (seg, part) in self.segments.iter().zip(parts) {
            match seg {
                Segment::Literal(l) if l == part => {}
                Segment::Literal(_) => return None,
                Segment::Param(_) if part.is_empty() => return None,
                Segment::Param(name) => {
                    params.insert(name.clone(), part.to_string());
                }
            }
        }
        Some(params)
    }

    /// Fill the given parameters; parameters not supplied stay as `{name}`.
    pub fn render(&self, values: &[(&str, &str)]) -> String {
        let mut out = String::new();
        for seg in &self.segments {
            out.push('/');
            match seg {
                Segment::Literal(l) => out.push_str(l),
                Segment::Param(name) => match values.iter().find(|(k, _)| k == name) {
                    Some((_, v)) => out.push_str(v),
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                },
            }
        }
        if out.is_empty() {
            out.push('/');
        }
        out
    }

    /// axum 0.7 syntax: `/:resource/:language`.
    pub fn to_axum(&self) -> String {
        let mut out = String::new();
        for seg in &self.segments {
            out.push('/');
            match seg {
                Segment::Literal(l) => out.push_str(l),
                Segment::Param(name) => {
                    out.push(':');
                    out.push_str(name);
                }
            }
        }
        out
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_matches_named_segments() {
        let p = RoutePattern::parse("/{resource}/{language}/{id}").unwrap();
        assert_eq!(p.segment_count(), 3);
        assert_eq!(p.params().collect::<Vec<_>>(), vec!["resource", "language", "id"]);
        let m = p.matches("/drinks/ru/12").unwrap();
        assert_eq!(m["resource"], "drinks");
        assert_eq!(m["language"], "ru");
        assert_eq!(m["id"], "12");
        assert!(p.matches("/drinks/ru").is_none());
        assert!(p.matches("/drinks//12").is_none());
        assert!(p.matches("/drinks/ru/12/").is_some());
    }

    #[test]
    fn literals_must_match_exactly() {
        let p = RoutePattern::parse("/{resource}/{id}/documents/{field}").unwrap();
        assert!(p.matches("/drinks/3/documents/image").is_some());
        assert!(p.matches("/drinks/3/files/image").is_none());
        assert_eq!(p.to_axum(), "/:resource/:id/documents/:field");
    }

    #[test]
    fn render_fills_known_params() {
        let p = RoutePattern::parse("/{resource}/{language}/{id}").unwrap();
        assert_eq!(p.render(&[("resource", "categories"), ("language", "en")]), "/categories/en/{id}");
    }

    #[test]
    fn rejects_malformed_templates() {
        assert!(RoutePattern::parse("drinks").is_err());
        assert!(RoutePattern::parse("/{}/x").is_err());
        assert!(RoutePattern::parse("/{a}/{a}").is_err());
        assert!(RoutePattern::parse("/a{b}").is_err());
    }
}
