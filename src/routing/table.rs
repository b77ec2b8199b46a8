//! Route table synthesis: one entry per (resource, language) or per resource for mutations.

use crate::error::{AppError, ConfigError};
use crate::routing::RoutePattern;
use crate::schema::{GeneratedShape, SchemaSynthesizer, ShapeKind};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

pub const LIST_TEMPLATE: &str = "/{resource}/{language}";
pub const READ_TEMPLATE: &str = "/{resource}/{language}/{id}";
pub const CREATE_TEMPLATE: &str = "/{resource}";
pub const ITEM_TEMPLATE: &str = "/{resource}/{id}";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RouteAction {
    List,
    Read,
    Create,
    Update,
    Delete,
}

impl RouteAction {
    pub fn method(&self) -> &'static str {
        match self {
            RouteAction::List | RouteAction::Read => "GET",
            RouteAction::Create => "POST",
            RouteAction::Update => "PATCH",
            RouteAction::Delete => "DELETE",
        }
    }

    /// The shape bound to routes of this action.
    pub fn shape_kind(&self) -> ShapeKind {
        match self {
            RouteAction::List => ShapeKind::List,
            RouteAction::Read => ShapeKind::Read,
            RouteAction::Create => ShapeKind::Create,
            RouteAction::Update => ShapeKind::Update,
            RouteAction::Delete => ShapeKind::Delete,
        }
    }

    /// Operation name as listed in a resource's `operations`.
    pub fn operation(&self) -> &'static str {
        match self {
            RouteAction::List => "list",
            RouteAction::Read => "read",
            RouteAction::Create => "create",
            RouteAction::Update => "update",
            RouteAction::Delete => "delete",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RouteEntry {
    pub action: RouteAction,
    pub template: Arc<RoutePattern>,
    /// Template with resource (and language) filled in, e.g. `/categories/en/{id}`.
    pub path: String,
    pub resource_key: String,
    pub language: Option<String>,
    pub shape: Arc<GeneratedShape>,
}

/// Right-to-left split of the last `tier` segments. The first two of those are
/// `(resource_key, language)`. `None` when the path is too short or a segment is empty.
pub fn split_path(path: &str, tier: usize) -> Option<(String, String)> {
    if tier < 2 {
        return None;
    }
    let mut parts: Vec<&str> = path.trim_end_matches('/').rsplitn(tier + 1, '/').collect();
    if parts.len() < tier + 1 {
        return None;
    }
    parts.truncate(tier);
    parts.reverse();
    if parts.iter().any(|p| p.is_empty()) {
        return None;
    }
    Some((parts[0].to_string(), parts[1].to_string()))
}

fn check_resource_key(key: &str) -> Result<(), ConfigError> {
    if key.is_empty() || key.contains('/') {
        return Err(ConfigError::Validation(format!(
            "resource key '{}' must be a single non-empty path segment",
            key
        )));
    }
    Ok(())
}

/// Builds route entries from previously synthesized shapes.
pub struct RouteSynthesizer<'a> {
    synth: &'a SchemaSynthesizer,
    depth: i64,
}

impl<'a> RouteSynthesizer<'a> {
    pub fn new(synth: &'a SchemaSynthesizer, depth: i64) -> Self {
        RouteSynthesizer { synth, depth }
    }

    /// One entry per (resource, language). Tier 2 binds list routes (`/{resource}/{language}`),
    /// tier 3 binds single-record reads (`/{resource}/{language}/{id}`).
    pub fn build_routes(
        &self,
        resources: &BTreeMap<String, String>,
        languages: &[String],
        path_tier: usize,
    ) -> Result<Vec<RouteEntry>, ConfigError> {
        let (action, template) = match path_tier {
            2 => (RouteAction::List, LIST_TEMPLATE),
            3 => (RouteAction::Read, READ_TEMPLATE),
            other => {
                return Err(ConfigError::Validation(format!("unsupported path tier {}", other)));
            }
        };
        let template = Arc::new(RoutePattern::parse(template)?);
        let mut out = Vec::with_capacity(resources.len() * languages.len());
        for (key, entity) in resources {
            check_resource_key(key)?;
            let shape = self.synth.synthesize(entity, action.shape_kind(), self.depth)?;
            for lang in languages {
                out.push(RouteEntry {
                    action,
                    path: template.render(&[("resource", key), ("language", lang)]),
                    template: template.clone(),
                    resource_key: key.clone(),
                    language: Some(lang.clone()),
                    shape: shape.clone(),
                });
            }
        }
        Ok(out)
    }

    /// Create (`/{resource}`), update and delete (`/{resource}/{id}`) entries. No language segment.
    pub fn build_mutation_routes(&self, resources: &BTreeMap<String, String>) -> Result<Vec<RouteEntry>, ConfigError> {
        let create = Arc::new(RoutePattern::parse(CREATE_TEMPLATE)?);
        let item = Arc::new(RoutePattern::parse(ITEM_TEMPLATE)?);
        let mut out = Vec::with_capacity(resources.len() * 3);
        for (key, entity) in resources {
            check_resource_key(key)?;
            for (action, template) in [
                (RouteAction::Create, &create),
                (RouteAction::Update, &item),
                (RouteAction::Delete, &item),
            ] {
                out.push(RouteEntry {
                    action,
                    path: template.render(&[("resource", key)]),
                    template: template.clone(),
                    resource_key: key.clone(),
                    language: None,
                    shape: self.synth.synthesize(entity, action.shape_kind(), self.depth)?,
                });
            }
        }
        Ok(out)
    }
}

type RouteKey = (RouteAction, String, Option<String>);

/// Immutable route table consulted per request.
#[derive(Debug, Default)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
    index: HashMap<RouteKey, usize>,
}

fn route_key(action: RouteAction, resource: &str, language: Option<&str>) -> RouteKey {
    (action, resource.to_lowercase(), language.map(str::to_lowercase))
}

impl RouteTable {
    pub fn new(entries: Vec<RouteEntry>) -> Result<Self, ConfigError> {
        let mut index = HashMap::with_capacity(entries.len());
        for (i, e) in entries.iter().enumerate() {
            let key = route_key(e.action, &e.resource_key, e.language.as_deref());
            if index.insert(key, i).is_some() {
                return Err(ConfigError::Validation(format!(
                    "duplicate route {} {}",
                    e.action.method(),
                    e.path
                )));
            }
        }
        Ok(RouteTable { entries, index })
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn lookup(&self, action: RouteAction, resource: &str, language: Option<&str>) -> Option<&RouteEntry> {
        self.index
            .get(&route_key(action, resource, language))
            .map(|&i| &self.entries[i])
    }

    /// Like `lookup`, but unknown resources or languages are `NotFound`.
    pub fn require(&self, action: RouteAction, resource: &str, language: Option<&str>) -> Result<&RouteEntry, AppError> {
        self.lookup(action, resource, language).ok_or_else(|| match language {
            Some(lang) => AppError::NotFound(format!("{} route for '{}' in '{}'", action.operation(), resource, lang)),
            None => AppError::NotFound(format!("{} route for '{}'", action.operation(), resource)),
        })
    }

    /// Match a concrete request against the named-segment templates.
    pub fn resolve(&self, method: &str, path: &str) -> Result<(&RouteEntry, HashMap<String, String>), AppError> {
        for e in self.entries.iter().filter(|e| e.action.method().eq_ignore_ascii_case(method)) {
            let Some(params) = e.template.matches(path) else { continue };
            let resource_ok = params
                .get("resource")
                .map(|r| r.eq_ignore_ascii_case(&e.resource_key))
                .unwrap_or(false);
            let language_ok = match (&e.language, params.get("language")) {
                (Some(l), Some(p)) => l.eq_ignore_ascii_case(p),
                (None, None) => true,
                _ => false,
            };
            if resource_ok && language_ok {
                return Ok((e, params));
            }
        }
        Err(AppError::NotFound(format!("{} {}", method, path)))
    }

    /// Fallback decoder: split the last `tier` segments and check the pair is routed.
    pub fn decode(&self, path: &str, tier: usize) -> Result<(String, String), AppError> {
        let action = match tier {
            2 => RouteAction::List,
            3 => RouteAction::Read,
            _ => return Err(AppError::BadRequest(format!("unsupported path tier {}", tier))),
        };
        let (resource, language) =
            split_path(path, tier).ok_or_else(|| AppError::BadRequest(format!("cannot decode path {}", path)))?;
        let entry = self.require(action, &resource, Some(&language))?;
        Ok((entry.resource_key.clone(), entry.language.clone().unwrap_or(language)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::i18n::Localizer;
    use crate::model::EntityGraph;
    use crate::schema::ClassifyOptions;

    fn synth() -> SchemaSynthesizer {
        let config = fixtures::wine_catalog();
        let graph = EntityGraph::build(&config.entities, &Localizer::from_settings(&config.settings.languages)).unwrap();
        SchemaSynthesizer::new(Arc::new(graph), ClassifyOptions::default())
    }

    fn langs(l: &[&str]) -> Vec<String> {
        l.iter().map(|s| s.to_string()).collect()
    }

    fn resources(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, e)| (k.to_string(), e.to_string())).collect()
    }

    #[test]
    fn categories_in_two_languages() {
        let s = synth();
        let routes = RouteSynthesizer::new(&s, 1)
            .build_routes(&resources(&[("categories", "Category")]), &langs(&["en", "ru"]), 2)
            .unwrap();
        let paths: Vec<_> = routes.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["/categories/en", "/categories/ru"]);
        assert!(routes.iter().all(|r| r.shape.kind == ShapeKind::List));

        let table = RouteTable::new(routes).unwrap();
        assert_eq!(table.decode("/categories/ru", 2).unwrap(), ("categories".to_string(), "ru".to_string()));
    }

    #[test]
    fn every_entry_decodes_to_its_own_pair() {
        let s = synth();
        let res = resources(&[("categories", "Category"), ("drinks", "Drink"), ("regions", "Region")]);
        let languages = langs(&["en", "ru", "fr"]);
        let rs = RouteSynthesizer::new(&s, 2);
        for tier in [2, 3] {
            let table = RouteTable::new(rs.build_routes(&res, &languages, tier).unwrap()).unwrap();
            assert_eq!(table.len(), 9);
            for e in table.entries() {
                let (key, lang) = table.decode(&e.path, tier).unwrap();
                assert_eq!(key, e.resource_key);
                assert_eq!(Some(lang), e.language);
            }
        }
    }

    #[test]
    fn decode_reports_unknown_resource_as_not_found() {
        let s = synth();
        let table = RouteTable::new(
            RouteSynthesizer::new(&s, 1)
                .build_routes(&resources(&[("drinks", "Drink")]), &langs(&["en"]), 2)
                .unwrap(),
        )
        .unwrap();
        assert!(matches!(table.decode("/beers/en", 2), Err(AppError::NotFound(_))));
        assert!(matches!(table.decode("/drinks/de", 2), Err(AppError::NotFound(_))));
        assert!(matches!(table.decode("/en", 2), Err(AppError::BadRequest(_))));
        assert!(matches!(table.decode("/drinks/en", 4), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn split_path_takes_trailing_segments() {
        assert_eq!(split_path("/api/v1/drinks/ru", 2), Some(("drinks".into(), "ru".into())));
        assert_eq!(split_path("/drinks/ru/42", 3), Some(("drinks".into(), "ru".into())));
        assert_eq!(split_path("/drinks/ru/", 2), Some(("drinks".into(), "ru".into())));
        assert_eq!(split_path("/ru", 2), None);
        assert_eq!(split_path("/drinks/ru", 1), None);
    }

    #[test]
    fn mutation_routes_have_no_language() {
        let s = synth();
        let routes = RouteSynthesizer::new(&s, 1)
            .build_mutation_routes(&resources(&[("drinks", "Drink")]))
            .unwrap();
        let table = RouteTable::new(routes).unwrap();
        let create = table.lookup(RouteAction::Create, "drinks", None).unwrap();
        assert_eq!(create.path, "/drinks");
        assert_eq!(create.shape.kind, ShapeKind::Create);
        let (entry, params) = table.resolve("PATCH", "/drinks/4").unwrap();
        assert_eq!(entry.action, RouteAction::Update);
        assert_eq!(params["id"], "4");
        assert_eq!(table.resolve("DELETE", "/drinks/4").unwrap().0.shape.kind, ShapeKind::Delete);
        assert!(table.resolve("PUT", "/drinks/4").is_err());
    }

    #[test]
    fn resolve_uses_named_segments() {
        let s = synth();
        let rs = RouteSynthesizer::new(&s, 1);
        let res = resources(&[("drinks", "Drink")]);
        let mut entries = rs.build_routes(&res, &langs(&["en", "ru"]), 2).unwrap();
        entries.extend(rs.build_routes(&res, &langs(&["en", "ru"]), 3).unwrap());
        let table = RouteTable::new(entries).unwrap();
        let (e, params) = table.resolve("GET", "/drinks/ru/7").unwrap();
        assert_eq!(e.action, RouteAction::Read);
        assert_eq!(params["id"], "7");
        assert_eq!(table.resolve("GET", "/drinks/en").unwrap().0.action, RouteAction::List);
        assert!(matches!(table.resolve("GET", "/drinks/de"), Err(AppError::NotFound(_))));
    }

    #[test]
    fn bad_keys_and_tiers_fail_at_build_time() {
        let s = synth();
        let rs = RouteSynthesizer::new(&s, 1);
        assert!(rs.build_routes(&resources(&[("red/wine", "Drink")]), &langs(&["en"]), 2).is_err());
        assert!(rs.build_routes(&resources(&[("drinks", "Drink")]), &langs(&["en"]), 4).is_err());
        assert!(matches!(
            rs.build_routes(&resources(&[("beers", "Beer")]), &langs(&["en"]), 2),
            Err(ConfigError::MissingReference { .. })
        ));
        let dup = rs.build_routes(&resources(&[("drinks", "Drink")]), &langs(&["en", "EN"]), 2).unwrap();
        assert!(RouteTable::new(dup).is_err());
    }
}
