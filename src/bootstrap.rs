//! Startup: config validation, introspection, eager shape synthesis, registry population and
//! route-table construction. Any error aborts startup and nothing is served.

use crate::config::{validate, CatalogConfig};
use crate::documents::{DocumentStore, MemoryDocumentStore};
use crate::error::ConfigError;
use crate::i18n::Localizer;
use crate::model::EntityGraph;
use crate::registry::Registry;
use crate::repository::RepositoryFactory;
use crate::routing::{RouteSynthesizer, RouteTable};
use crate::schema::{ClassifyOptions, SchemaSynthesizer, ShapeSet};
use crate::service::{CatalogContext, CatalogService};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

/// Everything request handling needs, fully built.
pub struct Catalog {
    pub config: Arc<CatalogConfig>,
    pub localizer: Arc<Localizer>,
    pub synthesizer: Arc<SchemaSynthesizer>,
    pub registry: Arc<Registry>,
    pub routes: Arc<RouteTable>,
    pub context: Arc<CatalogContext>,
}

/// Bootstrap with an in-memory document store.
pub fn bootstrap(config: CatalogConfig, factory: &dyn RepositoryFactory) -> Result<Catalog, ConfigError> {
    bootstrap_with_documents(config, factory, Arc::new(MemoryDocumentStore::new()))
}

pub fn bootstrap_with_documents(
    config: CatalogConfig,
    factory: &dyn RepositoryFactory,
    documents: Arc<dyn DocumentStore>,
) -> Result<Catalog, ConfigError> {
    validate(&config)?;
    let localizer = Arc::new(Localizer::from_settings(&config.settings.languages));
    let graph = Arc::new(EntityGraph::build(&config.entities, &localizer)?);

    let max_depth = config.settings.synthesis.max_depth;
    let synthesizer = Arc::new(SchemaSynthesizer::new(
        graph.clone(),
        ClassifyOptions::from_settings(&config.settings.synthesis),
    ));
    let shapes = synthesizer.synthesize_all(max_depth)?;

    let repositories: HashMap<_, _> = graph.iter().map(|e| (e.name.clone(), factory.create(e))).collect();
    let mut sensitive: HashMap<String, HashSet<String>> = HashMap::new();
    for res in &config.resources {
        sensitive
            .entry(res.entity.clone())
            .or_default()
            .extend(res.sensitive_columns.iter().cloned());
    }
    let context = Arc::new(CatalogContext {
        graph: graph.clone(),
        localizer: localizer.clone(),
        repositories,
        documents,
        pagination: config.settings.pagination.clone(),
        sensitive,
    });

    let registry = Arc::new(Registry::new());
    let mut bindings = BTreeMap::new();
    for res in &config.resources {
        let set = Arc::new(ShapeSet::synthesize(&synthesizer, &res.entity, max_depth)?);
        let repository = context
            .repositories
            .get(&res.entity)
            .cloned()
            .ok_or_else(|| ConfigError::MissingReference {
                kind: "repository",
                id: res.entity.clone(),
            })?;
        registry.register_schema(&res.key, set.clone())?;
        registry.register_repository(&res.key, repository)?;
        registry.register_service(&res.key, Arc::new(CatalogService::new(res, set, context.clone())?))?;
        bindings.insert(res.key.clone(), res.entity.clone());
    }

    let languages = localizer.languages().to_vec();
    let route_synth = RouteSynthesizer::new(&synthesizer, max_depth);
    let mut entries = route_synth.build_routes(&bindings, &languages, 2)?;
    entries.extend(route_synth.build_routes(&bindings, &languages, 3)?);
    entries.extend(route_synth.build_mutation_routes(&bindings)?);
    let routes = Arc::new(RouteTable::new(entries)?);

    tracing::info!(
        entities = graph.len(),
        resources = bindings.len(),
        shapes,
        routes = routes.len(),
        languages = ?languages,
        max_depth,
        "catalog ready"
    );

    Ok(Catalog {
        config: Arc::new(config),
        localizer,
        synthesizer,
        registry,
        routes,
        context,
    })
}
