//! OpenAPI 3.1 document derived from the route table and the shapes it binds.

use crate::config::ScalarType;
use crate::routing::{RouteAction, RouteEntry, RouteTable};
use crate::schema::{FieldType, GeneratedShape};
use std::collections::BTreeMap;
use std::sync::Arc;
use utoipa::openapi::path::{HttpMethod, OperationBuilder, ParameterBuilder, ParameterIn};
use utoipa::openapi::request_body::RequestBodyBuilder;
use utoipa::openapi::response::ResponseBuilder;
use utoipa::openapi::schema::{ArrayBuilder, KnownFormat, ObjectBuilder, Schema, SchemaFormat, SchemaType, Type};
use utoipa::openapi::{ComponentsBuilder, ContentBuilder, InfoBuilder, OpenApi, OpenApiBuilder, Paths, Ref, RefOr, Required};

const ERROR_SCHEMA: &str = "Error";

fn scalar_schema(scalar: ScalarType) -> Schema {
    let (ty, format) = match scalar {
        ScalarType::Integer => (Type::Integer, Some(KnownFormat::Int32)),
        ScalarType::BigInteger => (Type::Integer, Some(KnownFormat::Int64)),
        ScalarType::Float => (Type::Number, Some(KnownFormat::Double)),
        ScalarType::Decimal => (Type::Number, None),
        ScalarType::Boolean => (Type::Boolean, None),
        ScalarType::String | ScalarType::Text | ScalarType::Document => (Type::String, None),
        ScalarType::Date => (Type::String, Some(KnownFormat::Date)),
        ScalarType::DateTime => (Type::String, Some(KnownFormat::DateTime)),
        ScalarType::Uuid => (Type::String, Some(KnownFormat::Uuid)),
        ScalarType::Json => return Schema::Object(ObjectBuilder::new().schema_type(SchemaType::AnyValue).build()),
    };
    Schema::Object(
        ObjectBuilder::new()
            .schema_type(ty)
            .format(format.map(SchemaFormat::KnownFormat))
            .build(),
    )
}

fn field_schema(ty: &FieldType) -> RefOr<Schema> {
    match ty {
        FieldType::Scalar(s) => RefOr::T(scalar_schema(*s)),
        FieldType::Shape(shape) => RefOr::Ref(Ref::from_schema_name(shape.name.clone())),
        FieldType::List(inner) => RefOr::T(Schema::Array(ArrayBuilder::new().items(field_schema(inner)).build())),
    }
}

/// Object schema for one shape; nested shapes are `$ref`s to their own components.
pub fn shape_schema(shape: &GeneratedShape) -> Schema {
    let mut obj = ObjectBuilder::new()
        .schema_type(Type::Object)
        .title(Some(shape.name.clone()));
    for field in &shape.fields {
        obj = obj.property(field.name.clone(), field_schema(&field.ty));
        if !field.optional {
            obj = obj.required(field.name.clone());
        }
    }
    Schema::Object(obj.build())
}

fn collect_shapes(shape: &Arc<GeneratedShape>, out: &mut BTreeMap<String, Arc<GeneratedShape>>) {
    if out.contains_key(&shape.name) {
        return;
    }
    out.insert(shape.name.clone(), shape.clone());
    for field in &shape.fields {
        let mut ty = &field.ty;
        while let FieldType::List(inner) = ty {
            ty = inner;
        }
        if let FieldType::Shape(nested) = ty {
            collect_shapes(nested, out);
        }
    }
}

fn error_schema() -> Schema {
    let string = || RefOr::T(Schema::Object(ObjectBuilder::new().schema_type(Type::String).build()));
    let detail = ObjectBuilder::new()
        .schema_type(Type::Object)
        .property("code", string())
        .required("code")
        .property("message", string())
        .required("message")
        .property("details", RefOr::T(Schema::Array(ArrayBuilder::new().build())));
    Schema::Object(
        ObjectBuilder::new()
            .schema_type(Type::Object)
            .property("error", RefOr::T(Schema::Object(detail.build())))
            .required("error")
            .build(),
    )
}

fn json_content(schema_name: &str) -> utoipa::openapi::Content {
    ContentBuilder::new()
        .schema(Some(Ref::from_schema_name(schema_name)))
        .build()
}

fn error_response(description: &str) -> utoipa::openapi::Response {
    ResponseBuilder::new()
        .description(description)
        .content("application/json", json_content(ERROR_SCHEMA))
        .build()
}

fn id_parameter(entry: &RouteEntry) -> ParameterBuilder {
    let pk = entry
        .shape
        .field("id")
        .map(|f| field_schema(&f.ty))
        .unwrap_or_else(|| RefOr::T(scalar_schema(ScalarType::String)));
    ParameterBuilder::new()
        .name("id")
        .parameter_in(ParameterIn::Path)
        .required(Required::True)
        .schema(Some(pk))
}

fn query_parameter(name: &str, description: &str) -> ParameterBuilder {
    ParameterBuilder::new()
        .name(name)
        .parameter_in(ParameterIn::Query)
        .required(Required::False)
        .description(Some(description))
        .schema(Some(RefOr::T(scalar_schema(ScalarType::Integer))))
}

fn operation(entry: &RouteEntry, read_shapes: &BTreeMap<String, String>) -> OperationBuilder {
    let key = &entry.resource_key;
    let mut op = OperationBuilder::new().tag(key.clone());
    let response_shape = match entry.action {
        RouteAction::Create | RouteAction::Update => read_shapes
            .get(key)
            .cloned()
            .unwrap_or_else(|| entry.shape.name.clone()),
        _ => entry.shape.name.clone(),
    };
    let (operation_id, summary, status) = match (&entry.action, &entry.language) {
        (RouteAction::List, Some(lang)) => (format!("list_{}_{}", key, lang), format!("List {} ({})", key, lang), "200"),
        (RouteAction::Read, Some(lang)) => (format!("read_{}_{}", key, lang), format!("Read one of {} ({})", key, lang), "200"),
        (RouteAction::Create, _) => (format!("create_{}", key), format!("Create one of {}", key), "201"),
        (RouteAction::Update, _) => (format!("update_{}", key), format!("Update one of {}", key), "200"),
        (RouteAction::Delete, _) => (format!("delete_{}", key), format!("Delete one of {}", key), "200"),
        (action, None) => (format!("{}_{}", action.operation(), key), format!("{} {}", action.operation(), key), "200"),
    };
    op = op.operation_id(Some(operation_id)).summary(Some(summary));

    match entry.action {
        RouteAction::List => {
            op = op
                .parameter(query_parameter("page", "1-based page number"))
                .parameter(query_parameter("page_size", "items per page"));
        }
        RouteAction::Read | RouteAction::Update | RouteAction::Delete => {
            op = op.parameter(id_parameter(entry));
        }
        RouteAction::Create => {}
    }
    if matches!(entry.action, RouteAction::Create | RouteAction::Update) {
        op = op.request_body(Some(
            RequestBodyBuilder::new()
                .content("application/json", json_content(&entry.shape.name))
                .required(Some(Required::True))
                .build(),
        ));
        op = op.response("422", error_response("Body does not match the shape"));
    }
    op.response(
        status,
        ResponseBuilder::new()
            .description(format!("{} response", response_shape))
            .content("application/json", json_content(&response_shape))
            .build(),
    )
    .response("404", error_response("Unknown resource, language or record"))
}

fn method(action: RouteAction) -> HttpMethod {
    match action {
        RouteAction::List | RouteAction::Read => HttpMethod::Get,
        RouteAction::Create => HttpMethod::Post,
        RouteAction::Update => HttpMethod::Patch,
        RouteAction::Delete => HttpMethod::Delete,
    }
}

/// One path item per route entry, one component per distinct shape.
pub fn build_openapi(routes: &RouteTable) -> OpenApi {
    let mut shapes = BTreeMap::new();
    let mut read_shapes = BTreeMap::new();
    for entry in routes.entries() {
        collect_shapes(&entry.shape, &mut shapes);
        if entry.action == RouteAction::Read {
            read_shapes.insert(entry.resource_key.clone(), entry.shape.name.clone());
        }
    }

    let mut paths = Paths::new();
    for entry in routes.entries() {
        paths.add_path_operation(&entry.path, vec![method(entry.action)], operation(entry, &read_shapes).build());
    }

    let mut components = ComponentsBuilder::new().schema(ERROR_SCHEMA, error_schema());
    for (name, shape) in &shapes {
        components = components.schema(name.clone(), shape_schema(shape));
    }

    OpenApiBuilder::new()
        .info(
            InfoBuilder::new()
                .title(env!("CARGO_PKG_NAME"))
                .version(env!("CARGO_PKG_VERSION"))
                .description(Some(env!("CARGO_PKG_DESCRIPTION")))
                .build(),
        )
        .paths(paths)
        .components(Some(components.build()))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::bootstrap;
    use crate::fixtures;
    use crate::repository::MemoryRepositoryFactory;
    use serde_json::Value;

    fn document() -> Value {
        let catalog = bootstrap(fixtures::wine_catalog(), &MemoryRepositoryFactory).unwrap();
        serde_json::to_value(build_openapi(&catalog.routes)).unwrap()
    }

    #[test]
    fn shapes_become_components_with_refs() {
        let doc = document();
        let schemas = &doc["components"]["schemas"];
        let drink = &schemas["DrinkRead1"];
        assert_eq!(drink["properties"]["category"]["$ref"], "#/components/schemas/CategoryRead0");
        assert_eq!(drink["properties"]["created_at"]["format"], "date-time");
        let required: Vec<&str> = drink["required"].as_array().unwrap().iter().filter_map(Value::as_str).collect();
        assert!(required.contains(&"price"));
        assert!(!required.contains(&"vintage"));
        assert!(schemas["CategoryRead0"].is_object());
        assert_eq!(schemas["DrinkList1"]["properties"]["items"]["items"]["$ref"], "#/components/schemas/DrinkRead1");
        assert!(schemas["Error"].is_object());
    }

    #[test]
    fn every_route_is_documented() {
        let doc = document();
        let paths = doc["paths"].as_object().unwrap();
        assert!(paths["/drinks/ru"]["get"].is_object());
        assert!(paths["/drinks/ru/{id}"]["get"].is_object());
        assert!(paths["/drinks"]["post"]["requestBody"].is_object());
        let item = &paths["/drinks/{id}"];
        assert!(item["patch"].is_object());
        assert!(item["delete"].is_object());
        assert_eq!(item["patch"]["operationId"], "update_drinks");
        assert_eq!(
            paths["/drinks"]["post"]["responses"]["201"]["content"]["application/json"]["schema"]["$ref"],
            "#/components/schemas/DrinkRead1"
        );
    }
}
