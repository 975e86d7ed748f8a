use crate::api_error::ApiError;
use crate::handlers::ApiWriter;
use crate::models::{dehydrate, resource_uri, ApiResource, API_ROOT};
use crate::settings::Settings;
use crate::store::{check_explicit_id, Store, Table};
use actix_web::http::header;
use actix_web::{get, web, HttpResponse};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
pub struct PageParams {
    limit: Option<i64>,
    offset: Option<i64>,
}

/// Resources registered through [`resource_routes`].
pub const RESOURCES: [&str; 8] = [
    "project",
    "environment",
    "branch",
    "revision",
    "executable",
    "benchmark",
    "result",
    "report",
];

fn page_uri(resource: &str, limit: i64, offset: i64) -> String {
    format!("{}{}/?limit={}&offset={}", API_ROOT, resource, limit, offset)
}

async fn find_all<R>(
    store: web::Data<dyn Store>,
    settings: web::Data<Settings>,
    page: web::Query<PageParams>,
) -> Result<HttpResponse, ApiError>
where
    R: ApiResource,
    dyn Store: Table<R>,
{
    let limit = page.limit.unwrap_or(settings.api_limit_per_page);
    let offset = page.offset.unwrap_or(0);
    if limit < 0 || offset < 0 {
        return Err(ApiError::bad_request("limit and offset may not be negative"));
    }

    let total_count = <dyn Store as Table<R>>::count(&**store)?;
    // limit=0 asks for everything
    let rows = <dyn Store as Table<R>>::select(&**store, Some(limit).filter(|l| *l > 0), offset)?;
    let objects = rows.iter().map(dehydrate).collect::<Result<Vec<_>, _>>()?;

    let next = match limit > 0 && offset + limit < total_count {
        true => Value::String(page_uri(R::RESOURCE, limit, offset + limit)),
        false => Value::Null,
    };
    let previous = match limit > 0 && offset > 0 {
        true => Value::String(page_uri(R::RESOURCE, limit, (offset - limit).max(0))),
        false => Value::Null,
    };

    Ok(HttpResponse::Ok().json(json!({
        "meta": {
            "limit": limit,
            "offset": offset,
            "total_count": total_count,
            "next": next,
            "previous": previous,
        },
        "objects": objects,
    })))
}

async fn find<R>(
    store: web::Data<dyn Store>,
    id: web::Path<i32>,
) -> Result<HttpResponse, ApiError>
where
    R: ApiResource,
    dyn Store: Table<R>,
{
    let row = <dyn Store as Table<R>>::load(&**store, id.into_inner())?
        .ok_or_else(ApiError::gone)?;

    Ok(HttpResponse::Ok().json(dehydrate(&row)?))
}

async fn create<R>(
    store: web::Data<dyn Store>,
    input: web::Json<R::Input>,
    _writer: ApiWriter,
) -> Result<HttpResponse, ApiError>
where
    R: ApiResource,
    dyn Store: Table<R>,
{
    let new = R::hydrate(&**store, input.into_inner())?;
    let row = <dyn Store as Table<R>>::insert(&**store, new)?;
    info!("Created {} {}", R::RESOURCE, row.id());

    Ok(HttpResponse::Created()
        .insert_header((header::LOCATION, resource_uri(R::RESOURCE, row.id())))
        .json(dehydrate(&row)?))
}

async fn update<R>(
    store: web::Data<dyn Store>,
    id: web::Path<i32>,
    input: web::Json<R::Input>,
    _writer: ApiWriter,
) -> Result<HttpResponse, ApiError>
where
    R: ApiResource,
    dyn Store: Table<R>,
{
    let id = id.into_inner();
    check_explicit_id(id)?;
    let new = R::hydrate(&**store, input.into_inner())?;
    R::check_id(id, &new)?;

    match <dyn Store as Table<R>>::update(&**store, id, new.clone())? {
        Some(_) => {
            info!("Updated {} {}", R::RESOURCE, id);
            Ok(HttpResponse::NoContent().finish())
        }
        None => {
            let row = <dyn Store as Table<R>>::insert_with_id(&**store, id, new)?;
            info!("Created {} {} by PUT", R::RESOURCE, id);
            Ok(HttpResponse::Created()
                .insert_header((header::LOCATION, resource_uri(R::RESOURCE, row.id())))
                .json(dehydrate(&row)?))
        }
    }
}

async fn delete<R>(
    store: web::Data<dyn Store>,
    id: web::Path<i32>,
    _writer: ApiWriter,
) -> Result<HttpResponse, ApiError>
where
    R: ApiResource,
    dyn Store: Table<R>,
{
    let id = id.into_inner();
    if !<dyn Store as Table<R>>::delete(&**store, id)? {
        return Err(ApiError::gone());
    }
    info!("Deleted {} {}", R::RESOURCE, id);

    Ok(HttpResponse::NoContent().finish())
}

/// Registers list and detail endpoints for one resource. Read-only
/// resources only get `GET`; other methods answer 405.
pub fn resource_routes<R>(cfg: &mut web::ServiceConfig)
where
    R: ApiResource,
    dyn Store: Table<R>,
{
    let list_path = format!("{}{}/", API_ROOT, R::RESOURCE);
    let detail_path = format!("{}{}/{{id}}/", API_ROOT, R::RESOURCE);

    if R::READ_ONLY {
        cfg.service(web::resource(list_path).route(web::get().to(find_all::<R>)));
        cfg.service(web::resource(detail_path).route(web::get().to(find::<R>)));
        return;
    }

    cfg.service(
        web::resource(list_path)
            .route(web::get().to(find_all::<R>))
            .route(web::post().to(create::<R>)),
    );
    cfg.service(
        web::resource(detail_path)
            .route(web::get().to(find::<R>))
            .route(web::put().to(update::<R>))
            .route(web::delete().to(delete::<R>)),
    );
}

#[get("/api/v1/")]
async fn api_index() -> HttpResponse {
    let mut index = serde_json::Map::new();
    for resource in RESOURCES.iter().chain(std::iter::once(&"benchmark-result")) {
        index.insert(
            resource.to_string(),
            json!({ "list_endpoint": format!("{}{}/", API_ROOT, resource) }),
        );
    }
    HttpResponse::Ok().json(index)
}

pub fn index_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(api_index);
}
