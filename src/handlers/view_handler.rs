use crate::api_error::ApiError;
use crate::reports::changes_table;
use crate::settings::Settings;
use crate::store::Store;
use crate::timeline::{timelines, TimelineQuery};
use actix_web::{get, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct ChangesParams {
    rev: i32,
    exe: i32,
    env: i32,
}

#[derive(Debug, Deserialize)]
pub struct TimelineParams {
    exe: String,
    env: i32,
    ben: Option<String>,
    revs: Option<i64>,
    branch: Option<String>,
}

#[get("/changes/json/")]
async fn changes(
    store: web::Data<dyn Store>,
    settings: web::Data<Settings>,
    params: web::Query<ChangesParams>,
) -> Result<HttpResponse, ApiError> {
    let table = changes_table(&**store, &settings, params.rev, params.exe, params.env)?;

    Ok(HttpResponse::Ok().json(table))
}

#[get("/timeline/json/")]
async fn timeline(
    store: web::Data<dyn Store>,
    settings: web::Data<Settings>,
    params: web::Query<TimelineParams>,
) -> Result<HttpResponse, ApiError> {
    let params = params.into_inner();
    let revisions = params.revs.unwrap_or(settings.timeline_revisions);
    if revisions <= 0 {
        return Err(ApiError::bad_request("revs must be positive"));
    }

    let query = TimelineQuery {
        executables: TimelineQuery::parse_ids(&params.exe)?,
        environment: params.env,
        benchmark: params.ben.filter(|b| !b.is_empty()),
        revisions,
        branch: params.branch.unwrap_or_else(|| settings.def_branch.clone()),
    };
    let timelines = timelines(&**store, &query)?;

    Ok(HttpResponse::Ok().json(json!({ "timelines": timelines })))
}

pub fn view_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(changes);
    cfg.service(timeline);
}
