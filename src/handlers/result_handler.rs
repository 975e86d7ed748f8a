use crate::api_error::ApiError;
use crate::handlers::{ApiWriter, BasicWriter};
use crate::models::{resource_uri, BenchmarkResult, Entity};
use crate::reports::create_report_if_enough_data;
use crate::results::{describe, save_result, ResultBundle, ResultData};
use crate::settings::Settings;
use crate::store::{Store, Table};
use actix_web::http::header;
use actix_web::{get, post, web, HttpResponse};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Deserialize)]
pub struct JsonForm {
    json: String,
}

fn regenerate_report(
    store: &dyn Store,
    settings: &Settings,
    revision_id: i32,
    executable_id: i32,
    environment_id: i32,
) {
    if let Err(e) =
        create_report_if_enough_data(store, settings, revision_id, executable_id, environment_id)
    {
        error!(
            "Failed to generate report for revision {}: {}",
            revision_id, e
        );
    }
}

#[post("/result/add/")]
async fn add_result(
    store: web::Data<dyn Store>,
    settings: web::Data<Settings>,
    form: web::Form<HashMap<String, String>>,
    _writer: BasicWriter,
) -> Result<HttpResponse, ApiError> {
    let data = form
        .into_inner()
        .into_iter()
        .map(|(k, v)| (k, Value::String(v)))
        .collect::<ResultData>();

    let saved = save_result(&**store, &data)?;
    regenerate_report(
        &**store,
        &settings,
        saved.revision.id,
        saved.executable.id,
        saved.environment.id,
    );

    Ok(HttpResponse::Accepted().body("Result data saved successfully"))
}

#[post("/result/add/json/")]
async fn add_json_results(
    store: web::Data<dyn Store>,
    settings: web::Data<Settings>,
    form: web::Form<JsonForm>,
    _writer: BasicWriter,
) -> Result<HttpResponse, ApiError> {
    let items: Vec<ResultData> = serde_json::from_str(&form.json)?;

    let mut touched = BTreeSet::new();
    for data in &items {
        // earlier items stay saved when a later one fails
        let saved = save_result(&**store, data)?;
        touched.insert((saved.revision.id, saved.executable.id, saved.environment.id));
    }
    info!("Saved {} results", items.len());

    for (revision_id, executable_id, environment_id) in touched {
        regenerate_report(&**store, &settings, revision_id, executable_id, environment_id);
    }

    Ok(HttpResponse::Accepted().body("All result data saved successfully"))
}

#[post("/api/v1/benchmark-result/")]
async fn create_bundle(
    store: web::Data<dyn Store>,
    settings: web::Data<Settings>,
    data: web::Json<ResultData>,
    _writer: ApiWriter,
) -> Result<HttpResponse, ApiError> {
    let bundle = ResultBundle::new(&**store, &data)?;
    let result = bundle.save(&**store)?;
    info!(
        "Saved {} for {} at {}",
        bundle.benchmark.name, bundle.executable.name, bundle.revision.commitid
    );

    regenerate_report(
        &**store,
        &settings,
        result.revision_id,
        result.executable_id,
        result.environment_id,
    );

    Ok(HttpResponse::Created()
        .insert_header((
            header::LOCATION,
            resource_uri(BenchmarkResult::RESOURCE, result.id()),
        ))
        .json(describe(&**store, &result)?))
}

#[get("/api/v1/benchmark-result/{id}/")]
async fn find_bundle(
    store: web::Data<dyn Store>,
    id: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let result = Table::<BenchmarkResult>::load(&**store, id.into_inner())?
        .ok_or_else(ApiError::gone)?;

    Ok(HttpResponse::Ok().json(describe(&**store, &result)?))
}

pub fn result_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(add_result);
    cfg.service(add_json_results);
    cfg.service(create_bundle);
    cfg.service(find_bundle);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::init_routes;
    use crate::models::{Environment, NewEnvironment, Report, NewUser, User};
    use crate::store::{Lookups, MemoryStore};
    use crate::test_util::{app_data, fixture};
    use actix_web::{test, App};
    use serde_json::json;

    fn sample() -> Value {
        json!([
            {
                "commitid": "8",
                "project": "MyProject",
                "branch": "default",
                "executable": "myexe O3 64bits",
                "benchmark": "float",
                "environment": "Dual Core",
                "result_value": 2500.0,
                "revision_date": "2011-04-05 10:00:00",
            },
            {
                "commitid": "8",
                "project": "MyProject",
                "branch": "default",
                "executable": "myexe O3 64bits",
                "benchmark": "int",
                "environment": "Dual Core",
                "result_value": 1100,
                "revision_date": "2011-04-05 10:00:00",
            }
        ])
    }

    #[actix_rt::test]
    async fn add_single_result() {
        let store = fixture();
        let (store_data, settings) = app_data(store.clone(), Settings::default());
        let app = test::init_service(
            App::new()
                .app_data(store_data)
                .app_data(settings)
                .configure(init_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/result/add/")
            .set_form(&[
                ("commitid", "9"),
                ("branch", "default"),
                ("project", "MyProject"),
                ("executable", "myexe O3 64bits"),
                ("benchmark", "float"),
                ("environment", "Dual Core"),
                ("result_value", "4100"),
            ])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 202);
        let body = test::read_body(resp).await;
        assert_eq!(body, "Result data saved successfully");

        let branch = store.branch_by_name(1, "default").unwrap().unwrap();
        assert!(store.revision_by_commitid(branch.id, "9").unwrap().is_some());
    }

    #[actix_rt::test]
    async fn add_single_result_with_missing_key() {
        let (store, settings) = app_data(fixture(), Settings::default());
        let app = test::init_service(
            App::new()
                .app_data(store)
                .app_data(settings)
                .configure(init_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/result/add/")
            .set_form(&[("commitid", "9"), ("branch", "default")])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
    }

    #[actix_rt::test]
    async fn add_json_results_and_report() {
        let store = fixture();
        let (store_data, settings) = app_data(store.clone(), Settings::default());
        let app = test::init_service(
            App::new()
                .app_data(store_data)
                .app_data(settings)
                .configure(init_routes),
        )
        .await;

        let payload = sample().to_string();
        let req = test::TestRequest::post()
            .uri("/result/add/json/")
            .set_form(&[("json", payload.as_str())])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 202);
        let body = test::read_body(resp).await;
        assert_eq!(body, "All result data saved successfully");

        let branch = store.branch_by_name(1, "default").unwrap().unwrap();
        let revision = store.revision_by_commitid(branch.id, "8").unwrap().unwrap();
        let report = store.report_by_key(revision.id, 1, 1).unwrap().unwrap();
        assert_eq!(report.colorcode, "green");
        assert_eq!(Table::<Report>::count(&store).unwrap(), 1);
    }

    #[actix_rt::test]
    async fn add_json_results_keeps_earlier_items() {
        let store = fixture();
        let (store_data, settings) = app_data(store.clone(), Settings::default());
        let app = test::init_service(
            App::new()
                .app_data(store_data)
                .app_data(settings)
                .configure(init_routes),
        )
        .await;

        let mut items = sample();
        items[1]["environment"] = json!("Foo the Bar");
        let payload = items.to_string();
        let req = test::TestRequest::post()
            .uri("/result/add/json/")
            .set_form(&[("json", payload.as_str())])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);

        let branch = store.branch_by_name(1, "default").unwrap().unwrap();
        assert!(store.revision_by_commitid(branch.id, "8").unwrap().is_some());
    }

    #[actix_rt::test]
    async fn add_large_json_batch() {
        let store = fixture();
        let (store_data, settings) = app_data(store.clone(), Settings::default());
        let app = test::init_service(
            App::new()
                .app_data(store_data)
                .app_data(settings)
                .configure(init_routes),
        )
        .await;

        let items = (0..150)
            .map(|i| {
                let mut item = sample()[0].clone();
                item["benchmark"] = json!(format!("bench{}", i));
                item
            })
            .collect::<Vec<_>>();
        let payload = Value::Array(items).to_string();
        assert!(payload.len() > 16 * 1024);

        let req = test::TestRequest::post()
            .uri("/result/add/json/")
            .set_form(&[("json", payload.as_str())])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 202);

        let branch = store.branch_by_name(1, "default").unwrap().unwrap();
        let revision = store.revision_by_commitid(branch.id, "8").unwrap().unwrap();
        let saved = store.results_for_revisions(&[revision.id], 1, 1).unwrap();
        assert_eq!(saved.len(), 150);
    }

    #[actix_rt::test]
    async fn oversized_form_keeps_json_errors() {
        let (store, settings) = app_data(fixture(), Settings::default());
        let app = test::init_service(
            App::new()
                .app_data(store)
                .app_data(settings)
                .configure(init_routes),
        )
        .await;

        let payload = "x".repeat(crate::handlers::FORM_LIMIT + 1);
        let req = test::TestRequest::post()
            .uri("/result/add/json/")
            .set_form(&[("json", payload.as_str())])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 413);
        let body: Value = test::read_body_json(resp).await;
        assert!(body["message"].as_str().unwrap().contains("larger"));
    }

    #[actix_rt::test]
    async fn legacy_endpoints_require_basic_auth() {
        let store = fixture();
        let user = Table::<User>::insert(
            &store,
            NewUser::register("apiuser", "api@foo.bar", "password").unwrap(),
        )
        .unwrap();
        assert_eq!(user.username, "apiuser");

        let settings = Settings {
            allow_anonymous_post: false,
            ..Settings::default()
        };
        let (store_data, settings) = app_data(store, settings);
        let app = test::init_service(
            App::new()
                .app_data(store_data)
                .app_data(settings)
                .configure(init_routes),
        )
        .await;

        let payload = sample().to_string();
        let req = test::TestRequest::post()
            .uri("/result/add/json/")
            .set_form(&[("json", payload.as_str())])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 401);
        assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));

        let req = test::TestRequest::post()
            .uri("/result/add/json/")
            .insert_header((
                header::AUTHORIZATION,
                format!("Basic {}", base64::encode("apiuser:password")),
            ))
            .set_form(&[("json", payload.as_str())])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 202);
    }

    #[actix_rt::test]
    async fn post_and_get_bundle() {
        let store = fixture();
        Table::<Environment>::insert(&store, NewEnvironment::named("Bulldozer")).unwrap();
        let (store_data, settings) = app_data(store, Settings::default());
        let app = test::init_service(
            App::new()
                .app_data(store_data)
                .app_data(settings)
                .configure(init_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/benchmark-result/")
            .set_json(&json!({
                "commitid": "2",
                "branch": "default",
                "project": "MyProject",
                "executable": "myexe O3 64bits",
                "benchmark": "float",
                "environment": "Bulldozer",
                "result_value": 4000,
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 201);
        let location = resp
            .headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        let created: Value = test::read_body_json(resp).await;
        assert_eq!(created["environment"], "Bulldozer");
        assert_eq!(location, created["resource_uri"]);

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/benchmark-result/{}/", created["id"]))
            .to_request();
        let fetched: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(fetched["commitid"], "2");

        // same key again
        let req = test::TestRequest::post()
            .uri("/api/v1/benchmark-result/")
            .set_json(&json!({
                "commitid": "2",
                "branch": "default",
                "project": "MyProject",
                "executable": "myexe O3 64bits",
                "benchmark": "float",
                "environment": "Bulldozer",
                "result_value": 4000,
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 409);
    }

    #[actix_rt::test]
    async fn bundle_with_unknown_environment() {
        let (store, settings) = app_data(MemoryStore::new(), Settings::default());
        let app = test::init_service(
            App::new()
                .app_data(store)
                .app_data(settings)
                .configure(init_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/benchmark-result/")
            .set_json(&json!({
                "commitid": "2",
                "branch": "default",
                "project": "MyProject",
                "executable": "myexe O3 64bits",
                "benchmark": "float",
                "environment": "Foo the Bar",
                "result_value": 4000,
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
    }
}
