use actix_web::http::header;
use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use futures::future::{err, ok, Ready};
use serde::Deserialize;

use crate::api_error::ApiError;
use crate::models::User;
use crate::settings::Settings;
use crate::store::Store;

pub const REALM: &str = "codespeed";

/// Caller allowed to write through `/api/v1/`: an API-key user, or nobody
/// when anonymous posts are enabled.
pub struct ApiWriter(pub Option<User>);

/// Caller allowed to use the legacy `/result/add/` endpoints: a user with
/// valid basic credentials, or nobody when anonymous posts are enabled.
pub struct BasicWriter(pub Option<User>);

#[derive(Deserialize)]
struct ApiKeyParams {
    username: Option<String>,
    api_key: Option<String>,
}

fn app_state(req: &HttpRequest) -> Result<(&dyn Store, &Settings), ApiError> {
    let store = req
        .app_data::<web::Data<dyn Store>>()
        .ok_or_else(|| ApiError::new(500, "Store not configured".to_string()))?;
    let settings = req
        .app_data::<web::Data<Settings>>()
        .ok_or_else(|| ApiError::new(500, "Settings not configured".to_string()))?;
    Ok((&***store, &***settings))
}

fn authorization(req: &HttpRequest, scheme: &str) -> Option<String> {
    let value = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let (given, rest) = value.trim().split_once(' ')?;
    if given.eq_ignore_ascii_case(scheme) {
        Some(rest.trim().to_string())
    } else {
        None
    }
}

/// `Authorization: ApiKey <username>:<key>`, falling back to the `username`
/// and `api_key` query parameters.
fn api_key_credentials(req: &HttpRequest) -> Option<(String, String)> {
    if let Some(value) = authorization(req, "ApiKey") {
        let (username, key) = value.split_once(':')?;
        return Some((username.to_string(), key.to_string()));
    }
    let params = web::Query::<ApiKeyParams>::from_query(req.query_string()).ok()?;
    let params = params.into_inner();
    Some((params.username?, params.api_key?))
}

fn basic_credentials(req: &HttpRequest) -> Option<(String, String)> {
    let encoded = authorization(req, "Basic")?;
    let decoded = base64::decode(encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

pub fn authenticate_api_key(store: &dyn Store, req: &HttpRequest) -> Result<User, ApiError> {
    let unauthorized = || ApiError::new(401, "Invalid or missing API key".to_string());

    let (username, key) = api_key_credentials(req).ok_or_else(unauthorized)?;
    let user = store.user_by_username(&username)?.ok_or_else(unauthorized)?;
    if !user.verify_api_key(&key) {
        warn!("Rejected API key for user {}", username);
        return Err(unauthorized());
    }
    Ok(user)
}

pub fn authenticate_basic(store: &dyn Store, req: &HttpRequest) -> Result<User, ApiError> {
    let challenge = || ApiError::basic_challenge(REALM);

    let (username, password) = basic_credentials(req).ok_or_else(challenge)?;
    let user = store.user_by_username(&username)?.ok_or_else(challenge)?;
    if !user.verify_password(password.as_bytes())? {
        warn!("Rejected password for user {}", username);
        return Err(challenge());
    }
    Ok(user)
}

impl FromRequest for ApiWriter {
    type Error = ApiError;
    type Future = Ready<Result<ApiWriter, ApiError>>;

    fn from_request(req: &HttpRequest, _pl: &mut Payload) -> Self::Future {
        let (store, settings) = match app_state(req) {
            Ok(state) => state,
            Err(e) => return err(e),
        };
        match authenticate_api_key(store, req) {
            Ok(user) => ok(ApiWriter(Some(user))),
            Err(e) if e.status_code == 401 && settings.allow_anonymous_post => {
                ok(ApiWriter(None))
            }
            Err(e) => err(e),
        }
    }
}

impl FromRequest for BasicWriter {
    type Error = ApiError;
    type Future = Ready<Result<BasicWriter, ApiError>>;

    fn from_request(req: &HttpRequest, _pl: &mut Payload) -> Self::Future {
        let (store, settings) = match app_state(req) {
            Ok(state) => state,
            Err(e) => return err(e),
        };
        if settings.allow_anonymous_post {
            return ok(BasicWriter(None));
        }
        match authenticate_basic(store, req) {
            Ok(user) => ok(BasicWriter(Some(user))),
            Err(e) => err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewUser;
    use crate::store::{MemoryStore, Table};
    use actix_web::test::TestRequest;
    use std::sync::Arc;

    fn store_with_user() -> (MemoryStore, User) {
        let store = MemoryStore::new();
        let user = Table::<User>::insert(
            &store,
            NewUser::register("apiuser", "api@foo.bar", "password").unwrap(),
        )
        .unwrap();
        (store, user)
    }

    #[test]
    fn is_not_authenticated() {
        let (store, _) = store_with_user();

        // No username/api_key details.
        let req = TestRequest::default().to_http_request();
        assert_eq!(authenticate_api_key(&store, &req).unwrap_err().status_code, 401);

        // Wrong username.
        let req = TestRequest::with_uri("/?username=foo").to_http_request();
        assert_eq!(authenticate_api_key(&store, &req).unwrap_err().status_code, 401);

        // No api_key.
        let req = TestRequest::with_uri("/?username=daniel").to_http_request();
        assert_eq!(authenticate_api_key(&store, &req).unwrap_err().status_code, 401);

        // Wrong user/api_key.
        let req = TestRequest::with_uri("/?username=daniel&api_key=foo").to_http_request();
        assert_eq!(authenticate_api_key(&store, &req).unwrap_err().status_code, 401);

        // Right user, wrong key.
        let req = TestRequest::with_uri("/?username=apiuser&api_key=foo").to_http_request();
        assert_eq!(authenticate_api_key(&store, &req).unwrap_err().status_code, 401);
    }

    #[test]
    fn is_authenticated_by_query() {
        let (store, user) = store_with_user();
        let uri = format!("/?username=apiuser&api_key={}", user.api_key);
        let req = TestRequest::with_uri(&uri).to_http_request();
        assert_eq!(authenticate_api_key(&store, &req).unwrap().id, user.id);
    }

    #[test]
    fn is_authenticated_by_header() {
        let (store, user) = store_with_user();
        let req = TestRequest::default()
            .insert_header((
                header::AUTHORIZATION,
                format!("ApiKey apiuser:{}", user.api_key),
            ))
            .to_http_request();
        assert_eq!(authenticate_api_key(&store, &req).unwrap().id, user.id);
    }

    fn writer_request(store: MemoryStore, uri: &str) -> HttpRequest {
        TestRequest::with_uri(uri)
            .app_data(web::Data::from(Arc::new(store) as Arc<dyn Store>))
            .app_data(web::Data::new(Settings::default()))
            .to_http_request()
    }

    #[test]
    fn anonymous_writer_when_key_is_rejected() {
        let (store, user) = store_with_user();

        let req = writer_request(store.clone(), "/?username=apiuser&api_key=foo");
        let writer = ApiWriter::from_request(&req, &mut Payload::None).into_inner();
        assert!(writer.unwrap().0.is_none());

        let uri = format!("/?username=apiuser&api_key={}", user.api_key);
        let req = writer_request(store, &uri);
        let writer = ApiWriter::from_request(&req, &mut Payload::None).into_inner();
        assert_eq!(writer.unwrap().0.unwrap().id, user.id);
    }

    #[test]
    fn store_failures_are_not_anonymous() {
        let (store, user) = store_with_user();
        store.poison();

        let uri = format!("/?username=apiuser&api_key={}", user.api_key);
        let req = writer_request(store, &uri);
        let writer = ApiWriter::from_request(&req, &mut Payload::None).into_inner();
        assert_eq!(writer.err().unwrap().status_code, 500);
    }

    #[test]
    fn basic_auth() {
        let (store, user) = store_with_user();

        let good = format!("Basic {}", base64::encode("apiuser:password"));
        let req = TestRequest::default()
            .insert_header((header::AUTHORIZATION, good))
            .to_http_request();
        assert_eq!(authenticate_basic(&store, &req).unwrap().id, user.id);

        let bad = format!("Basic {}", base64::encode("apiuser:secret"));
        let req = TestRequest::default()
            .insert_header((header::AUTHORIZATION, bad))
            .to_http_request();
        let e = authenticate_basic(&store, &req).unwrap_err();
        assert_eq!(e.status_code, 401);
        assert_eq!(e.challenge, Some(REALM));

        let req = TestRequest::default().to_http_request();
        assert_eq!(authenticate_basic(&store, &req).unwrap_err().status_code, 401);
    }
}
