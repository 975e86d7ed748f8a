mod auth_handler;
mod resource_handler;
mod result_handler;
mod view_handler;

pub use auth_handler::*;
pub use resource_handler::*;
pub use result_handler::*;
pub use view_handler::*;

use crate::api_error::ApiError;
use crate::models::*;
use actix_web::{web, ResponseError};

/// Largest urlencoded body accepted; result batches easily exceed actix's 16 KiB default.
pub const FORM_LIMIT: usize = 8 * 1024 * 1024;

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| ApiError::bad_request(err.to_string()).into()),
    );
    cfg.app_data(
        web::FormConfig::default()
            .limit(FORM_LIMIT)
            .error_handler(|err, _req| {
                let status = err.status_code().as_u16();
                ApiError::new(status, err.to_string()).into()
            }),
    );

    index_routes(cfg);
    result_routes(cfg);
    view_routes(cfg);

    resource_routes::<Project>(cfg);
    resource_routes::<Environment>(cfg);
    resource_routes::<Branch>(cfg);
    resource_routes::<Revision>(cfg);
    resource_routes::<Executable>(cfg);
    resource_routes::<Benchmark>(cfg);
    resource_routes::<BenchmarkResult>(cfg);
    resource_routes::<Report>(cfg);
}
