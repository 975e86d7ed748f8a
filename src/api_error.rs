use actix_web::http::{header, StatusCode};
use actix_web::{HttpResponse, ResponseError};
use derive_more::Display;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use serde_json::json;

#[derive(Debug, Display)]
#[display(fmt = "{}", message)]
pub struct ApiError {
    pub status_code: u16,
    pub message: String,
    pub challenge: Option<&'static str>,
}

impl ApiError {
    pub fn new(status_code: u16, message: String) -> ApiError {
        ApiError {
            status_code,
            message,
            challenge: None,
        }
    }

    pub fn bad_request<S: Into<String>>(message: S) -> ApiError {
        ApiError::new(400, message.into())
    }

    pub fn gone() -> ApiError {
        ApiError::new(410, "Resource gone".to_string())
    }

    /// 401 asking the client to retry with HTTP basic credentials.
    pub fn basic_challenge(realm: &'static str) -> ApiError {
        ApiError {
            status_code: 401,
            message: "Authentication required".to_string(),
            challenge: Some(realm),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<DieselError> for ApiError {
    fn from(error: DieselError) -> ApiError {
        match error {
            DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, err) => {
                ApiError::new(400, err.message().to_string())
            }
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, err) => {
                ApiError::new(409, err.message().to_string())
            }
            DieselError::DatabaseError(_, err) => {
                ApiError::new(500, format!("Database error: {}", err.message()))
            }
            DieselError::NotFound => ApiError::new(404, "Record not found".to_string()),
            err => ApiError::new(500, format!("Diesel error: {}", err)),
        }
    }
}

impl From<r2d2::Error> for ApiError {
    fn from(error: r2d2::Error) -> ApiError {
        ApiError::new(500, format!("Failed getting db connection: {}", error))
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(error: serde_json::Error) -> ApiError {
        ApiError::new(400, format!("Invalid JSON: {}", error))
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();

        let message = match status_code.as_u16() < 500 {
            true => self.message.clone(),
            false => {
                error!("{}", self.message);
                "Internal server error".to_string()
            }
        };

        let mut response = HttpResponse::build(status_code);
        if let Some(realm) = self.challenge {
            response.insert_header((
                header::WWW_AUTHENTICATE,
                format!("Basic realm=\"{}\"", realm),
            ));
        }
        response.json(json!({ "message": message }))
    }
}
