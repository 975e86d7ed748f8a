use super::Entity;
use crate::api_error::ApiError;
use crate::schema::users;
use argon2::Config;
use chrono::{NaiveDateTime, Utc};
use rand::Rng;
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Account allowed to submit results.
#[derive(Debug, Clone, Serialize, Queryable)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[table_name = "users"]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub api_key: String,
    pub created_at: NaiveDateTime,
}

impl NewUser {
    /// Builds a user with a hashed password and a freshly generated API key.
    pub fn register(username: &str, email: &str, password: &str) -> Result<NewUser, ApiError> {
        if username.trim().is_empty() {
            return Err(ApiError::bad_request("Username may not be empty"));
        }

        Ok(NewUser {
            username: username.trim().to_string(),
            email: email.to_string(),
            password: hash_password(password)?,
            api_key: generate_api_key(),
            created_at: Utc::now().naive_utc(),
        })
    }
}

impl User {
    pub fn verify_password(&self, password: &[u8]) -> Result<bool, ApiError> {
        argon2::verify_encoded(&self.password, password)
            .map_err(|e| ApiError::new(500, format!("Failed to verify password: {}", e)))
    }

    pub fn verify_api_key(&self, key: &str) -> bool {
        !self.api_key.is_empty() && self.api_key == key
    }
}

pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt: [u8; 32] = rand::thread_rng().gen();
    let config = Config::default();

    argon2::hash_encoded(password.as_bytes(), &salt, &config)
        .map_err(|e| ApiError::new(500, format!("Failed to hash password: {}", e)))
}

/// 64 hex characters derived from a random UUID.
pub fn generate_api_key() -> String {
    let mut hasher = Sha256::new();
    hasher.update(Uuid::new_v4().as_bytes());
    format!("{:x}", hasher.finalize())
}

impl Entity for User {
    const RESOURCE: &'static str = "user";

    type New = NewUser;

    fn id(&self) -> i32 {
        self.id
    }
}
