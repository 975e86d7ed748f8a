mod benchmark;
mod branch;
mod environment;
mod executable;
mod project;
mod report;
mod result;
mod revision;
mod user;

pub use benchmark::*;
pub use branch::*;
pub use environment::*;
pub use executable::*;
pub use project::*;
pub use report::*;
pub use result::*;
pub use revision::*;
pub use user::*;

use crate::api_error::ApiError;
use crate::store::{Store, Table};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::convert::TryFrom;

pub const API_ROOT: &str = "/api/v1/";

/// A persisted row with a serial id.
pub trait Entity: Clone + Serialize + Send + Sync + 'static {
    /// Resource name used in URLs, e.g. `environment`.
    const RESOURCE: &'static str;
    /// `(column, resource)` pairs for columns holding another row's id.
    const FOREIGN_KEYS: &'static [(&'static str, &'static str)] = &[];

    type New: Clone + Send + 'static;

    fn id(&self) -> i32;
}

/// An entity exposed under `/api/v1/<RESOURCE>/`.
pub trait ApiResource: Entity {
    const READ_ONLY: bool = false;

    type Input: DeserializeOwned + 'static;

    /// Validates client input and resolves its references into an insertable row.
    fn hydrate(store: &dyn Store, input: Self::Input) -> Result<Self::New, ApiError>;

    /// Checks a hydrated row against the id it is about to be stored at.
    fn check_id(_id: i32, _new: &Self::New) -> Result<(), ApiError> {
        Ok(())
    }
}

pub fn resource_uri(resource: &str, id: i32) -> String {
    format!("{}{}/{}/", API_ROOT, resource, id)
}

/// Renders a row the way API clients see it: foreign key columns become
/// resource URIs and a `resource_uri` field is added.
pub fn dehydrate<E: Entity>(entity: &E) -> Result<Value, ApiError> {
    let mut value = serde_json::to_value(entity)?;
    if let Value::Object(map) = &mut value {
        for (column, resource) in E::FOREIGN_KEYS {
            let uri = match map.remove(*column) {
                Some(Value::Number(id)) => id
                    .as_i64()
                    .map(|id| Value::String(resource_uri(resource, id as i32)))
                    .unwrap_or(Value::Null),
                _ => Value::Null,
            };
            map.insert(column.trim_end_matches("_id").to_string(), uri);
        }
        map.insert(
            "resource_uri".to_string(),
            Value::String(resource_uri(E::RESOURCE, entity.id())),
        );
    }
    Ok(value)
}

/// Reference to another row in API input: a resource URI or a bare id.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawRef")]
pub struct ResourceRef {
    resource: Option<String>,
    id: i32,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawRef {
    Id(i32),
    Uri(String),
}

impl TryFrom<RawRef> for ResourceRef {
    type Error = String;

    fn try_from(raw: RawRef) -> Result<Self, Self::Error> {
        match raw {
            RawRef::Id(id) => Ok(ResourceRef::from_id(id)),
            RawRef::Uri(uri) => {
                ResourceRef::parse(&uri).ok_or_else(|| format!("invalid resource uri {:?}", uri))
            }
        }
    }
}

impl ResourceRef {
    pub fn from_id(id: i32) -> ResourceRef {
        ResourceRef { resource: None, id }
    }

    /// Parses `/api/v1/<resource>/<id>/`.
    pub fn parse(uri: &str) -> Option<ResourceRef> {
        let rest = uri.strip_prefix(API_ROOT)?;
        let mut parts = rest.trim_end_matches('/').split('/');
        let resource = parts.next().filter(|r| !r.is_empty())?;
        let id = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(ResourceRef {
            resource: Some(resource.to_string()),
            id,
        })
    }

    pub fn resolve<E, S>(&self, store: &S) -> Result<E, ApiError>
    where
        E: Entity,
        S: Table<E> + ?Sized,
    {
        if let Some(resource) = &self.resource {
            if resource != E::RESOURCE {
                return Err(ApiError::bad_request(format!(
                    "{} is not a {} resource",
                    resource_uri(resource, self.id),
                    E::RESOURCE
                )));
            }
        }
        <S as Table<E>>::load(store, self.id)?.ok_or_else(|| {
            ApiError::bad_request(format!(
                "{} does not exist",
                resource_uri(E::RESOURCE, self.id)
            ))
        })
    }
}

pub(crate) fn default_true() -> bool {
    true
}

/// Rejects blank values for required text fields.
pub(crate) fn required(field: &str, value: String) -> Result<String, ApiError> {
    let value = value.trim().to_string();
    if value.is_empty() {
        return Err(ApiError::bad_request(format!(
            "Field \"{}\" may not be empty",
            field
        )));
    }
    Ok(value)
}
