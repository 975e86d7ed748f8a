use super::{ApiResource, Entity};
use crate::api_error::ApiError;
use crate::schema::reports;
use crate::store::Store;
use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::Value;

/// Change summary of one revision for an executable on an environment.
#[derive(Debug, Clone, Serialize, Queryable)]
pub struct Report {
    pub id: i32,
    pub revision_id: i32,
    pub environment_id: i32,
    pub executable_id: i32,
    pub summary: String,
    pub colorcode: String,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[table_name = "reports"]
pub struct NewReport {
    pub revision_id: i32,
    pub environment_id: i32,
    pub executable_id: i32,
    pub summary: String,
    pub colorcode: String,
    pub updated_at: NaiveDateTime,
}

impl Entity for Report {
    const RESOURCE: &'static str = "report";
    const FOREIGN_KEYS: &'static [(&'static str, &'static str)] = &[
        ("revision_id", "revision"),
        ("environment_id", "environment"),
        ("executable_id", "executable"),
    ];

    type New = NewReport;

    fn id(&self) -> i32 {
        self.id
    }
}

impl ApiResource for Report {
    const READ_ONLY: bool = true;

    type Input = Value;

    fn hydrate(_store: &dyn Store, _input: Value) -> Result<NewReport, ApiError> {
        Err(ApiError::new(
            405,
            "Reports are generated from results".to_string(),
        ))
    }
}
