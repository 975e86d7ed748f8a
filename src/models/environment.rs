use super::{required, ApiResource, Entity};
use crate::api_error::ApiError;
use crate::schema::environments;
use crate::store::Store;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Queryable)]
pub struct Environment {
    pub id: i32,
    pub name: String,
    pub cpu: String,
    pub memory: String,
    pub os: String,
    pub kernel: String,
}

#[derive(Debug, Clone, Deserialize, Insertable, AsChangeset)]
#[table_name = "environments"]
pub struct NewEnvironment {
    pub name: String,
    #[serde(default)]
    pub cpu: String,
    #[serde(default)]
    pub memory: String,
    #[serde(default)]
    pub os: String,
    #[serde(default)]
    pub kernel: String,
}

impl NewEnvironment {
    pub fn named(name: &str) -> NewEnvironment {
        NewEnvironment {
            name: name.to_string(),
            cpu: String::new(),
            memory: String::new(),
            os: String::new(),
            kernel: String::new(),
        }
    }
}

impl Entity for Environment {
    const RESOURCE: &'static str = "environment";

    type New = NewEnvironment;

    fn id(&self) -> i32 {
        self.id
    }
}

impl ApiResource for Environment {
    type Input = NewEnvironment;

    fn hydrate(_store: &dyn Store, input: NewEnvironment) -> Result<NewEnvironment, ApiError> {
        Ok(NewEnvironment {
            name: required("name", input.name)?,
            ..input
        })
    }
}
