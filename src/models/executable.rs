use super::{required, ApiResource, Entity, Project, ResourceRef};
use crate::api_error::ApiError;
use crate::schema::executables;
use crate::store::Store;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Queryable)]
pub struct Executable {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub project_id: i32,
}

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[table_name = "executables"]
pub struct NewExecutable {
    pub name: String,
    pub description: String,
    pub project_id: i32,
}

#[derive(Debug, Deserialize)]
pub struct ExecutableInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub project: ResourceRef,
}

impl Entity for Executable {
    const RESOURCE: &'static str = "executable";
    const FOREIGN_KEYS: &'static [(&'static str, &'static str)] = &[("project_id", "project")];

    type New = NewExecutable;

    fn id(&self) -> i32 {
        self.id
    }
}

impl ApiResource for Executable {
    type Input = ExecutableInput;

    fn hydrate(store: &dyn Store, input: ExecutableInput) -> Result<NewExecutable, ApiError> {
        let project: Project = input.project.resolve(store)?;

        Ok(NewExecutable {
            name: required("name", input.name)?,
            description: input.description,
            project_id: project.id,
        })
    }
}
