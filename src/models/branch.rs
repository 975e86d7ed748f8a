use super::{required, ApiResource, Entity, Project, ResourceRef};
use crate::api_error::ApiError;
use crate::schema::branches;
use crate::store::Store;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Queryable)]
pub struct Branch {
    pub id: i32,
    pub name: String,
    pub project_id: i32,
}

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[table_name = "branches"]
pub struct NewBranch {
    pub name: String,
    pub project_id: i32,
}

#[derive(Debug, Deserialize)]
pub struct BranchInput {
    pub name: String,
    pub project: ResourceRef,
}

impl Entity for Branch {
    const RESOURCE: &'static str = "branch";
    const FOREIGN_KEYS: &'static [(&'static str, &'static str)] = &[("project_id", "project")];

    type New = NewBranch;

    fn id(&self) -> i32 {
        self.id
    }
}

impl ApiResource for Branch {
    type Input = BranchInput;

    fn hydrate(store: &dyn Store, input: BranchInput) -> Result<NewBranch, ApiError> {
        let project: Project = input.project.resolve(store)?;

        Ok(NewBranch {
            name: required("name", input.name)?,
            project_id: project.id,
        })
    }
}
