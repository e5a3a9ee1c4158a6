//! Project operations

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::client::ApiClient;
use crate::error::Result;
use crate::pagination;
use crate::request::RequestDescriptor;

/// A project, the top-level container for tasks, documents, and messages.
#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ApiClient {
    /// All active projects in the selected account, in server order.
    pub async fn list_projects(&self) -> Result<Vec<Project>> {
        pagination::fetch_all(self, "/projects.json", &[]).await
    }

    pub async fn get_project(&self, project_id: u64) -> Result<Project> {
        self.fetch_json(&RequestDescriptor::get(&format!(
            "/projects/{project_id}.json"
        )))
        .await
    }

    pub async fn create_project(&self, name: &str, description: Option<&str>) -> Result<Project> {
        self.fetch_json(&RequestDescriptor::post(
            "/projects.json",
            json!({ "name": name, "description": description }),
        ))
        .await
    }

    pub async fn update_project(
        &self,
        project_id: u64,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<Project> {
        let mut body = serde_json::Map::new();
        if let Some(name) = name {
            body.insert("name".into(), json!(name));
        }
        if let Some(description) = description {
            body.insert("description".into(), json!(description));
        }
        self.fetch_json(&RequestDescriptor::put(
            &format!("/projects/{project_id}.json"),
            body.into(),
        ))
        .await
    }

    /// Move a project to the trash. The server keeps it recoverable for a
    /// grace period; this client only triggers the move.
    pub async fn trash_project(&self, project_id: u64) -> Result<()> {
        self.fetch_unit(&RequestDescriptor::delete(&format!(
            "/projects/{project_id}.json"
        )))
        .await
    }
}
