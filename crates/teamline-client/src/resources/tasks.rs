//! Task operations, scoped to a project

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::client::ApiClient;
use crate::error::Result;
use crate::pagination;
use crate::request::RequestDescriptor;

#[derive(Debug, Clone, Deserialize)]
pub struct Task {
    pub id: u64,
    pub content: String,
    #[serde(default)]
    pub completed: bool,
    /// Due date as `YYYY-MM-DD`, when set
    #[serde(default)]
    pub due_on: Option<String>,
    #[serde(default)]
    pub assignee_ids: Vec<u64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ApiClient {
    /// All tasks in a project, in server order.
    pub async fn list_tasks(&self, project_id: u64) -> Result<Vec<Task>> {
        pagination::fetch_all(self, &format!("/projects/{project_id}/tasks.json"), &[]).await
    }

    /// Only the completed tasks in a project.
    pub async fn list_completed_tasks(&self, project_id: u64) -> Result<Vec<Task>> {
        pagination::fetch_all(
            self,
            &format!("/projects/{project_id}/tasks.json"),
            &[("completed", "true")],
        )
        .await
    }

    pub async fn get_task(&self, project_id: u64, task_id: u64) -> Result<Task> {
        self.fetch_json(&RequestDescriptor::get(&format!(
            "/projects/{project_id}/tasks/{task_id}.json"
        )))
        .await
    }

    pub async fn create_task(
        &self,
        project_id: u64,
        content: &str,
        due_on: Option<&str>,
    ) -> Result<Task> {
        self.fetch_json(&RequestDescriptor::post(
            &format!("/projects/{project_id}/tasks.json"),
            json!({ "content": content, "due_on": due_on }),
        ))
        .await
    }

    pub async fn update_task(
        &self,
        project_id: u64,
        task_id: u64,
        content: Option<&str>,
        due_on: Option<&str>,
    ) -> Result<Task> {
        let mut body = serde_json::Map::new();
        if let Some(content) = content {
            body.insert("content".into(), json!(content));
        }
        if let Some(due_on) = due_on {
            body.insert("due_on".into(), json!(due_on));
        }
        self.fetch_json(&RequestDescriptor::put(
            &format!("/projects/{project_id}/tasks/{task_id}.json"),
            body.into(),
        ))
        .await
    }

    /// Mark a task complete via its completion sub-resource.
    pub async fn complete_task(&self, project_id: u64, task_id: u64) -> Result<()> {
        self.fetch_unit(&RequestDescriptor::post_empty(&format!(
            "/projects/{project_id}/tasks/{task_id}/completion.json"
        )))
        .await
    }

    /// Reopen a completed task.
    pub async fn reopen_task(&self, project_id: u64, task_id: u64) -> Result<()> {
        self.fetch_unit(&RequestDescriptor::delete(&format!(
            "/projects/{project_id}/tasks/{task_id}/completion.json"
        )))
        .await
    }

    pub async fn delete_task(&self, project_id: u64, task_id: u64) -> Result<()> {
        self.fetch_unit(&RequestDescriptor::delete(&format!(
            "/projects/{project_id}/tasks/{task_id}.json"
        )))
        .await
    }
}
