//! Document operations, scoped to a project

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::client::ApiClient;
use crate::error::Result;
use crate::pagination;
use crate::request::RequestDescriptor;

#[derive(Debug, Clone, Deserialize)]
pub struct Document {
    pub id: u64,
    pub title: String,
    /// Rich-text body; absent in list responses on some server versions
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ApiClient {
    pub async fn list_documents(&self, project_id: u64) -> Result<Vec<Document>> {
        pagination::fetch_all(self, &format!("/projects/{project_id}/documents.json"), &[]).await
    }

    pub async fn get_document(&self, project_id: u64, document_id: u64) -> Result<Document> {
        self.fetch_json(&RequestDescriptor::get(&format!(
            "/projects/{project_id}/documents/{document_id}.json"
        )))
        .await
    }

    pub async fn create_document(
        &self,
        project_id: u64,
        title: &str,
        content: &str,
    ) -> Result<Document> {
        self.fetch_json(&RequestDescriptor::post(
            &format!("/projects/{project_id}/documents.json"),
            json!({ "title": title, "content": content }),
        ))
        .await
    }

    pub async fn update_document(
        &self,
        project_id: u64,
        document_id: u64,
        title: Option<&str>,
        content: Option<&str>,
    ) -> Result<Document> {
        let mut body = serde_json::Map::new();
        if let Some(title) = title {
            body.insert("title".into(), json!(title));
        }
        if let Some(content) = content {
            body.insert("content".into(), json!(content));
        }
        self.fetch_json(&RequestDescriptor::put(
            &format!("/projects/{project_id}/documents/{document_id}.json"),
            body.into(),
        ))
        .await
    }

    pub async fn trash_document(&self, project_id: u64, document_id: u64) -> Result<()> {
        self.fetch_unit(&RequestDescriptor::delete(&format!(
            "/projects/{project_id}/documents/{document_id}.json"
        )))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_content_is_optional_in_listings() {
        let doc: Document = serde_json::from_str(r#"{"id":5,"title":"Runbook"}"#).unwrap();
        assert_eq!(doc.title, "Runbook");
        assert!(doc.content.is_none());
    }
}
