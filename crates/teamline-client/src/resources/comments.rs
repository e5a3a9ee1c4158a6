//! Comment operations
//!
//! Comments hang off any commentable recording (task, document, message),
//! addressed by the recording's id within a project.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::client::ApiClient;
use crate::error::Result;
use crate::pagination;
use crate::request::RequestDescriptor;
use crate::resources::people::Person;

#[derive(Debug, Clone, Deserialize)]
pub struct Comment {
    pub id: u64,
    pub content: String,
    #[serde(default)]
    pub author: Option<Person>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl ApiClient {
    pub async fn list_comments(&self, project_id: u64, recording_id: u64) -> Result<Vec<Comment>> {
        pagination::fetch_all(
            self,
            &format!("/projects/{project_id}/recordings/{recording_id}/comments.json"),
            &[],
        )
        .await
    }

    pub async fn create_comment(
        &self,
        project_id: u64,
        recording_id: u64,
        content: &str,
    ) -> Result<Comment> {
        self.fetch_json(&RequestDescriptor::post(
            &format!("/projects/{project_id}/recordings/{recording_id}/comments.json"),
            json!({ "content": content }),
        ))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comment_deserializes() {
        let json = r#"{"id":77,"content":"LGTM","author":{"id":11,"name":"Sam"},"created_at":"2026-08-01T08:00:00Z"}"#;
        let comment: Comment = serde_json::from_str(json).unwrap();
        assert_eq!(comment.content, "LGTM");
        assert_eq!(comment.author.unwrap().id, 11);
    }
}
