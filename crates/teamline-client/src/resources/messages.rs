//! Message-board operations, scoped to a project

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::client::ApiClient;
use crate::error::Result;
use crate::pagination;
use crate::request::RequestDescriptor;
use crate::resources::people::Person;

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub id: u64,
    pub subject: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub author: Option<Person>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl ApiClient {
    pub async fn list_messages(&self, project_id: u64) -> Result<Vec<Message>> {
        pagination::fetch_all(self, &format!("/projects/{project_id}/messages.json"), &[]).await
    }

    pub async fn get_message(&self, project_id: u64, message_id: u64) -> Result<Message> {
        self.fetch_json(&RequestDescriptor::get(&format!(
            "/projects/{project_id}/messages/{message_id}.json"
        )))
        .await
    }

    pub async fn create_message(
        &self,
        project_id: u64,
        subject: &str,
        content: &str,
    ) -> Result<Message> {
        self.fetch_json(&RequestDescriptor::post(
            &format!("/projects/{project_id}/messages.json"),
            json!({ "subject": subject, "content": content }),
        ))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_embeds_its_author() {
        let json = r#"{
            "id": 2,
            "subject": "Kickoff notes",
            "content": "<p>Welcome</p>",
            "author": {"id": 11, "name": "Sam Rivera"},
            "created_at": "2026-07-01T12:00:00Z"
        }"#;
        let message: Message = serde_json::from_str(json).unwrap();
        assert_eq!(message.subject, "Kickoff notes");
        assert_eq!(message.author.unwrap().name, "Sam Rivera");
    }
}
