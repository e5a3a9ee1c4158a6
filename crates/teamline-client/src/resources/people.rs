//! People operations (account-wide)

use serde::Deserialize;

use crate::client::ApiClient;
use crate::error::Result;
use crate::pagination;
use crate::request::RequestDescriptor;

#[derive(Debug, Clone, Deserialize)]
pub struct Person {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub email_address: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub admin: bool,
}

impl ApiClient {
    /// Everyone visible in the selected account, in server order.
    pub async fn list_people(&self) -> Result<Vec<Person>> {
        pagination::fetch_all(self, "/people.json", &[]).await
    }

    pub async fn get_person(&self, person_id: u64) -> Result<Person> {
        self.fetch_json(&RequestDescriptor::get(&format!(
            "/people/{person_id}.json"
        )))
        .await
    }

    /// People with access to one project.
    pub async fn list_project_people(&self, project_id: u64) -> Result<Vec<Person>> {
        pagination::fetch_all(self, &format!("/projects/{project_id}/people.json"), &[]).await
    }
}
