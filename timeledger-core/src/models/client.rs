use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default billing mode of a project, used to prefill session forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectBilling {
    Hourly,
    FixedProject,
}

/// A project belonging to a client.
///
/// Projects are owned by value: they live inside the client's `projects`
/// JSON column and have no table of their own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Unique identifier for the project
    pub id: Uuid,

    /// Project name
    pub name: String,

    /// Default billing mode for sessions on this project
    pub billing: ProjectBilling,

    /// Default hourly rate (hourly projects)
    pub rate: Option<Decimal>,

    /// Agreed fixed budget (fixed-price projects)
    pub budget: Option<Decimal>,
}

/// Client model representing someone the user bills.
///
/// This struct maps to the `clients` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    /// Unique identifier for the client
    pub id: Uuid,

    /// ID of the user who owns this client
    pub user_id: Uuid,

    /// Client name
    pub name: String,

    /// Projects under this client
    pub projects: Vec<Project>,

    /// Timestamp when the client was created
    pub created_at: DateTime<Utc>,

    /// Timestamp when the client was last updated
    pub updated_at: DateTime<Utc>,
}

impl Client {
    /// Looks up one of this client's projects by id.
    pub fn project(&self, project_id: Uuid) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == project_id)
    }
}

/// Project input used when creating or replacing a client's project list.
/// Omitting `id` creates a new project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectInput {
    pub id: Option<Uuid>,
    pub name: String,
    pub billing: ProjectBilling,
    pub rate: Option<Decimal>,
    pub budget: Option<Decimal>,
}

/// Client creation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateClientRequest {
    pub name: String,
    pub projects: Option<Vec<ProjectInput>>,
}

/// Client update request; `projects` replaces the whole list when present
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateClientRequest {
    pub name: Option<String>,
    pub projects: Option<Vec<ProjectInput>>,
}

/// Client response (public representation)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub projects: Vec<Project>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Client> for ClientResponse {
    fn from(client: Client) -> Self {
        ClientResponse {
            id: client.id,
            user_id: client.user_id,
            name: client.name,
            projects: client.projects,
            created_at: client.created_at,
            updated_at: client.updated_at,
        }
    }
}
