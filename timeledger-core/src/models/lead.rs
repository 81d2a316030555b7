use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One stage of a sales funnel.
///
/// Stages are owned by value inside the funnel's `stages` JSON column and
/// ordered by `position`. The `key` is what leads reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunnelStage {
    /// Stable key referenced by leads, e.g. `"contacted"`
    pub key: String,

    /// Display title, e.g. `"Contacted"`
    pub title: String,

    /// Ordering index within the funnel
    pub position: i64,
}

/// Sales funnel model grouping a user's leads into ordered stages.
///
/// This struct maps to the `funnels` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Funnel {
    /// Unique identifier for the funnel
    pub id: Uuid,

    /// ID of the user who owns this funnel
    pub user_id: Uuid,

    /// Funnel name
    pub name: String,

    /// Ordered stages of this funnel
    pub stages: Vec<FunnelStage>,

    /// Timestamp when the funnel was created
    pub created_at: DateTime<Utc>,

    /// Timestamp when the funnel was last updated
    pub updated_at: DateTime<Utc>,
}

impl Funnel {
    pub fn has_stage(&self, key: &str) -> bool {
        self.stages.iter().any(|s| s.key == key)
    }

    /// Stages sorted by position.
    pub fn ordered_stages(&self) -> Vec<&FunnelStage> {
        let mut stages: Vec<&FunnelStage> = self.stages.iter().collect();
        stages.sort_by_key(|s| s.position);
        stages
    }

    /// Key of the first stage, where new leads land by default.
    pub fn first_stage_key(&self) -> Option<&str> {
        self.ordered_stages().first().map(|s| s.key.as_str())
    }
}

/// Lead model representing a potential client moving through a funnel.
///
/// This struct maps to the `leads` table. `stage` must always name one of
/// the owning funnel's stage keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    /// Unique identifier for the lead
    pub id: Uuid,

    /// ID of the user who owns this lead
    pub user_id: Uuid,

    /// Funnel this lead belongs to
    pub funnel_id: Uuid,

    /// Contact name
    pub name: String,

    /// Company, if any
    pub company: Option<String>,

    /// Key of the stage the lead currently sits in
    pub stage: String,

    /// Estimated deal value
    pub estimated_value: Option<Decimal>,

    /// Currency of the estimated value (ISO 4217)
    pub currency: String,

    /// Free-form tags
    pub tags: Vec<String>,

    /// Free-form notes
    pub notes: Option<String>,

    /// Timestamp when the lead was created
    pub created_at: DateTime<Utc>,

    /// Timestamp when the lead was last updated
    pub updated_at: DateTime<Utc>,
}

/// Stage input used when creating a funnel; positions follow list order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunnelStageInput {
    pub key: String,
    pub title: String,
}

/// Funnel creation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFunnelRequest {
    pub name: String,
    pub stages: Vec<FunnelStageInput>,
}

/// Lead creation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLeadRequest {
    pub name: String,
    pub company: Option<String>,
    /// Target stage key; defaults to the funnel's first stage
    pub stage: Option<String>,
    pub estimated_value: Option<Decimal>,
    pub currency: Option<String>,
    pub tags: Option<Vec<String>>,
    pub notes: Option<String>,
}

/// Lead update request; moving `stage` is how a lead advances
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateLeadRequest {
    pub name: Option<String>,
    pub company: Option<String>,
    pub stage: Option<String>,
    pub estimated_value: Option<Decimal>,
    pub currency: Option<String>,
    pub tags: Option<Vec<String>>,
    pub notes: Option<String>,
}

/// Per-stage slice of the funnel conversion report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageConversion {
    pub key: String,
    pub title: String,
    /// Leads currently in this stage
    pub count: i64,
    /// Percentage of the previous stage's count that reached this stage;
    /// the first stage always reads 100
    pub conversion_rate: Decimal,
}

/// Funnel conversion report response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunnelStatsResponse {
    pub funnel_id: Uuid,
    pub total_leads: i64,
    pub stages: Vec<StageConversion>,
}
