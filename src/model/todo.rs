use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Todo {
    pub id: u64,
    pub user_id: u64,
    pub task: String,
    pub is_completed: bool,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}
