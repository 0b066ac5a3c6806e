use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(example = json!({
    "id": 1,
    "department_name": "Engineering",
    "location": "Dhaka"
}))]
pub struct Department {
    pub id: u64,
    pub department_name: String,
    pub location: Option<String>,
}
