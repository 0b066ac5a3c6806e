use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(example = json!({
    "id": 1,
    "role": "employee",
    "position": "Software Engineer",
    "department_id": 2,
    "base_pay": 60000.0,
    "hra": 12000.0,
    "insurance": 1500.0
}))]
pub struct SalaryStructure {
    pub id: u64,
    #[schema(example = "employee")]
    pub role: String,
    pub position: String,
    pub department_id: u64,
    pub base_pay: f64,
    pub hra: f64,
    pub insurance: f64,
}

/// Amount checks shared by create and update.
pub fn validate_amounts(base_pay: f64, hra: f64, insurance: f64) -> Result<(), &'static str> {
    if !base_pay.is_finite() || !hra.is_finite() || !insurance.is_finite() {
        return Err("Amounts must be finite numbers");
    }
    if base_pay <= 0.0 {
        return Err("base_pay must be greater than zero");
    }
    if hra < 0.0 || insurance < 0.0 {
        return Err("hra and insurance cannot be negative");
    }
    Ok(())
}
