//! Fixtures for tests that run against a real MySQL database.
//!
//! Those tests only run when `DATABASE_URL` is set; otherwise `database()`
//! returns `None` and they exit early. Every fixture uses fresh unique keys,
//! so tests can share one database.

use chrono::NaiveDate;
use sqlx::MySqlPool;
use uuid::Uuid;

use crate::{auth::auth::AuthUser, model::role::Role};

pub async fn database() -> Option<MySqlPool> {
    dotenvy::dotenv().ok();
    let url = std::env::var("DATABASE_URL").ok()?;

    let pool = MySqlPool::connect(&url).await.expect("connect to DATABASE_URL");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("run migrations");
    Some(pool)
}

fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().to_simple())
}

pub async fn department(pool: &MySqlPool) -> u64 {
    sqlx::query("INSERT INTO departments (department_name) VALUES (?)")
        .bind(unique("dept"))
        .execute(pool)
        .await
        .expect("insert department")
        .last_insert_id()
}

/// Inserts a user and returns the identity its handlers would see.
pub async fn user(
    pool: &MySqlPool,
    role: Role,
    department_id: u64,
    position: &str,
    available_leaves: i32,
) -> AuthUser {
    let code = unique("emp");
    let email = format!("{code}@company.test");

    let id = sqlx::query(
        r#"
        INSERT INTO users
            (employee_code, first_name, email, password, role, department_id,
             position, date_of_joining, available_leaves)
        VALUES (?, 'Test', ?, 'not-a-hash', ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&code)
    .bind(&email)
    .bind(role.as_ref())
    .bind(department_id)
    .bind(position)
    .bind(NaiveDate::from_ymd_opt(2025, 1, 1))
    .bind(available_leaves)
    .execute(pool)
    .await
    .expect("insert user")
    .last_insert_id();

    AuthUser {
        user_id: id,
        email,
        role,
    }
}

pub async fn leave_balance(pool: &MySqlPool, user_id: u64) -> i32 {
    sqlx::query_scalar::<_, i32>("SELECT available_leaves FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .expect("read balance")
}

/// `(date, status)` rows for one employee, oldest first.
pub async fn attendance_rows(pool: &MySqlPool, employee_id: u64) -> Vec<(NaiveDate, String)> {
    sqlx::query_as::<_, (NaiveDate, String)>(
        "SELECT date, status FROM attendance WHERE employee_id = ? ORDER BY date",
    )
    .bind(employee_id)
    .fetch_all(pool)
    .await
    .expect("read attendance")
}
