use crate::{
    auth::auth::AuthUser,
    error::{ApiError, ApiResult},
    model::todo::Todo,
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::ToSchema;

const TODO_COLUMNS: &str = "id, user_id, task, is_completed, created_at";

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTodo {
    #[schema(example = "Submit quarterly report")]
    pub task: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateTodo {
    pub task: Option<String>,
    pub is_completed: Option<bool>,
}

fn clean_task(task: &str) -> Result<&str, ApiError> {
    let task = task.trim();
    if task.is_empty() {
        return Err(ApiError::bad_request("Task cannot be empty"));
    }
    Ok(task)
}

async fn fetch_own_todo(pool: &MySqlPool, todo_id: u64, user_id: u64) -> ApiResult<Todo> {
    let sql = format!("SELECT {TODO_COLUMNS} FROM todos WHERE id = ? AND user_id = ?");
    sqlx::query_as::<_, Todo>(&sql)
        .bind(todo_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Todo not found"))
}

#[utoipa::path(
    get,
    path = "/api/todos",
    responses((status = 200, description = "Own todos, newest first", body = [Todo])),
    tag = "Todo",
    security(("bearer_auth" = []))
)]
pub async fn list_todos(auth: AuthUser, pool: web::Data<MySqlPool>) -> ApiResult<HttpResponse> {
    let sql = format!(
        "SELECT {TODO_COLUMNS} FROM todos WHERE user_id = ? ORDER BY created_at DESC, id DESC"
    );
    let todos = sqlx::query_as::<_, Todo>(&sql)
        .bind(auth.user_id)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(todos))
}

#[utoipa::path(
    post,
    path = "/api/todos",
    request_body = CreateTodo,
    responses(
        (status = 201, description = "Todo created", body = Todo),
        (status = 400, description = "Task cannot be empty")
    ),
    tag = "Todo",
    security(("bearer_auth" = []))
)]
pub async fn create_todo(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateTodo>,
) -> ApiResult<HttpResponse> {
    let task = clean_task(&payload.task)?;

    let result = sqlx::query("INSERT INTO todos (user_id, task) VALUES (?, ?)")
        .bind(auth.user_id)
        .bind(task)
        .execute(pool.get_ref())
        .await?;

    let todo = fetch_own_todo(pool.get_ref(), result.last_insert_id(), auth.user_id).await?;

    info!(todo_id = todo.id, user_id = auth.user_id, "Todo created");

    Ok(HttpResponse::Created().json(todo))
}

#[utoipa::path(
    put,
    path = "/api/todos/{todo_id}",
    params(("todo_id" = u64, Path, description = "Todo ID")),
    request_body = UpdateTodo,
    responses(
        (status = 200, description = "Todo updated", body = Todo),
        (status = 400, description = "Nothing to update or empty task"),
        (status = 404, description = "Todo not found")
    ),
    tag = "Todo",
    security(("bearer_auth" = []))
)]
pub async fn update_todo(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<UpdateTodo>,
) -> ApiResult<HttpResponse> {
    let todo_id = path.into_inner();

    if payload.task.is_none() && payload.is_completed.is_none() {
        return Err(ApiError::bad_request("No fields provided for update"));
    }
    let task = payload.task.as_deref().map(clean_task).transpose()?;

    let current = fetch_own_todo(pool.get_ref(), todo_id, auth.user_id).await?;

    sqlx::query("UPDATE todos SET task = ?, is_completed = ? WHERE id = ? AND user_id = ?")
        .bind(task.unwrap_or(&current.task))
        .bind(payload.is_completed.unwrap_or(current.is_completed))
        .bind(todo_id)
        .bind(auth.user_id)
        .execute(pool.get_ref())
        .await?;

    let todo = fetch_own_todo(pool.get_ref(), todo_id, auth.user_id).await?;
    Ok(HttpResponse::Ok().json(todo))
}

#[utoipa::path(
    delete,
    path = "/api/todos/{todo_id}",
    params(("todo_id" = u64, Path, description = "Todo ID")),
    responses(
        (status = 200, description = "Todo deleted"),
        (status = 404, description = "Todo not found")
    ),
    tag = "Todo",
    security(("bearer_auth" = []))
)]
pub async fn delete_todo(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    let todo_id = path.into_inner();

    let result = sqlx::query("DELETE FROM todos WHERE id = ? AND user_id = ?")
        .bind(todo_id)
        .bind(auth.user_id)
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Todo not found"));
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "Todo deleted" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_is_trimmed_and_required() {
        assert_eq!(clean_task("  call HR  ").unwrap(), "call HR");
        assert!(clean_task("   ").is_err());
        assert!(clean_task("").is_err());
    }
}
