//! Task storage.

use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct TaskStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub status: bool,
    pub user_id: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Owner summary joined onto task listings.
#[derive(Debug, Clone)]
pub struct TaskOwner {
    pub id: i64,
    pub name: String,
    pub email: String,
}

/// A task together with its owner's public details.
#[derive(Debug, Clone)]
pub struct TaskWithOwner {
    pub task: Task,
    pub owner: TaskOwner,
}

#[derive(sqlx::FromRow)]
struct TaskWithOwnerRow {
    id: i64,
    title: String,
    status: bool,
    user_id: i64,
    created_at: String,
    updated_at: String,
    owner_name: String,
    owner_email: String,
}

impl From<TaskWithOwnerRow> for TaskWithOwner {
    fn from(row: TaskWithOwnerRow) -> Self {
        Self {
            owner: TaskOwner {
                id: row.user_id,
                name: row.owner_name,
                email: row.owner_email,
            },
            task: Task {
                id: row.id,
                title: row.title,
                status: row.status,
                user_id: row.user_id,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
        }
    }
}

const JOINED_SELECT: &str = "SELECT t.id, t.title, t.status, t.user_id, t.created_at, t.updated_at,
        u.name AS owner_name, u.email AS owner_email
    FROM tasks t JOIN users u ON u.id = t.user_id";

impl TaskStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a task owned by `user_id`. Returns the task ID.
    pub async fn create(&self, user_id: i64, title: &str, status: bool) -> Result<i64, sqlx::Error> {
        let result = sqlx::query("INSERT INTO tasks (title, status, user_id) VALUES (?, ?, ?)")
            .bind(title)
            .bind(status)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    /// Get a task by ID (used by the ownership check).
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Task>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, title, status, user_id, created_at, updated_at FROM tasks WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Get a task with its owner.
    pub async fn get_with_owner(&self, id: i64) -> Result<Option<TaskWithOwner>, sqlx::Error> {
        let row: Option<TaskWithOwnerRow> =
            sqlx::query_as(&format!("{} WHERE t.id = ?", JOINED_SELECT))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(TaskWithOwner::from))
    }

    /// List all tasks with their owners.
    pub async fn list_all(&self) -> Result<Vec<TaskWithOwner>, sqlx::Error> {
        let rows: Vec<TaskWithOwnerRow> =
            sqlx::query_as(&format!("{} ORDER BY t.id", JOINED_SELECT))
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(TaskWithOwner::from).collect())
    }

    /// List the tasks of a single user.
    pub async fn list_by_user(&self, user_id: i64) -> Result<Vec<TaskWithOwner>, sqlx::Error> {
        let rows: Vec<TaskWithOwnerRow> =
            sqlx::query_as(&format!("{} WHERE t.user_id = ? ORDER BY t.id", JOINED_SELECT))
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(TaskWithOwner::from).collect())
    }

    /// Update title and/or status. Returns the updated task.
    pub async fn update(
        &self,
        id: i64,
        title: Option<&str>,
        status: Option<bool>,
    ) -> Result<Option<Task>, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE tasks SET title = COALESCE(?, title), status = COALESCE(?, status), updated_at = datetime('now') WHERE id = ?",
        )
        .bind(title)
        .bind(status)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    /// Delete a task by ID.
    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
