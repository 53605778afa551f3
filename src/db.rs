use std::path::Path;
use std::time::Duration as StdDuration;

use anyhow::Context;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, TransactionBehavior};

use crate::models::{
    ActivityLog, NewTodo, PermissionSet, Role, Todo, TodoStatus, User,
};

const USER_COLUMNS: &str = "id, email, password_hash, name, role, permissions, reset_token, reset_token_expires_at, created_at";
const TODO_COLUMNS: &str = "id, title, description, tags, deadline, reminder, status, completed, user_id, created_at, updated_at";

pub struct Database {
    conn: Connection,
}

/// Outcome of [`Database::update_role`].
#[derive(Debug)]
pub enum RoleUpdate {
    Updated(User),
    UserNotFound,
    /// The change would leave no admin.
    LastAdmin,
}

impl Database {
    pub fn connect<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("opening database at {}", path.as_ref().display()))?;
        conn.busy_timeout(StdDuration::from_secs(5))?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> anyhow::Result<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                name TEXT,
                role TEXT NOT NULL DEFAULT 'user',
                permissions TEXT NOT NULL DEFAULT '[]',
                reset_token TEXT UNIQUE,
                reset_token_expires_at TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS todos (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                description TEXT,
                tags TEXT NOT NULL DEFAULT '[]',
                deadline TEXT,
                reminder TEXT,
                status TEXT NOT NULL DEFAULT 'todo',
                completed INTEGER NOT NULL DEFAULT 0,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS todos_user_id ON todos(user_id);

            CREATE TABLE IF NOT EXISTS activity_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                action TEXT NOT NULL,
                timestamp TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS activity_logs_timestamp ON activity_logs(timestamp);
            "#,
        )?;
        Ok(())
    }

    // Users

    /// Inserts the user together with its "Signed up" entry.
    /// Returns `None` when the email is already registered.
    pub fn create_user(
        &mut self,
        email: &str,
        password_hash: &str,
        name: Option<&str>,
        role: Role,
    ) -> anyhow::Result<Option<User>> {
        let now = Utc::now();
        let tx = self.conn.transaction()?;
        let inserted = tx.execute(
            "INSERT INTO users (email, password_hash, name, role, permissions, created_at)
             VALUES (?1, ?2, ?3, ?4, '[]', ?5)",
            params![email, password_hash, name, role.as_str(), encode_time(now)],
        );
        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        }
        let id = tx.last_insert_rowid();
        append_log(&tx, id, "Signed up")?;
        tx.commit()?;

        self.find_user(id)?
            .map(Some)
            .context("user vanished after insert")
    }

    pub fn find_user(&self, id: i64) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
        Ok(self.conn.query_row(&sql, params![id], user_from_row).optional()?)
    }

    pub fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1");
        Ok(self.conn.query_row(&sql, params![email], user_from_row).optional()?)
    }

    pub fn find_user_by_reset_token(&self, token: &str) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE reset_token = ?1");
        Ok(self.conn.query_row(&sql, params![token], user_from_row).optional()?)
    }

    pub fn list_users(&self) -> anyhow::Result<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY id");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], user_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Stores a new role and permission set for `user_id` and records `action` for `actor_id`.
    ///
    /// The current role and the admin count are read inside the update's write transaction.
    pub fn update_role(
        &mut self,
        user_id: i64,
        role: Role,
        permissions: &PermissionSet,
        actor_id: i64,
        action: &str,
    ) -> anyhow::Result<RoleUpdate> {
        let tx = self.conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let current = tx
            .query_row("SELECT role FROM users WHERE id = ?1", params![user_id], |row| {
                parse_text::<Role>(row, 0)
            })
            .optional()?;
        let Some(current) = current else {
            return Ok(RoleUpdate::UserNotFound);
        };
        if current == Role::Admin && role != Role::Admin && count_admins(&tx)? <= 1 {
            return Ok(RoleUpdate::LastAdmin);
        }

        tx.execute(
            "UPDATE users SET role = ?1, permissions = ?2 WHERE id = ?3",
            params![role.as_str(), serde_json::to_string(permissions)?, user_id],
        )?;
        append_log(&tx, actor_id, action)?;
        tx.commit()?;

        let user = self.find_user(user_id)?.context("user vanished after role update")?;
        Ok(RoleUpdate::Updated(user))
    }

    pub fn set_reset_token(
        &self,
        user_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        self.conn.execute(
            "UPDATE users SET reset_token = ?1, reset_token_expires_at = ?2 WHERE id = ?3",
            params![token, encode_time(expires_at), user_id],
        )?;
        Ok(())
    }

    /// Replaces the password hash if `token` is still the user's reset token,
    /// clears the token and records the change. Returns `false` if the token was already used.
    pub fn reset_password(&mut self, user_id: i64, token: &str, password_hash: &str) -> anyhow::Result<bool> {
        let tx = self.conn.transaction()?;
        let updated = tx.execute(
            "UPDATE users SET password_hash = ?1, reset_token = NULL, reset_token_expires_at = NULL
             WHERE id = ?2 AND reset_token = ?3",
            params![password_hash, user_id, token],
        )?;
        if updated == 0 {
            return Ok(false);
        }
        append_log(&tx, user_id, "Reset password")?;
        tx.commit()?;
        Ok(true)
    }

    // Todos

    pub fn create_todo(&mut self, user_id: i64, todo: &NewTodo) -> anyhow::Result<Todo> {
        let now = Utc::now();
        let title = todo.title.trim();
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO todos (title, description, tags, deadline, reminder, status, completed, user_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
            params![
                title,
                todo.description,
                serde_json::to_string(&todo.tags)?,
                todo.deadline.map(encode_time),
                todo.reminder.map(encode_time),
                todo.status.as_str(),
                todo.status.is_completed(),
                user_id,
                encode_time(now),
            ],
        )?;
        let id = tx.last_insert_rowid();
        append_log(&tx, user_id, &format!("Created task \"{title}\""))?;
        tx.commit()?;

        self.find_todo(id)?.context("todo vanished after insert")
    }

    pub fn find_todo(&self, id: i64) -> anyhow::Result<Option<Todo>> {
        let sql = format!("SELECT {TODO_COLUMNS} FROM todos WHERE id = ?1");
        Ok(self.conn.query_row(&sql, params![id], todo_from_row).optional()?)
    }

    pub fn list_todos_for_user(&self, user_id: i64) -> anyhow::Result<Vec<Todo>> {
        let sql = format!("SELECT {TODO_COLUMNS} FROM todos WHERE user_id = ?1 ORDER BY id DESC");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![user_id], todo_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Writes every mutable field of `todo` back and records `action` for `actor_id`.
    pub fn save_todo(&mut self, todo: &Todo, actor_id: i64, action: &str) -> anyhow::Result<Todo> {
        let now = Utc::now();
        let tx = self.conn.transaction()?;
        let updated = tx.execute(
            "UPDATE todos
             SET title = ?1, description = ?2, tags = ?3, deadline = ?4, reminder = ?5,
                 status = ?6, completed = ?7, updated_at = ?8
             WHERE id = ?9",
            params![
                todo.title,
                todo.description,
                serde_json::to_string(&todo.tags)?,
                todo.deadline.map(encode_time),
                todo.reminder.map(encode_time),
                todo.status.as_str(),
                todo.completed,
                encode_time(now),
                todo.id,
            ],
        )?;
        if updated == 0 {
            anyhow::bail!("todo {} not found", todo.id);
        }
        append_log(&tx, actor_id, action)?;
        tx.commit()?;

        self.find_todo(todo.id)?.context("todo vanished after update")
    }

    /// Deletes the todo and records `action`; `None` if it did not exist.
    pub fn delete_todo(&mut self, id: i64, actor_id: i64, action: &str) -> anyhow::Result<Option<Todo>> {
        let Some(todo) = self.find_todo(id)? else {
            return Ok(None);
        };
        let tx = self.conn.transaction()?;
        let deleted = tx.execute("DELETE FROM todos WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Ok(None);
        }
        append_log(&tx, actor_id, action)?;
        tx.commit()?;
        Ok(Some(todo))
    }

    // Activity log

    /// All entries, newest first.
    pub fn list_activity_logs(&self) -> anyhow::Result<Vec<ActivityLog>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, action, timestamp FROM activity_logs ORDER BY timestamp DESC, id DESC",
        )?;
        let rows = stmt.query_map([], log_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn list_activity_logs_for_user(&self, user_id: i64) -> anyhow::Result<Vec<ActivityLog>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, action, timestamp FROM activity_logs WHERE user_id = ?1
             ORDER BY timestamp DESC, id DESC",
        )?;
        let rows = stmt.query_map(params![user_id], log_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn count_admins(conn: &Connection) -> anyhow::Result<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM users WHERE role = ?1",
        params![Role::Admin.as_str()],
        |row| row.get(0),
    )?)
}

fn append_log(conn: &Connection, user_id: i64, action: &str) -> anyhow::Result<ActivityLog> {
    let timestamp = Utc::now();
    conn.execute(
        "INSERT INTO activity_logs (user_id, action, timestamp) VALUES (?1, ?2, ?3)",
        params![user_id, action, encode_time(timestamp)],
    )?;
    Ok(ActivityLog {
        id: conn.last_insert_rowid(),
        user_id,
        action: action.to_string(),
        timestamp,
    })
}

/// Fixed precision keeps lexical order equal to chronological order.
fn encode_time(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_datetime(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let value: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_optional_datetime(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let value: Option<String> = row.get(idx)?;
    value
        .map(|v| {
            DateTime::parse_from_rfc3339(&v)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
        })
        .transpose()
}

fn parse_text<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value: String = row.get(idx)?;
    value
        .parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_json<T: serde::de::DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let value: String = row.get(idx)?;
    serde_json::from_str(&value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        name: row.get(3)?,
        role: parse_text::<Role>(row, 4)?,
        permissions: parse_json::<PermissionSet>(row, 5)?,
        reset_token: row.get(6)?,
        reset_token_expires_at: parse_optional_datetime(row, 7)?,
        created_at: parse_datetime(row, 8)?,
    })
}

fn todo_from_row(row: &Row<'_>) -> rusqlite::Result<Todo> {
    Ok(Todo {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        tags: parse_json(row, 3)?,
        deadline: parse_optional_datetime(row, 4)?,
        reminder: parse_optional_datetime(row, 5)?,
        status: parse_text::<TodoStatus>(row, 6)?,
        completed: row.get(7)?,
        user_id: row.get(8)?,
        created_at: parse_datetime(row, 9)?,
        updated_at: parse_datetime(row, 10)?,
    })
}

fn log_from_row(row: &Row<'_>) -> rusqlite::Result<ActivityLog> {
    Ok(ActivityLog {
        id: row.get(0)?,
        user_id: row.get(1)?,
        action: row.get(2)?,
        timestamp: parse_datetime(row, 3)?,
    })
}
