use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::lists::owned_list;
use super::{
    insert_index, time_column, timestamp, uuid_column, write_sequence, Sequence, Store,
    StoreError, StoreResult,
};
use crate::model::{ListId, NewTask, Priority, Task, TaskId, TaskPatch, UserId};

pub(super) const TASK_COLUMNS: &str =
    "id, list_id, title, description, completed, priority, deadline, sort_order, created_at, updated_at";

pub(super) fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    let priority: String = row.get(5)?;
    Ok(Task {
        id: uuid_column(0, row.get(0)?)?,
        list_id: uuid_column(1, row.get(1)?)?,
        title: row.get(2)?,
        description: row.get(3)?,
        completed: row.get(4)?,
        priority: priority.parse::<Priority>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e))
        })?,
        deadline: row
            .get::<_, Option<String>>(6)?
            .map(|raw| time_column(6, raw))
            .transpose()?,
        order: row.get(7)?,
        created_at: time_column(8, row.get(8)?)?,
        updated_at: time_column(9, row.get(9)?)?,
    })
}

/// A task whose list is owned by `owner`.
fn owned_task(conn: &Connection, owner: UserId, id: TaskId) -> StoreResult<Task> {
    let columns = TASK_COLUMNS
        .split(", ")
        .map(|c| format!("t.{c}"))
        .collect::<Vec<_>>()
        .join(", ");
    conn.query_row(
        &format!(
            "SELECT {columns} FROM tasks t JOIN lists l ON l.id = t.list_id
             WHERE t.id = ?1 AND l.owner_id = ?2"
        ),
        params![id.to_string(), owner.to_string()],
        task_from_row,
    )
    .optional()?
    .ok_or_else(|| StoreError::NotFound(format!("Task {}", id)))
}

/// Task ids of a list in display order.
fn task_ids(conn: &Connection, list_id: ListId) -> StoreResult<Vec<TaskId>> {
    let mut stmt =
        conn.prepare_cached("SELECT id FROM tasks WHERE list_id = ?1 ORDER BY sort_order, id")?;
    let ids = stmt
        .query_map(params![list_id.to_string()], |row| uuid_column(0, row.get(0)?))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(ids)
}

impl Store {
    /// Create a task in `list_id` at `order` (clamped), appending when absent.
    pub async fn create_task(
        &self,
        owner: UserId,
        list_id: ListId,
        new: &NewTask,
    ) -> StoreResult<Task> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        owned_list(&tx, owner, list_id)?;

        let now = timestamp(&Utc::now());
        let id = Uuid::new_v4();
        tx.execute(
            "INSERT INTO tasks (id, list_id, title, description, completed, priority, deadline,
                                sort_order, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6, ?7, ?8, ?8)",
            params![
                id.to_string(),
                list_id.to_string(),
                new.title,
                new.description,
                new.priority.as_str(),
                new.deadline.as_ref().map(timestamp),
                i64::MAX,
                now
            ],
        )?;

        let mut ids = task_ids(&tx, list_id)?;
        ids.retain(|other| *other != id);
        let index = insert_index(new.order, ids.len());
        ids.insert(index, id);
        write_sequence(&tx, Sequence::Tasks, &ids)?;

        let task = owned_task(&tx, owner, id)?;
        tx.commit()?;
        Ok(task)
    }

    /// Apply a partial update.
    ///
    /// When the patch carries `order` or `list_id`, the task is taken out of
    /// its list (which is renumbered), then inserted at the clamped `order`
    /// of the target list (which is renumbered too). Without `order` a moved
    /// task is appended.
    pub async fn update_task(
        &self,
        owner: UserId,
        id: TaskId,
        patch: &TaskPatch,
    ) -> StoreResult<Task> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        let current = owned_task(&tx, owner, id)?;
        let target_list = patch.list_id.unwrap_or(current.list_id);
        if target_list != current.list_id {
            owned_list(&tx, owner, target_list)?;
        }

        let id_text = id.to_string();
        if let Some(title) = &patch.title {
            tx.execute(
                "UPDATE tasks SET title = ?1 WHERE id = ?2",
                params![title, id_text],
            )?;
        }
        if let Some(description) = &patch.description {
            tx.execute(
                "UPDATE tasks SET description = ?1 WHERE id = ?2",
                params![description, id_text],
            )?;
        }
        if let Some(completed) = patch.completed {
            tx.execute(
                "UPDATE tasks SET completed = ?1 WHERE id = ?2",
                params![completed, id_text],
            )?;
        }
        if let Some(priority) = patch.priority {
            tx.execute(
                "UPDATE tasks SET priority = ?1 WHERE id = ?2",
                params![priority.as_str(), id_text],
            )?;
        }
        if let Some(deadline) = &patch.deadline {
            tx.execute(
                "UPDATE tasks SET deadline = ?1 WHERE id = ?2",
                params![deadline.as_ref().map(timestamp), id_text],
            )?;
        }

        if patch.moves() {
            let mut source = task_ids(&tx, current.list_id)?;
            source.retain(|other| *other != id);
            write_sequence(&tx, Sequence::Tasks, &source)?;

            tx.execute(
                "UPDATE tasks SET list_id = ?1 WHERE id = ?2",
                params![target_list.to_string(), id_text],
            )?;
            let mut target = task_ids(&tx, target_list)?;
            target.retain(|other| *other != id);
            let index = insert_index(patch.order, target.len());
            target.insert(index, id);
            write_sequence(&tx, Sequence::Tasks, &target)?;
        }

        tx.execute(
            "UPDATE tasks SET updated_at = ?1 WHERE id = ?2",
            params![timestamp(&Utc::now()), id_text],
        )?;
        let task = owned_task(&tx, owner, id)?;
        tx.commit()?;
        Ok(task)
    }

    pub async fn delete_task(&self, owner: UserId, id: TaskId) -> StoreResult<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        let task = owned_task(&tx, owner, id)?;
        tx.execute("DELETE FROM tasks WHERE id = ?1", params![id.to_string()])?;
        let ids = task_ids(&tx, task.list_id)?;
        write_sequence(&tx, Sequence::Tasks, &ids)?;
        tx.commit()?;
        Ok(())
    }
}
