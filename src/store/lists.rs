use std::collections::HashMap;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::tasks::{task_from_row, TASK_COLUMNS};
use super::{
    insert_index, time_column, timestamp, uuid_column, write_sequence, Sequence, Store,
    StoreError, StoreResult,
};
use crate::model::{List, ListId, ListPatch, UserId};

const LIST_COLUMNS: &str = "id, title, sort_order, owner_id, created_at, updated_at";

fn list_from_row(row: &Row<'_>) -> rusqlite::Result<List> {
    Ok(List {
        id: uuid_column(0, row.get(0)?)?,
        title: row.get(1)?,
        order: row.get(2)?,
        owner_id: uuid_column(3, row.get(3)?)?,
        tasks: Vec::new(),
        created_at: time_column(4, row.get(4)?)?,
        updated_at: time_column(5, row.get(5)?)?,
    })
}

/// A list owned by `owner`, without its tasks.
pub(crate) fn owned_list(conn: &Connection, owner: UserId, id: ListId) -> StoreResult<List> {
    conn.query_row(
        &format!("SELECT {LIST_COLUMNS} FROM lists WHERE id = ?1 AND owner_id = ?2"),
        params![id.to_string(), owner.to_string()],
        list_from_row,
    )
    .optional()?
    .ok_or_else(|| StoreError::NotFound(format!("List {}", id)))
}

/// The owner's list ids in display order.
fn list_ids(conn: &Connection, owner: UserId) -> StoreResult<Vec<ListId>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id FROM lists WHERE owner_id = ?1 ORDER BY sort_order, id",
    )?;
    let ids = stmt
        .query_map(params![owner.to_string()], |row| uuid_column(0, row.get(0)?))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(ids)
}

fn with_tasks(conn: &Connection, mut list: List) -> StoreResult<List> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks WHERE list_id = ?1 ORDER BY sort_order, id"
    ))?;
    list.tasks = stmt
        .query_map(params![list.id.to_string()], task_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(list)
}

impl Store {
    /// All of `owner`'s lists in order, each with its ordered tasks.
    pub async fn lists_for_user(&self, owner: UserId) -> StoreResult<Vec<List>> {
        let conn = self.conn.lock().await;

        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {LIST_COLUMNS} FROM lists WHERE owner_id = ?1 ORDER BY sort_order, id"
        ))?;
        let mut lists = stmt
            .query_map(params![owner.to_string()], list_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let task_columns = TASK_COLUMNS
            .split(", ")
            .map(|c| format!("t.{c}"))
            .collect::<Vec<_>>()
            .join(", ");
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {task_columns} FROM tasks t JOIN lists l ON l.id = t.list_id
             WHERE l.owner_id = ?1 ORDER BY t.sort_order, t.id"
        ))?;
        let mut by_list: HashMap<ListId, Vec<_>> = HashMap::new();
        for task in stmt.query_map(params![owner.to_string()], task_from_row)? {
            let task = task?;
            by_list.entry(task.list_id).or_default().push(task);
        }
        for list in &mut lists {
            list.tasks = by_list.remove(&list.id).unwrap_or_default();
        }
        Ok(lists)
    }

    pub async fn get_list(&self, owner: UserId, id: ListId) -> StoreResult<List> {
        let conn = self.conn.lock().await;
        let list = owned_list(&conn, owner, id)?;
        with_tasks(&conn, list)
    }

    /// Create a list at `order` (clamped), appending when absent.
    pub async fn create_list(
        &self,
        owner: UserId,
        title: &str,
        order: Option<i64>,
    ) -> StoreResult<List> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        let now = Utc::now();
        let id = Uuid::new_v4();
        tx.execute(
            "INSERT INTO lists (id, owner_id, title, sort_order, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![
                id.to_string(),
                owner.to_string(),
                title,
                i64::MAX,
                timestamp(&now)
            ],
        )?;

        let mut ids = list_ids(&tx, owner)?;
        ids.retain(|other| *other != id);
        let index = insert_index(order, ids.len());
        ids.insert(index, id);
        write_sequence(&tx, Sequence::Lists, &ids)?;

        let list = owned_list(&tx, owner, id)?;
        tx.commit()?;
        Ok(list)
    }

    /// Rename and/or reposition a list among the owner's lists.
    pub async fn update_list(
        &self,
        owner: UserId,
        id: ListId,
        patch: &ListPatch,
    ) -> StoreResult<List> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        owned_list(&tx, owner, id)?;

        if let Some(title) = &patch.title {
            tx.execute(
                "UPDATE lists SET title = ?1 WHERE id = ?2",
                params![title, id.to_string()],
            )?;
        }
        if patch.order.is_some() {
            let mut ids = list_ids(&tx, owner)?;
            ids.retain(|other| *other != id);
            let index = insert_index(patch.order, ids.len());
            ids.insert(index, id);
            write_sequence(&tx, Sequence::Lists, &ids)?;
        }
        tx.execute(
            "UPDATE lists SET updated_at = ?1 WHERE id = ?2",
            params![timestamp(&Utc::now()), id.to_string()],
        )?;

        let list = with_tasks(&tx, owned_list(&tx, owner, id)?)?;
        tx.commit()?;
        Ok(list)
    }

    /// Delete a list and, by cascade, its tasks.
    pub async fn delete_list(&self, owner: UserId, id: ListId) -> StoreResult<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        let deleted = tx.execute(
            "DELETE FROM lists WHERE id = ?1 AND owner_id = ?2",
            params![id.to_string(), owner.to_string()],
        )?;
        if deleted == 0 {
            return Err(StoreError::NotFound(format!("List {}", id)));
        }
        let ids = list_ids(&tx, owner)?;
        write_sequence(&tx, Sequence::Lists, &ids)?;
        tx.commit()?;
        Ok(())
    }
}
