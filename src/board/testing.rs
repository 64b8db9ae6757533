//! Test fixtures: board builders, an in-memory store and a recording notifier.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::error::SyncError;
use super::planner::MovePlan;
use super::reconcile::{Notice, Notifier, TaskStore};
use super::Board;
use crate::model::{List, ListId, ListPatch, NewList, NewTask, Task, TaskId, TaskPatch};

pub fn task(list_id: ListId, title: &str, order: i64) -> Task {
    let now = Utc::now();
    Task {
        id: Uuid::new_v4(),
        title: title.to_string(),
        description: None,
        completed: false,
        priority: Default::default(),
        deadline: None,
        order,
        list_id,
        created_at: now,
        updated_at: now,
    }
}

pub fn list(title: &str, order: i64) -> List {
    let now = Utc::now();
    List {
        id: Uuid::new_v4(),
        title: title.to_string(),
        order,
        owner_id: Uuid::nil(),
        tasks: Vec::new(),
        created_at: now,
        updated_at: now,
    }
}

/// `board_of(&[("A", &["T1", "T2"]), ("B", &[])])`
pub fn board_of(layout: &[(&str, &[&str])]) -> Board {
    let lists = layout
        .iter()
        .enumerate()
        .map(|(i, (title, tasks))| {
            let mut l = list(title, i as i64);
            l.tasks = tasks
                .iter()
                .enumerate()
                .map(|(j, t)| task(l.id, t, j as i64))
                .collect();
            l
        })
        .collect();
    Board::new(lists)
}

pub fn task_id(board: &Board, title: &str) -> TaskId {
    board
        .lists()
        .iter()
        .flat_map(|l| &l.tasks)
        .find(|t| t.title == title)
        .map(|t| t.id)
        .unwrap_or_else(|| panic!("no task titled {title}"))
}

/// `["T1:0", "T2:1"]` for the list at `index`.
pub fn titles(board: &Board, index: usize) -> Vec<String> {
    board.lists()[index]
        .tasks
        .iter()
        .map(|t| format!("{}:{}", t.title, t.order))
        .collect()
}

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.notices()
            .into_iter()
            .filter_map(|n| match n {
                Notice::Error(message) => Some(message),
                Notice::Success(_) => None,
            })
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }
}

/// Server stand-in with the same repositioning rules as the real backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    board: Mutex<Board>,
    fetches: AtomicUsize,
    updates: AtomicUsize,
    offline: AtomicBool,
    fetches_fail: AtomicBool,
    ignore_list_changes: AtomicBool,
    order_skew: AtomicI64,
    next_update_error: Mutex<Option<SyncError>>,
}

impl MemoryStore {
    pub fn seeded(board: &Board) -> Self {
        Self {
            board: Mutex::new(board.clone()),
            ..Self::default()
        }
    }

    pub fn board(&self) -> Board {
        self.board.lock().unwrap().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Task updates received, failed ones included.
    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    /// Make every fetch fail while writes keep working.
    pub fn fail_fetches(&self) {
        self.fetches_fail.store(true, Ordering::SeqCst);
    }

    pub fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_update(&self, err: SyncError) {
        *self.next_update_error.lock().unwrap() = Some(err);
    }

    /// Report orders shifted by `skew` in update responses.
    pub fn skew_orders(&self, skew: i64) {
        self.order_skew.store(skew, Ordering::SeqCst);
    }

    /// Pretend `listId` in task patches is not understood.
    pub fn ignore_list_changes(&self) {
        self.ignore_list_changes.store(true, Ordering::SeqCst);
    }

    pub fn remove_task(&self, id: TaskId) {
        self.board.lock().unwrap().remove_task(id);
    }

    fn online(&self) -> Result<(), SyncError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(SyncError::Network("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn fetch_lists(&self) -> Result<Vec<List>, SyncError> {
        self.online()?;
        if self.fetches_fail.load(Ordering::SeqCst) {
            return Err(SyncError::Network("fetch timed out".to_string()));
        }
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.board().lists().to_vec())
    }

    async fn create_list(&self, new: &NewList) -> Result<List, SyncError> {
        self.online()?;
        let mut board = self.board.lock().unwrap();
        let created = list(&new.title, board.next_list_order());
        board.push_list(created.clone());
        Ok(created)
    }

    async fn update_list(&self, id: ListId, patch: &ListPatch) -> Result<List, SyncError> {
        self.online()?;
        let mut board = self.board.lock().unwrap();
        if let Some(order) = patch.order {
            board
                .move_list(id, order.max(0) as usize)
                .ok_or_else(|| SyncError::NotFound(format!("list {}", id)))?;
        }
        let mut updated = board
            .list(id)
            .cloned()
            .ok_or_else(|| SyncError::NotFound(format!("list {}", id)))?;
        if let Some(title) = &patch.title {
            updated.title = title.clone();
            board.adopt_list(&updated);
        }
        Ok(updated)
    }

    async fn delete_list(&self, id: ListId) -> Result<(), SyncError> {
        self.online()?;
        self.board
            .lock()
            .unwrap()
            .remove_list(id)
            .map(|_| ())
            .ok_or_else(|| SyncError::NotFound(format!("list {}", id)))
    }

    async fn create_task(&self, list_id: ListId, new: &NewTask) -> Result<Task, SyncError> {
        self.online()?;
        let mut board = self.board.lock().unwrap();
        let order = board
            .next_task_order(list_id)
            .ok_or_else(|| SyncError::NotFound(format!("list {}", list_id)))?;
        let mut created = task(list_id, &new.title, order);
        created.description = new.description.clone();
        created.priority = new.priority;
        created.deadline = new.deadline;
        board.push_task(created.clone());
        Ok(created)
    }

    async fn update_task(&self, id: TaskId, patch: &TaskPatch) -> Result<Task, SyncError> {
        self.online()?;
        self.updates.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.next_update_error.lock().unwrap().take() {
            return Err(err);
        }
        let mut board = self.board.lock().unwrap();
        let pos = board
            .locate(id)
            .ok_or_else(|| SyncError::NotFound(format!("task {}", id)))?;
        let from_list = board.lists()[pos.list].id;

        let mut edited = board.lists()[pos.list].tasks[pos.task].clone();
        if let Some(title) = &patch.title {
            edited.title = title.clone();
        }
        if let Some(description) = &patch.description {
            edited.description = description.clone();
        }
        if let Some(completed) = patch.completed {
            edited.completed = completed;
        }
        if let Some(priority) = patch.priority {
            edited.priority = priority;
        }
        if let Some(deadline) = patch.deadline {
            edited.deadline = deadline;
        }
        edited.updated_at = Utc::now();
        board.adopt_task(edited);

        if patch.moves() {
            let to_list = match patch.list_id {
                Some(list_id) if !self.ignore_list_changes.load(Ordering::SeqCst) => list_id,
                _ => from_list,
            };
            if board.list(to_list).is_none() {
                return Err(SyncError::NotFound(format!("list {}", to_list)));
            }
            let to_index = patch.order.unwrap_or(i64::MAX).max(0);
            board.apply_move(&MovePlan {
                task_id: id,
                from_list,
                from_index: pos.task,
                to_list,
                to_index: usize::try_from(to_index).unwrap_or(usize::MAX),
            });
        }

        let mut updated = board
            .task(id)
            .cloned()
            .ok_or_else(|| SyncError::NotFound(format!("task {}", id)))?;
        updated.order += self.order_skew.load(Ordering::SeqCst);
        Ok(updated)
    }

    async fn delete_task(&self, id: TaskId) -> Result<(), SyncError> {
        self.online()?;
        self.board
            .lock()
            .unwrap()
            .remove_task(id)
            .map(|_| ())
            .ok_or_else(|| SyncError::NotFound(format!("task {}", id)))
    }
}
