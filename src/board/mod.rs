//! Ordering & move engine.
//!
//! The board is the client-side copy of a user's lists and tasks. It is
//! owned by a [`BoardController`] and only changes through a narrow API:
//! placements computed by the [planner](planner), optimistic application,
//! and reconciliation against the server.
//!
//! ```text
//!  drag gesture ──▶ planner ──▶ Board::apply_move ──▶ TaskStore::update_task
//!                                  (optimistic)               │
//!                                       ▲                     ▼
//!                                       └──── reconcile (commit / resync / rollback)
//! ```

pub mod controller;
pub mod drag;
pub mod error;
pub mod order;
pub mod planner;
pub mod reconcile;

#[cfg(test)]
pub(crate) mod testing;

pub use controller::{BoardController, DragResult};
pub use drag::{DragError, DragOutcome, DragPhase, DragSession, PendingMove};
pub use error::SyncError;
pub use order::{renumber, renumbered, sort_by_order, Ordered};
pub use planner::{plan_move, MovePlan, PlanError};
pub use reconcile::{LogNotifier, Notice, Notifier, SyncOutcome, TaskStore};

use crate::model::{List, ListId, Task, TaskId};

/// Where a task currently sits: indices into the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskPosition {
    pub list: usize,
    pub task: usize,
}

/// Ordered lists, each holding its ordered tasks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Board {
    lists: Vec<List>,
}

impl Board {
    /// Build a board from server rows, sorting lists and tasks by order.
    pub fn new(lists: Vec<List>) -> Self {
        let mut board = Self { lists };
        board.sort();
        board
    }

    fn sort(&mut self) {
        sort_by_order(&mut self.lists);
        for list in &mut self.lists {
            sort_by_order(&mut list.tasks);
        }
    }

    pub fn lists(&self) -> &[List] {
        &self.lists
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    pub fn list(&self, id: ListId) -> Option<&List> {
        self.lists.iter().find(|l| l.id == id)
    }

    pub fn list_index(&self, id: ListId) -> Option<usize> {
        self.lists.iter().position(|l| l.id == id)
    }

    pub fn locate(&self, task_id: TaskId) -> Option<TaskPosition> {
        self.lists.iter().enumerate().find_map(|(list, l)| {
            l.tasks
                .iter()
                .position(|t| t.id == task_id)
                .map(|task| TaskPosition { list, task })
        })
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.locate(id)
            .map(|pos| &self.lists[pos.list].tasks[pos.task])
    }

    pub fn task_count(&self) -> usize {
        self.lists.iter().map(|l| l.tasks.len()).sum()
    }

    /// Order a new list gets when appended.
    pub fn next_list_order(&self) -> i64 {
        self.lists.len() as i64
    }

    /// Order a new task gets when appended to `list_id`.
    pub fn next_task_order(&self, list_id: ListId) -> Option<i64> {
        self.list(list_id).map(|l| l.tasks.len() as i64)
    }

    /// Replace everything with an authoritative fetch.
    pub fn replace(&mut self, lists: Vec<List>) {
        *self = Self::new(lists);
    }

    /// Apply a placement. Returns false (and leaves the board untouched)
    /// when the task or the target list is gone.
    pub fn apply_move(&mut self, plan: &MovePlan) -> bool {
        let Some(to) = self.list_index(plan.to_list) else {
            return false;
        };
        let Some(pos) = self.locate(plan.task_id) else {
            return false;
        };

        let mut task = self.lists[pos.list].tasks.remove(pos.task);
        renumber(&mut self.lists[pos.list].tasks);

        task.list_id = plan.to_list;
        let tasks = &mut self.lists[to].tasks;
        let index = plan.to_index.min(tasks.len());
        tasks.insert(index, task);
        renumber(tasks);
        true
    }

    /// Move a list to `to_index` among the lists. Returns the old index.
    pub fn move_list(&mut self, list_id: ListId, to_index: usize) -> Option<usize> {
        let from = self.list_index(list_id)?;
        let list = self.lists.remove(from);
        let index = to_index.min(self.lists.len());
        self.lists.insert(index, list);
        renumber(&mut self.lists);
        Some(from)
    }

    /// Append a list created by the server.
    pub fn push_list(&mut self, list: List) {
        self.lists.push(list);
        renumber(&mut self.lists);
    }

    pub fn remove_list(&mut self, id: ListId) -> Option<List> {
        let index = self.list_index(id)?;
        let list = self.lists.remove(index);
        renumber(&mut self.lists);
        Some(list)
    }

    /// Overwrite a list's non-positional fields (title, timestamps).
    pub fn adopt_list(&mut self, list: &List) -> bool {
        match self.lists.iter_mut().find(|l| l.id == list.id) {
            Some(local) => {
                local.title = list.title.clone();
                local.updated_at = list.updated_at;
                true
            }
            None => false,
        }
    }

    /// Append a task to the list named by its `list_id`.
    pub fn push_task(&mut self, task: Task) -> bool {
        let Some(index) = self.list_index(task.list_id) else {
            return false;
        };
        let tasks = &mut self.lists[index].tasks;
        tasks.push(task);
        renumber(tasks);
        true
    }

    pub fn remove_task(&mut self, id: TaskId) -> Option<Task> {
        let pos = self.locate(id)?;
        let tasks = &mut self.lists[pos.list].tasks;
        let task = tasks.remove(pos.task);
        renumber(tasks);
        Some(task)
    }

    /// Overwrite a task with a server copy while keeping its local position.
    ///
    /// Returns false when the task is unknown or the server copy lives in a
    /// different list.
    pub fn adopt_task(&mut self, task: Task) -> bool {
        let Some(pos) = self.locate(task.id) else {
            return false;
        };
        let local = &mut self.lists[pos.list].tasks[pos.task];
        if local.list_id != task.list_id {
            return false;
        }
        let order = local.order;
        *local = Task { order, ..task };
        true
    }
}
