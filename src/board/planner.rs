//! Move planner: where does a task land when dropped on a target?
//!
//! The drop target (`over`) names either a task, meaning "insert at that
//! task's index", or a list, meaning "append to that list". Planning is pure;
//! [`Board::apply_move`] performs the placement.

use thiserror::Error;
use uuid::Uuid;

use super::Board;
use crate::model::{ListId, TaskId};

/// A resolved placement for one task.
///
/// `to_index` follows remove-then-insert semantics: the task is taken out of
/// its list first, then inserted at `to_index` of the target list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovePlan {
    pub task_id: TaskId,
    pub from_list: ListId,
    pub from_index: usize,
    pub to_list: ListId,
    pub to_index: usize,
}

impl MovePlan {
    pub fn is_cross_list(&self) -> bool {
        self.from_list != self.to_list
    }

    /// True when applying the plan would leave the task where it is.
    pub fn is_noop(&self) -> bool {
        !self.is_cross_list() && self.from_index == self.to_index
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("task {0} is not on the board")]
    UnknownTask(TaskId),

    #[error("drop target {0} is neither a task nor a list on the board")]
    UnknownTarget(Uuid),
}

/// Plan moving `active` onto `over`.
///
/// Returns `Ok(None)` when the drop changes nothing: dropping a task onto
/// itself, or onto its current slot.
pub fn plan_move(board: &Board, active: TaskId, over: Uuid) -> Result<Option<MovePlan>, PlanError> {
    let from = board.locate(active).ok_or(PlanError::UnknownTask(active))?;
    if over == active {
        return Ok(None);
    }

    let (to_list, over_index) = match board.locate(over) {
        Some(pos) => (pos.list, Some(pos.task)),
        None => {
            let list = board
                .list_index(over)
                .ok_or(PlanError::UnknownTarget(over))?;
            (list, None)
        }
    };

    let lists = board.lists();
    let to_index = if to_list == from.list {
        // Empty space of the task's own list means "to the end"; after the
        // removal the last slot is len - 1.
        over_index.unwrap_or(lists[from.list].tasks.len() - 1)
    } else {
        over_index.unwrap_or(lists[to_list].tasks.len())
    };

    let plan = MovePlan {
        task_id: active,
        from_list: lists[from.list].id,
        from_index: from.task,
        to_list: lists[to_list].id,
        to_index,
    };
    Ok((!plan.is_noop()).then_some(plan))
}
