//! Drag gesture state machine.
//!
//! ```text
//!   Idle ──start──▶ Dragging ──over──▶ Previewing ──end──▶ Committing ──finish──▶ Idle
//!                      │                    │
//!                      └──────end (no target / nothing changed)──────────────────▶ Idle
//! ```
//!
//! Every placement, preview or final, is planned against the base board taken
//! at drag start. Previews are therefore idempotent: replaying the same
//! drag-over event yields the same board, so bursts of pointer events can be
//! coalesced freely. Changes made while a drag is open (a refresh, a deleted
//! list) go through [`DragSession::rebase`] so the base stays current.

use thiserror::Error;
use uuid::Uuid;

use super::planner::{plan_move, MovePlan};
use super::Board;
use crate::model::{ListId, TaskId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DragPhase {
    #[default]
    Idle,
    Dragging,
    Previewing,
    Committing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DragError {
    #[error("a drag is already in progress ({0:?})")]
    Busy(DragPhase),

    #[error("task {0} is not on the board")]
    UnknownTask(TaskId),
}

/// A placement already applied locally and waiting for the server.
#[derive(Debug, Clone)]
pub struct PendingMove {
    pub plan: MovePlan,
    /// Order the task holds after the local placement.
    pub expected_order: i64,
    /// Board as it was before the drag, for rollback.
    pub snapshot: Board,
}

#[derive(Debug, Clone)]
pub enum DragOutcome {
    /// No drop target, an unresolvable one, or no drag in progress. The
    /// pre-drag board is back in place.
    Cancelled,
    /// The drop resolved to the task's current slot.
    Unchanged,
    /// The placement is applied locally and must be persisted.
    Commit(PendingMove),
}

#[derive(Debug, Clone)]
struct Gesture {
    active: TaskId,
    source_list: ListId,
    snapshot: Board,
    preview: Option<MovePlan>,
    /// Last target hovered, replanned on rebase.
    hover: Option<Uuid>,
}

/// One drag at a time.
#[derive(Debug, Default)]
pub struct DragSession {
    phase: DragPhase,
    gesture: Option<Gesture>,
}

impl DragSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> DragPhase {
        self.phase
    }

    pub fn active_task(&self) -> Option<TaskId> {
        self.gesture.as_ref().map(|g| g.active)
    }

    pub fn source_list(&self) -> Option<ListId> {
        self.gesture.as_ref().map(|g| g.source_list)
    }

    /// Idle → Dragging.
    pub fn start(&mut self, board: &Board, task_id: TaskId) -> Result<(), DragError> {
        if self.phase != DragPhase::Idle {
            return Err(DragError::Busy(self.phase));
        }
        let task = board.task(task_id).ok_or(DragError::UnknownTask(task_id))?;

        self.gesture = Some(Gesture {
            active: task_id,
            source_list: task.list_id,
            snapshot: board.clone(),
            preview: None,
            hover: None,
        });
        self.phase = DragPhase::Dragging;
        Ok(())
    }

    /// Dragging/Previewing → Previewing. Rewrites `board` with the tentative
    /// placement; returns true when the board changed.
    pub fn over(&mut self, board: &mut Board, active: TaskId, over: Uuid) -> bool {
        if !matches!(self.phase, DragPhase::Dragging | DragPhase::Previewing) {
            return false;
        }
        let Some(gesture) = self.gesture.as_mut() else {
            return false;
        };
        if gesture.active != active || over == active {
            // Hovering the dragged task itself keeps whatever preview is showing.
            return false;
        }

        let plan = match plan_move(&gesture.snapshot, active, over) {
            Ok(plan) => plan,
            Err(e) => {
                tracing::debug!("Ignoring drag-over: {}", e);
                return false;
            }
        };
        self.phase = DragPhase::Previewing;
        gesture.hover = Some(over);
        if plan == gesture.preview {
            return false;
        }

        *board = gesture.snapshot.clone();
        if let Some(plan) = &plan {
            board.apply_move(plan);
        }
        gesture.preview = plan;
        true
    }

    /// Dragging/Previewing → Committing (or Idle when there is nothing to
    /// persist). `over == None` means the drop landed outside any target.
    pub fn end(&mut self, board: &mut Board, active: TaskId, over: Option<Uuid>) -> DragOutcome {
        if !matches!(self.phase, DragPhase::Dragging | DragPhase::Previewing) {
            return DragOutcome::Cancelled;
        }
        let Some(gesture) = self.gesture.take() else {
            self.phase = DragPhase::Idle;
            return DragOutcome::Cancelled;
        };
        if gesture.active != active {
            tracing::debug!(
                "Drag end for {} does not match active task {}",
                active,
                gesture.active
            );
            *board = gesture.snapshot;
            self.phase = DragPhase::Idle;
            return DragOutcome::Cancelled;
        }

        let plan = match over {
            None => Err(()),
            Some(over) if over == active => Ok(gesture.preview),
            Some(over) => plan_move(&gesture.snapshot, active, over).map_err(|e| {
                tracing::debug!("Cancelling drop: {}", e);
            }),
        };

        *board = gesture.snapshot.clone();
        let plan = match plan {
            Ok(Some(plan)) => plan,
            Ok(None) => {
                self.phase = DragPhase::Idle;
                return DragOutcome::Unchanged;
            }
            Err(()) => {
                self.phase = DragPhase::Idle;
                return DragOutcome::Cancelled;
            }
        };

        if !board.apply_move(&plan) {
            self.phase = DragPhase::Idle;
            return DragOutcome::Cancelled;
        }
        let expected_order = board
            .task(plan.task_id)
            .map(|t| t.order)
            .unwrap_or(plan.to_index as i64);

        self.phase = DragPhase::Committing;
        DragOutcome::Commit(PendingMove {
            plan,
            expected_order,
            snapshot: gesture.snapshot,
        })
    }

    /// The board without the preview: the drag's base while one is open,
    /// `board` otherwise.
    pub fn base<'a>(&'a self, board: &'a Board) -> &'a Board {
        match &self.gesture {
            Some(gesture) => &gesture.snapshot,
            None => board,
        }
    }

    /// Apply `change` to the board the drag plans against, then redraw the
    /// current preview on top of it. Outside Dragging/Previewing the change
    /// goes straight to `board`.
    ///
    /// If the dragged task is gone afterwards the drag is cancelled. A hover
    /// target that vanished drops the preview.
    pub fn rebase(&mut self, board: &mut Board, change: impl FnOnce(&mut Board)) {
        let dragging = matches!(self.phase, DragPhase::Dragging | DragPhase::Previewing);
        let Some(gesture) = self.gesture.as_mut().filter(|_| dragging) else {
            change(board);
            return;
        };
        change(&mut gesture.snapshot);

        let Some(source_list) = gesture.snapshot.task(gesture.active).map(|t| t.list_id) else {
            tracing::debug!("Dragged task {} vanished, cancelling drag", gesture.active);
            self.cancel(board);
            return;
        };
        gesture.source_list = source_list;
        gesture.preview = gesture.hover.and_then(|over| {
            plan_move(&gesture.snapshot, gesture.active, over)
                .ok()
                .flatten()
        });
        if gesture.preview.is_none() {
            gesture.hover = None;
        }

        *board = gesture.snapshot.clone();
        if let Some(plan) = &gesture.preview {
            board.apply_move(plan);
        }
    }

    /// Committing → Idle, once reconciliation resolved.
    pub fn finish(&mut self) {
        self.phase = DragPhase::Idle;
        self.gesture = None;
    }

    /// Abort whatever is in progress, restoring the pre-drag board.
    pub fn cancel(&mut self, board: &mut Board) {
        if let Some(gesture) = self.gesture.take() {
            *board = gesture.snapshot;
        }
        self.phase = DragPhase::Idle;
    }
}
