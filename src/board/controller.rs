//! Board controller: the owned state object the presentation layer drives.
//!
//! It holds the board, the drag state machine, a storage handle and a
//! notifier. Every mutation goes through one of its methods; the UI renders
//! [`BoardController::board`] after each call.

use uuid::Uuid;

use super::drag::{DragError, DragOutcome, DragPhase, DragSession};
use super::error::SyncError;
use super::reconcile::{self, Notice, Notifier, SyncOutcome, TaskStore};
use super::Board;
use crate::model::{ListId, ListPatch, NewList, NewTask, TaskId, TaskPatch};

/// How a drag gesture ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragResult {
    Cancelled,
    Unchanged,
    Synced(SyncOutcome),
}

pub struct BoardController<S, N> {
    board: Board,
    drag: DragSession,
    store: S,
    notifier: N,
}

impl<S: TaskStore, N: Notifier> BoardController<S, N> {
    pub fn new(store: S, notifier: N) -> Self {
        Self {
            board: Board::default(),
            drag: DragSession::new(),
            store,
            notifier,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn drag_phase(&self) -> DragPhase {
        self.drag.phase()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn fail(&self, what: &str, err: &SyncError) {
        tracing::warn!("Failed to {}: {}", what, err);
        let message = if err.is_auth() {
            "Session expired, please sign in again".to_string()
        } else {
            format!("Failed to {}", what)
        };
        self.notifier.notify(Notice::error(message));
    }

    /// Apply a change to the board. While a drag is open the change lands on
    /// the board the drag plans against, so dropping later cannot undo it.
    fn edit(&mut self, change: impl FnOnce(&mut Board)) {
        self.drag.rebase(&mut self.board, change);
    }

    /// Fetch everything and replace the board.
    async fn resync(&mut self) -> Result<(), SyncError> {
        let lists = self.store.fetch_lists().await?;
        self.edit(|board| board.replace(lists));
        Ok(())
    }

    /// Replace the board with the server's lists.
    pub async fn refresh(&mut self) -> Result<(), SyncError> {
        let result = self.resync().await;
        if let Err(e) = &result {
            self.fail("fetch lists", e);
        }
        result
    }

    // ─────────────────────────────────────────────────────────────────────
    // Lists
    // ─────────────────────────────────────────────────────────────────────

    /// Create a list at the end.
    pub async fn add_list(&mut self, title: &str) -> Result<ListId, SyncError> {
        let new = NewList {
            title: title.to_string(),
            order: Some(self.drag.base(&self.board).next_list_order()),
        };
        match self.store.create_list(&new).await {
            Ok(list) => {
                let id = list.id;
                self.edit(|board| board.push_list(list));
                self.notifier.notify(Notice::success("List created successfully"));
                Ok(id)
            }
            Err(e) => {
                self.fail("create list", &e);
                Err(e)
            }
        }
    }

    pub async fn rename_list(&mut self, id: ListId, title: &str) -> Result<(), SyncError> {
        let patch = ListPatch {
            title: Some(title.to_string()),
            ..ListPatch::default()
        };
        match self.store.update_list(id, &patch).await {
            Ok(list) => {
                self.edit(|board| {
                    board.adopt_list(&list);
                });
                Ok(())
            }
            Err(e) => {
                self.fail("rename list", &e);
                Err(e)
            }
        }
    }

    /// Move a list to `to_index` optimistically, then persist. Cancels an
    /// open task drag first.
    pub async fn move_list(&mut self, id: ListId, to_index: usize) -> SyncOutcome {
        self.drag.cancel(&mut self.board);
        let snapshot = self.board.clone();
        match self.board.move_list(id, to_index) {
            Some(from) if from == to_index.min(self.board.lists().len() - 1) => {
                SyncOutcome::Confirmed
            }
            Some(_) => {
                reconcile::reconcile_list_move(
                    &self.store,
                    &self.notifier,
                    &mut self.board,
                    id,
                    snapshot,
                )
                .await
            }
            None => SyncOutcome::Failed(SyncError::NotFound(format!("list {}", id))),
        }
    }

    pub async fn delete_list(&mut self, id: ListId) -> Result<(), SyncError> {
        match self.store.delete_list(id).await {
            Ok(()) => {
                self.edit(|board| {
                    board.remove_list(id);
                });
                self.notifier.notify(Notice::success("List deleted successfully"));
                Ok(())
            }
            Err(e) => {
                self.fail("delete list", &e);
                Err(e)
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Tasks
    // ─────────────────────────────────────────────────────────────────────

    /// Create a task at the end of `list_id`.
    pub async fn add_task(&mut self, list_id: ListId, mut task: NewTask) -> Result<TaskId, SyncError> {
        task.order = Some(
            self.drag
                .base(&self.board)
                .next_task_order(list_id)
                .unwrap_or(0),
        );
        match self.store.create_task(list_id, &task).await {
            Ok(created) => {
                let id = created.id;
                self.edit(|board| {
                    board.push_task(created);
                });
                self.notifier.notify(Notice::success("Task created successfully"));
                Ok(id)
            }
            Err(e) => {
                self.fail("create task", &e);
                Err(e)
            }
        }
    }

    /// Edit a task. Field edits are taken from the response; a patch that
    /// changes the list triggers a refetch, and so does any failure.
    pub async fn update_task(&mut self, id: TaskId, patch: TaskPatch) -> Result<(), SyncError> {
        match self.store.update_task(id, &patch).await {
            Ok(task) => {
                let mut adopted = false;
                if !patch.moves() {
                    self.edit(|board| adopted = board.adopt_task(task));
                }
                if !adopted {
                    if let Err(e) = self.resync().await {
                        self.fail("refresh lists", &e);
                    }
                }
                Ok(())
            }
            Err(e) => {
                self.fail("update task", &e);
                if !e.is_auth() {
                    if let Err(e) = self.resync().await {
                        tracing::warn!("Resync after failed task update failed: {}", e);
                    }
                }
                Err(e)
            }
        }
    }

    pub async fn delete_task(&mut self, id: TaskId) -> Result<(), SyncError> {
        match self.store.delete_task(id).await {
            Ok(()) => {
                self.edit(|board| {
                    board.remove_task(id);
                });
                self.notifier.notify(Notice::success("Task deleted successfully"));
                Ok(())
            }
            Err(e) => {
                self.fail("delete task", &e);
                Err(e)
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Drag and drop
    // ─────────────────────────────────────────────────────────────────────

    pub fn drag_start(&mut self, task_id: TaskId) -> Result<(), DragError> {
        self.drag.start(&self.board, task_id)
    }

    /// Live preview. Returns true when the board changed.
    pub fn drag_over(&mut self, active: TaskId, over: Uuid) -> bool {
        self.drag.over(&mut self.board, active, over)
    }

    /// Drop. Applies the placement, persists it and reconciles.
    pub async fn drag_end(&mut self, active: TaskId, over: Option<Uuid>) -> DragResult {
        let pending = match self.drag.end(&mut self.board, active, over) {
            DragOutcome::Cancelled => return DragResult::Cancelled,
            DragOutcome::Unchanged => return DragResult::Unchanged,
            DragOutcome::Commit(pending) => pending,
        };
        let outcome =
            reconcile::reconcile_move(&self.store, &self.notifier, &mut self.board, pending).await;
        self.drag.finish();
        DragResult::Synced(outcome)
    }

    pub fn cancel_drag(&mut self) {
        self.drag.cancel(&mut self.board);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::testing::{board_of, task_id, titles, MemoryStore, RecordingNotifier};
    use crate::board::LogNotifier;
    use crate::model::Priority;

    async fn controller_for(board: &Board) -> BoardController<MemoryStore, RecordingNotifier> {
        let mut controller =
            BoardController::new(MemoryStore::seeded(board), RecordingNotifier::default());
        controller.refresh().await.unwrap();
        controller
    }

    #[tokio::test]
    async fn test_cross_list_drag_scenario() {
        let seed = board_of(&[("A", &["T1", "T2"]), ("B", &["T3"])]);
        let mut controller = controller_for(&seed).await;
        let (t1, t3) = (task_id(&seed, "T1"), task_id(&seed, "T3"));

        controller.drag_start(t1).unwrap();
        assert!(controller.drag_over(t1, t3));
        let result = controller.drag_end(t1, Some(t3)).await;

        assert_eq!(result, DragResult::Synced(SyncOutcome::Resynced));
        assert_eq!(controller.drag_phase(), DragPhase::Idle);
        assert_eq!(titles(controller.board(), 0), ["T2:0"]);
        assert_eq!(titles(controller.board(), 1), ["T1:0", "T3:1"]);
    }

    #[tokio::test]
    async fn test_cancelled_drag_restores_board() {
        let seed = board_of(&[("A", &["T1", "T2"]), ("B", &["T3"])]);
        let mut controller = controller_for(&seed).await;
        let before = controller.board().clone();
        let (t1, t3) = (task_id(&seed, "T1"), task_id(&seed, "T3"));

        controller.drag_start(t1).unwrap();
        controller.drag_over(t1, t3);
        controller.cancel_drag();

        assert_eq!(controller.board(), &before);
        assert_eq!(controller.drag_phase(), DragPhase::Idle);
        assert!(controller.drag_start(t1).is_ok());
    }

    #[tokio::test]
    async fn test_crud_appends_and_notifies() {
        let mut controller = controller_for(&Board::default()).await;

        let inbox = controller.add_list("Inbox").await.unwrap();
        let later = controller.add_list("Later").await.unwrap();
        controller.add_task(inbox, NewTask::titled("first")).await.unwrap();
        let second = controller
            .add_task(
                inbox,
                NewTask {
                    priority: Priority::High,
                    ..NewTask::titled("second")
                },
            )
            .await
            .unwrap();

        assert_eq!(controller.board().lists()[1].id, later);
        assert_eq!(titles(controller.board(), 0), ["first:0", "second:1"]);
        assert_eq!(
            controller.board().task(second).unwrap().priority,
            Priority::High
        );
        assert_eq!(controller.board(), &controller.store().board());

        controller.delete_task(second).await.unwrap();
        controller.delete_list(later).await.unwrap();
        assert_eq!(controller.board().task_count(), 1);
        assert_eq!(controller.board().lists().len(), 1);
        assert_eq!(controller.notifier.notices().len(), 6);
    }

    #[tokio::test]
    async fn test_field_edit_keeps_position() {
        let seed = board_of(&[("A", &["T1", "T2"])]);
        let mut controller = controller_for(&seed).await;
        let t2 = task_id(&seed, "T2");

        let patch = TaskPatch {
            completed: Some(true),
            title: Some("done".to_string()),
            ..TaskPatch::default()
        };
        controller.update_task(t2, patch).await.unwrap();

        let task = controller.board().task(t2).unwrap();
        assert!(task.completed);
        assert_eq!(titles(controller.board(), 0), ["T1:0", "done:1"]);
        assert_eq!(controller.store().fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_patch_with_list_change_refetches() {
        let seed = board_of(&[("A", &["T1"]), ("B", &[])]);
        let mut controller = controller_for(&seed).await;
        let t1 = task_id(&seed, "T1");
        let b = seed.lists()[1].id;

        controller
            .update_task(t1, TaskPatch::placement(Some(b), 0))
            .await
            .unwrap();

        assert_eq!(controller.store().fetch_count(), 2);
        assert_eq!(titles(controller.board(), 1), ["T1:0"]);
    }

    #[tokio::test]
    async fn test_failed_delete_notifies() {
        let seed = board_of(&[("A", &["T1"])]);
        let mut controller = controller_for(&seed).await;

        let err = controller.delete_task(Uuid::new_v4()).await.unwrap_err();

        assert!(matches!(err, SyncError::NotFound(_)));
        assert_eq!(controller.notifier.errors(), ["Failed to delete task"]);
        assert_eq!(controller.board().task_count(), 1);
    }

    #[tokio::test]
    async fn test_move_list_persists() {
        let seed = board_of(&[("A", &[]), ("B", &[]), ("C", &[])]);
        let mut controller = controller_for(&seed).await;
        let a = seed.lists()[0].id;

        assert_eq!(controller.move_list(a, 2).await, SyncOutcome::Confirmed);
        assert_eq!(controller.board(), &controller.store().board());
        assert_eq!(controller.board().lists()[2].id, a);

        // Already there: nothing to persist.
        assert_eq!(controller.move_list(a, 5).await, SyncOutcome::Confirmed);
    }

    /// Drag T1 over T3, delete list B mid-drag, then drop on `target`.
    async fn drop_after_target_list_deleted(target: &str) {
        let seed = board_of(&[("A", &["T1", "T2"]), ("B", &["T3"])]);
        let mut controller = controller_for(&seed).await;
        let (t1, t3) = (task_id(&seed, "T1"), task_id(&seed, "T3"));
        let b = seed.lists()[1].id;

        controller.drag_start(t1).unwrap();
        controller.drag_over(t1, t3);
        controller.delete_list(b).await.unwrap();
        assert_eq!(titles(controller.board(), 0), ["T1:0", "T2:1"]);

        let over = if target == "list" { b } else { t3 };
        let result = controller.drag_end(t1, Some(over)).await;

        assert_eq!(result, DragResult::Cancelled, "drop on deleted {target}");
        assert_eq!(controller.drag_phase(), DragPhase::Idle);
        assert_eq!(controller.store().update_count(), 0);
        assert_eq!(controller.board(), &controller.store().board());
        assert!(controller.notifier.errors().is_empty());
    }

    #[tokio::test]
    async fn test_drop_on_list_deleted_mid_drag_cancels() {
        drop_after_target_list_deleted("list").await;
    }

    #[tokio::test]
    async fn test_drop_on_task_of_list_deleted_mid_drag_cancels() {
        drop_after_target_list_deleted("task").await;
    }

    #[tokio::test]
    async fn test_aborted_drag_keeps_mid_drag_deletion() {
        let seed = board_of(&[("A", &["T1"]), ("B", &["T2"]), ("C", &[])]);
        let mut controller = controller_for(&seed).await;
        let t1 = task_id(&seed, "T1");
        let (b, c) = (seed.lists()[1].id, seed.lists()[2].id);

        controller.drag_start(t1).unwrap();
        controller.delete_list(b).await.unwrap();
        assert_eq!(controller.drag_end(t1, None).await, DragResult::Cancelled);
        assert!(controller.board().list(b).is_none());
        assert_eq!(controller.board(), &controller.store().board());

        controller.drag_start(t1).unwrap();
        controller.drag_over(t1, c);
        controller.delete_list(c).await.unwrap();
        controller.cancel_drag();
        assert!(controller.board().list(c).is_none());
        assert_eq!(controller.board(), &controller.store().board());
        assert_eq!(controller.store().update_count(), 0);
    }

    #[tokio::test]
    async fn test_refresh_mid_drag_keeps_preview() {
        let seed = board_of(&[("A", &["T1", "T2"]), ("B", &["T3"])]);
        let mut controller = controller_for(&seed).await;
        let (t1, t2, t3) = (
            task_id(&seed, "T1"),
            task_id(&seed, "T2"),
            task_id(&seed, "T3"),
        );

        controller.drag_start(t1).unwrap();
        controller.drag_over(t1, t3);
        // Someone else deletes T2 on the server.
        controller.store().remove_task(t2);
        controller.refresh().await.unwrap();

        assert!(titles(controller.board(), 0).is_empty());
        assert_eq!(titles(controller.board(), 1), ["T1:0", "T3:1"]);

        let result = controller.drag_end(t1, Some(t3)).await;
        assert_eq!(result, DragResult::Synced(SyncOutcome::Resynced));
        assert_eq!(controller.board(), &controller.store().board());
        assert!(titles(controller.board(), 0).is_empty());
    }

    #[tokio::test]
    async fn test_task_added_mid_drag_lands_at_end() {
        let seed = board_of(&[("A", &["T1", "T2"]), ("B", &["T3"])]);
        let mut controller = controller_for(&seed).await;
        let (t1, t3) = (task_id(&seed, "T1"), task_id(&seed, "T3"));
        let a = seed.lists()[0].id;

        controller.drag_start(t1).unwrap();
        controller.drag_over(t1, t3);
        controller.add_task(a, NewTask::titled("T4")).await.unwrap();

        assert_eq!(titles(controller.board(), 0), ["T2:0", "T4:1"]);
        controller.cancel_drag();
        assert_eq!(titles(controller.board(), 0), ["T1:0", "T2:1", "T4:2"]);
        assert_eq!(controller.board(), &controller.store().board());
    }

    #[tokio::test]
    async fn test_deleting_dragged_task_ends_drag() {
        let seed = board_of(&[("A", &["T1", "T2"]), ("B", &["T3"])]);
        let mut controller = controller_for(&seed).await;
        let (t1, t3) = (task_id(&seed, "T1"), task_id(&seed, "T3"));

        controller.drag_start(t1).unwrap();
        controller.drag_over(t1, t3);
        controller.delete_task(t1).await.unwrap();

        assert_eq!(controller.drag_phase(), DragPhase::Idle);
        assert_eq!(controller.drag_end(t1, Some(t3)).await, DragResult::Cancelled);
        assert_eq!(titles(controller.board(), 0), ["T2:0"]);
        assert_eq!(titles(controller.board(), 1), ["T3:0"]);
        assert_eq!(controller.store().update_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_refresh_after_update_notifies() {
        let seed = board_of(&[("A", &["T1"]), ("B", &[])]);
        let mut controller = controller_for(&seed).await;
        let t1 = task_id(&seed, "T1");
        let b = seed.lists()[1].id;
        controller.store().fail_fetches();

        controller
            .update_task(t1, TaskPatch::placement(Some(b), 0))
            .await
            .unwrap();

        assert_eq!(controller.notifier.errors(), ["Failed to refresh lists"]);
        assert_eq!(titles(&controller.store().board(), 1), ["T1:0"]);
    }

    #[tokio::test]
    async fn test_log_notifier_drives_controller() {
        let seed = board_of(&[("A", &["T1"])]);
        let mut controller = BoardController::new(MemoryStore::seeded(&seed), LogNotifier);
        controller.refresh().await.unwrap();

        let list = controller.add_list("Later").await.unwrap();
        assert!(controller.delete_task(Uuid::new_v4()).await.is_err());
        controller.delete_list(list).await.unwrap();

        assert_eq!(controller.board(), &controller.store().board());
    }
}
