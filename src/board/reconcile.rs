//! Reconciliation of optimistic placements with the server.
//!
//! A placement is applied locally first, then persisted with exactly one
//! request. Afterwards:
//!
//! - same-list reorder confirmed with the expected order: done, no refetch
//! - move across lists confirmed: refetch, since one task row cannot carry
//!   the renumbering of two sibling lists
//! - response disagrees with the local placement: refetch
//! - any failure: notify once, refetch; if the refetch fails too, restore
//!   the pre-drag snapshot. Authentication failures skip the refetch.

use async_trait::async_trait;

use super::drag::PendingMove;
use super::error::SyncError;
use super::Board;
use crate::model::{List, ListId, ListPatch, NewList, NewTask, Task, TaskId, TaskPatch};

/// The persistence side the engine talks to.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// All of the user's lists, each embedding its tasks.
    async fn fetch_lists(&self) -> Result<Vec<List>, SyncError>;

    async fn create_list(&self, list: &NewList) -> Result<List, SyncError>;

    async fn update_list(&self, id: ListId, patch: &ListPatch) -> Result<List, SyncError>;

    async fn delete_list(&self, id: ListId) -> Result<(), SyncError>;

    async fn create_task(&self, list_id: ListId, task: &NewTask) -> Result<Task, SyncError>;

    async fn update_task(&self, id: TaskId, patch: &TaskPatch) -> Result<Task, SyncError>;

    async fn delete_task(&self, id: TaskId) -> Result<(), SyncError>;
}

/// A transient, user-visible message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Success(String),
    Error(String),
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self::Success(message.into())
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }
}

/// Where notices go (toasts in a UI, the log otherwise).
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Writes notices to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: Notice) {
        match notice {
            Notice::Success(message) => tracing::info!("{}", message),
            Notice::Error(message) => tracing::warn!("{}", message),
        }
    }
}

/// How a persisted placement ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Server agreed; local state kept.
    Confirmed,
    /// Server agreed; local state refreshed from a full fetch.
    Resynced,
    /// The optimistic change was discarded.
    Failed(SyncError),
}

/// Replace the board with a full fetch.
pub async fn resync<S>(store: &S, board: &mut Board) -> Result<(), SyncError>
where
    S: TaskStore + ?Sized,
{
    let lists = store.fetch_lists().await?;
    board.replace(lists);
    Ok(())
}

fn failure_message(err: &SyncError, what: &str) -> String {
    if err.is_auth() {
        "Session expired, please sign in again".to_string()
    } else {
        format!("Failed to {}", what)
    }
}

/// Discard an optimistic change after a failure: refetch, or fall back to
/// the snapshot when that is impossible.
async fn discard<S>(store: &S, board: &mut Board, snapshot: Board, err: &SyncError)
where
    S: TaskStore + ?Sized,
{
    if err.is_auth() {
        *board = snapshot;
        return;
    }
    if let Err(e) = resync(store, board).await {
        tracing::warn!("Resync after failed update also failed: {}", e);
        *board = snapshot;
    }
}

/// Persist a placement already applied to `board` and reconcile.
pub async fn reconcile_move<S, N>(
    store: &S,
    notifier: &N,
    board: &mut Board,
    pending: PendingMove,
) -> SyncOutcome
where
    S: TaskStore + ?Sized,
    N: Notifier + ?Sized,
{
    let PendingMove {
        plan,
        expected_order,
        snapshot,
    } = pending;
    let cross_list = plan.is_cross_list();
    let patch = TaskPatch::placement(cross_list.then_some(plan.to_list), expected_order);

    let task = match store.update_task(plan.task_id, &patch).await {
        Ok(task) => task,
        Err(err) => {
            tracing::warn!("Persisting move of task {} failed: {}", plan.task_id, err);
            notifier.notify(Notice::error(failure_message(&err, "move task")));
            discard(store, board, snapshot, &err).await;
            return SyncOutcome::Failed(err);
        }
    };

    if task.list_id != plan.to_list {
        let err = SyncError::Mismatch(format!(
            "task {} is in list {} on the server, expected {}",
            task.id, task.list_id, plan.to_list
        ));
        tracing::warn!("{}", err);
        notifier.notify(Notice::error(failure_message(&err, "move task")));
        discard(store, board, snapshot, &err).await;
        return SyncOutcome::Failed(err);
    }

    let order_agrees = task.order == expected_order;
    board.adopt_task(task);
    if !cross_list && order_agrees {
        return SyncOutcome::Confirmed;
    }

    if !order_agrees {
        tracing::debug!(
            "Server placed task {} at a different order than {}, resyncing",
            plan.task_id,
            expected_order
        );
    }
    match resync(store, board).await {
        Ok(()) => SyncOutcome::Resynced,
        Err(err) => {
            // The move itself was persisted; keep the optimistic board.
            tracing::warn!("Resync after move failed: {}", err);
            notifier.notify(Notice::error(failure_message(&err, "refresh lists")));
            SyncOutcome::Failed(err)
        }
    }
}

/// Persist a list reorder already applied to `board` and reconcile.
pub async fn reconcile_list_move<S, N>(
    store: &S,
    notifier: &N,
    board: &mut Board,
    list_id: ListId,
    snapshot: Board,
) -> SyncOutcome
where
    S: TaskStore + ?Sized,
    N: Notifier + ?Sized,
{
    let Some(expected_order) = board.list(list_id).map(|l| l.order) else {
        *board = snapshot;
        return SyncOutcome::Failed(SyncError::NotFound(format!("list {}", list_id)));
    };
    let patch = ListPatch {
        order: Some(expected_order),
        ..ListPatch::default()
    };

    match store.update_list(list_id, &patch).await {
        Ok(list) if list.order == expected_order => {
            board.adopt_list(&list);
            SyncOutcome::Confirmed
        }
        Ok(_) => match resync(store, board).await {
            Ok(()) => SyncOutcome::Resynced,
            Err(err) => {
                tracing::warn!("Resync after list move failed: {}", err);
                notifier.notify(Notice::error(failure_message(&err, "refresh lists")));
                SyncOutcome::Failed(err)
            }
        },
        Err(err) => {
            tracing::warn!("Persisting move of list {} failed: {}", list_id, err);
            notifier.notify(Notice::error(failure_message(&err, "move list")));
            discard(store, board, snapshot, &err).await;
            SyncOutcome::Failed(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::drag::{DragOutcome, DragSession};
    use crate::board::testing::{board_of, task_id, titles, MemoryStore, RecordingNotifier};

    async fn drop_and_sync(
        store: &MemoryStore,
        notifier: &RecordingNotifier,
        board: &mut Board,
        active: &str,
        over: uuid::Uuid,
    ) -> SyncOutcome {
        let active = task_id(board, active);
        let mut drag = DragSession::new();
        drag.start(board, active).unwrap();
        drag.over(board, active, over);
        let DragOutcome::Commit(pending) = drag.end(board, active, Some(over)) else {
            panic!("expected a commit");
        };
        let outcome = reconcile_move(store, notifier, board, pending).await;
        drag.finish();
        outcome
    }

    #[tokio::test]
    async fn test_same_list_reorder_confirms_without_fetch() {
        let mut board = board_of(&[("A", &["T1", "T2", "T3"])]);
        let store = MemoryStore::seeded(&board);
        let notifier = RecordingNotifier::default();
        let t1 = task_id(&board, "T1");

        let outcome = drop_and_sync(&store, &notifier, &mut board, "T3", t1).await;

        assert_eq!(outcome, SyncOutcome::Confirmed);
        assert_eq!(store.fetch_count(), 0);
        assert_eq!(titles(&board, 0), ["T3:0", "T1:1", "T2:2"]);
        assert_eq!(store.board().lists()[0], board.lists()[0]);
        assert!(notifier.notices().is_empty());
    }

    #[tokio::test]
    async fn test_cross_list_move_resyncs() {
        let mut board = board_of(&[("A", &["T1", "T2"]), ("B", &["T3"])]);
        let store = MemoryStore::seeded(&board);
        let notifier = RecordingNotifier::default();
        let t3 = task_id(&board, "T3");

        let outcome = drop_and_sync(&store, &notifier, &mut board, "T1", t3).await;

        assert_eq!(outcome, SyncOutcome::Resynced);
        assert_eq!(store.fetch_count(), 1);
        assert_eq!(titles(&board, 0), ["T2:0"]);
        assert_eq!(titles(&board, 1), ["T1:0", "T3:1"]);
        assert_eq!(board, store.board());
    }

    #[tokio::test]
    async fn test_network_failure_reverts_and_notifies_once() {
        let mut board = board_of(&[("A", &["T1", "T2"]), ("B", &["T3"])]);
        let before = board.clone();
        let store = MemoryStore::seeded(&board);
        store.fail_next_update(SyncError::Network("connection refused".into()));
        let notifier = RecordingNotifier::default();
        let t3 = task_id(&board, "T3");

        let outcome = drop_and_sync(&store, &notifier, &mut board, "T1", t3).await;

        assert!(matches!(outcome, SyncOutcome::Failed(SyncError::Network(_))));
        assert_eq!(board, before);
        assert_eq!(notifier.errors(), ["Failed to move task"]);
    }

    #[tokio::test]
    async fn test_failure_with_dead_server_restores_snapshot() {
        let mut board = board_of(&[("A", &["T1", "T2"]), ("B", &["T3"])]);
        let before = board.clone();
        let store = MemoryStore::seeded(&board);
        store.go_offline();
        let notifier = RecordingNotifier::default();
        let t3 = task_id(&board, "T3");

        let outcome = drop_and_sync(&store, &notifier, &mut board, "T1", t3).await;

        assert!(matches!(outcome, SyncOutcome::Failed(SyncError::Network(_))));
        assert_eq!(board, before);
        assert_eq!(notifier.errors().len(), 1);
    }

    #[tokio::test]
    async fn test_auth_failure_skips_refetch() {
        let mut board = board_of(&[("A", &["T1", "T2"])]);
        let before = board.clone();
        let store = MemoryStore::seeded(&board);
        store.fail_next_update(SyncError::Unauthorized("Invalid token".into()));
        let notifier = RecordingNotifier::default();
        let t2 = task_id(&board, "T2");

        let outcome = drop_and_sync(&store, &notifier, &mut board, "T1", t2).await;

        assert!(matches!(outcome, SyncOutcome::Failed(SyncError::Unauthorized(_))));
        assert_eq!(board, before);
        assert_eq!(store.fetch_count(), 0);
        assert_eq!(notifier.errors(), ["Session expired, please sign in again"]);
    }

    #[tokio::test]
    async fn test_vanished_task_resyncs_to_server_truth() {
        let mut board = board_of(&[("A", &["T1", "T2"]), ("B", &["T3"])]);
        let store = MemoryStore::seeded(&board);
        let notifier = RecordingNotifier::default();
        let (t1, t3) = (task_id(&board, "T1"), task_id(&board, "T3"));
        // Someone else deleted T1 meanwhile.
        store.remove_task(t1);

        let outcome = drop_and_sync(&store, &notifier, &mut board, "T1", t3).await;

        assert!(matches!(outcome, SyncOutcome::Failed(SyncError::NotFound(_))));
        assert_eq!(board, store.board());
        assert!(board.task(t1).is_none());
        assert_eq!(notifier.errors().len(), 1);
    }

    #[tokio::test]
    async fn test_order_disagreement_resyncs() {
        let mut board = board_of(&[("A", &["T1", "T2", "T3"])]);
        let store = MemoryStore::seeded(&board);
        store.skew_orders(1);
        let notifier = RecordingNotifier::default();
        let t1 = task_id(&board, "T1");

        let outcome = drop_and_sync(&store, &notifier, &mut board, "T3", t1).await;

        assert_eq!(outcome, SyncOutcome::Resynced);
        assert_eq!(store.fetch_count(), 1);
        assert!(notifier.notices().is_empty());
    }

    #[tokio::test]
    async fn test_list_mismatch_is_reported() {
        let mut board = board_of(&[("A", &["T1"]), ("B", &["T2"])]);
        let store = MemoryStore::seeded(&board);
        store.ignore_list_changes();
        let notifier = RecordingNotifier::default();
        let t2 = task_id(&board, "T2");

        let outcome = drop_and_sync(&store, &notifier, &mut board, "T1", t2).await;

        assert!(matches!(outcome, SyncOutcome::Failed(SyncError::Mismatch(_))));
        assert_eq!(board, store.board());
        assert_eq!(notifier.errors().len(), 1);
    }

    #[tokio::test]
    async fn test_list_reorder_confirms() {
        let mut board = board_of(&[("A", &[]), ("B", &[]), ("C", &[])]);
        let store = MemoryStore::seeded(&board);
        let notifier = RecordingNotifier::default();
        let snapshot = board.clone();
        let c = board.lists()[2].id;
        board.move_list(c, 0);

        let outcome = reconcile_list_move(&store, &notifier, &mut board, c, snapshot).await;

        assert_eq!(outcome, SyncOutcome::Confirmed);
        let names: Vec<_> = store.board().lists().iter().map(|l| l.title.clone()).collect();
        assert_eq!(names, ["C", "A", "B"]);
    }
}
