//! Live queries driven by the repository change feed.
//!
//! A [`Live`] stream holds the latest result of a query and is re-evaluated
//! by a background task whenever one of the tables it depends on changes.
//! The task stops once every receiver has been dropped.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{trace, warn};

use crate::error::{Error, ResolutionError, Result};
use crate::repository::{Table, TableVersions};

/// One evaluation of a live query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot<T> {
    /// The resulting rows.
    pub items: Vec<T>,
    /// Rows that were skipped because they could not be resolved.
    pub unresolved: Vec<ResolutionError>,
    /// Table versions observed before the query ran.
    pub versions: TableVersions,
}

impl<T> Snapshot<T> {
    /// A snapshot with no skipped rows.
    #[must_use]
    pub fn new(items: Vec<T>, versions: TableVersions) -> Self {
        Self {
            items,
            unresolved: Vec::new(),
            versions,
        }
    }
}

/// Current state of a live query.
#[derive(Debug, Clone)]
pub enum LiveState<T> {
    /// No result yet.
    Pending,
    /// The latest successful evaluation.
    Ready(Snapshot<T>),
    /// The latest evaluation failed.
    Failed(Arc<Error>),
}

impl<T> LiveState<T> {
    /// The snapshot, if ready.
    #[must_use]
    pub fn snapshot(&self) -> Option<&Snapshot<T>> {
        match self {
            Self::Ready(snapshot) => Some(snapshot),
            _ => None,
        }
    }

    /// The ready items, or an empty slice.
    #[must_use]
    pub fn items(&self) -> &[T] {
        self.snapshot().map_or(&[], |s| s.items.as_slice())
    }

    /// The error, if the last evaluation failed.
    #[must_use]
    pub fn error(&self) -> Option<&Arc<Error>> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Whether the query has not produced a result yet.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// A subscription to a live query.
#[derive(Debug, Clone)]
pub struct Live<T> {
    rx: watch::Receiver<LiveState<T>>,
}

impl<T> Live<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// A stream that is ready with `items` and never changes.
    #[must_use]
    pub fn fixed(items: Vec<T>) -> Self {
        let (_tx, rx) = watch::channel(LiveState::Ready(Snapshot::new(
            items,
            TableVersions::default(),
        )));
        Self { rx }
    }

    /// Spawn a task that evaluates `query` now and again whenever one of
    /// `tables` changes on `changes`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<F, Fut>(
        name: &'static str,
        mut changes: watch::Receiver<TableVersions>,
        tables: &'static [Table],
        query: F,
    ) -> Self
    where
        F: Fn(TableVersions) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Snapshot<T>>> + Send,
    {
        let (tx, rx) = watch::channel(LiveState::Pending);

        tokio::spawn(async move {
            loop {
                let seen = *changes.borrow_and_update();
                trace!("Evaluating live query {} at {:?}", name, seen);

                let state = match query(seen).await {
                    Ok(snapshot) => LiveState::Ready(snapshot),
                    Err(err) => {
                        warn!("Live query {} failed: {}", name, err);
                        LiveState::Failed(Arc::new(err))
                    }
                };
                if tx.send(state).is_err() {
                    return;
                }

                loop {
                    tokio::select! {
                        () = tx.closed() => return,
                        changed = changes.changed() => {
                            if changed.is_err() {
                                return;
                            }
                            if seen.changed_since(&changes.borrow(), tables) {
                                break;
                            }
                        }
                    }
                }
            }
        });

        Self { rx }
    }

    /// A clone of the current state.
    #[must_use]
    pub fn current(&self) -> LiveState<T> {
        self.rx.borrow().clone()
    }

    /// The current ready items, or empty when pending or failed.
    #[must_use]
    pub fn items(&self) -> Vec<T> {
        self.rx.borrow().items().to_vec()
    }

    /// Wait until the state changes.
    ///
    /// # Errors
    ///
    /// Returns an error if the query task has stopped.
    pub async fn changed(&mut self) -> Result<()> {
        self.rx
            .changed()
            .await
            .map_err(|_| Error::internal("live query stopped"))
    }

    /// Wait for the first state that is not [`LiveState::Pending`].
    ///
    /// # Errors
    ///
    /// Returns an error if the query task stopped before producing a result.
    pub async fn settled(&mut self) -> Result<LiveState<T>> {
        self.wait_for(|state| !state.is_pending()).await
    }

    /// Wait for a state matching `predicate`, checking the current one first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query task stopped before a match.
    pub async fn wait_for(
        &mut self,
        mut predicate: impl FnMut(&LiveState<T>) -> bool,
    ) -> Result<LiveState<T>> {
        let state = self
            .rx
            .wait_for(|state| predicate(state))
            .await
            .map_err(|_| Error::internal("live query stopped"))?;
        Ok(state.clone())
    }
}
