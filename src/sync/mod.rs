//! Live sync channel
//!
//! Change events say only "something in this table changed"; they carry no row
//! data. Consumers react by re-fetching the whole collection for their scope,
//! so a coalesced or lagged burst still converges on the store's latest state.

use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::store::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Appointments,
    Instructors,
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Table::Appointments => f.write_str("appointments"),
            Table::Instructors => f.write_str("instructors"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
    pub at: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(table: Table, kind: ChangeKind) -> Self {
        Self {
            table,
            kind,
            at: Utc::now(),
        }
    }
}

/// Tells a subscriber to re-fetch `table`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSignal {
    pub table: Table,
    /// Number of change events folded into this signal.
    pub coalesced: usize,
    /// True when events may have been missed (lag or restart); the re-fetch covers them.
    pub resync: bool,
}

/// In-process fan-out of change events, one broadcast channel for all tables.
#[derive(Debug, Clone)]
pub struct SyncHub {
    tx: Arc<broadcast::Sender<ChangeEvent>>,
    capacity: usize,
}

impl SyncHub {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx: Arc::new(tx),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Publishes to every open subscription. Having no subscribers is not an error.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        debug!(table = %event.table, kind = ?event.kind, "Publishing change event");
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn subscribe(&self, table: Table) -> Subscription {
        let (closed_tx, closed_rx) = watch::channel(false);
        Subscription {
            table,
            hub: Arc::downgrade(&self.tx),
            rx: Some(self.tx.subscribe()),
            closed_tx: Arc::new(closed_tx),
            closed_rx,
            resync_pending: false,
        }
    }
}

impl Default for SyncHub {
    fn default() -> Self {
        Self::new(64)
    }
}

/// Closes a subscription from outside the task that is consuming it.
#[derive(Debug, Clone)]
pub struct CloseHandle(Arc<watch::Sender<bool>>);

impl CloseHandle {
    pub fn close(&self) {
        self.0.send_replace(true);
    }
}

/// A cancellable, restartable sequence of re-fetch signals for one table.
#[derive(Debug)]
pub struct Subscription {
    table: Table,
    hub: Weak<broadcast::Sender<ChangeEvent>>,
    rx: Option<broadcast::Receiver<ChangeEvent>>,
    closed_tx: Arc<watch::Sender<bool>>,
    closed_rx: watch::Receiver<bool>,
    resync_pending: bool,
}

impl Subscription {
    pub fn table(&self) -> Table {
        self.table
    }

    pub fn is_open(&self) -> bool {
        self.rx.is_some() && !*self.closed_rx.borrow()
    }

    pub fn close_handle(&self) -> CloseHandle {
        CloseHandle(self.closed_tx.clone())
    }

    pub fn close(&mut self) {
        self.closed_tx.send_replace(true);
        self.rx = None;
        info!(table = %self.table, "Live sync subscription closed");
    }

    /// Re-opens the subscription. Returns false when the hub no longer exists.
    /// The first signal after a restart is always a resync, because changes made
    /// while closed were not observed.
    pub fn restart(&mut self) -> bool {
        let Some(tx) = self.hub.upgrade() else {
            warn!(table = %self.table, "Cannot restart subscription: sync hub dropped");
            return false;
        };
        self.closed_tx.send_replace(false);
        self.rx = Some(tx.subscribe());
        self.resync_pending = true;
        info!(table = %self.table, "Live sync subscription restarted");
        true
    }

    /// Waits for the next change affecting this table. Events already queued
    /// behind it are folded into the same signal. Returns `None` once closed.
    pub async fn next(&mut self) -> Option<SyncSignal> {
        let table = self.table;
        if *self.closed_rx.borrow() {
            self.rx = None;
            return None;
        }
        if self.resync_pending {
            self.resync_pending = false;
            return Some(SyncSignal {
                table,
                coalesced: 0,
                resync: true,
            });
        }

        let outcome = match self.rx.as_mut() {
            Some(rx) => Self::wait_for_change(rx, self.closed_rx.clone(), table).await,
            None => return None,
        };
        if outcome.is_none() {
            self.rx = None;
        }
        outcome
    }

    async fn wait_for_change(
        rx: &mut broadcast::Receiver<ChangeEvent>,
        mut closed_rx: watch::Receiver<bool>,
        table: Table,
    ) -> Option<SyncSignal> {
        let mut signal = loop {
            tokio::select! {
                biased;
                _ = closed_rx.wait_for(|closed| *closed) => return None,
                received = rx.recv() => match received {
                    Ok(event) if event.table == table => {
                        break SyncSignal { table, coalesced: 1, resync: false };
                    }
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(table = %table, missed = missed, "Live sync lagged, forcing resync");
                        break SyncSignal { table, coalesced: missed as usize, resync: true };
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!(table = %table, "Sync hub closed");
                        return None;
                    }
                }
            }
        };

        loop {
            match rx.try_recv() {
                Ok(event) if event.table == table => signal.coalesced += 1,
                Ok(_) => {}
                Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                    signal.coalesced += missed as usize;
                    signal.resync = true;
                }
                Err(_) => break,
            }
        }

        Some(signal)
    }

    /// Lazy stream view of the subscription.
    pub fn into_stream(self) -> impl Stream<Item = SyncSignal> {
        futures::stream::unfold(self, |mut sub| async move {
            sub.next().await.map(|signal| (signal, sub))
        })
    }
}

/// Drives `refetch` once per signal until the subscription closes. A failed
/// re-fetch is logged and left for the next signal; the view is never patched
/// incrementally. Returns the number of re-fetch rounds performed.
pub async fn follow<F, Fut>(mut subscription: Subscription, mut refetch: F) -> usize
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<usize, StoreError>>,
{
    let mut rounds = 0;
    while let Some(signal) = subscription.next().await {
        rounds += 1;
        match refetch().await {
            Ok(rows) => debug!(
                table = %signal.table,
                coalesced = signal.coalesced,
                resync = signal.resync,
                rows = rows,
                "Re-fetched after change"
            ),
            Err(e) => warn!(table = %signal.table, error = %e, "Re-fetch after change failed"),
        }
    }
    rounds
}
