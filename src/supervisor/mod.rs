//! Supervisor: bootstrap, trace replay, teardown
//!
//! Builds the network (identities, mailboxes, transport, directory), spawns
//! one peer task per replica, drives an edit trace with a quiescence barrier
//! between edits instead of timed sleeps, snapshots every peer for
//! convergence checks, and tears the whole network down.

mod trace;

pub use trace::{Edit, EditOp, EditTrace, TraceCommit, TraceError};

use std::collections::HashMap;
use std::sync::Arc;

use ed25519_dalek::VerifyingKey;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::crdt::{PeerId, Replica};
use crate::identity::PeerIdentity;
use crate::net::{ChannelTransport, PeerDirectory};
use crate::peer::{Peer, PeerError, PeerHandle};

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("trace names {found} authors but the network has {capacity} peers")]
    TooManyAuthors { found: usize, capacity: usize },

    #[error(transparent)]
    Peer(#[from] PeerError),
}

/// Tuning knobs for a supervised network.
#[derive(Clone, Debug)]
pub struct SupervisorConfig {
    /// Mailbox depth per peer. Deep enough that a round of broadcasts from
    /// every peer fits without anyone blocking.
    pub mailbox_depth: usize,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self { mailbox_depth: 256 }
    }
}

/// A bootstrapped network of peers under one driver.
pub struct Supervisor {
    handles: Vec<PeerHandle>,
    joins: Vec<JoinHandle<()>>,
    directory: Arc<PeerDirectory>,
}

impl Supervisor {
    /// Create `network_size` peers wired to each other through an
    /// in-process transport. The directory is written here, once, and is
    /// read-only from then on.
    pub fn bootstrap(network_size: usize, config: SupervisorConfig) -> Self {
        let identities: Vec<PeerIdentity> =
            (0..network_size).map(|_| PeerIdentity::generate()).collect();
        let keys: Vec<VerifyingKey> = identities.iter().map(|i| i.verifying_key()).collect();

        let (txs, rxs): (Vec<_>, Vec<_>) = (0..network_size)
            .map(|_| mpsc::channel(config.mailbox_depth))
            .unzip();

        let transport = Arc::new(ChannelTransport::new(txs.clone()));
        let directory = Arc::new(PeerDirectory::new(transport, keys.clone()));

        let mut handles = Vec::with_capacity(network_size);
        let mut joins = Vec::with_capacity(network_size);
        for (peer_id, (identity, (tx, rx))) in identities
            .into_iter()
            .zip(txs.into_iter().zip(rxs))
            .enumerate()
        {
            let replica = Replica::new(peer_id, identity, keys.clone());
            let (handle, join) = Peer::spawn(replica, Arc::clone(&directory), rx, tx);
            handles.push(handle);
            joins.push(join);
        }

        Self {
            handles,
            joins,
            directory,
        }
    }

    /// Bootstrap a network sized to a trace: one peer per distinct author.
    pub fn for_trace(trace: &EditTrace, config: SupervisorConfig) -> Self {
        Self::bootstrap(trace.authors().len().max(1), config)
    }

    pub fn network_size(&self) -> usize {
        self.handles.len()
    }

    pub fn handle(&self, peer: PeerId) -> Option<&PeerHandle> {
        self.handles.get(peer)
    }

    pub fn directory(&self) -> &Arc<PeerDirectory> {
        &self.directory
    }

    /// Replay a trace, one edit at a time. After each edit the originating
    /// peer is quiesced (its broadcasts are then in every mailbox, since
    /// handlers finish their fan-out before taking the next message) and
    /// then the whole network is, so every peer has applied the edit before
    /// the next one is issued.
    pub async fn replay(&self, trace: &EditTrace) -> Result<(), SupervisorError> {
        let authors = trace.authors();
        if authors.len() > self.handles.len() {
            return Err(SupervisorError::TooManyAuthors {
                found: authors.len(),
                capacity: self.handles.len(),
            });
        }
        let assignment: HashMap<&str, PeerId> = authors
            .iter()
            .enumerate()
            .map(|(peer, author)| (*author, peer))
            .collect();

        for commit in &trace.commits {
            let peer = assignment[commit.author.as_str()];
            let handle = &self.handles[peer];
            for edit in &commit.edits {
                match edit.op {
                    EditOp::Insert => {
                        let content = edit.content.clone().unwrap_or_default();
                        handle.insert(content, edit.index).await?;
                    }
                    EditOp::Delete => {
                        handle.delete(edit.index).await?;
                    }
                }
                self.barrier(peer).await?;
            }
        }
        Ok(())
    }

    /// Two-phase quiescence: the originator first, then everyone.
    pub async fn barrier(&self, origin: PeerId) -> Result<(), SupervisorError> {
        if let Some(handle) = self.handles.get(origin) {
            handle.quiesce().await?;
        }
        for handle in &self.handles {
            handle.quiesce().await?;
        }
        Ok(())
    }

    /// Alive content of every peer, for convergence checking.
    pub async fn snapshots(&self) -> Result<Vec<Vec<String>>, SupervisorError> {
        let mut all = Vec::with_capacity(self.handles.len());
        for handle in &self.handles {
            all.push(handle.snapshot().await?);
        }
        Ok(all)
    }

    /// Terminate every peer and wait for the tasks to finish. Messages
    /// still in flight to a terminated peer are dropped by the transport.
    pub async fn kill_all(self) {
        for handle in &self.handles {
            let _ = handle.shutdown().await;
        }
        for join in self.joins {
            let _ = join.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_bootstrap_and_teardown() {
        let supervisor = Supervisor::bootstrap(3, SupervisorConfig::default());
        assert_eq!(supervisor.network_size(), 3);

        let snapshots = supervisor.snapshots().await.unwrap();
        assert!(snapshots.iter().all(Vec::is_empty));

        supervisor.kill_all().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_rejects_oversized_trace() {
        let supervisor = Supervisor::bootstrap(1, SupervisorConfig::default());
        let trace = EditTrace::new(vec![
            TraceCommit {
                hash: "a".into(),
                author: "alice".into(),
                edits: vec![],
            },
            TraceCommit {
                hash: "b".into(),
                author: "bob".into(),
                edits: vec![],
            },
        ]);
        assert!(matches!(
            supervisor.replay(&trace).await,
            Err(SupervisorError::TooManyAuthors {
                found: 2,
                capacity: 1
            })
        ));
        supervisor.kill_all().await;
    }
}
