//! End-to-end convergence tests
//!
//! Drives full networks of peer tasks over the in-process transport:
//! linear editing, concurrent inserts racing the same gap, deletes racing
//! inserts, Byzantine injection, and trace replay. Every scenario ends by
//! checking that all peers hold identical alive content.

use syncordian::crdt::{Line, LineId, VectorClock};
use syncordian::identity::PeerIdentity;
use syncordian::net::{encode, Broadcast};
use syncordian::supervisor::{Edit, EditTrace, Supervisor, SupervisorConfig, TraceCommit};

fn commit(hash: &str, author: &str, edits: Vec<Edit>) -> TraceCommit {
    TraceCommit {
        hash: hash.into(),
        author: author.into(),
        edits,
    }
}

async fn assert_converged(supervisor: &Supervisor) -> Vec<String> {
    let snapshots = supervisor.snapshots().await.unwrap();
    let first = snapshots[0].clone();
    for (peer, snapshot) in snapshots.iter().enumerate() {
        assert_eq!(*snapshot, first, "peer {peer} diverged");
    }
    first
}

#[tokio::test(start_paused = true)]
async fn single_peer_linear_edit() {
    let supervisor = Supervisor::bootstrap(1, SupervisorConfig::default());
    let peer = supervisor.handle(0).unwrap();

    peer.insert("A", 0).await.unwrap();
    peer.insert("B", 1).await.unwrap();
    peer.insert("C", 2).await.unwrap();
    peer.print_content().await.unwrap();
    supervisor.barrier(0).await.unwrap();

    assert_eq!(peer.snapshot().await.unwrap(), vec!["A", "B", "C"]);
    supervisor.kill_all().await;
}

#[tokio::test(start_paused = true)]
async fn concurrent_inserts_in_distinct_gaps() {
    let supervisor = Supervisor::bootstrap(3, SupervisorConfig::default());

    // Shared starting point: X, replicated everywhere.
    supervisor.handle(0).unwrap().insert("X", 0).await.unwrap();
    supervisor.barrier(0).await.unwrap();

    // p1 inserts before X, p2 after X, concurrently.
    supervisor.handle(1).unwrap().insert("L", 0).await.unwrap();
    supervisor.handle(2).unwrap().insert("R", 1).await.unwrap();
    supervisor.barrier(1).await.unwrap();
    supervisor.barrier(2).await.unwrap();

    assert_eq!(assert_converged(&supervisor).await, vec!["L", "X", "R"]);
    supervisor.kill_all().await;
}

#[tokio::test(start_paused = true)]
async fn concurrent_inserts_race_same_gap() {
    let supervisor = Supervisor::bootstrap(2, SupervisorConfig::default());

    // Both peers split the (infimum, supremum) gap before seeing each
    // other's line. Order falls out of id comparison, identically
    // everywhere.
    supervisor.handle(0).unwrap().insert("L", 0).await.unwrap();
    supervisor.handle(1).unwrap().insert("R", 0).await.unwrap();
    supervisor.barrier(0).await.unwrap();
    supervisor.barrier(1).await.unwrap();

    let content = assert_converged(&supervisor).await;
    assert_eq!(content.len(), 2);
    assert!(content.contains(&"L".to_string()));
    assert!(content.contains(&"R".to_string()));
    supervisor.kill_all().await;
}

#[tokio::test(start_paused = true)]
async fn delete_races_concurrent_insert() {
    let supervisor = Supervisor::bootstrap(2, SupervisorConfig::default());

    supervisor.handle(0).unwrap().insert("X", 0).await.unwrap();
    supervisor.barrier(0).await.unwrap();

    // p0 tombstones X while p1 inserts before it.
    supervisor.handle(0).unwrap().delete(0).await.unwrap();
    supervisor.handle(1).unwrap().insert("Y", 0).await.unwrap();
    supervisor.barrier(0).await.unwrap();
    supervisor.barrier(1).await.unwrap();

    assert_eq!(assert_converged(&supervisor).await, vec!["Y"]);
    supervisor.kill_all().await;
}

#[tokio::test(start_paused = true)]
async fn byzantine_injection_never_shows() {
    let supervisor = Supervisor::bootstrap(3, SupervisorConfig::default());

    supervisor.handle(0).unwrap().insert("real", 0).await.unwrap();
    supervisor.barrier(0).await.unwrap();

    // A correctly-formed broadcast whose line is signed by nobody in the
    // directory, over parents that exist in no document.
    let forged = {
        let outsider = PeerIdentity::generate();
        let ghost_left =
            LineId::allocate_between(&LineId::infimum(), &LineId::supremum(), 7).unwrap();
        let ghost_right = LineId::allocate_between(&ghost_left, &LineId::supremum(), 7).unwrap();
        let id = LineId::allocate_between(&ghost_left, &ghost_right, 1).unwrap();
        let digest = syncordian::crdt::binding_digest(&ghost_left, &id, "evil", &ghost_right);
        Line::new(id, "evil", 1, outsider.sign(&digest).to_bytes().to_vec())
    };
    let mut clock = VectorClock::new(3);
    clock.tick(1);
    clock.tick(1);

    let payload = encode(&Broadcast::Insert {
        line: forged,
        clock,
    })
    .unwrap();
    supervisor.directory().broadcast_from(1, payload).await;
    supervisor.barrier(1).await.unwrap();

    // Nothing but the real line anywhere, whether the forgery was rejected
    // outright or stashed for later judgment.
    assert_eq!(assert_converged(&supervisor).await, vec!["real"]);
    supervisor.kill_all().await;
}

#[tokio::test(start_paused = true)]
async fn trace_replay_converges() {
    let trace = EditTrace::new(vec![
        commit(
            "c1",
            "alice",
            vec![Edit::insert("fn main() {", 0), Edit::insert("}", 1)],
        ),
        commit("c2", "bob", vec![Edit::insert("    body();", 1)]),
        commit("c3", "alice", vec![Edit::delete(1)]),
        commit("c4", "bob", vec![Edit::insert("    other();", 1)]),
    ]);

    let supervisor = Supervisor::for_trace(&trace, SupervisorConfig::default());
    assert_eq!(supervisor.network_size(), 2);

    supervisor.replay(&trace).await.unwrap();

    let content = assert_converged(&supervisor).await;
    assert_eq!(content, vec!["fn main() {", "    other();", "}"]);
    supervisor.kill_all().await;
}

#[tokio::test(start_paused = true)]
async fn trace_round_trips_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trace.json");

    let trace = EditTrace::new(vec![commit(
        "c1",
        "alice",
        vec![Edit::insert("only line", 0)],
    )]);
    trace.save(&path).unwrap();
    let loaded = EditTrace::load(&path).unwrap();

    let supervisor = Supervisor::for_trace(&loaded, SupervisorConfig::default());
    supervisor.replay(&loaded).await.unwrap();
    assert_eq!(assert_converged(&supervisor).await, vec!["only line"]);
    supervisor.kill_all().await;
}
