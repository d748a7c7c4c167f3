//! End-to-end scenarios spanning more than one crate, matching spec §8's
//! "Concrete scenarios" list: none of these is a single crate's own
//! responsibility to exercise in isolation.

use std::sync::Arc;
use std::time::Duration;

use merkle_state::byte_stream::Digest384;
use merkle_state::merkle_route::{AnyRoute, RouteEncoding};
use merkle_state::merkle_tree::Tree;
use merkle_state::signed_state::{AddressBook, AddressBookMember, HashSigner, KeyEchoSigner, NodeId};
use merkle_state::{FCHashMap, ReconnectController, ReconnectExecutor, SignedState, SignedStateManager, SyncError, SyncResult};
use parking_lot::Mutex as PlMutex;

fn root_route() -> AnyRoute {
    AnyRoute::empty_in(RouteEncoding::BinaryCompressed)
}

/// Scenario 2: fast-copy put/release with independent per-copy views.
#[test]
fn fast_copy_put_and_release_keeps_copies_independent() {
    let c0 = FCHashMap::new::<&'static str, i32>(1024);
    c0.put("a", 1).unwrap();
    c0.put("b", 2).unwrap();

    let c1 = c0.copy().unwrap();
    c1.put("a", 3).unwrap();
    c1.remove("b").unwrap();

    assert_eq!(*c0.get(&"a").unwrap().unwrap(), 1);
    assert_eq!(*c0.get(&"b").unwrap().unwrap(), 2);
    assert_eq!(*c1.get(&"a").unwrap().unwrap(), 3);
    assert!(c1.get(&"b").unwrap().is_none());

    c0.release().unwrap();
    // c1 is still live and sees its own writes regardless of c0's release.
    assert_eq!(*c1.get(&"a").unwrap().unwrap(), 3);
}

/// Scenario 4: reconnect no-op when teacher and learner already match —
/// exactly one descriptor and one ACK, no payload ever crosses the wire.
#[tokio::test]
async fn reconnect_against_an_identical_learner_transfers_nothing() {
    use merkle_state::reconnect::{anticipated_channel, LearnerSync, TeacherSync};

    let mut tree = Tree::new();
    let root = tree.alloc_leaf(root_route(), b"already-synced".to_vec());
    let hasher = merkle_state::merkle_hasher::MerkleHasher::new(1).unwrap();
    hasher.digest_sync(&mut tree, Some(root)).unwrap();

    let existing = Arc::new(PlMutex::new(tree));
    let teacher_tree = Arc::clone(&existing);
    let teacher = Arc::new(TeacherSync::new(teacher_tree, root, Duration::from_millis(200)));
    let learner = LearnerSync::new(Some((Arc::clone(&existing), root)));

    let (node_reader, node_writer) = anticipated_channel(4);
    let (ack_reader, ack_writer) = anticipated_channel(4);

    let teacher_task = tokio::spawn(async move { teacher.run(node_writer, ack_reader).await });
    let learner_task = tokio::spawn(async move { learner.run(node_reader, ack_writer, root_route()).await });

    let (teacher_result, learner_result) = tokio::join!(teacher_task, learner_task);
    teacher_result.unwrap().unwrap();
    let (_rebuilt, rebuilt_root) = learner_result.unwrap().unwrap();
    assert_eq!(rebuilt_root.index(), root.index());
}

fn equal_stake_book(n: u64, stake: u64) -> Arc<AddressBook> {
    Arc::new(AddressBook::new(
        (1..=n)
            .map(|id| AddressBookMember {
                node_id: NodeId(id),
                stake,
                public_key: vec![id as u8],
            })
            .collect(),
    ))
}

/// Scenario 5: a 4-node, equal-stake address book requires at least 3
/// signatures to reach quorum, and `state_has_enough_signatures` fires
/// exactly once, on the third.
#[test]
fn quorum_requires_three_of_four_equal_stake_signers() {
    let book = equal_stake_book(4, 10);
    assert_eq!(book.quorum_threshold(), 27); // (2*40)/3 + 1

    let self_signer: Arc<dyn HashSigner> = Arc::new(KeyEchoSigner::new(NodeId(1), vec![1]));
    let manager = SignedStateManager::new(5, self_signer);
    let mut enough_signatures = manager.channels().subscribe_state_has_enough_signatures();

    let hash = Digest384::from_bytes([10u8; 48]);
    let state = Arc::new(SignedState::new(10, hash, Arc::clone(&book)));
    manager.add_unsigned_state(Arc::clone(&state)); // node 1 self-signs

    for node_id in [2u64, 3] {
        manager.signature_observed(
            10,
            NodeId(node_id),
            hash,
            merkle_state::signed_state::Signature {
                signer_key: vec![node_id as u8],
                bytes: hash.as_bytes().to_vec(),
            },
        );
    }

    assert!(state.is_complete());
    assert_eq!(manager.last_complete().unwrap().round(), 10);
    assert_eq!(enough_signatures.try_recv().unwrap(), 10);
    assert!(enough_signatures.try_recv().is_err());
}

/// Scenario 6: with `W=5`, tracking rounds 0..9 with no signatures
/// retires rounds as the window fills, firing `state_lacks_signatures`
/// for each retired round in order.
#[tokio::test]
async fn window_eviction_without_signatures_reports_every_retired_round() {
    let book = equal_stake_book(3, 10);
    let self_signer: Arc<dyn HashSigner> = Arc::new(KeyEchoSigner::new(NodeId(99), vec![99]));
    let manager = SignedStateManager::new(5, self_signer);
    let mut lacks_signatures = manager.channels().subscribe_state_lacks_signatures();

    for round in 0..10 {
        let hash = Digest384::from_bytes([round as u8; 48]);
        manager.add_unsigned_state(Arc::new(SignedState::new(round, hash, Arc::clone(&book))));
    }

    let mut retired = Vec::new();
    while let Ok(round) = lacks_signatures.try_recv() {
        retired.push(round);
    }
    assert_eq!(retired, vec![0, 1, 2, 3, 4]);
}

struct AlwaysFails;

#[async_trait::async_trait]
impl ReconnectExecutor for AlwaysFails {
    async fn attempt(&self, _cancel: tokio::sync::watch::Receiver<bool>) -> SyncResult<()> {
        Err(SyncError::StreamClosed)
    }
}

/// The retry policy's two bounds compose: a zero backoff still refuses
/// once the consecutive-failure cap is hit.
#[tokio::test]
async fn reconnect_controller_refuses_after_the_failure_cap() {
    let mut controller = ReconnectController::new(3, Duration::from_millis(0));
    let executor = AlwaysFails;
    let (_tx, rx) = merkle_state::reconnect::cancellation_token();

    for _ in 0..3 {
        assert!(controller.run_attempt(&executor, rx.clone()).await.is_err());
    }
    assert!(matches!(
        controller.run_attempt(&executor, rx).await,
        Err(SyncError::Refused { .. })
    ));
}
