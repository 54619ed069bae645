//! End-to-end worker tests: queue, drain, supersede, restart.

mod common;

use common::{RemoteCall, TestEnv};
use courier_engine::OperationWorker;
use courier_model::{
    DeletionScope, MessageId, OperationContents, Peer, PeerId, RemoveMessagesOperation,
    TAG_CLOUD_CHAT_REMOVALS,
};
use courier_oplog::Oplog;
use std::future::Future;
use std::time::Duration;
use tempfile::tempdir;

fn remove_messages(ids: &[i32]) -> OperationContents {
    OperationContents::RemoveMessages(RemoveMessagesOperation {
        message_ids: ids.iter().map(|id| MessageId(*id)).collect(),
        scope: DeletionScope::ForLocalPeer,
    })
}

/// Poll an async condition until it holds or a 5s deadline passes.
async fn eventually<F, Fut>(mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if condition().await {
            return true;
        }
        if tokio::time::Instant::now() > deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn test_worker_drains_queued_operation() {
    common::init_tracing();
    let dir = tempdir().unwrap();
    let (oplog, runner) = Oplog::open(dir.path().join("oplog.redb")).unwrap();
    tokio::spawn(runner.run());

    let env = TestEnv::new();
    let peer = PeerId::user(1);
    env.chats.put_peer(Peer::new(peer, Some(5))).unwrap();

    let worker = OperationWorker::new(oplog.clone(), env.services()).spawn().await.unwrap();

    let tag = TAG_CLOUD_CHAT_REMOVALS;
    let entry = oplog.add_entry(peer, tag, remove_messages(&[1, 2, 3])).await.unwrap();

    assert!(
        eventually(|| {
            let oplog = oplog.clone();
            async move { oplog.entry(peer, tag, entry.tag_local_index).await.unwrap().is_none() }
        })
        .await,
        "entry should be executed and removed"
    );

    assert_eq!(
        env.remote.calls(),
        vec![RemoteCall::DeleteMessages {
            ids: vec![MessageId(1), MessageId(2), MessageId(3)],
            revoke: false
        }]
    );
    assert_eq!(env.sink.sequence_updates().len(), 1);

    worker.close().await;
    oplog.close().await;
}

#[tokio::test]
async fn test_worker_drains_multiple_peers() {
    common::init_tracing();
    let dir = tempdir().unwrap();
    let (oplog, runner) = Oplog::open(dir.path().join("oplog.redb")).unwrap();
    tokio::spawn(runner.run());

    let env = TestEnv::new();
    let user = PeerId::user(1);
    let channel = PeerId::channel(2);
    env.chats.put_peer(Peer::new(user, Some(5))).unwrap();
    env.chats.put_peer(Peer::new(channel, Some(6))).unwrap();

    let worker = OperationWorker::new(oplog.clone(), env.services()).spawn().await.unwrap();

    let tag = TAG_CLOUD_CHAT_REMOVALS;
    let a = oplog.add_entry(user, tag, remove_messages(&[1])).await.unwrap();
    let b = oplog.add_entry(channel, tag, remove_messages(&[2])).await.unwrap();

    assert!(
        eventually(|| {
            let oplog = oplog.clone();
            async move {
                oplog.entry(user, tag, a.tag_local_index).await.unwrap().is_none()
                    && oplog.entry(channel, tag, b.tag_local_index).await.unwrap().is_none()
            }
        })
        .await
    );

    let calls = env.remote.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().any(|call| matches!(call, RemoteCall::DeleteMessages { .. })));
    assert!(calls
        .iter()
        .any(|call| matches!(call, RemoteCall::DeleteChannelMessages { channel_id: 2, .. })));

    worker.close().await;
    oplog.close().await;
}

#[tokio::test]
async fn test_worker_drains_existing_queue_on_restart() {
    common::init_tracing();
    let dir = tempdir().unwrap();
    let path = dir.path().join("oplog.redb");
    let tag = TAG_CLOUD_CHAT_REMOVALS;
    let peer = PeerId::user(4);

    // Queue an operation with no worker running, then shut everything down.
    let entry = {
        let (oplog, runner) = Oplog::open(&path).unwrap();
        tokio::spawn(runner.run());
        let entry = oplog.add_entry(peer, tag, remove_messages(&[7, 8])).await.unwrap();
        oplog.close().await;
        entry
    };

    // A fresh process: reopen the log, start a worker, and the queued
    // operation drains from the initial view emission.
    let (oplog, runner) = Oplog::open(&path).unwrap();
    tokio::spawn(runner.run());
    let env = TestEnv::new();
    env.chats.put_peer(Peer::new(peer, Some(5))).unwrap();
    let worker = OperationWorker::new(oplog.clone(), env.services()).spawn().await.unwrap();

    assert!(
        eventually(|| {
            let oplog = oplog.clone();
            async move { oplog.entry(peer, tag, entry.tag_local_index).await.unwrap().is_none() }
        })
        .await
    );
    assert_eq!(env.remote.calls().len(), 1);

    worker.close().await;
    oplog.close().await;
}

#[tokio::test]
async fn test_worker_removes_entry_after_channel_fallback() {
    common::init_tracing();
    let dir = tempdir().unwrap();
    let (oplog, runner) = Oplog::open(dir.path().join("oplog.redb")).unwrap();
    tokio::spawn(runner.run());

    let env = TestEnv::new();
    let peer = PeerId::channel(5);
    env.chats.put_peer(Peer::new(peer, Some(3))).unwrap();
    env.remote.fail_delete_channel();

    let worker = OperationWorker::new(oplog.clone(), env.services()).spawn().await.unwrap();

    let tag = TAG_CLOUD_CHAT_REMOVALS;
    let entry = oplog
        .add_entry(
            peer,
            tag,
            OperationContents::RemoveChat(courier_model::RemoveChatOperation {
                delete_globally_if_possible: true,
                report_chat_spam: false,
                top_message_id: None,
            }),
        )
        .await
        .unwrap();

    assert!(
        eventually(|| {
            let oplog = oplog.clone();
            async move { oplog.entry(peer, tag, entry.tag_local_index).await.unwrap().is_none() }
        })
        .await,
        "entry should be removed after the fallback settles"
    );

    // Hard delete failed, leave succeeded: exactly one batch applied.
    let calls = env.remote.calls();
    assert_eq!(
        calls,
        vec![
            RemoteCall::DeleteChannel { channel_id: 5 },
            RemoteCall::LeaveChannel { channel_id: 5 },
        ]
    );
    assert_eq!(env.sink.events().len(), 1);

    worker.close().await;
    oplog.close().await;
}

#[tokio::test]
async fn test_superseded_operation_cancels_inflight_call() {
    common::init_tracing();
    let dir = tempdir().unwrap();
    let (oplog, runner) = Oplog::open(dir.path().join("oplog.redb")).unwrap();
    tokio::spawn(runner.run());

    let env = TestEnv::new();
    let peer = PeerId::user(6);
    env.chats.put_peer(Peer::new(peer, Some(5))).unwrap();
    env.remote.set_delay(Duration::from_millis(300));

    let worker = OperationWorker::new(oplog.clone(), env.services()).spawn().await.unwrap();

    let tag = TAG_CLOUD_CHAT_REMOVALS;
    let entry = oplog.add_entry(peer, tag, remove_messages(&[1])).await.unwrap();

    // Wait until the remote call is in flight.
    assert!(
        eventually(|| {
            let remote = env.remote.clone();
            async move { remote.calls().len() == 1 }
        })
        .await
    );

    // The producer coalesces the queued operation away; the view omits the
    // merged index and the dispatcher must cancel the in-flight unit.
    oplog.remove_entry(peer, tag, entry.tag_local_index).await.unwrap();

    // Give the cancelled call time to have completed, had it survived.
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(env.remote.calls().len(), 1, "no retry after cancellation");
    assert!(env.sink.events().is_empty(), "cancelled operation must not emit events");

    worker.close().await;
    oplog.close().await;
}

#[tokio::test]
async fn test_shutdown_preserves_claimed_entry_and_next_run_cleans_it() {
    common::init_tracing();
    let dir = tempdir().unwrap();
    let path = dir.path().join("oplog.redb");
    let tag = TAG_CLOUD_CHAT_REMOVALS;
    let peer = PeerId::user(7);

    let (oplog, runner) = Oplog::open(&path).unwrap();
    tokio::spawn(runner.run());

    let env = TestEnv::new();
    env.chats.put_peer(Peer::new(peer, Some(5))).unwrap();
    env.remote.set_delay(Duration::from_millis(300));

    let worker = OperationWorker::new(oplog.clone(), env.services()).spawn().await.unwrap();
    let entry = oplog.add_entry(peer, tag, remove_messages(&[9])).await.unwrap();

    assert!(
        eventually(|| {
            let remote = env.remote.clone();
            async move { remote.calls().len() == 1 }
        })
        .await
    );

    // Shutdown mid-execution: the in-flight call is cancelled and the
    // claimed entry stays in the log, inert.
    worker.close().await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let inert = oplog.entry(peer, tag, entry.tag_local_index).await.unwrap().unwrap();
    assert_eq!(inert.merged_index, None);
    assert_eq!(inert.contents, None);
    assert!(env.sink.events().is_empty());

    // The next run cannot re-execute a claimed entry; it just removes it,
    // leaving the log clean.
    let worker = OperationWorker::new(oplog.clone(), env.services()).spawn().await.unwrap();
    assert!(
        eventually(|| {
            let oplog = oplog.clone();
            async move { oplog.entry(peer, tag, entry.tag_local_index).await.unwrap().is_none() }
        })
        .await
    );
    assert_eq!(env.remote.calls().len(), 1, "claimed entry is never re-executed");
    assert!(env.sink.events().is_empty());

    worker.close().await;
    oplog.close().await;
}
