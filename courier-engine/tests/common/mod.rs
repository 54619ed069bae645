//! Shared test harness: a scriptable mock remote and a recording sink.
#![allow(dead_code)]

use async_trait::async_trait;
use courier_engine::Services;
use courier_model::{InputChannel, InputPeer, MessageId, PtsUpdate, UpdateSink, UpdatesBatch};
use courier_remote::{AffectedHistory, AffectedMessages, RemoteService, RpcError};
use courier_store::ChatStore;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Install a subscriber once so `RUST_LOG=debug cargo test` shows traces.
pub fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

/// One recorded remote call, in issue order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    DeleteMessages { ids: Vec<MessageId>, revoke: bool },
    DeleteChannelMessages { channel_id: i64, ids: Vec<MessageId> },
    DeleteHistory { max_id: MessageId, just_clear: bool, revoke: bool },
    DeleteChannelHistory { channel_id: i64, max_id: MessageId },
    DeleteChannel { channel_id: i64 },
    LeaveChannel { channel_id: i64 },
    DeleteChatParticipant { group_id: i64 },
    ReportSpam,
}

/// Scriptable in-memory remote. Every successful mutating call hands out
/// the next pts value, so emission order is visible in the sink.
#[derive(Default)]
pub struct MockRemote {
    calls: Mutex<Vec<RemoteCall>>,
    pts: AtomicI32,
    delay: Mutex<Option<Duration>>,
    history_script: Mutex<VecDeque<Result<i32, RpcError>>>,
    message_script: Mutex<VecDeque<Result<(), RpcError>>>,
    fail_delete_channel: Mutex<bool>,
    fail_leave_channel: Mutex<bool>,
    fail_report_spam: Mutex<bool>,
    fail_channel_history: Mutex<bool>,
}

impl MockRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every response by `delay` (for cancellation tests).
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Script delete-history outcomes: `Ok(offset)` or a failure, consumed
    /// per call. An exhausted script answers `Ok(0)`.
    pub fn script_history(&self, outcomes: Vec<Result<i32, RpcError>>) {
        *self.history_script.lock().unwrap() = outcomes.into();
    }

    /// Script delete-messages outcomes per batch. An exhausted script
    /// answers success.
    pub fn script_messages(&self, outcomes: Vec<Result<(), RpcError>>) {
        *self.message_script.lock().unwrap() = outcomes.into();
    }

    pub fn fail_delete_channel(&self) {
        *self.fail_delete_channel.lock().unwrap() = true;
    }

    pub fn fail_leave_channel(&self) {
        *self.fail_leave_channel.lock().unwrap() = true;
    }

    pub fn fail_report_spam(&self) {
        *self.fail_report_spam.lock().unwrap() = true;
    }

    pub fn fail_channel_history(&self) {
        *self.fail_channel_history.lock().unwrap() = true;
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: RemoteCall) {
        self.calls.lock().unwrap().push(call);
    }

    async fn maybe_delay(&self) {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn next_pts(&self) -> i32 {
        self.pts.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn server_error() -> RpcError {
        RpcError::Server { code: 400, message: "scripted failure".into() }
    }
}

#[async_trait]
impl RemoteService for MockRemote {
    async fn delete_messages(
        &self,
        ids: &[MessageId],
        revoke: bool,
    ) -> Result<AffectedMessages, RpcError> {
        self.record(RemoteCall::DeleteMessages { ids: ids.to_vec(), revoke });
        self.maybe_delay().await;
        match self.message_script.lock().unwrap().pop_front() {
            Some(Err(e)) => Err(e),
            _ => Ok(AffectedMessages { pts: self.next_pts(), pts_count: ids.len() as i32 }),
        }
    }

    async fn delete_channel_messages(
        &self,
        channel: InputChannel,
        ids: &[MessageId],
    ) -> Result<AffectedMessages, RpcError> {
        self.record(RemoteCall::DeleteChannelMessages {
            channel_id: channel.channel_id,
            ids: ids.to_vec(),
        });
        self.maybe_delay().await;
        match self.message_script.lock().unwrap().pop_front() {
            Some(Err(e)) => Err(e),
            _ => Ok(AffectedMessages { pts: self.next_pts(), pts_count: ids.len() as i32 }),
        }
    }

    async fn delete_history(
        &self,
        _peer: InputPeer,
        max_id: MessageId,
        just_clear: bool,
        revoke: bool,
    ) -> Result<AffectedHistory, RpcError> {
        self.record(RemoteCall::DeleteHistory { max_id, just_clear, revoke });
        self.maybe_delay().await;
        match self.history_script.lock().unwrap().pop_front() {
            Some(Ok(offset)) => {
                Ok(AffectedHistory { pts: self.next_pts(), pts_count: 1, offset })
            }
            Some(Err(e)) => Err(e),
            None => Ok(AffectedHistory { pts: self.next_pts(), pts_count: 1, offset: 0 }),
        }
    }

    async fn delete_channel_history(
        &self,
        channel: InputChannel,
        max_id: MessageId,
    ) -> Result<bool, RpcError> {
        self.record(RemoteCall::DeleteChannelHistory {
            channel_id: channel.channel_id,
            max_id,
        });
        self.maybe_delay().await;
        if *self.fail_channel_history.lock().unwrap() {
            Err(Self::server_error())
        } else {
            Ok(true)
        }
    }

    async fn delete_channel(&self, channel: InputChannel) -> Result<UpdatesBatch, RpcError> {
        self.record(RemoteCall::DeleteChannel { channel_id: channel.channel_id });
        self.maybe_delay().await;
        if *self.fail_delete_channel.lock().unwrap() {
            Err(Self::server_error())
        } else {
            Ok(UpdatesBatch {
                updates: vec![PtsUpdate::channel(channel.channel_id, self.next_pts(), 1)],
            })
        }
    }

    async fn leave_channel(&self, channel: InputChannel) -> Result<UpdatesBatch, RpcError> {
        self.record(RemoteCall::LeaveChannel { channel_id: channel.channel_id });
        self.maybe_delay().await;
        if *self.fail_leave_channel.lock().unwrap() {
            Err(Self::server_error())
        } else {
            Ok(UpdatesBatch {
                updates: vec![PtsUpdate::channel(channel.channel_id, self.next_pts(), 1)],
            })
        }
    }

    async fn delete_chat_participant(&self, group_id: i64) -> Result<UpdatesBatch, RpcError> {
        self.record(RemoteCall::DeleteChatParticipant { group_id });
        self.maybe_delay().await;
        Ok(UpdatesBatch { updates: vec![PtsUpdate::common(self.next_pts(), 1)] })
    }

    async fn report_spam(&self, _peer: InputPeer) -> Result<bool, RpcError> {
        self.record(RemoteCall::ReportSpam);
        self.maybe_delay().await;
        if *self.fail_report_spam.lock().unwrap() {
            Err(Self::server_error())
        } else {
            Ok(true)
        }
    }
}

/// Everything the sink received, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Sequence(PtsUpdate),
    Batch(UpdatesBatch),
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SinkEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn sequence_updates(&self) -> Vec<PtsUpdate> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SinkEvent::Sequence(update) => Some(update),
                SinkEvent::Batch(_) => None,
            })
            .collect()
    }

    pub fn batches(&self) -> Vec<UpdatesBatch> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SinkEvent::Batch(batch) => Some(batch),
                SinkEvent::Sequence(_) => None,
            })
            .collect()
    }
}

impl UpdateSink for RecordingSink {
    fn apply_sequence_update(&self, update: PtsUpdate) {
        self.events.lock().unwrap().push(SinkEvent::Sequence(update));
    }

    fn apply_updates(&self, batch: UpdatesBatch) {
        self.events.lock().unwrap().push(SinkEvent::Batch(batch));
    }
}

/// Bundle of mock collaborators plus the `Services` view the engine takes.
pub struct TestEnv {
    pub remote: Arc<MockRemote>,
    pub chats: Arc<ChatStore>,
    pub sink: Arc<RecordingSink>,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            remote: Arc::new(MockRemote::new()),
            chats: Arc::new(ChatStore::new()),
            sink: Arc::new(RecordingSink::new()),
        }
    }

    pub fn services(&self) -> Services {
        Services {
            remote: self.remote.clone(),
            chats: self.chats.clone(),
            updates: self.sink.clone(),
        }
    }
}
