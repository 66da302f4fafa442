mod render;
mod state;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::info;

use crate::matchmaker::{Matchmaker, SessionHandle, SessionId};

/// The inactivity supervisor's timing parameters, threaded in at spawn
/// time so the session can start its own supervisor task once it leaves
/// `AwaitingInterests` (not before — a session sitting at the interests
/// prompt is not yet "idle chat", per the reset/lifecycle rules).
#[derive(Clone, Copy)]
pub struct SupervisorTiming {
    pub poll_interval: Duration,
    pub warn_threshold: Duration,
    pub evict_threshold: Duration,
}

pub use state::{Mode, Role};

/// Everything that can happen to a session from outside its own actor
/// task. The actor task is the only thing that ever mutates `Session`'s
/// fields; every one of these is a message, never a direct field write.
pub enum SessionEvent {
    /// A line of input read off the SSH channel.
    Input(String),
    /// The client's terminal was resized.
    ResizeTerminal(u32),
    /// A chat line relayed from the current partner.
    MsgFromPeer(String),
    /// A partner was found for this session.
    Matched { partner: SessionHandle, common_interests: HashSet<String> },
    /// The partner left (quit, disconnected, evicted, or re-matched).
    PeerDisconnected(String),
    /// The transport itself closed (the client's own channel went away).
    /// Distinct from `PeerDisconnected`, which is what the *other* side of
    /// a pairing receives.
    Closed,
    /// A cosmetic notice to splice into the log without changing mode
    /// (e.g. "the stranger saved the chat log.").
    Notice(String),
    /// The inactivity supervisor has decided this session should be warned.
    Warn,
    /// The inactivity supervisor has decided this session should be evicted.
    Evict,
}

/// The sink a session actor writes rendered frames through. Implemented by
/// the SSH transport adapter; a test-only in-memory implementation lives in
/// this module's test submodule.
pub trait ChannelWriter: Send + Sync + 'static {
    fn send_frame(&self, frame: String);
    fn close(&self);
}

pub struct Session {
    id: SessionId,
    self_handle: SessionHandle,
    partner: Option<SessionHandle>,
    messages: Vec<state::Message>,
    art: &'static str,
    terminal_height: u32,
    visible_lines: Option<usize>,
    mode: Mode,
    matched: bool,
    interests: HashSet<String>,
    chat_count: u32,
    last_active_ms: Arc<AtomicU64>,
    start: Instant,
    matchmaker: Arc<Matchmaker>,
    closing: Arc<AtomicBool>,
    supervisor_timing: SupervisorTiming,
}

/// Spawns a session actor and returns the mailbox sender the transport
/// adapter should forward SSH events through, along with the atomics the
/// inactivity supervisor reads.
pub fn spawn(
    id: SessionId,
    matchmaker: Arc<Matchmaker>,
    output: Arc<dyn ChannelWriter>,
    supervisor_timing: SupervisorTiming,
) -> (SessionHandle, Arc<AtomicU64>, Arc<AtomicBool>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let self_handle = SessionHandle { id, mailbox: tx };
    let last_active_ms = Arc::new(AtomicU64::new(0));
    let closing = Arc::new(AtomicBool::new(false));

    let session = Session {
        id,
        self_handle: self_handle.clone(),
        partner: None,
        messages: Vec::new(),
        art: crate::art::pick(),
        terminal_height: crate::consts::DEFAULT_TERMINAL_HEIGHT,
        visible_lines: None,
        mode: Mode::AwaitingInterests,
        matched: false,
        interests: HashSet::new(),
        chat_count: 0,
        last_active_ms: last_active_ms.clone(),
        closing: closing.clone(),
        supervisor_timing,
        start: Instant::now(),
        matchmaker: matchmaker.clone(),
    };

    matchmaker.register();

    let closing_for_actor = closing.clone();
    tokio::spawn(run(session, rx, output, closing_for_actor));

    (self_handle, last_active_ms, closing)
}

async fn run(
    mut session: Session,
    mut mailbox: mpsc::UnboundedReceiver<SessionEvent>,
    output: Arc<dyn ChannelWriter>,
    closing: Arc<AtomicBool>,
) {
    let id = session.id;
    session.send_splash(output.as_ref());

    while let Some(event) = mailbox.recv().await {
        match session.handle_event(event, output.as_ref()) {
            Ok(true) => break,
            Ok(false) => {}
            Err(err) => {
                tracing::error!(session = id, error = %err, "error handling session event");
            }
        }
    }

    closing.store(true, Ordering::SeqCst);
    info!(session = id, messages = session.messages.len(), "session ended");
}

impl Session {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn handle(&self) -> SessionHandle {
        self.self_handle.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    pub struct CollectingWriter {
        pub frames: Mutex<Vec<String>>,
        pub closed: Mutex<bool>,
    }

    impl CollectingWriter {
        pub fn new() -> Arc<Self> {
            Arc::new(CollectingWriter { frames: Mutex::new(Vec::new()), closed: Mutex::new(false) })
        }
    }

    impl ChannelWriter for CollectingWriter {
        fn send_frame(&self, frame: String) {
            self.frames.lock().unwrap().push(frame);
        }
        fn close(&self) {
            *self.closed.lock().unwrap() = true;
        }
    }

    fn spawn_test_session(id: SessionId, mm: Arc<Matchmaker>) -> (SessionHandle, Arc<CollectingWriter>) {
        let writer = CollectingWriter::new();
        let timing = SupervisorTiming {
            poll_interval: Duration::from_secs(30),
            warn_threshold: Duration::from_secs(240),
            evict_threshold: Duration::from_secs(300),
        };
        let (handle, _last_active, _closing) = spawn(id, mm, writer.clone(), timing);
        (handle, writer)
    }

    #[tokio::test]
    async fn splash_is_sent_on_spawn() {
        let mm = Arc::new(Matchmaker::new());
        let (_handle, writer) = spawn_test_session(1, mm);
        tokio::task::yield_now().await;
        assert!(!writer.frames.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn two_sessions_get_matched_and_relay_chat() {
        let mm = Arc::new(Matchmaker::new());
        let (handle_a, writer_a) = spawn_test_session(1, mm.clone());
        let (handle_b, writer_b) = spawn_test_session(2, mm.clone());

        handle_a.notify(SessionEvent::Input(String::new()));
        handle_b.notify(SessionEvent::Input(String::new()));
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        handle_a.notify(SessionEvent::Input("hello".to_string()));
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        let b_frames = writer_b.frames.lock().unwrap();
        let last = b_frames.last().unwrap();
        assert!(last.contains("stranger: hello"));
        drop(b_frames);
        let _ = writer_a;
    }
}
