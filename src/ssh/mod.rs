mod hostkey;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use async_trait::async_trait;
use russh::server::{self, Auth, Msg, Session};
use russh::{Channel, ChannelId, CryptoVec};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::Config;
use crate::matchmaker::Matchmaker;
use crate::ratelimit::RateLimiter;
use crate::session::{self, ChannelWriter, SessionEvent};

/// Long-lived, shared state every connection needs. Threaded through
/// explicitly rather than reached via any global.
pub struct Daemon {
    matchmaker: Arc<Matchmaker>,
    rate_limiter: Arc<RateLimiter>,
    config: Arc<Config>,
    next_session_id: AtomicU64,
}

impl Daemon {
    pub fn new(config: Arc<Config>) -> Self {
        Daemon {
            matchmaker: Arc::new(Matchmaker::new()),
            rate_limiter: Arc::new(RateLimiter::new(
                config.rate_limit_window(),
                config.rate_limit_max_connections(),
            )),
            config,
            next_session_id: AtomicU64::new(1),
        }
    }

    fn next_id(&self) -> u64 {
        self.next_session_id.fetch_add(1, Ordering::SeqCst)
    }
}

/// Runs the rate-limited accept loop. The peer address is available before
/// the SSH handshake starts, so admission control runs strictly ahead of
/// session creation, per the required Transport → Rate Limiter → Session
/// ordering.
pub async fn serve(daemon: Arc<Daemon>, listener: TcpListener, ssh_config: Arc<server::Config>) -> anyhow::Result<()> {
    loop {
        let (stream, peer_addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(err) => {
                warn!(error = %err, "accept failed");
                continue;
            }
        };

        if !daemon.rate_limiter.admit(peer_addr.ip(), Instant::now()) {
            info!(peer = %peer_addr, "rate limit exceeded, dropping connection");
            drop(stream);
            continue;
        }

        info!(peer = %peer_addr, online = daemon.matchmaker.online(), "new connection");

        let daemon = daemon.clone();
        let ssh_config = ssh_config.clone();
        tokio::spawn(async move {
            let handler = ChatHandler::new(daemon, peer_addr);
            if let Err(err) = russh::server::run_stream(ssh_config, stream, handler).await {
                warn!(peer = %peer_addr, error = %err, "ssh session ended with error");
            }
        });
    }
}

pub fn load_ssh_config(config: &Config) -> anyhow::Result<Arc<server::Config>> {
    let key = hostkey::load_or_generate(config.host_key_path())?;
    Ok(Arc::new(server::Config {
        keys: vec![key],
        ..Default::default()
    }))
}

/// Translates SSH channel events into `SessionEvent`s for the owning
/// session's mailbox, and exposes the `russh::server::Handle` the session
/// actor writes rendered frames back through. Holds no chat state itself.
struct ChatHandler {
    daemon: Arc<Daemon>,
    peer_addr: SocketAddr,
    mailbox: Option<crate::matchmaker::SessionHandle>,
    input_buf: String,
}

impl ChatHandler {
    fn new(daemon: Arc<Daemon>, peer_addr: SocketAddr) -> Self {
        ChatHandler { daemon, peer_addr, mailbox: None, input_buf: String::new() }
    }
}

enum OutMsg {
    Frame(String),
    Close,
}

struct SshWriter {
    tx: mpsc::UnboundedSender<OutMsg>,
}

impl ChannelWriter for SshWriter {
    fn send_frame(&self, frame: String) {
        let _ = self.tx.send(OutMsg::Frame(frame));
    }
    fn close(&self) {
        let _ = self.tx.send(OutMsg::Close);
    }
}

async fn pump_output(handle: server::Handle, channel_id: ChannelId, mut rx: mpsc::UnboundedReceiver<OutMsg>) {
    while let Some(msg) = rx.recv().await {
        match msg {
            OutMsg::Frame(frame) => {
                if handle.data(channel_id, CryptoVec::from(frame.into_bytes())).await.is_err() {
                    break;
                }
            }
            OutMsg::Close => {
                let _ = handle.close(channel_id).await;
                break;
            }
        }
    }
}

#[async_trait]
impl server::Handler for ChatHandler {
    type Error = anyhow::Error;

    async fn auth_none(&mut self, _user: &str) -> Result<Auth, Self::Error> {
        // No accounts; every client is admitted unconditionally.
        Ok(Auth::Accept)
    }

    async fn channel_open_session(
        &mut self,
        channel: Channel<Msg>,
        session: &mut Session,
    ) -> Result<bool, Self::Error> {
        let channel_id = channel.id();
        let ssh_handle = session.handle();

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(pump_output(ssh_handle, channel_id, rx));
        let writer: Arc<dyn ChannelWriter> = Arc::new(SshWriter { tx });

        let id = self.daemon.next_id();
        info!(peer = %self.peer_addr, session = id, "shell opened");
        let timing = session::SupervisorTiming {
            poll_interval: self.daemon.config.supervisor_poll_interval(),
            warn_threshold: self.daemon.config.inactivity_warn_threshold(),
            evict_threshold: self.daemon.config.inactivity_evict_threshold(),
        };
        let (mailbox, _last_active, _closing) =
            session::spawn(id, self.daemon.matchmaker.clone(), writer, timing);

        self.mailbox = Some(mailbox);
        Ok(true)
    }

    async fn shell_request(&mut self, channel: ChannelId, session: &mut Session) -> Result<(), Self::Error> {
        session.channel_success(channel);
        Ok(())
    }

    async fn pty_request(
        &mut self,
        channel: ChannelId,
        _term: &str,
        _col_width: u32,
        row_height: u32,
        _pix_width: u32,
        _pix_height: u32,
        _modes: &[(russh::Pty, u32)],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        if let Some(mailbox) = &self.mailbox {
            mailbox.notify(SessionEvent::ResizeTerminal(row_height));
        }
        session.channel_success(channel);
        Ok(())
    }

    async fn window_change_request(
        &mut self,
        _channel: ChannelId,
        _col_width: u32,
        row_height: u32,
        _pix_width: u32,
        _pix_height: u32,
        _session: &mut Session,
    ) -> Result<(), Self::Error> {
        if let Some(mailbox) = &self.mailbox {
            mailbox.notify(SessionEvent::ResizeTerminal(row_height));
        }
        Ok(())
    }

    async fn data(&mut self, _channel: ChannelId, data: &[u8], _session: &mut Session) -> Result<(), Self::Error> {
        self.input_buf.push_str(&String::from_utf8_lossy(data));

        // russh hands us raw bytes with no line discipline of its own; an
        // interactive client's Enter key is CR (0x0D), not LF, so a line
        // ends on either, with a \r\n pair collapsing to one line.
        while let Some(pos) = self.input_buf.find(['\r', '\n']) {
            let line: String = self.input_buf.drain(..pos).collect();
            let terminator = self.input_buf.drain(..1).next();
            if terminator == Some('\r') && self.input_buf.starts_with('\n') {
                self.input_buf.drain(..1);
            }
            if let Some(mailbox) = &self.mailbox {
                mailbox.notify(SessionEvent::Input(line));
            }
        }
        Ok(())
    }

    async fn channel_close(&mut self, _channel: ChannelId, _session: &mut Session) -> Result<(), Self::Error> {
        if let Some(mailbox) = self.mailbox.take() {
            mailbox.notify(SessionEvent::Closed);
        }
        Ok(())
    }
}

impl Drop for ChatHandler {
    fn drop(&mut self) {
        if let Some(mailbox) = self.mailbox.take() {
            mailbox.notify(SessionEvent::Closed);
        }
    }
}

pub async fn bind(config: &Config) -> anyhow::Result<TcpListener> {
    let addr = format!("0.0.0.0:{}", config.port());
    TcpListener::bind(&addr).await.with_context(|| format!("binding {addr}"))
}
