use std::sync::atomic::Ordering;
use std::time::Instant;

use chrono::Local;

use crate::consts;
use crate::matchmaker::SessionHandle;

use super::{ChannelWriter, Session, SessionEvent};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Mode {
    AwaitingInterests,
    Chatting,
    SaveView,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Role {
    System,
    Matched,
    Stranger,
    You,
}

pub struct Message {
    pub timestamp: String,
    pub role: Role,
    pub text: String,
    pub show_timestamp: bool,
}

impl Session {
    fn now_timestamp() -> String {
        Local::now().format("[%H:%M]").to_string()
    }

    fn touch_last_active(&self) {
        let elapsed_ms = Instant::now().duration_since(self.start).as_millis() as u64;
        self.last_active_ms.store(elapsed_ms, Ordering::SeqCst);
    }

    pub(super) fn add_message(&mut self, role: Role, text: impl Into<String>, show_timestamp: bool) {
        self.messages.push(Message {
            timestamp: Self::now_timestamp(),
            role,
            text: text.into(),
            show_timestamp,
        });
    }

    fn online_notice_text(&self) -> String {
        let n = self.matchmaker.online();
        if n == 1 {
            format!("{n} user (just you...) online right now")
        } else {
            format!("{n} users online right now")
        }
    }

    pub(super) fn send_splash(&mut self, output: &dyn ChannelWriter) {
        output.send_frame(self.render());
    }

    /// Runs the AwaitingInterests → Chatting transition.
    fn begin_chatting(&mut self, interests_line: &str, output: &dyn ChannelWriter) {
        if !interests_line.is_empty() {
            self.interests = interests_line
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect();
        }
        self.mode = Mode::Chatting;

        let online = self.online_notice_text();
        self.add_message(Role::System, online, false);
        self.add_message(Role::System, "finding you a stranger to chat with...", false);
        self.add_message(
            Role::System,
            "commands: 'save' to view full chat | 'next' for new stranger | 'quit' to exit",
            false,
        );
        self.add_message(Role::System, "─".repeat(consts::RULE_WIDTH), false);

        crate::supervisor::spawn(
            self.self_handle.clone(),
            self.last_active_ms.clone(),
            self.closing.clone(),
            self.start,
            self.supervisor_timing.poll_interval,
            self.supervisor_timing.warn_threshold,
            self.supervisor_timing.evict_threshold,
        );

        output.send_frame(self.render());
        self.attempt_match(output);
    }

    /// Asks the Matchmaker for a partner. If one is found, wires up both
    /// sides; this session's own state is updated directly, the partner's
    /// is updated by sending it a `Matched` event for its own actor to
    /// apply.
    pub(super) fn attempt_match(&mut self, output: &dyn ChannelWriter) {
        let (partner, common) = self.matchmaker.find_match(self.self_handle.clone(), &self.interests);

        let Some(partner) = partner else {
            return;
        };

        self.partner = Some(partner.clone());
        self.matched = true;
        self.chat_count += 1;
        self.add_message(Role::Matched, "connected to a stranger!", false);
        if !common.is_empty() {
            self.add_message(Role::Matched, interest_sentence(&common), false);
        }
        output.send_frame(self.render());

        partner.notify(SessionEvent::Matched { partner: self.self_handle.clone(), common_interests: common });
    }

    /// Applies a `Matched` event received from the peer that initiated the
    /// pairing. Appends exactly one copy of the banner from this session's
    /// own perspective.
    pub(super) fn apply_matched(
        &mut self,
        partner: SessionHandle,
        common: std::collections::HashSet<String>,
        output: &dyn ChannelWriter,
    ) {
        self.partner = Some(partner);
        self.matched = true;
        self.chat_count += 1;
        self.add_message(Role::Matched, "connected to a stranger!", false);
        if !common.is_empty() {
            self.add_message(Role::Matched, interest_sentence(&common), false);
        }
        output.send_frame(self.render());
    }

    /// Clears the transcript and rebuilds the pre-pairing banner, per the
    /// reset protocol. `reason` is `None` for the default
    /// "stranger disconnected." notice.
    pub(super) fn clear_chat_and_reset(&mut self, reason: Option<String>) {
        self.messages.clear();
        let online = self.online_notice_text();
        self.add_message(Role::System, online, false);
        self.add_message(
            Role::Matched,
            reason.unwrap_or_else(|| "stranger disconnected.".to_string()),
            false,
        );
        self.add_message(Role::System, "finding you a stranger to chat with...", false);
        self.add_message(
            Role::System,
            "commands: 'save' to view full chat | 'next' for new stranger | 'quit' to exit",
            false,
        );
        self.add_message(Role::System, "─".repeat(consts::RULE_WIDTH), false);
    }

    /// Handles one inbound event. Returns `Ok(true)` if the session should
    /// now be torn down (channel closed, actor loop should exit).
    pub(super) fn handle_event(
        &mut self,
        event: SessionEvent,
        output: &dyn ChannelWriter,
    ) -> anyhow::Result<bool> {
        match event {
            SessionEvent::Input(line) => Ok(self.handle_input(line, output)),
            SessionEvent::ResizeTerminal(height) => {
                self.terminal_height = if height > 0 { height } else { consts::DEFAULT_TERMINAL_HEIGHT };
                self.visible_lines =
                    Some((self.terminal_height.saturating_sub(consts::VISIBLE_LINES_HEIGHT_OFFSET))
                        .max(consts::VISIBLE_LINES_FLOOR) as usize);
                if self.mode != Mode::SaveView && self.mode != Mode::AwaitingInterests {
                    output.send_frame(self.render());
                }
                Ok(false)
            }
            SessionEvent::MsgFromPeer(text) => {
                // A relay that lands just after a reset (partner already
                // cleared) is a stale message from the prior pairing; drop it
                // rather than showing a stranger line while unmatched.
                if self.matched {
                    self.add_message(Role::Stranger, text, true);
                    output.send_frame(self.render());
                }
                Ok(false)
            }
            SessionEvent::Matched { partner, common_interests } => {
                self.apply_matched(partner, common_interests, output);
                Ok(false)
            }
            SessionEvent::PeerDisconnected(reason) => {
                // Idempotence guard (R1/R2): a second notice arriving after
                // we've already reset (or never matched this partner) is a
                // no-op.
                if self.matched {
                    self.partner = None;
                    self.matched = false;
                    self.clear_chat_and_reset(Some(reason));
                    output.send_frame(self.render());
                    self.attempt_match(output);
                }
                Ok(false)
            }
            SessionEvent::Notice(text) => {
                self.add_message(Role::System, text, false);
                output.send_frame(self.render());
                Ok(false)
            }
            SessionEvent::Warn => {
                self.add_message(
                    Role::System,
                    "you'll be disconnected in 1 minute due to inactivity.",
                    false,
                );
                output.send_frame(self.render());
                Ok(false)
            }
            SessionEvent::Evict => {
                self.add_message(
                    Role::System,
                    "you were disconnected for being inactive for 5 minutes.",
                    false,
                );
                output.send_frame(self.render());
                output.send_frame("\r\ninactivity timeout - disconnected.\r\n".to_string());
                self.teardown(Some("the stranger was disconnected for inactivity.".to_string()));
                output.close();
                Ok(true)
            }
            SessionEvent::Closed => {
                self.teardown(None);
                Ok(true)
            }
        }
    }

    fn handle_input(&mut self, raw: String, output: &dyn ChannelWriter) -> bool {
        let msg = raw.trim().to_string();

        if self.mode == Mode::AwaitingInterests {
            self.begin_chatting(&msg, output);
            return false;
        }

        if msg.is_empty() {
            return false;
        }
        self.touch_last_active();

        let lower = msg.to_lowercase();

        if lower == "quit" {
            if self.mode != Mode::SaveView {
                self.add_message(Role::System, "cya!", true);
                output.send_frame(self.render());
            }
            output.send_frame("\r\ncya!\r\n".to_string());
            self.teardown(None);
            output.close();
            return true;
        }

        if lower == "back" && self.mode == Mode::SaveView {
            self.mode = Mode::Chatting;
            output.send_frame(self.render());
            return false;
        }

        if lower == "save" && self.mode != Mode::SaveView {
            output.send_frame(self.render_full_chat());
            self.mode = Mode::SaveView;
            let ts = Self::now_timestamp();
            self.add_message(Role::System, format!("{ts} you saved the chat log. (stranger can see this)"), false);
            if let Some(partner) = &self.partner {
                partner.notify(SessionEvent::Notice(format!("{ts} the stranger saved the chat log.")));
            }
            return false;
        }

        if self.mode == Mode::SaveView {
            output.send_frame("Type 'back' to return to chat, or 'quit' to exit\r\n> ".to_string());
            return false;
        }

        if lower == "next" {
            if let Some(partner) = self.partner.take() {
                partner.notify(SessionEvent::PeerDisconnected("stranger disconnected.".to_string()));
            }
            self.matched = false;
            self.clear_chat_and_reset(None);
            output.send_frame(self.render());
            self.attempt_match(output);
            return false;
        }

        if let Some(partner) = &self.partner {
            self.add_message(Role::You, msg.clone(), true);
            output.send_frame(self.render());
            partner.notify(SessionEvent::MsgFromPeer(msg));
        } else {
            self.add_message(Role::System, "waiting for connection...", true);
            output.send_frame(self.render());
        }

        false
    }

    /// Leaves the matchmaker (idempotent) and, if paired, notifies the
    /// partner exactly once (idempotent via `Option::take`).
    pub(super) fn teardown(&mut self, peer_reason: Option<String>) {
        self.matchmaker.cancel(self.id);
        self.matchmaker.unregister();
        if let Some(partner) = self.partner.take() {
            partner.notify(SessionEvent::PeerDisconnected(
                peer_reason.unwrap_or_else(|| "stranger disconnected.".to_string()),
            ));
        }
    }
}

fn interest_sentence(common: &std::collections::HashSet<String>) -> String {
    let mut interests: Vec<&String> = common.iter().collect();
    interests.sort();
    match interests.len() {
        0 => String::new(),
        1 => format!("you both like {}.", interests[0]),
        2 => format!("you both like {} and {}.", interests[0], interests[1]),
        _ => {
            let (last, rest) = interests.split_last().unwrap();
            format!("you both like {}, and {}.", rest.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", "), last)
        }
    }
}
