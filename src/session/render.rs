use chrono::Local;

use crate::consts;

use super::state::Role;
use super::{Mode, Session};

const CLEAR_HOME: &str = "\x1b[2J\x1b[H";
const RESET: &str = "\x1b[0m";
const COLOR_SYSTEM: &str = "\x1b[36m";
const COLOR_MATCHED: &str = "\x1b[33m";
const COLOR_STRANGER: &str = "\x1b[31m";
const COLOR_YOU: &str = "\x1b[34m";

fn is_noise(text: &str) -> bool {
    text.contains("online right now")
        || text == "finding you a stranger to chat with..."
        || text == "stranger disconnected."
        || text == "the stranger was disconnected for inactivity."
}

impl Session {
    /// Builds the full terminal frame for the current state: clear/home,
    /// splash (only while unmatched), the most recent visible lines of
    /// the (possibly noise-filtered) transcript, and a trailing prompt.
    pub(super) fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(CLEAR_HOME);

        if !self.matched {
            out.push_str("\r\n");
            out.push_str(self.art);
            out.push_str("\r\n\r\n");
        }

        if self.mode == Mode::AwaitingInterests {
            out.push_str(&format!(
                "{COLOR_SYSTEM}what are your interests? enter to skip (separate with commas){RESET}\r\n"
            ));
            out.push_str(&format!("{COLOR_SYSTEM}example: gaming, sports, pb and j{RESET}\r\n\r\n"));
        }

        let lines_to_show = self.visible_lines.unwrap_or(consts::VISIBLE_LINES_FALLBACK);

        let filtered: Vec<&super::state::Message> = if self.matched {
            self.messages.iter().filter(|m| !is_noise(&m.text)).collect()
        } else {
            self.messages.iter().collect()
        };

        let recent: &[&super::state::Message] = if filtered.len() > lines_to_show {
            &filtered[filtered.len() - lines_to_show..]
        } else {
            &filtered[..]
        };

        let rule = "─".repeat(consts::RULE_WIDTH);
        for msg in recent {
            if msg.role == Role::System && msg.text == rule && self.chat_count > 0 {
                let plural = if self.chat_count != 1 { "s" } else { "" };
                out.push_str(&format!(
                    "{COLOR_SYSTEM}you've chatted with {} stranger{plural} this session!{RESET}\r\n",
                    self.chat_count
                ));
            }
            match msg.role {
                Role::System => {
                    if msg.show_timestamp {
                        out.push_str(&format!("{COLOR_SYSTEM}{} {}{RESET}\r\n", msg.timestamp, msg.text));
                    } else {
                        out.push_str(&format!("{COLOR_SYSTEM}{}{RESET}\r\n", msg.text));
                    }
                }
                Role::Matched => {
                    out.push_str(&format!("{COLOR_MATCHED}{}{RESET}\r\n", msg.text));
                }
                Role::Stranger => {
                    out.push_str(&format!("{COLOR_STRANGER}{} stranger: {}{RESET}\r\n", msg.timestamp, msg.text));
                }
                Role::You => {
                    out.push_str(&format!("{COLOR_YOU}{} you: {}{RESET}\r\n", msg.timestamp, msg.text));
                }
            }
        }

        out.push_str("\r\n> ");
        out
    }

    /// An unfiltered, untruncated dump of the whole transcript for the
    /// 'save' command. Read-only: it never mutates `messages`.
    pub(super) fn render_full_chat(&self) -> String {
        let banner = "=".repeat(consts::SAVE_LOG_BANNER_WIDTH);
        let mut out = String::new();
        out.push_str(CLEAR_HOME);
        out.push_str(&format!("{banner}\r\n"));
        out.push_str("PARLOR CHAT LOG\r\n");
        out.push_str(&format!("saved: {}\r\n", Local::now().format("%Y-%m-%d %H:%M:%S UTC")));
        out.push_str(&format!("total messages: {}\r\n", self.messages.len()));
        out.push_str(&format!("{banner}\r\n\r\n"));

        for msg in &self.messages {
            match msg.role {
                Role::System | Role::Matched => {
                    if msg.show_timestamp {
                        out.push_str(&format!("{} [SYSTEM] {}\r\n", msg.timestamp, msg.text));
                    } else {
                        out.push_str(&format!("[SYSTEM] {}\r\n", msg.text));
                    }
                }
                Role::Stranger => out.push_str(&format!("{} [STRANGER] {}\r\n", msg.timestamp, msg.text)),
                Role::You => out.push_str(&format!("{} [YOU] {}\r\n", msg.timestamp, msg.text)),
            }
        }

        out.push_str("\r\n");
        out.push_str(&format!("{banner}\r\n"));
        out.push_str("end of chat log - select all and copy to save!\r\n");
        out.push_str(&format!("{banner}\r\n\r\n"));
        out.push_str("type 'back' to return to chat, or 'quit' to exit\r\n> ");
        out
    }
}
