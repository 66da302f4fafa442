use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tokio::sync::mpsc::UnboundedSender;

use crate::session::SessionEvent;

pub type SessionId = u64;

/// A cheap, cloneable reference to another session: its identity plus the
/// sending half of its mailbox. Nothing about another session's own state
/// is ever reachable through a `SessionHandle` — every cross-session action
/// is a message send.
#[derive(Clone)]
pub struct SessionHandle {
    pub id: SessionId,
    pub mailbox: UnboundedSender<SessionEvent>,
}

impl SessionHandle {
    /// Posts an event to the peer's mailbox. The peer may already have
    /// disconnected; a failed send is a local, non-fatal condition.
    pub fn notify(&self, event: SessionEvent) {
        let _ = self.mailbox.send(event);
    }
}

struct WaitingEntry {
    handle: SessionHandle,
    interests: HashSet<String>,
    enqueue_seq: u64,
}

/// Process-wide pairing oracle. Constructed once and threaded through the
/// daemon as an explicit `Arc<Matchmaker>` rather than a global.
pub struct Matchmaker {
    waiting: Mutex<HashMap<SessionId, WaitingEntry>>,
    next_seq: AtomicU64,
    active_count: AtomicU64,
}

impl Matchmaker {
    pub fn new() -> Self {
        Matchmaker {
            waiting: Mutex::new(HashMap::new()),
            next_seq: AtomicU64::new(0),
            active_count: AtomicU64::new(0),
        }
    }

    /// Called once, when a session's shell starts.
    pub fn register(&self) {
        self.active_count.fetch_add(1, Ordering::SeqCst);
    }

    /// Called once, at final teardown.
    pub fn unregister(&self) {
        self.active_count.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn online(&self) -> usize {
        self.active_count.load(Ordering::SeqCst) as usize
    }

    /// Removes `id` from the waiting pool, if present. A no-op for unknown
    /// ids, so that both a user-initiated `next` and connection teardown
    /// can call it without coordinating first.
    pub fn cancel(&self, id: SessionId) {
        self.waiting.lock().unwrap().remove(&id);
    }

    /// Interest-preferring, then-FIFO, pairing. Ties within each class are
    /// broken by the waiter's `enqueue_seq`, the order it joined `waiting`.
    pub fn find_match(
        &self,
        handle: SessionHandle,
        interests: &HashSet<String>,
    ) -> (Option<SessionHandle>, HashSet<String>) {
        let mut waiting = self.waiting.lock().unwrap();
        waiting.remove(&handle.id);

        let mut best: Option<(&SessionId, HashSet<String>, u64)> = None;
        for (id, entry) in waiting.iter() {
            let common: HashSet<String> =
                interests.intersection(&entry.interests).cloned().collect();
            if common.is_empty() {
                continue;
            }
            if best.as_ref().map_or(true, |(_, _, seq)| entry.enqueue_seq < *seq) {
                best = Some((id, common, entry.enqueue_seq));
            }
        }

        if let Some((id, common, _)) = best {
            let id = *id;
            let partner = waiting.remove(&id).unwrap().handle;
            return (Some(partner), common);
        }

        let mut oldest: Option<(&SessionId, u64)> = None;
        for (id, entry) in waiting.iter() {
            if oldest.as_ref().map_or(true, |(_, seq)| entry.enqueue_seq < *seq) {
                oldest = Some((id, entry.enqueue_seq));
            }
        }

        if let Some((id, _)) = oldest {
            let id = *id;
            let partner = waiting.remove(&id).unwrap().handle;
            return (Some(partner), HashSet::new());
        }

        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let id = handle.id;
        waiting.insert(id, WaitingEntry { handle, interests: interests.clone(), enqueue_seq: seq });
        (None, HashSet::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn handle(id: SessionId) -> (SessionHandle, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (SessionHandle { id, mailbox: tx }, rx)
    }

    #[test]
    fn first_caller_waits_second_caller_is_paired() {
        let mm = Matchmaker::new();
        let (a, _ra) = handle(1);
        let (b, _rb) = handle(2);

        let (partner, common) = mm.find_match(a.clone(), &HashSet::new());
        assert!(partner.is_none());
        assert!(common.is_empty());

        let (partner, _) = mm.find_match(b, &HashSet::new());
        assert_eq!(partner.unwrap().id, a.id);
    }

    #[test]
    fn never_matches_the_caller_to_itself() {
        let mm = Matchmaker::new();
        let (a, _ra) = handle(1);
        let (partner, _) = mm.find_match(a.clone(), &HashSet::new());
        assert!(partner.is_none());
        // a is now the sole waiter; a second find_match call for a itself
        // must not return a.
        let (partner, _) = mm.find_match(a.clone(), &HashSet::new());
        assert!(partner.is_none());
    }

    #[test]
    fn common_interest_waiter_is_preferred_over_fifo() {
        let mm = Matchmaker::new();
        let (a, _ra) = handle(1);
        let (b, _rb) = handle(2);
        let (c, _rc) = handle(3);

        let chess: HashSet<String> = ["chess".to_string()].into_iter().collect();
        let gaming: HashSet<String> = ["gaming".to_string()].into_iter().collect();
        let both: HashSet<String> = ["chess".to_string(), "gaming".to_string()].into_iter().collect();

        mm.find_match(a.clone(), &chess);
        mm.find_match(b.clone(), &gaming);

        let (partner, common) = mm.find_match(c, &both);
        assert_eq!(partner.unwrap().id, a.id);
        assert_eq!(common, chess);
    }

    #[test]
    fn falls_back_to_fifo_when_no_interests_overlap() {
        let mm = Matchmaker::new();
        let (a, _ra) = handle(1);
        let (b, _rb) = handle(2);
        let (c, _rc) = handle(3);

        let chess: HashSet<String> = ["chess".to_string()].into_iter().collect();
        let sports: HashSet<String> = ["sports".to_string()].into_iter().collect();

        mm.find_match(a.clone(), &chess);
        let (partner, common) = mm.find_match(b, &sports);
        assert_eq!(partner.unwrap().id, a.id);
        assert!(common.is_empty());

        // c now has nobody waiting.
        let (partner, _) = mm.find_match(c, &sports);
        assert!(partner.is_none());
    }

    #[test]
    fn cancel_is_idempotent_for_unknown_ids() {
        let mm = Matchmaker::new();
        mm.cancel(42);
        mm.cancel(42);
    }

    #[test]
    fn active_count_tracks_register_unregister() {
        let mm = Matchmaker::new();
        assert_eq!(mm.online(), 0);
        mm.register();
        mm.register();
        assert_eq!(mm.online(), 2);
        mm.unregister();
        assert_eq!(mm.online(), 1);
    }
}
