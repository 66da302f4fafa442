use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Sliding-window admission control keyed by source IP. Checked at
/// TCP-accept time, before a session (or even an SSH handshake) exists.
pub struct RateLimiter {
    window: Duration,
    max_connections: usize,
    connections: Mutex<HashMap<IpAddr, Vec<Instant>>>,
}

impl RateLimiter {
    pub fn new(window: Duration, max_connections: usize) -> Self {
        RateLimiter { window, max_connections, connections: Mutex::new(HashMap::new()) }
    }

    /// Prunes stale timestamps for `ip` and admits the connection if fewer
    /// than `max_connections` remain within the window.
    pub fn admit(&self, ip: IpAddr, now: Instant) -> bool {
        let mut connections = self.connections.lock().unwrap();
        let entry = connections.entry(ip).or_default();
        entry.retain(|&t| now.duration_since(t) < self.window);

        if entry.len() >= self.max_connections {
            return false;
        }
        entry.push(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_the_limit_then_rejects() {
        let rl = RateLimiter::new(Duration::from_secs(60), 5);
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        let now = Instant::now();
        for _ in 0..5 {
            assert!(rl.admit(ip, now));
        }
        assert!(!rl.admit(ip, now));
    }

    #[test]
    fn independent_ips_have_independent_budgets() {
        let rl = RateLimiter::new(Duration::from_secs(60), 1);
        let a: IpAddr = "10.0.0.1".parse().unwrap();
        let b: IpAddr = "10.0.0.2".parse().unwrap();
        let now = Instant::now();
        assert!(rl.admit(a, now));
        assert!(!rl.admit(a, now));
        assert!(rl.admit(b, now));
    }

    #[test]
    fn old_connections_fall_out_of_the_window() {
        let rl = RateLimiter::new(Duration::from_secs(60), 1);
        let ip: IpAddr = "10.0.0.3".parse().unwrap();
        let t0 = Instant::now();
        assert!(rl.admit(ip, t0));
        assert!(!rl.admit(ip, t0 + Duration::from_secs(30)));
        assert!(rl.admit(ip, t0 + Duration::from_secs(61)));
    }
}
