//! Single-flight trigger with a pending slot of depth one.
//!
//! File changes call [`CycleGate::request`]; the session task waits in
//! [`CycleGate::acquire`]. Any number of requests made while a cycle is in
//! flight collapse into exactly one follow-up cycle.

use parking_lot::Mutex;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct GateState {
    in_flight: bool,
    pending: bool,
}

/// Per-session cycle scheduler.
#[derive(Debug, Default)]
pub struct CycleGate {
    state: Mutex<GateState>,
    wake: Notify,
}

impl CycleGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a cycle. Returns `false` when one was already pending and
    /// this request was coalesced into it.
    pub fn request(&self) -> bool {
        let mut state = self.state.lock();
        if state.pending {
            return false;
        }
        state.pending = true;
        drop(state);
        self.wake.notify_one();
        true
    }

    /// Wait for a pending request, consume it and mark a cycle in flight.
    pub async fn acquire(&self) {
        loop {
            {
                let mut state = self.state.lock();
                if state.pending && !state.in_flight {
                    state.pending = false;
                    state.in_flight = true;
                    return;
                }
            }
            self.wake.notified().await;
        }
    }

    /// Mark a cycle in flight without consuming a request (the initial cycle).
    pub fn begin(&self) {
        self.state.lock().in_flight = true;
    }

    /// Settle the in-flight cycle, letting a pending request start.
    pub fn release(&self) {
        let pending = {
            let mut state = self.state.lock();
            state.in_flight = false;
            state.pending
        };
        if pending {
            self.wake.notify_one();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state.lock().pending
    }

    pub fn is_in_flight(&self) -> bool {
        self.state.lock().in_flight
    }
}
