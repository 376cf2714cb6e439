use serde::Serialize;
use std::sync::{
    atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering},
    Arc,
};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum LoopChannel {
    Pointer,
    Keyboard,
    Supervisor,
}

impl LoopChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoopChannel::Pointer => "pointer",
            LoopChannel::Keyboard => "keyboard",
            LoopChannel::Supervisor => "supervisor",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum LoopStatus {
    Idle,
    Running,
    /// Gave up after too many consecutive failures
    Terminated,
    Stopped,
}

impl LoopStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => LoopStatus::Running,
            2 => LoopStatus::Terminated,
            3 => LoopStatus::Stopped,
            _ => LoopStatus::Idle,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            LoopStatus::Idle => 0,
            LoopStatus::Running => 1,
            LoopStatus::Terminated => 2,
            LoopStatus::Stopped => 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoopHealthSnapshot {
    pub channel: LoopChannel,
    pub status: LoopStatus,
    pub consecutive_errors: u32,
    pub total_errors: u64,
    pub samples: u64,
}

/// Lock-free counters a loop updates on every iteration.
#[derive(Debug)]
pub struct LoopHealth {
    channel: LoopChannel,
    status: AtomicU8,
    consecutive_errors: AtomicU32,
    total_errors: AtomicU64,
    samples: AtomicU64,
}

impl LoopHealth {
    pub fn new(channel: LoopChannel) -> Self {
        Self {
            channel,
            status: AtomicU8::new(LoopStatus::Idle.as_u8()),
            consecutive_errors: AtomicU32::new(0),
            total_errors: AtomicU64::new(0),
            samples: AtomicU64::new(0),
        }
    }

    pub fn channel(&self) -> LoopChannel {
        self.channel
    }

    pub fn status(&self) -> LoopStatus {
        LoopStatus::from_u8(self.status.load(Ordering::SeqCst))
    }

    pub fn set_status(&self, status: LoopStatus) {
        self.status.store(status.as_u8(), Ordering::SeqCst);
    }

    pub fn begin(&self) {
        self.consecutive_errors.store(0, Ordering::SeqCst);
        self.total_errors.store(0, Ordering::SeqCst);
        self.samples.store(0, Ordering::SeqCst);
        self.set_status(LoopStatus::Running);
    }

    pub fn record_success(&self) {
        self.consecutive_errors.store(0, Ordering::SeqCst);
        self.samples.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the consecutive failure count including this one.
    pub fn record_error(&self) -> u32 {
        self.total_errors.fetch_add(1, Ordering::Relaxed);
        self.consecutive_errors.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn snapshot(&self) -> LoopHealthSnapshot {
        LoopHealthSnapshot {
            channel: self.channel,
            status: self.status(),
            consecutive_errors: self.consecutive_errors.load(Ordering::SeqCst),
            total_errors: self.total_errors.load(Ordering::Relaxed),
            samples: self.samples.load(Ordering::Relaxed),
        }
    }
}

/// One health record per loop, shared between the loops and diagnostics.
#[derive(Debug, Clone)]
pub struct LoopHealthBoard {
    pub pointer: Arc<LoopHealth>,
    pub keyboard: Arc<LoopHealth>,
    pub supervisor: Arc<LoopHealth>,
}

impl LoopHealthBoard {
    pub fn new() -> Self {
        Self {
            pointer: Arc::new(LoopHealth::new(LoopChannel::Pointer)),
            keyboard: Arc::new(LoopHealth::new(LoopChannel::Keyboard)),
            supervisor: Arc::new(LoopHealth::new(LoopChannel::Supervisor)),
        }
    }

    pub fn get(&self, channel: LoopChannel) -> &Arc<LoopHealth> {
        match channel {
            LoopChannel::Pointer => &self.pointer,
            LoopChannel::Keyboard => &self.keyboard,
            LoopChannel::Supervisor => &self.supervisor,
        }
    }

    pub fn snapshot(&self) -> Vec<LoopHealthSnapshot> {
        vec![
            self.pointer.snapshot(),
            self.keyboard.snapshot(),
            self.supervisor.snapshot(),
        ]
    }
}

impl Default for LoopHealthBoard {
    fn default() -> Self {
        Self::new()
    }
}
