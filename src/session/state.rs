use serde::{Deserialize, Serialize};
use std::cmp;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PowerPhase {
    Active,
    Booting,
    Standby,
}

impl Default for PowerPhase {
    fn default() -> Self {
        PowerPhase::Active
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ViewMode {
    Dashboard,
    Agenda,
    Focus,
}

impl Default for ViewMode {
    fn default() -> Self {
        ViewMode::Dashboard
    }
}

/// Power transition reported by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerTransition {
    BootStarted,
    BootFinished,
    WentStandby,
}

/// Activity recency and power phase.
#[derive(Debug, Clone)]
pub struct SessionState {
    phase: PowerPhase,
    last_activity_at: Instant,
    boot_started_at: Option<Instant>,
    /// Activity before this instant does not wake the mirror.
    wake_blocked_until: Option<Instant>,
    inactivity_timeout: Duration,
    boot_delay: Duration,
}

impl SessionState {
    pub fn new(now: Instant, inactivity_timeout: Duration, boot_delay: Duration) -> Self {
        Self {
            phase: PowerPhase::Active,
            last_activity_at: now,
            boot_started_at: None,
            wake_blocked_until: None,
            inactivity_timeout,
            boot_delay,
        }
    }

    pub fn phase(&self) -> PowerPhase {
        self.phase
    }

    pub fn is_standby(&self) -> bool {
        self.phase == PowerPhase::Standby
    }

    /// Record activity; wakes the mirror when in standby.
    pub fn register_activity(&mut self, now: Instant) -> Option<PowerTransition> {
        if let Some(until) = self.wake_blocked_until {
            if now < until {
                return None;
            }
            self.wake_blocked_until = None;
        }

        self.last_activity_at = now;
        if self.phase == PowerPhase::Standby {
            self.phase = PowerPhase::Booting;
            self.boot_started_at = Some(now);
            return Some(PowerTransition::BootStarted);
        }
        None
    }

    /// Enter standby immediately. `wake_grace` keeps the triggering hand
    /// from waking the mirror straight back up.
    pub fn force_standby(&mut self, now: Instant, wake_grace: Duration) -> Option<PowerTransition> {
        self.wake_blocked_until = (!wake_grace.is_zero()).then(|| now + wake_grace);
        self.enter_standby()
    }

    /// Periodic check: finishes a boot after the boot delay and drops into
    /// standby after the inactivity timeout unless focus pins the session.
    pub fn poll(&mut self, now: Instant, focus_active: bool) -> Option<PowerTransition> {
        match self.phase {
            PowerPhase::Booting => {
                let started = self.boot_started_at.unwrap_or(now);
                if now.saturating_duration_since(started) >= self.boot_delay {
                    self.phase = PowerPhase::Active;
                    self.boot_started_at = None;
                    return Some(PowerTransition::BootFinished);
                }
                None
            }
            PowerPhase::Active => {
                if !focus_active
                    && now.saturating_duration_since(self.last_activity_at) > self.inactivity_timeout
                {
                    return self.enter_standby();
                }
                None
            }
            PowerPhase::Standby => None,
        }
    }

    fn enter_standby(&mut self) -> Option<PowerTransition> {
        if self.phase == PowerPhase::Standby {
            return None;
        }
        self.phase = PowerPhase::Standby;
        self.boot_started_at = None;
        Some(PowerTransition::WentStandby)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FocusStatus {
    Idle,
    Running,
    Completed,
}

impl Default for FocusStatus {
    fn default() -> Self {
        FocusStatus::Idle
    }
}

/// Focus timer step result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusTransition {
    /// Countdown reached zero.
    Completed,
    /// Post-completion delay elapsed; focus mode should end.
    Expired,
}

/// Countdown that runs while focus mode is on.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusTimer {
    pub status: FocusStatus,
    pub target_ms: u64,
    #[serde(skip)]
    running_anchor: Option<Instant>,
    #[serde(skip)]
    completed_at: Option<Instant>,
    #[serde(skip)]
    exit_delay: Duration,
}

impl FocusTimer {
    pub fn new(duration: Duration, exit_delay: Duration) -> Self {
        Self {
            status: FocusStatus::Idle,
            target_ms: duration.as_millis() as u64,
            running_anchor: None,
            completed_at: None,
            exit_delay,
        }
    }

    pub fn is_engaged(&self) -> bool {
        self.status != FocusStatus::Idle
    }

    pub fn session_complete(&self) -> bool {
        self.status == FocusStatus::Completed
    }

    pub fn start(&mut self, now: Instant) {
        self.status = FocusStatus::Running;
        self.running_anchor = Some(now);
        self.completed_at = None;
    }

    /// Stop without completing; the countdown starts over next time.
    pub fn cancel(&mut self) {
        self.status = FocusStatus::Idle;
        self.running_anchor = None;
        self.completed_at = None;
    }

    pub fn remaining_ms(&self, now: Instant) -> u64 {
        match (self.status, self.running_anchor) {
            (FocusStatus::Running, Some(anchor)) => {
                let elapsed = now.saturating_duration_since(anchor).as_millis() as u64;
                cmp::max(self.target_ms as i64 - elapsed as i64, 0) as u64
            }
            (FocusStatus::Completed, _) => 0,
            _ => self.target_ms,
        }
    }

    /// Whole seconds left, rounded up, for display.
    pub fn remaining_secs(&self, now: Instant) -> u64 {
        (self.remaining_ms(now) + 999) / 1000
    }

    pub fn poll(&mut self, now: Instant) -> Option<FocusTransition> {
        match self.status {
            FocusStatus::Running if self.remaining_ms(now) == 0 => {
                self.status = FocusStatus::Completed;
                self.running_anchor = None;
                self.completed_at = Some(now);
                Some(FocusTransition::Completed)
            }
            FocusStatus::Completed => {
                let done = self.completed_at.unwrap_or(now);
                if now.saturating_duration_since(done) >= self.exit_delay {
                    self.cancel();
                    return Some(FocusTransition::Expired);
                }
                None
            }
            _ => None,
        }
    }
}
