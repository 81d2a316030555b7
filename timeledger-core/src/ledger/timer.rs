use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::AppError;

/// Live state of one user's running timer.
///
/// The elapsed count is deliberately kept out of the database: it advances
/// once per tick and is only written back into the session row when the
/// timer stops. A crash loses at most the live count, never a stored value.
#[derive(Debug, Clone)]
pub struct ActiveTimer {
    /// Session being timed
    pub session_id: Uuid,
    /// Seconds accumulated so far
    pub elapsed_secs: i64,
    /// Paused timers keep their count but stop accumulating
    pub paused: bool,
}

/// Public snapshot of a running timer.
#[derive(Debug, Clone, Serialize)]
pub struct TimerSnapshot {
    pub session_id: Uuid,
    pub elapsed_secs: i64,
    pub paused: bool,
}

impl From<&ActiveTimer> for TimerSnapshot {
    fn from(timer: &ActiveTimer) -> Self {
        TimerSnapshot {
            session_id: timer.session_id,
            elapsed_secs: timer.elapsed_secs,
            paused: timer.paused,
        }
    }
}

/// In-memory registry of running timers, at most one per user.
///
/// Cloning is cheap; all clones share the same state.
#[derive(Clone, Default)]
pub struct TimerEngine {
    timers: Arc<Mutex<HashMap<Uuid, ActiveTimer>>>,
}

impl TimerEngine {
    pub fn new() -> Self {
        TimerEngine {
            timers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Registers a running timer for the user, seeded with the seconds the
    /// session has already accumulated (zero for a fresh start).
    ///
    /// # Errors
    ///
    /// Returns `AppError::TimerBusy` when the user already has a timer,
    /// whether running or paused.
    pub async fn begin(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        seed_secs: i64,
    ) -> Result<(), AppError> {
        let mut timers = self.timers.lock().await;
        if timers.contains_key(&user_id) {
            return Err(AppError::TimerBusy);
        }
        timers.insert(
            user_id,
            ActiveTimer {
                session_id,
                elapsed_secs: seed_secs.max(0),
                paused: false,
            },
        );
        Ok(())
    }

    /// Pauses the user's timer. Pausing an already paused timer is a no-op.
    pub async fn pause(&self, user_id: Uuid) -> Result<TimerSnapshot, AppError> {
        let mut timers = self.timers.lock().await;
        let timer = timers.get_mut(&user_id).ok_or(AppError::NotFound("timer"))?;
        timer.paused = true;
        Ok(TimerSnapshot::from(&*timer))
    }

    /// Resumes a paused timer.
    pub async fn resume(&self, user_id: Uuid) -> Result<TimerSnapshot, AppError> {
        let mut timers = self.timers.lock().await;
        let timer = timers.get_mut(&user_id).ok_or(AppError::NotFound("timer"))?;
        timer.paused = false;
        Ok(TimerSnapshot::from(&*timer))
    }

    /// Current timer for the user, if any.
    pub async fn snapshot(&self, user_id: Uuid) -> Option<TimerSnapshot> {
        let timers = self.timers.lock().await;
        timers.get(&user_id).map(TimerSnapshot::from)
    }

    /// Removes and returns the user's timer, ending accumulation.
    pub async fn take(&self, user_id: Uuid) -> Option<ActiveTimer> {
        let mut timers = self.timers.lock().await;
        timers.remove(&user_id)
    }

    /// Drops the user's timer if it is timing the given session. Used when a
    /// session is deleted out from under its timer.
    pub async fn discard_session(&self, user_id: Uuid, session_id: Uuid) -> bool {
        let mut timers = self.timers.lock().await;
        match timers.get(&user_id) {
            Some(timer) if timer.session_id == session_id => {
                timers.remove(&user_id);
                true
            }
            _ => false,
        }
    }

    /// Advances every non-paused timer by one second.
    pub async fn tick(&self) {
        let mut timers = self.timers.lock().await;
        for timer in timers.values_mut() {
            if !timer.paused {
                timer.elapsed_secs += 1;
            }
        }
    }
}

/// Spawns the background task that ticks the engine once per second.
pub fn spawn_ticker(engine: TimerEngine) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        // The first tick of an interval fires immediately; consume it so the
        // count starts advancing one second after spawn.
        interval.tick().await;
        loop {
            interval.tick().await;
            engine.tick().await;
        }
    })
}
