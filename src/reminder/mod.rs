//! Reminder scheduler - single task that turns reminder timestamps into
//! one-shot "fired" events.
//!
//! Architecture:
//! - Callers hold a cloneable `ReminderScheduler` handle and send commands
//! - The scheduler task owns the `ReminderQueue` and sleeps until the earliest deadline
//! - Expired reminders are sent as `ReminderFired` on an mpsc channel, which the
//!   app loop drains on the same task that owns the store
//! - Every 30 s the task also compares against the wall clock, so reminders
//!   that came due while the machine slept fire on wake

pub mod queue;

use crate::todo::{self, TodoStore};
use chrono::NaiveDateTime;
use queue::ReminderQueue;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};

/// How often armed reminders are checked against the wall clock.
const WALL_CLOCK_CHECK: Duration = Duration::from_secs(30);

/// Emitted once per armed reminder when its deadline passes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderFired {
    pub todo_id: String,
}

#[derive(Debug)]
enum Command {
    Schedule {
        todo_id: String,
        deadline: Instant,
        fire_at: NaiveDateTime,
    },
    CancelAll {
        todo_id: String,
    },
    Clear,
    Pending {
        todo_id: Option<String>,
        response_tx: oneshot::Sender<usize>,
    },
    Shutdown,
}

/// Handle to the scheduler task.
#[derive(Clone)]
pub struct ReminderScheduler {
    command_tx: mpsc::UnboundedSender<Command>,
}

impl ReminderScheduler {
    /// Spawns the scheduler task on the current tokio runtime.
    pub fn spawn() -> (Self, mpsc::UnboundedReceiver<ReminderFired>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();

        let worker = SchedulerLoop {
            queue: ReminderQueue::new(),
            command_rx,
            fired_tx,
        };
        tokio::spawn(worker.run());

        (Self { command_tx }, fired_rx)
    }

    /// Arms a reminder for a wall-clock time. Returns false, without arming
    /// anything, when `fire_at` is not in the future.
    pub fn schedule(&self, todo_id: &str, fire_at: NaiveDateTime) -> bool {
        let delay = (fire_at - todo::now())
            .to_std()
            .ok()
            .filter(|delay| !delay.is_zero());

        match delay {
            Some(delay) => self.send(Command::Schedule {
                todo_id: todo_id.to_string(),
                deadline: Instant::now() + delay,
                fire_at,
            }),
            None => {
                tracing::debug!(
                    target: "reminders",
                    todo_id = %todo_id,
                    fire_at = %fire_at,
                    "Reminder time already passed, not scheduling"
                );
                false
            }
        }
    }

    /// Arms a reminder `delay` from now. A zero delay is dropped.
    pub fn schedule_after(&self, todo_id: &str, delay: Duration) -> bool {
        if delay.is_zero() {
            return false;
        }
        let Ok(wall_delay) = chrono::Duration::from_std(delay) else {
            return false;
        };

        self.send(Command::Schedule {
            todo_id: todo_id.to_string(),
            deadline: Instant::now() + delay,
            fire_at: todo::now() + wall_delay,
        })
    }

    /// Stops every pending reminder of one todo.
    pub fn cancel_all(&self, todo_id: &str) {
        self.send(Command::CancelAll {
            todo_id: todo_id.to_string(),
        });
    }

    /// Stops every pending reminder.
    pub fn clear(&self) {
        self.send(Command::Clear);
    }

    /// Number of reminders still pending for `todo_id`.
    pub async fn pending(&self, todo_id: &str) -> usize {
        self.query_pending(Some(todo_id.to_string())).await
    }

    /// Number of reminders still pending across all todos.
    pub async fn pending_total(&self) -> usize {
        self.query_pending(None).await
    }

    pub fn shutdown(&self) {
        self.send(Command::Shutdown);
    }

    async fn query_pending(&self, todo_id: Option<String>) -> usize {
        let (response_tx, response_rx) = oneshot::channel();
        if !self.send(Command::Pending {
            todo_id,
            response_tx,
        }) {
            return 0;
        }
        response_rx.await.unwrap_or(0)
    }

    fn send(&self, command: Command) -> bool {
        match self.command_tx.send(command) {
            Ok(()) => true,
            Err(_) => {
                tracing::warn!(target: "reminders", "Scheduler task is gone, command dropped");
                false
            }
        }
    }
}

struct SchedulerLoop {
    queue: ReminderQueue,
    command_rx: mpsc::UnboundedReceiver<Command>,
    fired_tx: mpsc::UnboundedSender<ReminderFired>,
}

impl SchedulerLoop {
    async fn run(mut self) {
        tracing::info!(target: "reminders", "Reminder scheduler started");

        let mut wall_clock = interval(WALL_CLOCK_CHECK);
        wall_clock.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let next_deadline = self.queue.next_deadline();
            let wait = async move {
                match next_deadline {
                    Some(deadline) => sleep_until(deadline).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                _ = wait => self.fire_due(),
                _ = wall_clock.tick() => self.fire_wall_due(),
            }
        }

        tracing::info!(
            target: "reminders",
            dropped = self.queue.len(),
            "Reminder scheduler stopped"
        );
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Schedule {
                todo_id,
                deadline,
                fire_at,
            } => {
                if self.queue.schedule(&todo_id, deadline, fire_at, Instant::now()) {
                    tracing::debug!(
                        target: "reminders",
                        todo_id = %todo_id,
                        in_ms = deadline.saturating_duration_since(Instant::now()).as_millis() as u64,
                        "Reminder armed"
                    );
                }
            }
            Command::CancelAll { todo_id } => {
                let cancelled = self.queue.cancel_all(&todo_id);
                if cancelled > 0 {
                    tracing::debug!(target: "reminders", todo_id = %todo_id, cancelled, "Reminders cancelled");
                }
            }
            Command::Clear => {
                self.queue.clear();
                tracing::debug!(target: "reminders", "All reminders cleared");
            }
            Command::Pending {
                todo_id,
                response_tx,
            } => {
                let count = match todo_id {
                    Some(id) => self.queue.pending_for(&id),
                    None => self.queue.len(),
                };
                let _ = response_tx.send(count);
            }
            Command::Shutdown => {}
        }
    }

    fn fire_due(&mut self) {
        let due = self.queue.pop_due(Instant::now());
        self.emit(due);
    }

    fn fire_wall_due(&mut self) {
        let overdue = self.queue.pop_wall_due(todo::now());
        if !overdue.is_empty() {
            tracing::info!(target: "reminders", count = overdue.len(), "Catching up on reminders missed during sleep");
        }
        self.emit(overdue);
    }

    fn emit(&self, todo_ids: Vec<String>) {
        for todo_id in todo_ids {
            tracing::info!(target: "reminders", todo_id = %todo_id, "Reminder fired");
            if self.fired_tx.send(ReminderFired { todo_id }).is_err() {
                tracing::warn!(target: "reminders", "No receiver for fired reminders");
            }
        }
    }
}

/// Re-arms the scheduler from the store: clears every pending timer, then
/// schedules each future reminder of every incomplete todo. Returns how many
/// reminders were armed.
pub fn reconcile(store: &TodoStore, scheduler: &ReminderScheduler) -> usize {
    scheduler.clear();

    let armed = store
        .open_reminders()
        .into_iter()
        .filter(|(todo_id, at)| scheduler.schedule(todo_id, *at))
        .count();

    tracing::info!(target: "reminders", armed, "Reminders reconciled");
    armed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::todo::types::Category;
    use chrono::Duration as ChronoDuration;
    use tokio::time::timeout;

    #[tokio::test(start_paused = true)]
    async fn test_fires_once_not_before_deadline() {
        let (scheduler, mut fired_rx) = ReminderScheduler::spawn();
        let started = Instant::now();

        assert!(scheduler.schedule_after("a", Duration::from_millis(100)));

        let fired = fired_rx.recv().await.unwrap();
        assert_eq!(fired.todo_id, "a");
        assert!(started.elapsed() >= Duration::from_millis(100));

        let again = timeout(Duration::from_secs(5), fired_rx.recv()).await;
        assert!(again.is_err(), "reminder fired more than once");
        assert_eq!(scheduler.pending("a").await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all_prevents_firing() {
        let (scheduler, mut fired_rx) = ReminderScheduler::spawn();

        scheduler.schedule_after("a", Duration::from_millis(100));
        scheduler.schedule_after("a", Duration::from_millis(200));
        assert_eq!(scheduler.pending("a").await, 2);

        scheduler.cancel_all("a");
        assert_eq!(scheduler.pending("a").await, 0);

        let fired = timeout(Duration::from_secs(1), fired_rx.recv()).await;
        assert!(fired.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_past_time_is_not_scheduled() {
        let (scheduler, mut fired_rx) = ReminderScheduler::spawn();

        let past = todo::now() - ChronoDuration::minutes(1);
        assert!(!scheduler.schedule("a", past));
        assert_eq!(scheduler.pending_total().await, 0);

        let fired = timeout(Duration::from_secs(1), fired_rx.recv()).await;
        assert!(fired.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_future_wall_clock_time_is_armed() {
        let (scheduler, _fired_rx) = ReminderScheduler::spawn();

        let soon = todo::now() + ChronoDuration::minutes(5);
        assert!(scheduler.schedule("a", soon));
        assert_eq!(scheduler.pending("a").await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_cancels_every_todo() {
        let (scheduler, mut fired_rx) = ReminderScheduler::spawn();

        scheduler.schedule_after("a", Duration::from_millis(100));
        scheduler.schedule_after("b", Duration::from_millis(100));
        scheduler.clear();

        assert_eq!(scheduler.pending_total().await, 0);
        assert!(timeout(Duration::from_secs(1), fired_rx.recv()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconcile_arms_only_future_reminders_of_open_todos() {
        let (scheduler, _fired_rx) = ReminderScheduler::spawn();
        let mut store = TodoStore::new("unused.json");

        let open = store.add("open", Category::Today, None, None);
        let done = store.add("done", Category::Week, None, None);
        let now = todo::now();

        store.add_reminder(&open, now + ChronoDuration::minutes(5)).unwrap();
        store.add_reminder(&open, now + ChronoDuration::hours(1)).unwrap();
        store.add_reminder(&open, now - ChronoDuration::minutes(5)).unwrap();
        store.add_reminder(&done, now + ChronoDuration::minutes(5)).unwrap();
        store.complete(&done).unwrap();

        // Stale timer from before reconciliation must be dropped
        scheduler.schedule_after("stale", Duration::from_secs(60));

        assert_eq!(reconcile(&store, &scheduler), 2);
        assert_eq!(scheduler.pending(&open).await, 2);
        assert_eq!(scheduler.pending(&done).await, 0);
        assert_eq!(scheduler.pending("stale").await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_task() {
        let (scheduler, mut fired_rx) = ReminderScheduler::spawn();
        scheduler.schedule_after("a", Duration::from_millis(100));
        scheduler.shutdown();

        // The fired sender is dropped with the task
        assert_eq!(fired_rx.recv().await, None);
        assert!(!scheduler.schedule_after("a", Duration::from_millis(100)));
    }
}
