use embassy_time::{Duration, Instant};
use heapless::Vec;
use mirror_clock_common::*;

/// Periodic work driven by the main loop, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TaskKind {
    RefreshTime,
    RefreshDisplay,
    RotateMode,
}

pub const MAX_TASKS: usize = 3;

#[derive(Debug, Clone, Copy)]
struct PeriodicTask {
    kind: TaskKind,
    period: Duration,
    first_delay: Duration,
    next_due: Option<Instant>,
}

impl PeriodicTask {
    fn new(kind: TaskKind, period_ms: u32, first_delay_ms: u32) -> Self {
        Self {
            kind,
            period: Duration::from_millis(u64::from(period_ms)),
            first_delay: Duration::from_millis(u64::from(first_delay_ms)),
            next_due: None,
        }
    }
}

/// Fixed table of periodic tasks.
///
/// The table is built once from the configuration; the first `due` call
/// anchors every task to that instant. Refresh tasks run right away, the mode
/// rotation only after a full period. Missed periods are not replayed.
pub struct Scheduler {
    tasks: Vec<PeriodicTask, MAX_TASKS>,
}

impl Scheduler {
    pub fn new(config: &ScheduleConfig, demo_mode: bool) -> Self {
        let mut tasks = Vec::new();
        tasks.push(PeriodicTask::new(TaskKind::RefreshTime, config.time_refresh_ms, 0)).ok();
        tasks.push(PeriodicTask::new(
            TaskKind::RefreshDisplay,
            config.display_refresh_ms,
            0,
        )).ok();
        if demo_mode {
            tasks.push(PeriodicTask::new(
                TaskKind::RotateMode,
                config.mode_rotation_ms,
                config.mode_rotation_ms,
            )).ok();
        }

        debug!("Scheduler created with {} tasks", tasks.len());
        Self { tasks }
    }

    /// Tasks due at `now`, in table order. Each returned task is rescheduled
    /// one period after `now`.
    pub fn due(&mut self, now: Instant) -> Vec<TaskKind, MAX_TASKS> {
        let mut due = Vec::new();
        for task in self.tasks.iter_mut() {
            let next_due = *task.next_due.get_or_insert(now + task.first_delay);
            if now >= next_due {
                task.next_due = Some(now + task.period);
                due.push(task.kind).ok();
            }
        }
        due
    }

    pub fn has_task(&self, kind: TaskKind) -> bool {
        self.tasks.iter().any(|task| task.kind == kind)
    }
}
