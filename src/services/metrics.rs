use lazy_static::lazy_static;
use prometheus::{register_counter, register_counter_vec, Counter, CounterVec};

lazy_static! {
    pub static ref SCHEDULE_OPERATIONS_COUNTER: CounterVec = register_counter_vec!(
        "notice_schedule_operations_total",
        "Push schedule calls by operation and result",
        &["operation", "status"]
    ).unwrap();

    /// Schedules left behind after their notice was deleted. Each increment
    /// has a matching warning in the logs naming the schedule.
    pub static ref ORPHANED_SCHEDULES_COUNTER: Counter = register_counter!(
        "notice_orphaned_schedules_total",
        "Remote schedules that could not be removed with their notice"
    ).unwrap();

    pub static ref ICON_UPLOADS_COUNTER: CounterVec = register_counter_vec!(
        "notice_icon_uploads_total",
        "Push notification icons stored by backend",
        &["backend"]
    ).unwrap();
}
