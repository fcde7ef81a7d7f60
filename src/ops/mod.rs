pub mod recurrence;
pub mod reminders;
pub mod task_ops;
