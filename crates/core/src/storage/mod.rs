pub mod alert_log;
pub mod candidates;
