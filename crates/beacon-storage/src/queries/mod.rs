pub mod queue_ops;
pub mod state_ops;
