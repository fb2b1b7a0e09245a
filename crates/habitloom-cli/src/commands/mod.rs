pub mod analytics;
pub mod freeze;
pub mod habit;
pub mod stats;
pub mod template;
