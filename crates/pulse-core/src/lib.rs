pub mod events;
pub mod ids;
pub mod messages;
pub mod report;
