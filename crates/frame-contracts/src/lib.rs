pub mod events;
pub mod milestones;
pub mod payload;
pub mod receipts;
pub mod records;
pub mod wire;
