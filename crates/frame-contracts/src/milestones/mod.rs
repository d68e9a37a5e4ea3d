mod catalog;

pub use catalog::{Milestone, MilestoneCatalog, UnknownMilestone};
