// versioner-common: shared record types for the versioning branch

pub mod changelog;
pub mod counter;
pub mod timestamp;
pub mod types;
