pub mod bulk;
pub mod candidate;
pub mod merge;
pub mod person;
