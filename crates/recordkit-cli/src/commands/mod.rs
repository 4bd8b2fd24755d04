pub mod account;
pub mod library;
pub mod notes;
pub mod student;
