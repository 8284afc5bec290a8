pub mod attendance;
pub mod auth;
pub mod backup;
pub mod core;
pub mod export;
pub mod profiles;
pub mod reports;
pub mod students;
