pub mod builds;
pub mod repos;
pub mod users;
pub mod validate;
