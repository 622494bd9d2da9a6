pub mod attendance;
pub mod audit;
pub mod correction;
pub mod day_status;
pub mod employee;
pub mod holiday;
pub mod leave;
pub mod recovery;
pub mod role;
pub mod schedule;
