pub mod attendance;
pub mod correction;
pub mod holiday;
pub mod leave;
pub mod recovery;
pub mod schedule;
pub mod sync;
