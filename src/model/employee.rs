use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The slice of an employee record the attendance engine reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct EmployeeProfile {
    #[schema(example = 1000)]
    pub id: u64,
    #[schema(example = "active")]
    pub status: String,
    /// Employees exempt from clocking are never classified from clock events.
    pub clock_required: bool,
}

impl EmployeeProfile {
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }

    pub fn is_tracked(&self) -> bool {
        self.is_active() && self.clock_required
    }
}
