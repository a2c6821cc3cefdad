use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// The slice of an employee profile the ledger needs: identity plus the name
/// that gets snapshotted onto each attendance record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct EmployeeProfile {
    pub id: u64,
    pub first_name: String,
    pub last_name: String,
}

