use chrono::Utc;
use serde::Serialize;

use crate::engine::Actor;
use crate::engine::error::Result;
use crate::engine::{ATTENDANCE_TABLE, AttendanceEngine};
use crate::model::attendance::AttendanceDailyRecord;
use crate::model::audit::{AuditAction, AuditLogEntry, NewAuditEntry};
use crate::store::StoreError;

/// Builds append-only audit entries. There is no update or delete path;
/// entries are committed by the store together with the change they describe.
pub struct AuditLog;

impl AuditLog {
    pub fn entry<T: Serialize>(
        table_name: &'static str,
        record_id: String,
        action: AuditAction,
        before: Option<&T>,
        after: Option<&T>,
        actor: &Actor,
        reason: Option<String>,
    ) -> Result<NewAuditEntry> {
        let snapshot = |value: Option<&T>| -> std::result::Result<_, StoreError> {
            Ok(match value {
                Some(v) => Some(serde_json::to_value(v)?),
                None => None,
            })
        };
        Ok(NewAuditEntry {
            table_name,
            record_id,
            action,
            before: snapshot(before)?,
            after: snapshot(after)?,
            actor_id: actor.user_id,
            reason,
            created_at: Utc::now(),
        })
    }
}

impl AttendanceEngine {
    /// History of one attendance row, oldest first.
    pub async fn record_audit_trail(
        &self,
        employee_id: u64,
        date: chrono::NaiveDate,
    ) -> Result<Vec<AuditLogEntry>> {
        Ok(self
            .store
            .audit_trail(
                ATTENDANCE_TABLE,
                &AttendanceDailyRecord::audit_key(employee_id, date),
            )
            .await?)
    }
}
