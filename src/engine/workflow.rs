//! Correction request approval pipeline.
//!
//! A request walks its approval levels strictly in order. Intermediate
//! approvals only record the decision; the final one classifies the
//! requested clock times and writes the attendance row in the same
//! transaction as the status change. Every transition is a compare-and-set
//! on the request version, so two approvers racing on one level cannot both
//! win.

use chrono::{NaiveDate, NaiveTime, Utc};
use tracing::{info, warn};

use crate::engine::audit::AuditLog;
use crate::engine::error::{EngineError, Result};
use crate::engine::{ATTENDANCE_TABLE, Actor, AttendanceEngine, CORRECTION_TABLE};
use crate::model::attendance::AttendanceDailyRecord;
use crate::model::audit::AuditAction;
use crate::model::correction::{ApprovalDecision, CorrectionRequest, CorrectionStatus};
use crate::store::{
    CorrectionCommit, CorrectionFilter, NewCorrection, RecordWrite, StoreError, WriteOutcome,
};

/// What an employee (or HR on their behalf) asks to change.
#[derive(Debug, Clone)]
pub struct CorrectionInput {
    /// `None` files for the acting employee.
    pub employee_id: Option<u64>,
    pub work_date: NaiveDate,
    /// `None` keeps the stored clock-in.
    pub requested_clock_in: Option<NaiveTime>,
    /// `None` keeps the stored clock-out.
    pub requested_clock_out: Option<NaiveTime>,
    pub reason: String,
}

/// Reason tag on the audit entry of a materialized correction, used to find
/// the pre-correction snapshot again on cancellation.
fn applied_marker(request_id: u64) -> String {
    format!("correction_request:{}", request_id)
}

impl AttendanceEngine {
    pub async fn file_correction(
        &self,
        actor: &Actor,
        input: CorrectionInput,
    ) -> Result<CorrectionRequest> {
        let employee_id = match input.employee_id {
            Some(id) if Some(id) != actor.employee_id => {
                actor.require_hr_or_admin()?;
                id
            }
            _ => actor.own_employee_id()?,
        };

        let reason = input.reason.trim();
        if reason.is_empty() {
            return Err(EngineError::InvalidInput("A reason is required".into()));
        }
        if input.requested_clock_in.is_none() && input.requested_clock_out.is_none() {
            return Err(EngineError::InvalidInput(
                "Request at least one clock time".into(),
            ));
        }
        if let (Some(i), Some(o)) = (input.requested_clock_in, input.requested_clock_out) {
            if o < i {
                return Err(EngineError::InvalidInput(
                    "requested clock-out is before clock-in".into(),
                ));
            }
        }
        if input.work_date > self.now().date() {
            return Err(EngineError::InvalidInput(
                "Cannot correct a future date".into(),
            ));
        }
        self.store
            .employee(employee_id)
            .await?
            .filter(|e| e.is_active())
            .ok_or_else(|| EngineError::NotFound(format!("Employee {}", employee_id)))?;
        if let Some(open) = self.store.open_correction(employee_id, input.work_date).await? {
            return Err(EngineError::Conflict(format!(
                "correction request {} is already open for this date",
                open.id
            )));
        }
        // an empty side keeps the stored event, so check the merged pair
        let stored = self.store.record(employee_id, input.work_date).await?;
        let clock_in = input
            .requested_clock_in
            .map(|t| input.work_date.and_time(t))
            .or(stored.as_ref().and_then(|r| r.clock_in_at));
        let clock_out = input
            .requested_clock_out
            .map(|t| input.work_date.and_time(t))
            .or(stored.as_ref().and_then(|r| r.clock_out_at));
        if let (Some(i), Some(o)) = (clock_in, clock_out) {
            if o < i {
                return Err(EngineError::InvalidInput(format!(
                    "clock-out {} would fall before clock-in {}",
                    o.time(),
                    i.time()
                )));
            }
        }

        let audit = AuditLog::entry::<CorrectionRequest>(
            CORRECTION_TABLE,
            String::new(),
            AuditAction::CorrectionFiled,
            None,
            None,
            actor,
            Some(reason.to_string()),
        )?;
        let request = self
            .store
            .insert_correction(
                NewCorrection {
                    employee_id,
                    work_date: input.work_date,
                    requested_clock_in: input.requested_clock_in,
                    requested_clock_out: input.requested_clock_out,
                    reason: reason.to_string(),
                    levels: self.chain.len(),
                    requested_by: actor.user_id,
                    created_at: Utc::now(),
                },
                audit,
            )
            .await?
            // lost a race with a concurrent filing for the same day
            .ok_or_else(|| {
                EngineError::Conflict(format!(
                    "a correction request is already open for employee {} on {}",
                    employee_id, input.work_date
                ))
            })?;

        info!(
            request_id = request.id,
            employee_id,
            date = %request.work_date,
            levels = request.levels,
            "Correction request filed"
        );
        Ok(request)
    }

    /// Employees only see their own requests.
    pub async fn correction(&self, actor: &Actor, request_id: u64) -> Result<CorrectionRequest> {
        let request = self.load_correction(request_id).await?;
        actor.require_access_to(request.employee_id)?;
        Ok(request)
    }

    pub async fn list_corrections(
        &self,
        actor: &Actor,
        mut filter: CorrectionFilter,
    ) -> Result<(Vec<CorrectionRequest>, i64)> {
        if !actor.role.is_hr_or_admin() {
            filter.employee_id = Some(actor.own_employee_id()?);
        }
        Ok(self.store.list_corrections(&filter).await?)
    }

    /// Approves `level`. The final level materializes the correction.
    pub async fn approve_correction(
        &self,
        actor: &Actor,
        request_id: u64,
        level: u8,
        comment: Option<String>,
    ) -> Result<CorrectionRequest> {
        let before = self.load_correction(request_id).await?;
        self.authorize_level(&before, level, actor)?;
        Self::gate(&before, level)?;

        let mut after = before.clone();
        Self::decide_slot(&mut after, level, ApprovalDecision::Approved, actor, comment.clone());
        after.status = CorrectionStatus::Approved { level };

        if after.is_materialized() {
            return self.materialize(&before, after, actor, comment).await;
        }

        let after = self
            .commit_transition(&before, after, AuditAction::CorrectionApproved, actor, comment, None)
            .await?;
        info!(request_id, level, approver = actor.user_id, "Correction approved at level");
        Ok(after)
    }

    /// Rejects at `level`, ending the pipeline for good.
    pub async fn reject_correction(
        &self,
        actor: &Actor,
        request_id: u64,
        level: u8,
        comment: Option<String>,
    ) -> Result<CorrectionRequest> {
        let before = self.load_correction(request_id).await?;
        self.authorize_level(&before, level, actor)?;
        Self::gate(&before, level)?;

        let mut after = before.clone();
        Self::decide_slot(&mut after, level, ApprovalDecision::Rejected, actor, comment.clone());
        after.status = CorrectionStatus::Rejected;

        let after = self
            .commit_transition(&before, after, AuditAction::CorrectionRejected, actor, comment, None)
            .await?;
        info!(request_id, level, approver = actor.user_id, "Correction rejected");
        Ok(after)
    }

    /// Administrative override from any state. A materialized correction is
    /// reverted in the same transaction.
    pub async fn cancel_correction(
        &self,
        actor: &Actor,
        request_id: u64,
        reason: &str,
    ) -> Result<CorrectionRequest> {
        actor.require_admin()?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(EngineError::InvalidInput(
                "A cancellation reason is required".into(),
            ));
        }

        let before = self.load_correction(request_id).await?;
        if before.status == CorrectionStatus::AdminCancelled {
            return Err(EngineError::AlreadyDecided {
                request_id,
                status: before.status.to_string(),
            });
        }

        let mut after = before.clone();
        after.status = CorrectionStatus::AdminCancelled;
        after.cancelled_at = Some(Utc::now());
        after.cancelled_by = Some(actor.user_id);
        after.cancel_reason = Some(reason.to_string());

        if !before.is_materialized() {
            let after = self
                .commit_transition(
                    &before,
                    after,
                    AuditAction::CorrectionCancelled,
                    actor,
                    Some(reason.to_string()),
                    None,
                )
                .await?;
            info!(request_id, "Correction cancelled");
            return Ok(after);
        }

        let _guard = self.locks.lock(before.employee_id, before.work_date).await;
        let key = AttendanceDailyRecord::audit_key(before.employee_id, before.work_date);
        let marker = applied_marker(request_id);
        let trail = self.store.audit_trail(ATTENDANCE_TABLE, &key).await?;
        let applied = trail
            .iter()
            .rev()
            .find(|e| e.action == AuditAction::CorrectionApplied && e.reason.as_deref() == Some(&marker))
            .ok_or_else(|| {
                EngineError::NotFound(format!("audit snapshot for correction {}", request_id))
            })?;
        let prior: Option<AttendanceDailyRecord> = match &applied.before {
            Some(snapshot) => Some(serde_json::from_value(snapshot.clone()).map_err(StoreError::from)?),
            None => None,
        };

        let current = self
            .store
            .record(before.employee_id, before.work_date)
            .await?;
        let mut next = current.clone().unwrap_or_else(|| {
            AttendanceDailyRecord::blank(before.employee_id, before.work_date, Utc::now())
        });
        next.clock_in_at = prior.as_ref().and_then(|p| p.clock_in_at);
        next.clock_out_at = prior.as_ref().and_then(|p| p.clock_out_at);

        let facts = self.day_facts(next.employee_id, next.work_date).await?;
        let classification = self.classify_with(&facts, &next)?;
        classification.apply_to(&mut next);
        next.append_note(&format!("correction #{} cancelled: {}", request_id, reason));
        Self::bumped(&mut next);
        let ledger = Self::recovery_ledger(&facts, &next, &classification);

        let record_audit = AuditLog::entry(
            ATTENDANCE_TABLE,
            key,
            AuditAction::CorrectionReverted,
            current.as_ref(),
            Some(&next),
            actor,
            Some(reason.to_string()),
        )?;
        let write = RecordWrite {
            expected_version: current.as_ref().map(|r| r.version),
            record: next.clone(),
            audit: record_audit,
            ledger,
        };
        let after = self
            .commit_transition(
                &before,
                after,
                AuditAction::CorrectionCancelled,
                actor,
                Some(reason.to_string()),
                Some(write),
            )
            .await?;

        info!(
            request_id,
            employee_id = next.employee_id,
            date = %next.work_date,
            status = %next.day_status,
            "Materialized correction cancelled and reverted"
        );
        Ok(after)
    }

    async fn load_correction(&self, request_id: u64) -> Result<CorrectionRequest> {
        self.store
            .correction(request_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("Correction request {}", request_id)))
    }

    fn authorize_level(&self, request: &CorrectionRequest, level: u8, actor: &Actor) -> Result<()> {
        if actor.employee_id == Some(request.employee_id) || actor.user_id == request.requested_by
        {
            return Err(EngineError::PermissionDenied(
                "Cannot decide your own correction request".into(),
            ));
        }
        if level == 0 || level > request.levels || !self.chain.allows(level, actor.role) {
            return Err(EngineError::PermissionDenied(format!(
                "Not an approver for level {}",
                level
            )));
        }
        Ok(())
    }

    /// Sequencing check: "not yet your turn" versus "already decided".
    fn gate(request: &CorrectionRequest, level: u8) -> Result<()> {
        match request.next_level() {
            None => Err(EngineError::AlreadyDecided {
                request_id: request.id,
                status: request.status.to_string(),
            }),
            Some(next) if level < next => Err(EngineError::AlreadyDecided {
                request_id: request.id,
                status: request.status.to_string(),
            }),
            Some(next) if level > next => Err(EngineError::OutOfSequenceApproval {
                expected: next,
                attempted: level,
            }),
            Some(_) => Ok(()),
        }
    }

    fn decide_slot(
        request: &mut CorrectionRequest,
        level: u8,
        decision: ApprovalDecision,
        actor: &Actor,
        comment: Option<String>,
    ) {
        if let Some(slot) = request.slot_mut(level) {
            slot.decision = Some(decision);
            slot.approver_id = Some(actor.user_id);
            slot.decided_at = Some(Utc::now());
            slot.comment = comment;
        }
    }

    async fn materialize(
        &self,
        before: &CorrectionRequest,
        after: CorrectionRequest,
        actor: &Actor,
        comment: Option<String>,
    ) -> Result<CorrectionRequest> {
        let (employee_id, date) = (after.employee_id, after.work_date);
        let _guard = self.locks.lock(employee_id, date).await;

        let current = self.store.record(employee_id, date).await?;
        let mut next = current
            .clone()
            .unwrap_or_else(|| AttendanceDailyRecord::blank(employee_id, date, Utc::now()));
        let (requested_in, requested_out) = after.requested_clock_events();
        next.clock_in_at = requested_in.or(next.clock_in_at);
        next.clock_out_at = requested_out.or(next.clock_out_at);

        let facts = self.day_facts(employee_id, date).await?;
        let classification = self.classify_with(&facts, &next)?;
        classification.apply_to(&mut next);
        next.append_note(&format!("correction #{} applied", after.id));
        Self::bumped(&mut next);
        let ledger = Self::recovery_ledger(&facts, &next, &classification);

        let record_audit = AuditLog::entry(
            ATTENDANCE_TABLE,
            AttendanceDailyRecord::audit_key(employee_id, date),
            AuditAction::CorrectionApplied,
            current.as_ref(),
            Some(&next),
            actor,
            Some(applied_marker(after.id)),
        )?;
        let write = RecordWrite {
            expected_version: current.as_ref().map(|r| r.version),
            record: next.clone(),
            audit: record_audit,
            ledger,
        };

        let request_id = after.id;
        let committed = self
            .commit_transition(
                before,
                after,
                AuditAction::CorrectionApproved,
                actor,
                comment,
                Some(write),
            )
            .await?;

        info!(
            request_id,
            employee_id,
            %date,
            status = %next.day_status,
            "Correction fully approved and materialized"
        );
        Ok(committed)
    }

    async fn commit_transition(
        &self,
        before: &CorrectionRequest,
        mut after: CorrectionRequest,
        action: AuditAction,
        actor: &Actor,
        reason: Option<String>,
        record: Option<RecordWrite>,
    ) -> Result<CorrectionRequest> {
        after.version = before.version + 1;
        after.updated_at = Utc::now();
        let audit = AuditLog::entry(
            CORRECTION_TABLE,
            before.audit_key(),
            action,
            Some(before),
            Some(&after),
            actor,
            reason,
        )?;
        let commit = CorrectionCommit {
            expected_version: before.version,
            expected_status: before.status,
            request: after.clone(),
            audit,
            record,
        };
        match self.store.commit_correction(commit).await? {
            WriteOutcome::Written => Ok(after),
            WriteOutcome::Conflict => {
                warn!(request_id = before.id, "Correction request changed concurrently");
                Err(EngineError::Conflict(format!("correction request {}", before.id)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::classifier::{ClassifyInput, classify};
    use crate::engine::testing::{admin, employee, engine, fixed_now, hr, monday, t};
    use crate::engine::{ApprovalChain, SyncSettings};
    use crate::model::day_status::DayStatus;
    use crate::model::recovery::RecoveryInfo;
    use crate::store::AttendanceStore;
    use std::sync::Arc;

    /// Employee 1000 worked 08:30–12:00 on Monday: partial.
    async fn partial_day(engine: &AttendanceEngine) -> AttendanceDailyRecord {
        let me = employee(1000);
        engine
            .clock_in(&me, monday().and_time(t(8, 30)))
            .await
            .unwrap();
        engine
            .clock_out(&me, monday().and_time(t(12, 0)))
            .await
            .unwrap()
    }

    async fn file_late_clock_out(engine: &AttendanceEngine) -> CorrectionRequest {
        engine
            .file_correction(
                &employee(1000),
                CorrectionInput {
                    employee_id: None,
                    work_date: monday(),
                    requested_clock_in: None,
                    requested_clock_out: Some(t(17, 30)),
                    reason: "Forgot to clock out".into(),
                },
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn full_chain_turns_partial_into_present() {
        let (engine, _) = engine().await;
        let partial = partial_day(&engine).await;
        assert_eq!(partial.day_status, DayStatus::Partial);

        let req = file_late_clock_out(&engine).await;
        assert_eq!(req.status, CorrectionStatus::Pending);
        assert_eq!(req.approvals.len(), 3);

        let n1 = engine
            .approve_correction(&hr(10), req.id, 1, Some("ok".into()))
            .await
            .unwrap();
        assert_eq!(n1.status, CorrectionStatus::Approved { level: 1 });
        assert_eq!(engine.record(1000, monday()).await.unwrap().unwrap(), partial);

        let n2 = engine
            .approve_correction(&hr(11), req.id, 2, None)
            .await
            .unwrap();
        assert_eq!(n2.status, CorrectionStatus::Approved { level: 2 });
        assert_eq!(engine.record(1000, monday()).await.unwrap().unwrap(), partial);

        let n3 = engine
            .approve_correction(&admin(12), req.id, 3, None)
            .await
            .unwrap();
        assert!(n3.is_materialized());
        assert_eq!(n3.status.to_string(), "n3_approved");
        assert_eq!(n3.approvals[2].approver_id, Some(12));

        let stored = engine.record(1000, monday()).await.unwrap().unwrap();
        assert_eq!(stored.day_status, DayStatus::Present);
        assert_eq!(stored.gross_worked_minutes, 540);
        assert_eq!(stored.net_worked_minutes, 480);
        assert_eq!(stored.clock_in_at, Some(monday().and_time(t(8, 30))));

        let trail = engine.record_audit_trail(1000, monday()).await.unwrap();
        let applied = trail.last().unwrap();
        assert_eq!(applied.action, AuditAction::CorrectionApplied);
        let before = applied.before.as_ref().unwrap();
        assert_eq!(before["day_status"], "partial");
        assert_eq!(before["net_worked_minutes"], 150);
    }

    #[tokio::test]
    async fn materialized_record_matches_independent_classification() {
        let (engine, _) = engine().await;
        partial_day(&engine).await;
        let req = file_late_clock_out(&engine).await;
        engine.approve_correction(&hr(10), req.id, 1, None).await.unwrap();
        engine.approve_correction(&hr(11), req.id, 2, None).await.unwrap();
        engine.approve_correction(&admin(12), req.id, 3, None).await.unwrap();

        let expected = classify(&ClassifyInput {
            employee_id: 1000,
            work_date: monday(),
            as_of: fixed_now(),
            clock_in: Some(monday().and_time(t(8, 30))),
            clock_out: Some(monday().and_time(t(17, 30))),
            schedule: engine.resolve(1000, monday()).await.unwrap(),
            is_holiday: false,
            on_approved_leave: false,
            recovery: RecoveryInfo::none(),
            tolerances: engine.tolerances().await.unwrap(),
        })
        .unwrap();
        let stored = engine.record(1000, monday()).await.unwrap().unwrap();
        assert!(expected.matches(&stored));
    }

    #[tokio::test]
    async fn skipping_a_level_fails_and_changes_nothing() {
        let (engine, store) = engine().await;
        partial_day(&engine).await;
        let req = file_late_clock_out(&engine).await;
        let audit_before = store.audit_len().await;

        let err = engine
            .approve_correction(&hr(10), req.id, 2, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::OutOfSequenceApproval {
                expected: 1,
                attempted: 2
            }
        ));
        let unchanged = store.correction(req.id).await.unwrap().unwrap();
        assert_eq!(unchanged, req);
        assert_eq!(store.audit_len().await, audit_before);
    }

    #[tokio::test]
    async fn decided_levels_cannot_act_again() {
        let (engine, _) = engine().await;
        partial_day(&engine).await;
        let req = file_late_clock_out(&engine).await;
        engine.approve_correction(&hr(10), req.id, 1, None).await.unwrap();

        assert!(matches!(
            engine.approve_correction(&hr(11), req.id, 1, None).await,
            Err(EngineError::AlreadyDecided { .. })
        ));
        assert!(matches!(
            engine.reject_correction(&hr(11), req.id, 1, None).await,
            Err(EngineError::AlreadyDecided { .. })
        ));
    }

    #[tokio::test]
    async fn rejection_halts_the_pipeline() {
        let (engine, _) = engine().await;
        let partial = partial_day(&engine).await;
        let req = file_late_clock_out(&engine).await;
        engine.approve_correction(&hr(10), req.id, 1, None).await.unwrap();
        let rejected = engine
            .reject_correction(&hr(11), req.id, 2, Some("no evidence".into()))
            .await
            .unwrap();
        assert_eq!(rejected.status, CorrectionStatus::Rejected);
        assert_eq!(rejected.approvals[1].decision, Some(ApprovalDecision::Rejected));

        assert!(matches!(
            engine.approve_correction(&admin(12), req.id, 3, None).await,
            Err(EngineError::AlreadyDecided { .. })
        ));
        assert_eq!(engine.record(1000, monday()).await.unwrap().unwrap(), partial);
    }

    #[tokio::test]
    async fn approvers_are_checked_against_the_chain() {
        let (engine, _) = engine().await;
        partial_day(&engine).await;
        let req = file_late_clock_out(&engine).await;

        assert!(matches!(
            engine.approve_correction(&employee(1001), req.id, 1, None).await,
            Err(EngineError::PermissionDenied(_))
        ));
        // HR user linked to the requesting employee
        assert!(matches!(
            engine.approve_correction(&hr(1000), req.id, 1, None).await,
            Err(EngineError::PermissionDenied(_))
        ));
        engine.approve_correction(&hr(10), req.id, 1, None).await.unwrap();
        engine.approve_correction(&hr(11), req.id, 2, None).await.unwrap();
        assert!(matches!(
            engine.approve_correction(&hr(11), req.id, 3, None).await,
            Err(EngineError::PermissionDenied(_))
        ));
        assert!(matches!(
            engine.approve_correction(&admin(12), req.id, 4, None).await,
            Err(EngineError::PermissionDenied(_))
        ));
    }

    #[tokio::test]
    async fn filers_cannot_approve_what_they_filed() {
        let (engine, _) = engine().await;
        let req = engine
            .file_correction(
                &hr(10),
                CorrectionInput {
                    employee_id: Some(1001),
                    work_date: monday(),
                    requested_clock_in: Some(t(8, 30)),
                    requested_clock_out: Some(t(17, 30)),
                    reason: "Clock terminal offline".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(req.requested_by, 10);
        assert!(matches!(
            engine.approve_correction(&hr(10), req.id, 1, None).await,
            Err(EngineError::PermissionDenied(_))
        ));
        assert!(matches!(
            engine.reject_correction(&hr(10), req.id, 1, None).await,
            Err(EngineError::PermissionDenied(_))
        ));
        engine.approve_correction(&hr(11), req.id, 1, None).await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_approvals_at_one_level_apply_once() {
        let (engine, store) = engine().await;
        partial_day(&engine).await;
        let req = file_late_clock_out(&engine).await;

        let (h10, h11) = (hr(10), hr(11));
        let (a, b) = tokio::join!(
            engine.approve_correction(&h10, req.id, 1, None),
            engine.approve_correction(&h11, req.id, 1, None),
        );
        let wins = [&a, &b].iter().filter(|r| r.is_ok()).count();
        assert_eq!(wins, 1);
        let loser = if a.is_err() { a } else { b };
        assert!(matches!(
            loser,
            Err(EngineError::Conflict(_)) | Err(EngineError::AlreadyDecided { .. })
        ));
        let stored = store.correction(req.id).await.unwrap().unwrap();
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn stale_version_commit_is_a_conflict() {
        let (engine, store) = engine().await;
        partial_day(&engine).await;
        let req = file_late_clock_out(&engine).await;
        engine.approve_correction(&hr(10), req.id, 1, None).await.unwrap();

        // replay the level-1 transition from the stale snapshot
        let mut stale_after = req.clone();
        stale_after.status = CorrectionStatus::Approved { level: 1 };
        let err = engine
            .commit_transition(&req, stale_after, AuditAction::CorrectionApproved, &hr(11), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Conflict(_)));
        assert_eq!(
            store.correction(req.id).await.unwrap().unwrap().status,
            CorrectionStatus::Approved { level: 1 }
        );
    }

    #[tokio::test]
    async fn cancelling_a_materialized_correction_reverts_the_record() {
        let (engine, _) = engine().await;
        partial_day(&engine).await;
        let req = file_late_clock_out(&engine).await;
        engine.approve_correction(&hr(10), req.id, 1, None).await.unwrap();
        engine.approve_correction(&hr(11), req.id, 2, None).await.unwrap();
        engine.approve_correction(&admin(12), req.id, 3, None).await.unwrap();

        assert!(matches!(
            engine.cancel_correction(&hr(10), req.id, "wrong").await,
            Err(EngineError::PermissionDenied(_))
        ));
        assert!(matches!(
            engine.cancel_correction(&admin(12), req.id, " ").await,
            Err(EngineError::InvalidInput(_))
        ));

        let cancelled = engine
            .cancel_correction(&admin(12), req.id, "approved by mistake")
            .await
            .unwrap();
        assert_eq!(cancelled.status, CorrectionStatus::AdminCancelled);
        assert_eq!(cancelled.cancelled_by, Some(12));

        let stored = engine.record(1000, monday()).await.unwrap().unwrap();
        assert_eq!(stored.day_status, DayStatus::Partial);
        assert_eq!(stored.clock_out_at, Some(monday().and_time(t(12, 0))));
        assert!(stored.notes.contains("cancelled"));

        let trail = engine.record_audit_trail(1000, monday()).await.unwrap();
        assert_eq!(trail.last().unwrap().action, AuditAction::CorrectionReverted);

        assert!(matches!(
            engine.cancel_correction(&admin(12), req.id, "again").await,
            Err(EngineError::AlreadyDecided { .. })
        ));
    }

    #[tokio::test]
    async fn cancelling_a_correction_that_created_the_row_clears_its_clock_events() {
        let (engine, _) = engine().await;
        let req = engine
            .file_correction(
                &hr(10),
                CorrectionInput {
                    employee_id: Some(1001),
                    work_date: monday(),
                    requested_clock_in: Some(t(8, 30)),
                    requested_clock_out: Some(t(17, 30)),
                    reason: "Clock terminal offline".into(),
                },
            )
            .await
            .unwrap();
        engine.approve_correction(&hr(11), req.id, 1, None).await.unwrap();
        engine.approve_correction(&hr(12), req.id, 2, None).await.unwrap();
        engine.approve_correction(&admin(13), req.id, 3, None).await.unwrap();
        assert_eq!(
            engine.record(1001, monday()).await.unwrap().unwrap().day_status,
            DayStatus::Present
        );

        engine
            .cancel_correction(&admin(13), req.id, "duplicate")
            .await
            .unwrap();
        let stored = engine.record(1001, monday()).await.unwrap().unwrap();
        assert_eq!(stored.clock_in_at, None);
        assert_eq!(stored.day_status, DayStatus::Absent);
    }

    #[tokio::test]
    async fn cancelling_an_open_request_leaves_the_record_alone() {
        let (engine, _) = engine().await;
        let partial = partial_day(&engine).await;
        let req = file_late_clock_out(&engine).await;
        engine.approve_correction(&hr(10), req.id, 1, None).await.unwrap();
        engine
            .cancel_correction(&admin(12), req.id, "withdrawn")
            .await
            .unwrap();
        assert_eq!(engine.record(1000, monday()).await.unwrap().unwrap(), partial);
        assert!(matches!(
            engine.approve_correction(&hr(11), req.id, 2, None).await,
            Err(EngineError::AlreadyDecided { .. })
        ));
    }

    #[tokio::test]
    async fn filing_is_validated() {
        let (engine, _) = engine().await;
        let base = CorrectionInput {
            employee_id: None,
            work_date: monday(),
            requested_clock_in: Some(t(8, 30)),
            requested_clock_out: Some(t(17, 30)),
            reason: "reason".into(),
        };

        let mut reversed = base.clone();
        reversed.requested_clock_in = Some(t(18, 0));
        assert!(matches!(
            engine.file_correction(&employee(1000), reversed).await,
            Err(EngineError::InvalidInput(_))
        ));

        let mut future = base.clone();
        future.work_date = fixed_now().date() + chrono::Duration::days(1);
        assert!(engine.file_correction(&employee(1000), future).await.is_err());

        let mut for_other = base.clone();
        for_other.employee_id = Some(1001);
        assert!(matches!(
            engine.file_correction(&employee(1000), for_other).await,
            Err(EngineError::PermissionDenied(_))
        ));

        engine
            .file_correction(&employee(1000), base.clone())
            .await
            .unwrap();
        assert!(matches!(
            engine.file_correction(&employee(1000), base).await,
            Err(EngineError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn filing_rejects_times_that_cross_the_stored_event() {
        let (engine, store) = engine().await;
        partial_day(&engine).await;
        let audit_before = store.audit_len().await;

        // stored 08:30-12:00; a 13:00 clock-in alone would end before it starts
        let err = engine
            .file_correction(
                &employee(1000),
                CorrectionInput {
                    employee_id: None,
                    work_date: monday(),
                    requested_clock_in: Some(t(13, 0)),
                    requested_clock_out: None,
                    reason: "Came back after lunch".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
        assert!(store.open_correction(1000, monday()).await.unwrap().is_none());
        assert_eq!(store.audit_len().await, audit_before);

        let moved = engine
            .file_correction(
                &employee(1000),
                CorrectionInput {
                    employee_id: None,
                    work_date: monday(),
                    requested_clock_in: Some(t(11, 0)),
                    requested_clock_out: None,
                    reason: "Badge reader was down".into(),
                },
            )
            .await
            .unwrap();
        engine.approve_correction(&hr(10), moved.id, 1, None).await.unwrap();
        engine.approve_correction(&hr(11), moved.id, 2, None).await.unwrap();
        let done = engine
            .approve_correction(&admin(12), moved.id, 3, None)
            .await
            .unwrap();
        assert!(done.is_materialized());
        let stored = engine.record(1000, monday()).await.unwrap().unwrap();
        assert_eq!(stored.clock_in_at, Some(monday().and_time(t(11, 0))));
        assert_eq!(stored.clock_out_at, Some(monday().and_time(t(12, 0))));
    }

    #[tokio::test]
    async fn one_open_request_per_employee_day() {
        let (engine, store) = engine().await;
        partial_day(&engine).await;
        let first = file_late_clock_out(&engine).await;

        let again = NewCorrection {
            employee_id: 1000,
            work_date: monday(),
            requested_clock_in: None,
            requested_clock_out: Some(t(17, 0)),
            reason: "second try".into(),
            levels: 3,
            requested_by: 1000,
            created_at: Utc::now(),
        };
        let audit = AuditLog::entry::<CorrectionRequest>(
            CORRECTION_TABLE,
            String::new(),
            AuditAction::CorrectionFiled,
            None,
            None,
            &employee(1000),
            None,
        )
        .unwrap();
        assert!(store
            .insert_correction(again.clone(), audit.clone())
            .await
            .unwrap()
            .is_none());

        engine
            .reject_correction(&hr(10), first.id, 1, Some("wrong time".into()))
            .await
            .unwrap();
        let reopened = store.insert_correction(again, audit).await.unwrap().unwrap();
        assert_eq!(reopened.status, CorrectionStatus::Pending);
    }

    #[tokio::test]
    async fn single_level_chain_materializes_on_first_approval() {
        let (_, store) = engine().await;
        let engine = AttendanceEngine::new(
            store.clone() as Arc<dyn AttendanceStore>,
            ApprovalChain::new(vec![crate::model::role::Role::Hr]).unwrap(),
            SyncSettings::default(),
        )
        .with_clock(fixed_now);
        let req = engine
            .file_correction(
                &hr(10),
                CorrectionInput {
                    employee_id: Some(1002),
                    work_date: monday(),
                    requested_clock_in: Some(t(8, 30)),
                    requested_clock_out: Some(t(17, 30)),
                    reason: "x".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(req.levels, 1);
        let done = engine.approve_correction(&hr(11), req.id, 1, None).await.unwrap();
        assert_eq!(done.status.to_string(), "n1_approved");
        assert!(done.is_materialized());
        assert_eq!(
            engine.record(1002, monday()).await.unwrap().unwrap().day_status,
            DayStatus::Present
        );
    }

    #[tokio::test]
    async fn employees_only_see_their_own_requests() {
        let (engine, _) = engine().await;
        let req = file_late_clock_out(&engine).await;
        assert!(engine.correction(&employee(1000), req.id).await.is_ok());
        assert!(matches!(
            engine.correction(&employee(1001), req.id).await,
            Err(EngineError::PermissionDenied(_))
        ));
        let (mine, total) = engine
            .list_corrections(
                &employee(1001),
                CorrectionFilter {
                    employee_id: Some(1000),
                    status: None,
                    page: 1,
                    per_page: 10,
                },
            )
            .await
            .unwrap();
        assert!(mine.is_empty());
        assert_eq!(total, 0);
    }
}
