//! Batch reclassification after upstream changes.
//!
//! Holidays, leave approvals, schedule activations and recovery declarations
//! all change what a stored day should say. A resync run recomputes every
//! targeted employee-day, rewrites only rows whose classification moved, and
//! keeps going when a single employee fails.

use std::collections::HashSet;

use chrono::{NaiveDate, Utc};
use futures::StreamExt;
use serde::Serialize;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::engine::audit::AuditLog;
use crate::engine::error::Result;
use crate::engine::{ATTENDANCE_TABLE, Actor, AttendanceEngine};
use crate::model::attendance::AttendanceDailyRecord;
use crate::model::audit::AuditAction;
use crate::store::{RecordWrite, WriteOutcome};

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SyncFailure {
    pub employee_id: Option<u64>,
    pub message: String,
}

/// Outcome of one resync run over one date.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SyncReport {
    #[schema(value_type = String)]
    pub run_id: Uuid,
    pub date: NaiveDate,
    pub targeted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
    pub failures: Vec<SyncFailure>,
}

impl SyncReport {
    fn new(date: NaiveDate) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            date,
            targeted: 0,
            updated: 0,
            unchanged: 0,
            skipped: 0,
            failed: 0,
            failures: Vec::new(),
        }
    }
}

enum ItemOutcome {
    Updated,
    Unchanged,
    Skipped,
}

impl AttendanceEngine {
    /// Reclassifies `date` for the listed employees, or for every tracked
    /// employee when `employee_ids` is `None`. Listed employees that are
    /// unknown or not required to clock are skipped.
    pub async fn resync(
        &self,
        date: NaiveDate,
        employee_ids: Option<Vec<u64>>,
        reason: &str,
    ) -> Result<SyncReport> {
        let mut report = SyncReport::new(date);
        // malformed settings fail the run instead of every item
        self.tolerances().await?;
        let tracked = self.store.tracked_employees().await?;

        let targets: Vec<u64> = match employee_ids {
            None => tracked,
            Some(ids) => {
                let tracked: HashSet<u64> = tracked.into_iter().collect();
                let mut seen = HashSet::new();
                let mut targets = Vec::new();
                for id in ids.into_iter().filter(|id| seen.insert(*id)) {
                    if tracked.contains(&id) {
                        targets.push(id);
                    } else {
                        report.skipped += 1;
                    }
                }
                targets
            }
        };
        report.targeted = targets.len() + report.skipped;

        info!(
            run_id = %report.run_id,
            %date,
            targeted = report.targeted,
            reason,
            "Resync started"
        );

        let actor = Actor::system();
        let timeout = self.sync.item_timeout;
        let mut results = futures::stream::iter(targets)
            .map(|employee_id| async move {
                let outcome =
                    tokio::time::timeout(timeout, self.resync_one(employee_id, date, &actor, reason))
                        .await;
                (employee_id, outcome)
            })
            .buffer_unordered(self.sync.concurrency.max(1));

        while let Some((employee_id, outcome)) = results.next().await {
            match outcome {
                Ok(Ok(ItemOutcome::Updated)) => report.updated += 1,
                Ok(Ok(ItemOutcome::Unchanged)) => report.unchanged += 1,
                Ok(Ok(ItemOutcome::Skipped)) => report.skipped += 1,
                Ok(Err(e)) => {
                    warn!(run_id = %report.run_id, employee_id, %date, error = %e, "Resync item failed");
                    report.failed += 1;
                    report.failures.push(SyncFailure {
                        employee_id: Some(employee_id),
                        message: e.to_string(),
                    });
                }
                Err(_) => {
                    warn!(run_id = %report.run_id, employee_id, %date, "Resync item timed out");
                    report.failed += 1;
                    report.failures.push(SyncFailure {
                        employee_id: Some(employee_id),
                        message: format!("timed out after {:?}", timeout),
                    });
                }
            }
        }

        info!(
            run_id = %report.run_id,
            %date,
            updated = report.updated,
            unchanged = report.unchanged,
            skipped = report.skipped,
            failed = report.failed,
            "Resync finished"
        );
        Ok(report)
    }

    /// One report per date, oldest date first.
    pub async fn resync_dates(
        &self,
        mut dates: Vec<NaiveDate>,
        employee_ids: Option<Vec<u64>>,
        reason: &str,
    ) -> Result<Vec<SyncReport>> {
        dates.sort();
        dates.dedup();
        let mut reports = Vec::with_capacity(dates.len());
        for date in dates {
            reports.push(self.resync(date, employee_ids.clone(), reason).await?);
        }
        Ok(reports)
    }

    async fn resync_one(
        &self,
        employee_id: u64,
        date: NaiveDate,
        actor: &Actor,
        reason: &str,
    ) -> Result<ItemOutcome> {
        let _guard = self.locks.lock(employee_id, date).await;

        let current = self.store.record(employee_id, date).await?;
        let facts = self.day_facts(employee_id, date).await?;
        let mut next = current
            .clone()
            .unwrap_or_else(|| AttendanceDailyRecord::blank(employee_id, date, Utc::now()));
        let classification = self.classify_with(&facts, &next)?;

        let ledger = Self::recovery_ledger(&facts, &next, &classification);
        if current.as_ref().is_some_and(|r| classification.matches(r)) {
            // the row is current; only a stale ledger row needs writing
            if let Some(ledger) = ledger {
                self.store.upsert_employee_recovery(ledger).await?;
            }
            return Ok(ItemOutcome::Unchanged);
        }

        classification.apply_to(&mut next);
        next.append_note(&format!("resync: {}", reason));
        Self::bumped(&mut next);
        let audit = AuditLog::entry(
            ATTENDANCE_TABLE,
            AttendanceDailyRecord::audit_key(employee_id, date),
            AuditAction::Resync,
            current.as_ref(),
            Some(&next),
            actor,
            Some(reason.to_string()),
        )?;
        let write = RecordWrite {
            expected_version: current.as_ref().map(|r| r.version),
            record: next,
            audit,
            ledger,
        };

        match self.store.write_record(write).await? {
            WriteOutcome::Written => Ok(ItemOutcome::Updated),
            // a concurrent writer already classified with fresher data
            WriteOutcome::Conflict => Ok(ItemOutcome::Skipped),
        }
    }
}
