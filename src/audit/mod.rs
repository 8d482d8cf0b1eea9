//! Audit logging of workflow runs
//!
//! Every finished run is kept with a fingerprint of the inputs it ran on,
//! so a stored report can be matched against the data that produced it.

use crate::models::{CompanyProfile, Transaction, WorkflowPolicy, WorkflowReport};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub company_id: i64,
    pub input_fingerprint: String,
    pub report: Arc<WorkflowReport>,
    pub recorded_at: DateTime<Utc>,
    /// Insertion order, unique for the lifetime of the log.
    pub sequence: usize,
}

/// Default number of runs kept before the oldest are evicted.
pub const DEFAULT_MAX_RUNS: usize = 1_000;

#[derive(Default)]
struct Store {
    records: HashMap<Uuid, RunRecord>,
    order: VecDeque<Uuid>,
    next_sequence: usize,
}

/// Audit trail storage, bounded to `max_runs` records (oldest evicted first)
pub struct AuditLog {
    store: Arc<RwLock<Store>>,
    max_runs: usize,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_RUNS)
    }

    pub fn with_capacity(max_runs: usize) -> Self {
        Self {
            store: Arc::new(RwLock::new(Store::default())),
            max_runs: max_runs.max(1),
        }
    }

    /// Store a finished run
    pub async fn record(&self, report: WorkflowReport, input_fingerprint: String) -> Result<Uuid> {
        let run_id = report.run_id;
        let mut store = self.store.write().await;
        let record = RunRecord {
            run_id,
            company_id: report.company_id,
            input_fingerprint,
            report: Arc::new(report),
            recorded_at: Utc::now(),
            sequence: store.next_sequence,
        };
        store.next_sequence += 1;

        store.records.insert(run_id, record);
        store.order.push_back(run_id);

        while store.order.len() > self.max_runs {
            if let Some(evicted) = store.order.pop_front() {
                store.records.remove(&evicted);
                debug!(run_id = %evicted, "Evicted oldest audited run");
            }
        }

        debug!(run_id = %run_id, stored = store.records.len(), "Recorded workflow run");
        Ok(run_id)
    }

    pub fn capacity(&self) -> usize {
        self.max_runs
    }

    pub async fn get(&self, run_id: Uuid) -> Result<Option<RunRecord>> {
        let store = self.store.read().await;
        Ok(store.records.get(&run_id).cloned())
    }

    /// Run IDs for a company, oldest first
    pub async fn list_for_company(&self, company_id: i64) -> Result<Vec<Uuid>> {
        let store = self.store.read().await;

        let mut items: Vec<_> = store
            .records
            .values()
            .filter(|record| record.company_id == company_id)
            .map(|record| (record.run_id, record.sequence))
            .collect();

        items.sort_by_key(|(_, sequence)| *sequence);

        Ok(items.into_iter().map(|(id, _)| id).collect())
    }

    /// Check a stored run against a candidate set of inputs
    pub async fn verify_integrity(
        &self,
        run_id: Uuid,
        company: &CompanyProfile,
        transactions: &[Transaction],
        policy: WorkflowPolicy,
    ) -> Result<bool> {
        let store = self.store.read().await;

        match store.records.get(&run_id) {
            Some(record) => {
                Ok(record.input_fingerprint == compute_input_fingerprint(company, transactions, policy))
            }
            None => Ok(false),
        }
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct FingerprintInput<'a> {
    company: &'a CompanyProfile,
    transactions: &'a [Transaction],
    policy: WorkflowPolicy,
}

/// SHA-256 over the JSON form of (company, transactions, policy)
pub fn compute_input_fingerprint(
    company: &CompanyProfile,
    transactions: &[Transaction],
    policy: WorkflowPolicy,
) -> String {
    let input = FingerprintInput {
        company,
        transactions,
        policy,
    };
    let mut hasher = Sha256::new();

    if serde_json::to_writer(&mut HashWriter(&mut hasher), &input).is_err() {
        return String::new();
    }

    hex::encode(hasher.finalize())
}

/// Adapter to allow writing into Sha256 via std::io::Write
struct HashWriter<'a, H: Digest>(&'a mut H);

impl<'a, H: Digest> Write for HashWriter<'a, H> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OverallStatus, ReportSummary, WorkflowState};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use std::collections::BTreeMap;

    fn company(id: i64) -> CompanyProfile {
        CompanyProfile::new(id, "Acme", Decimal::from(50_000))
    }

    fn transactions() -> Vec<Transaction> {
        vec![Transaction::expense(
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            Decimal::from(1_200),
            "Rent",
        )]
    }

    fn report(company_id: i64) -> WorkflowReport {
        let now = Utc::now();
        WorkflowReport {
            run_id: Uuid::new_v4(),
            company_id,
            company_name: "Acme".to_string(),
            policy: WorkflowPolicy::Sequential,
            state: WorkflowState::Completed,
            outcomes: BTreeMap::new(),
            summary: ReportSummary {
                tasks_completed: 0,
                tasks_failed: 0,
                tasks_not_run: 0,
                overall_status: OverallStatus::Success,
                runway_months: None,
                runway_status: None,
                current_balance: None,
                investment_readiness: None,
            },
            checks: vec![],
            started_at: now,
            completed_at: now,
            execution_time_ms: 0,
        }
    }

    #[test]
    fn test_fingerprint_is_stable_and_input_sensitive() {
        let a = compute_input_fingerprint(&company(1), &transactions(), WorkflowPolicy::Sequential);
        let b = compute_input_fingerprint(&company(1), &transactions(), WorkflowPolicy::Sequential);
        let c = compute_input_fingerprint(&company(1), &transactions(), WorkflowPolicy::Parallel);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[tokio::test]
    async fn test_record_and_lookup() {
        let log = AuditLog::new();
        let fingerprint =
            compute_input_fingerprint(&company(7), &transactions(), WorkflowPolicy::Sequential);

        let first = log.record(report(7), fingerprint.clone()).await.unwrap();
        let second = log.record(report(7), fingerprint).await.unwrap();
        log.record(report(8), String::new()).await.unwrap();

        let stored = log.get(first).await.unwrap().unwrap();
        assert_eq!(stored.company_id, 7);
        assert_eq!(log.list_for_company(7).await.unwrap(), vec![first, second]);
        assert!(log.get(Uuid::new_v4()).await.unwrap().is_none());

        assert!(log
            .verify_integrity(first, &company(7), &transactions(), WorkflowPolicy::Sequential)
            .await
            .unwrap());
        assert!(!log
            .verify_integrity(first, &company(7), &[], WorkflowPolicy::Sequential)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_oldest_runs_are_evicted_at_capacity() {
        let log = AuditLog::with_capacity(2);

        let first = log.record(report(3), String::new()).await.unwrap();
        let second = log.record(report(3), String::new()).await.unwrap();
        let third = log.record(report(3), String::new()).await.unwrap();

        assert!(log.get(first).await.unwrap().is_none());
        assert_eq!(log.list_for_company(3).await.unwrap(), vec![second, third]);
        assert_eq!(log.get(third).await.unwrap().unwrap().sequence, 2);
    }
}
