//! Per-subject dashboards and the cache-aside service in front of them.
//!
//! Each submodule exposes `build(repo, subject_id, as_of)`: it fetches the subject and its related
//! records concurrently, runs the shared analytics over them and assembles an immutable result.

pub mod account;
pub mod customer;
pub mod error;
pub mod loan_product;
pub mod project;
pub mod staff;
#[cfg(test)]
pub(crate) mod testkit;
pub mod vendor;

use crate::cache::{dashboard_key, ResultCache};
use crate::domain::records::{MovementRecord, Obligation};
use crate::repo::{AccountingRepository, MicrofinanceRepository};
use crate::time::period::{start_of_year, DateRange, Granularity};
use crate::time::Clock;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

pub use error::{is_deadline_exceeded, is_not_found, DeadlineExceededError, NotFoundError};

pub const TREND_MONTHS: usize = 12;
pub const PERFORMANCE_MONTHS: usize = 6;
pub const RECENT_ITEMS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubjectKind {
    Customer,
    Vendor,
    LoanProduct,
    Staff,
    Project,
    ChartOfAccount,
}

impl SubjectKind {
    pub const ALL: [SubjectKind; 6] = [
        SubjectKind::Customer,
        SubjectKind::Vendor,
        SubjectKind::LoanProduct,
        SubjectKind::Staff,
        SubjectKind::Project,
        SubjectKind::ChartOfAccount,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SubjectKind::Customer => "customer",
            SubjectKind::Vendor => "vendor",
            SubjectKind::LoanProduct => "loan-product",
            SubjectKind::Staff => "staff",
            SubjectKind::Project => "project",
            SubjectKind::ChartOfAccount => "chart-of-account",
        }
    }

    /// Cache key prefix. Chart-of-account keys have historically been written without dashes.
    pub fn cache_prefix(self) -> &'static str {
        match self {
            SubjectKind::ChartOfAccount => "chartofaccount",
            other => other.as_str(),
        }
    }

    pub fn cache_key(self, subject_id: Uuid) -> String {
        dashboard_key(self.cache_prefix(), subject_id)
    }
}

impl FromStr for SubjectKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        Ok(match normalized.as_str() {
            "customer" => SubjectKind::Customer,
            "vendor" => SubjectKind::Vendor,
            "loanproduct" => SubjectKind::LoanProduct,
            "staff" => SubjectKind::Staff,
            "project" => SubjectKind::Project,
            "chartofaccount" | "account" => SubjectKind::ChartOfAccount,
            _ => anyhow::bail!("unknown subject type: {s}"),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "subject_type", rename_all = "kebab-case")]
pub enum DashboardResult {
    Customer(customer::CustomerDashboard),
    Vendor(vendor::VendorDashboard),
    LoanProduct(loan_product::LoanProductDashboard),
    Staff(staff::StaffDashboard),
    Project(project::ProjectDashboard),
    ChartOfAccount(account::AccountDashboard),
}

impl DashboardResult {
    pub fn kind(&self) -> SubjectKind {
        match self {
            DashboardResult::Customer(_) => SubjectKind::Customer,
            DashboardResult::Vendor(_) => SubjectKind::Vendor,
            DashboardResult::LoanProduct(_) => SubjectKind::LoanProduct,
            DashboardResult::Staff(_) => SubjectKind::Staff,
            DashboardResult::Project(_) => SubjectKind::Project,
            DashboardResult::ChartOfAccount(_) => SubjectKind::ChartOfAccount,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Calendar {
    pub as_of: NaiveDate,
    pub start_of_year: NaiveDate,
    pub this_month: DateRange,
    pub last_month: DateRange,
    pub last_year: DateRange,
}

impl Calendar {
    pub fn new(as_of: NaiveDate) -> Self {
        let this_month = DateRange::month_of(as_of);
        let last_month_start = Granularity::Month.shift(this_month.start, -1);
        let start_of_year = start_of_year(as_of);
        Self {
            as_of,
            start_of_year,
            this_month,
            last_month: DateRange::new(last_month_start, this_month.start),
            last_year: DateRange::new(Granularity::Year.shift(start_of_year, -1), start_of_year),
        }
    }

    pub fn in_ytd(&self, date: NaiveDate) -> bool {
        date >= self.start_of_year
    }
}

/// Obligations as debit movements on their issue date, so they can be netted against payments
/// (credits) in a balance trend.
pub(crate) fn issued_as_movements(obligations: &[Obligation]) -> Vec<MovementRecord> {
    obligations
        .iter()
        .map(|o| MovementRecord {
            id: o.id,
            subject_id: o.subject_id,
            occurred_date: o.issue_date,
            debit_amount: o.total_amount,
            credit_amount: rust_decimal::Decimal::ZERO,
        })
        .collect()
}

/// Computes one dashboard straight from the repositories, for one-shot callers with no cache.
pub async fn build(
    accounting: &dyn AccountingRepository,
    microfinance: &dyn MicrofinanceRepository,
    kind: SubjectKind,
    subject_id: Uuid,
    as_of: NaiveDate,
) -> anyhow::Result<DashboardResult> {
    let t0 = Instant::now();
    tracing::info!(kind = kind.as_str(), %subject_id, %as_of, "generating dashboard");

    let result = match kind {
        SubjectKind::Customer => {
            DashboardResult::Customer(customer::build(accounting, subject_id, as_of).await?)
        }
        SubjectKind::Vendor => {
            DashboardResult::Vendor(vendor::build(accounting, subject_id, as_of).await?)
        }
        SubjectKind::Project => {
            DashboardResult::Project(project::build(accounting, subject_id, as_of).await?)
        }
        SubjectKind::ChartOfAccount => DashboardResult::ChartOfAccount(
            account::build(accounting, subject_id, as_of).await?,
        ),
        SubjectKind::LoanProduct => DashboardResult::LoanProduct(
            loan_product::build(microfinance, subject_id, as_of).await?,
        ),
        SubjectKind::Staff => {
            DashboardResult::Staff(staff::build(microfinance, subject_id, as_of).await?)
        }
    };

    tracing::info!(
        kind = kind.as_str(),
        %subject_id,
        elapsed_ms = t0.elapsed().as_millis() as u64,
        "dashboard generated"
    );
    Ok(result)
}

/// Serves dashboards through the result cache. A `NotFound` or failed build is not cached.
pub struct DashboardService {
    accounting: Arc<dyn AccountingRepository>,
    microfinance: Arc<dyn MicrofinanceRepository>,
    cache: ResultCache,
    clock: Arc<dyn Clock>,
    deadline: Option<Duration>,
}

impl DashboardService {
    pub fn new(
        accounting: Arc<dyn AccountingRepository>,
        microfinance: Arc<dyn MicrofinanceRepository>,
        cache: ResultCache,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            accounting,
            microfinance,
            cache,
            clock,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Cached dashboard as of the clock's business date.
    pub async fn dashboard(&self, kind: SubjectKind, subject_id: Uuid) -> anyhow::Result<DashboardResult> {
        let as_of = self.clock.today();
        let key = kind.cache_key(subject_id);
        let lookup = self
            .cache
            .get_or_compute(&key, || self.build(kind, subject_id, as_of));

        match self.deadline {
            Some(deadline) => match tokio::time::timeout(deadline, lookup).await {
                Ok(res) => res,
                Err(_) => {
                    tracing::error!(kind = kind.as_str(), %subject_id, deadline_ms = deadline.as_millis() as u64, "dashboard deadline exceeded");
                    Err(anyhow::Error::new(DeadlineExceededError {
                        kind,
                        subject_id,
                        deadline,
                    }))
                }
            },
            None => lookup.await,
        }
    }

    /// Builds a dashboard without touching the cache.
    pub async fn build(
        &self,
        kind: SubjectKind,
        subject_id: Uuid,
        as_of: NaiveDate,
    ) -> anyhow::Result<DashboardResult> {
        build(self.accounting.as_ref(), self.microfinance.as_ref(), kind, subject_id, as_of).await
    }

    pub async fn invalidate(&self, kind: SubjectKind, subject_id: Uuid) -> anyhow::Result<()> {
        self.cache.invalidate(&kind.cache_key(subject_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::testkit::{customer, d, invoice};
    use super::*;
    use crate::cache::{self, MemoryCache};
    use crate::domain::records::{Loan, MovementRecord, ObligationStatus, ScheduleLine};
    use crate::domain::subjects::{LoanProduct, Staff};
    use crate::repo::InMemoryRepository;
    use crate::time::{DateRange, FixedClock};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    struct Harness {
        service: DashboardService,
        backend: Arc<MemoryCache>,
        clock: Arc<FixedClock>,
    }

    fn harness(repo: InMemoryRepository) -> Harness {
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2026, 6, 30, 23, 58, 0).unwrap()));
        let backend = Arc::new(MemoryCache::new(clock.clone(), 100));
        let repo = Arc::new(repo);
        let service = DashboardService::new(
            repo.clone(),
            repo,
            ResultCache::new(backend.clone(), Duration::from_secs(300)),
            clock.clone(),
        );
        Harness {
            service,
            backend,
            clock,
        }
    }

    #[test]
    fn subject_kinds_round_trip_through_names() {
        for kind in SubjectKind::ALL {
            assert_eq!(kind.as_str().parse::<SubjectKind>().unwrap(), kind);
        }
        assert_eq!("LoanProduct".parse::<SubjectKind>().unwrap(), SubjectKind::LoanProduct);
        assert!("warehouse".parse::<SubjectKind>().is_err());

        let id = Uuid::nil();
        assert_eq!(
            SubjectKind::ChartOfAccount.cache_key(id),
            format!("chartofaccount-dashboard:{id}")
        );
        assert_eq!(SubjectKind::LoanProduct.cache_key(id), format!("loan-product-dashboard:{id}"));
    }

    #[test]
    fn calendar_anchors() {
        let cal = Calendar::new(d(2026, 3, 15));
        assert_eq!(cal.start_of_year, d(2026, 1, 1));
        assert_eq!(cal.last_month, DateRange::new(d(2026, 2, 1), d(2026, 3, 1)));
        assert_eq!(cal.last_year, DateRange::new(d(2025, 1, 1), d(2026, 1, 1)));
        assert!(cal.in_ytd(d(2026, 1, 1)));
        assert!(!cal.in_ytd(d(2025, 12, 31)));
    }

    #[tokio::test]
    async fn serves_cached_dashboard_until_ttl_expires() {
        let c = customer(dec!(1000), dec!(400));
        let repo = InMemoryRepository {
            invoices: vec![invoice(c.id, d(2026, 6, 1), d(2026, 7, 1), dec!(400), ObligationStatus::Sent)],
            customers: vec![c.clone()],
            ..Default::default()
        };
        let h = harness(repo);

        let first = h.service.dashboard(SubjectKind::Customer, c.id).await.unwrap();
        assert_eq!(first.kind(), SubjectKind::Customer);
        let cached: Option<DashboardResult> =
            cache::get(h.backend.as_ref(), &SubjectKind::Customer.cache_key(c.id)).await.unwrap();
        assert_eq!(cached.as_ref(), Some(&first));

        // the business date rolls over but the entry is still fresh
        h.clock.advance(chrono::Duration::minutes(3));
        let second = h.service.dashboard(SubjectKind::Customer, c.id).await.unwrap();
        assert_eq!(second, first);

        h.clock.advance(chrono::Duration::minutes(3));
        let third = h.service.dashboard(SubjectKind::Customer, c.id).await.unwrap();
        match third {
            DashboardResult::Customer(dash) => assert_eq!(dash.as_of, d(2026, 7, 1)),
            other => panic!("unexpected {:?}", other.kind()),
        }
    }

    #[tokio::test]
    async fn one_shot_build_uses_the_given_date_without_a_cache() {
        let c = customer(dec!(1000), dec!(400));
        let repo = InMemoryRepository {
            invoices: vec![invoice(c.id, d(2026, 1, 10), d(2026, 2, 9), dec!(400), ObligationStatus::Sent)],
            customers: vec![c.clone()],
            ..Default::default()
        };

        let result = build(&repo, &repo, SubjectKind::Customer, c.id, d(2026, 3, 31)).await.unwrap();
        match result {
            DashboardResult::Customer(dash) => assert_eq!(dash.as_of, d(2026, 3, 31)),
            other => panic!("unexpected {:?}", other.kind()),
        }

        let err = build(&repo, &repo, SubjectKind::Staff, c.id, d(2026, 3, 31)).await.unwrap_err();
        assert!(is_not_found(&err));
    }

    #[tokio::test]
    async fn invalidate_forces_recompute() {
        let c = customer(dec!(1000), dec!(0));
        let repo = InMemoryRepository {
            customers: vec![c.clone()],
            ..Default::default()
        };
        let h = harness(repo);

        h.service.dashboard(SubjectKind::Customer, c.id).await.unwrap();
        assert_eq!(h.backend.len().await, 1);
        h.service.invalidate(SubjectKind::Customer, c.id).await.unwrap();
        assert!(h.backend.is_empty().await);
    }

    #[tokio::test]
    async fn not_found_is_not_cached() {
        let h = harness(InMemoryRepository::default());
        let id = Uuid::new_v4();

        let err = h.service.dashboard(SubjectKind::Vendor, id).await.unwrap_err();
        assert!(is_not_found(&err));
        assert_eq!(err.to_string(), format!("vendor {id} not found"));
        assert!(h.backend.is_empty().await);
    }

    struct Stalled;

    #[async_trait]
    impl MicrofinanceRepository for Stalled {
        async fn get_loan_product(&self, _id: Uuid) -> anyhow::Result<Option<LoanProduct>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(None)
        }
        async fn list_loans_by_product(&self, _product_id: Uuid) -> anyhow::Result<Vec<Loan>> {
            Ok(Vec::new())
        }
        async fn list_schedules_by_loans(&self, _loan_ids: &[Uuid]) -> anyhow::Result<Vec<ScheduleLine>> {
            Ok(Vec::new())
        }
        async fn list_repayments_by_loans(
            &self,
            _loan_ids: &[Uuid],
            _range: Option<DateRange>,
        ) -> anyhow::Result<Vec<MovementRecord>> {
            Ok(Vec::new())
        }
        async fn get_staff(&self, _id: Uuid) -> anyhow::Result<Option<Staff>> {
            Ok(None)
        }
        async fn list_assigned_member_ids(&self, _staff_id: Uuid) -> anyhow::Result<Vec<Uuid>> {
            Ok(Vec::new())
        }
        async fn list_loans_by_members(&self, _member_ids: &[Uuid]) -> anyhow::Result<Vec<Loan>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn deadline_bounds_the_whole_request() {
        let clock = Arc::new(FixedClock::at_date(d(2026, 1, 1)));
        let backend = Arc::new(MemoryCache::new(clock.clone(), 10));
        let service = DashboardService::new(
            Arc::new(InMemoryRepository::default()),
            Arc::new(Stalled),
            ResultCache::new(backend.clone(), Duration::from_secs(300)),
            clock,
        )
        .with_deadline(Duration::from_millis(20));

        let err = service
            .dashboard(SubjectKind::LoanProduct, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(is_deadline_exceeded(&err));
        assert!(backend.is_empty().await);
    }
}
