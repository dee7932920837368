//! Read-only capabilities the dashboards pull their inputs from.
//!
//! `get_*` methods return `Ok(None)` for an unknown id; turning that into a not-found error is the
//! caller's decision. Optional date ranges filter obligations by `issue_date`, movements by
//! `occurred_date` and cost entries by `entry_date`. Payments and repayments carry their amount in
//! `credit_amount`.

pub mod memory;

use crate::domain::records::{CostEntry, Loan, MovementRecord, Obligation, ScheduleLine};
use crate::domain::subjects::{ChartOfAccount, Customer, LoanProduct, Project, Staff, Vendor};
use crate::time::DateRange;
use async_trait::async_trait;
use uuid::Uuid;

pub use memory::InMemoryRepository;

#[async_trait]
pub trait AccountingRepository: Send + Sync {
    async fn get_customer(&self, id: Uuid) -> anyhow::Result<Option<Customer>>;
    async fn list_invoices_by_customer(
        &self,
        customer_id: Uuid,
        range: Option<DateRange>,
    ) -> anyhow::Result<Vec<Obligation>>;
    async fn list_payments_by_customer(
        &self,
        customer_id: Uuid,
        range: Option<DateRange>,
    ) -> anyhow::Result<Vec<MovementRecord>>;

    async fn get_vendor(&self, id: Uuid) -> anyhow::Result<Option<Vendor>>;
    async fn list_bills_by_vendor(
        &self,
        vendor_id: Uuid,
        range: Option<DateRange>,
    ) -> anyhow::Result<Vec<Obligation>>;
    async fn list_vendor_payments(
        &self,
        vendor_id: Uuid,
        range: Option<DateRange>,
    ) -> anyhow::Result<Vec<MovementRecord>>;

    async fn get_project(&self, id: Uuid) -> anyhow::Result<Option<Project>>;
    async fn list_cost_entries_by_project(
        &self,
        project_id: Uuid,
        range: Option<DateRange>,
    ) -> anyhow::Result<Vec<CostEntry>>;

    async fn get_account(&self, id: Uuid) -> anyhow::Result<Option<ChartOfAccount>>;
    async fn list_journal_lines_by_account(
        &self,
        account_id: Uuid,
        range: Option<DateRange>,
    ) -> anyhow::Result<Vec<MovementRecord>>;
    async fn list_sub_accounts(&self, parent_id: Uuid) -> anyhow::Result<Vec<ChartOfAccount>>;
}

#[async_trait]
pub trait MicrofinanceRepository: Send + Sync {
    async fn get_loan_product(&self, id: Uuid) -> anyhow::Result<Option<LoanProduct>>;
    async fn list_loans_by_product(&self, product_id: Uuid) -> anyhow::Result<Vec<Loan>>;
    async fn list_schedules_by_loans(&self, loan_ids: &[Uuid]) -> anyhow::Result<Vec<ScheduleLine>>;
    async fn list_repayments_by_loans(
        &self,
        loan_ids: &[Uuid],
        range: Option<DateRange>,
    ) -> anyhow::Result<Vec<MovementRecord>>;

    async fn get_staff(&self, id: Uuid) -> anyhow::Result<Option<Staff>>;
    async fn list_assigned_member_ids(&self, staff_id: Uuid) -> anyhow::Result<Vec<Uuid>>;
    async fn list_loans_by_members(&self, member_ids: &[Uuid]) -> anyhow::Result<Vec<Loan>>;
}

pub(crate) fn in_range(range: Option<DateRange>, date: chrono::NaiveDate) -> bool {
    range.map_or(true, |r| r.contains(date))
}
