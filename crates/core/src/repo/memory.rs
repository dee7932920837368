use super::{in_range, AccountingRepository, MicrofinanceRepository};
use crate::domain::records::{CostEntry, Loan, MovementRecord, Obligation, ScheduleLine};
use crate::domain::subjects::{ChartOfAccount, Customer, LoanProduct, Project, Staff, Vendor};
use crate::time::DateRange;
use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffAssignment {
    pub staff_id: Uuid,
    pub member_id: Uuid,
}

/// Repository over plain vectors. Used by tests and by the worker's `--fixture` mode, where it is
/// loaded from a JSON document with one array per field (missing arrays are empty).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InMemoryRepository {
    pub customers: Vec<Customer>,
    pub invoices: Vec<Obligation>,
    pub customer_payments: Vec<MovementRecord>,
    pub vendors: Vec<Vendor>,
    pub bills: Vec<Obligation>,
    pub vendor_payments: Vec<MovementRecord>,
    pub projects: Vec<Project>,
    pub cost_entries: Vec<CostEntry>,
    pub accounts: Vec<ChartOfAccount>,
    pub journal_lines: Vec<MovementRecord>,
    pub loan_products: Vec<LoanProduct>,
    pub loans: Vec<Loan>,
    pub schedules: Vec<ScheduleLine>,
    pub repayments: Vec<MovementRecord>,
    pub staff: Vec<Staff>,
    pub assignments: Vec<StaffAssignment>,
}

impl InMemoryRepository {
    pub fn from_json_str(s: &str) -> anyhow::Result<Self> {
        serde_json::from_str(s).context("parse repository fixture failed")
    }

    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read fixture {} failed", path.display()))?;
        Self::from_json_str(&raw).with_context(|| format!("load fixture {} failed", path.display()))
    }
}

fn obligations_of(rows: &[Obligation], subject_id: Uuid, range: Option<DateRange>) -> Vec<Obligation> {
    rows.iter()
        .filter(|o| o.subject_id == subject_id && in_range(range, o.issue_date))
        .cloned()
        .collect()
}

fn movements_of(
    rows: &[MovementRecord],
    owner: impl Fn(Uuid) -> bool,
    range: Option<DateRange>,
) -> Vec<MovementRecord> {
    rows.iter()
        .filter(|m| owner(m.subject_id) && in_range(range, m.occurred_date))
        .cloned()
        .collect()
}

#[async_trait]
impl AccountingRepository for InMemoryRepository {
    async fn get_customer(&self, id: Uuid) -> anyhow::Result<Option<Customer>> {
        Ok(self.customers.iter().find(|c| c.id == id).cloned())
    }

    async fn list_invoices_by_customer(
        &self,
        customer_id: Uuid,
        range: Option<DateRange>,
    ) -> anyhow::Result<Vec<Obligation>> {
        Ok(obligations_of(&self.invoices, customer_id, range))
    }

    async fn list_payments_by_customer(
        &self,
        customer_id: Uuid,
        range: Option<DateRange>,
    ) -> anyhow::Result<Vec<MovementRecord>> {
        Ok(movements_of(&self.customer_payments, |id| id == customer_id, range))
    }

    async fn get_vendor(&self, id: Uuid) -> anyhow::Result<Option<Vendor>> {
        Ok(self.vendors.iter().find(|v| v.id == id).cloned())
    }

    async fn list_bills_by_vendor(
        &self,
        vendor_id: Uuid,
        range: Option<DateRange>,
    ) -> anyhow::Result<Vec<Obligation>> {
        Ok(obligations_of(&self.bills, vendor_id, range))
    }

    async fn list_vendor_payments(
        &self,
        vendor_id: Uuid,
        range: Option<DateRange>,
    ) -> anyhow::Result<Vec<MovementRecord>> {
        Ok(movements_of(&self.vendor_payments, |id| id == vendor_id, range))
    }

    async fn get_project(&self, id: Uuid) -> anyhow::Result<Option<Project>> {
        Ok(self.projects.iter().find(|p| p.id == id).cloned())
    }

    async fn list_cost_entries_by_project(
        &self,
        project_id: Uuid,
        range: Option<DateRange>,
    ) -> anyhow::Result<Vec<CostEntry>> {
        Ok(self
            .cost_entries
            .iter()
            .filter(|c| c.project_id == project_id && in_range(range, c.entry_date))
            .cloned()
            .collect())
    }

    async fn get_account(&self, id: Uuid) -> anyhow::Result<Option<ChartOfAccount>> {
        Ok(self.accounts.iter().find(|a| a.id == id).cloned())
    }

    async fn list_journal_lines_by_account(
        &self,
        account_id: Uuid,
        range: Option<DateRange>,
    ) -> anyhow::Result<Vec<MovementRecord>> {
        Ok(movements_of(&self.journal_lines, |id| id == account_id, range))
    }

    async fn list_sub_accounts(&self, parent_id: Uuid) -> anyhow::Result<Vec<ChartOfAccount>> {
        Ok(self
            .accounts
            .iter()
            .filter(|a| a.parent_account_id == Some(parent_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl MicrofinanceRepository for InMemoryRepository {
    async fn get_loan_product(&self, id: Uuid) -> anyhow::Result<Option<LoanProduct>> {
        Ok(self.loan_products.iter().find(|p| p.id == id).cloned())
    }

    async fn list_loans_by_product(&self, product_id: Uuid) -> anyhow::Result<Vec<Loan>> {
        Ok(self
            .loans
            .iter()
            .filter(|l| l.product_id == product_id)
            .cloned()
            .collect())
    }

    async fn list_schedules_by_loans(&self, loan_ids: &[Uuid]) -> anyhow::Result<Vec<ScheduleLine>> {
        Ok(self
            .schedules
            .iter()
            .filter(|s| loan_ids.contains(&s.loan_id))
            .cloned()
            .collect())
    }

    async fn list_repayments_by_loans(
        &self,
        loan_ids: &[Uuid],
        range: Option<DateRange>,
    ) -> anyhow::Result<Vec<MovementRecord>> {
        Ok(movements_of(&self.repayments, |id| loan_ids.contains(&id), range))
    }

    async fn get_staff(&self, id: Uuid) -> anyhow::Result<Option<Staff>> {
        Ok(self.staff.iter().find(|s| s.id == id).cloned())
    }

    async fn list_assigned_member_ids(&self, staff_id: Uuid) -> anyhow::Result<Vec<Uuid>> {
        Ok(self
            .assignments
            .iter()
            .filter(|a| a.staff_id == staff_id)
            .map(|a| a.member_id)
            .collect())
    }

    async fn list_loans_by_members(&self, member_ids: &[Uuid]) -> anyhow::Result<Vec<Loan>> {
        Ok(self
            .loans
            .iter()
            .filter(|l| member_ids.contains(&l.member_id))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn fixture_with_missing_arrays_loads() {
        let customer_id = Uuid::new_v4();
        let raw = serde_json::json!({
            "customers": [{
                "id": customer_id,
                "customer_number": "C-001",
                "name": "Acme",
                "is_active": true,
                "is_on_credit_hold": false,
                "credit_limit": "5000",
                "current_balance": "1200.50"
            }],
            "customer_payments": [
                {"id": Uuid::new_v4(), "subject_id": customer_id, "occurred_date": "2026-01-10",
                 "debit_amount": "0", "credit_amount": "100"},
                {"id": Uuid::new_v4(), "subject_id": customer_id, "occurred_date": "2026-02-10",
                 "debit_amount": "0", "credit_amount": "200"}
            ]
        })
        .to_string();

        let repo = InMemoryRepository::from_json_str(&raw).unwrap();
        assert!(repo.get_customer(customer_id).await.unwrap().is_some());
        assert!(repo.get_customer(Uuid::new_v4()).await.unwrap().is_none());
        assert!(repo.loans.is_empty());

        let feb = DateRange::month_of(NaiveDate::from_ymd_opt(2026, 2, 1).unwrap());
        let payments = repo.list_payments_by_customer(customer_id, Some(feb)).await.unwrap();
        assert_eq!(payments.len(), 1);
        let all = repo.list_payments_by_customer(customer_id, None).await.unwrap();
        assert_eq!(all.len(), 2);
    }
}
