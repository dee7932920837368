use crate::domain::records::{
    CostEntry, Loan, LoanStatus, MovementRecord, Obligation, ObligationStatus, ScheduleLine,
};
use crate::domain::subjects::{
    ChartOfAccount, Customer, LoanProduct, Project, ProjectStatus, Staff, Vendor,
};
use crate::repo::{AccountingRepository, MicrofinanceRepository};
use crate::time::DateRange;
use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

type ObligationRow = (
    Uuid,
    Uuid,
    NaiveDate,
    NaiveDate,
    Decimal,
    Decimal,
    String,
    Option<NaiveDate>,
);
type PaymentRow = (Uuid, Uuid, NaiveDate, Decimal);
type LoanRow = (
    Uuid,
    Uuid,
    Uuid,
    String,
    Decimal,
    Decimal,
    Decimal,
    Decimal,
    i32,
    NaiveDate,
    Option<NaiveDate>,
);
type AccountRow = (Uuid, String, String, bool, bool, Option<Uuid>, Decimal);

const LOAN_COLUMNS: &str = "id, product_id, member_id, status, principal_amount, outstanding_principal, \
     outstanding_interest, interest_rate, term_months, application_date, disbursement_date";

#[derive(Clone)]
pub struct PgRepository {
    pool: sqlx::PgPool,
}

impl PgRepository {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

fn bounds(range: Option<DateRange>) -> (Option<NaiveDate>, Option<NaiveDate>) {
    match range {
        Some(r) => (Some(r.start), Some(r.end)),
        None => (None, None),
    }
}

fn obligation_from_row(row: ObligationRow) -> anyhow::Result<Obligation> {
    let (id, subject_id, issue_date, due_date, total_amount, paid_amount, status, settled_date) = row;
    Ok(Obligation {
        id,
        subject_id,
        issue_date,
        due_date,
        total_amount,
        paid_amount,
        status: status.parse::<ObligationStatus>()?,
        settled_date,
    })
}

fn payment_from_row(row: PaymentRow) -> MovementRecord {
    let (id, subject_id, occurred_date, amount) = row;
    MovementRecord {
        id,
        subject_id,
        occurred_date,
        debit_amount: Decimal::ZERO,
        credit_amount: amount,
    }
}

fn loan_from_row(row: LoanRow) -> anyhow::Result<Loan> {
    let (
        id,
        product_id,
        member_id,
        status,
        principal_amount,
        outstanding_principal,
        outstanding_interest,
        interest_rate,
        term_months,
        application_date,
        disbursement_date,
    ) = row;
    Ok(Loan {
        id,
        product_id,
        member_id,
        status: status.parse::<LoanStatus>()?,
        principal_amount,
        outstanding_principal,
        outstanding_interest,
        interest_rate,
        term_months,
        application_date,
        disbursement_date,
    })
}

fn account_from_row(row: AccountRow) -> ChartOfAccount {
    let (id, account_code, account_name, is_active, is_control_account, parent_account_id, balance) = row;
    ChartOfAccount {
        id,
        account_code,
        account_name,
        is_active,
        is_control_account,
        parent_account_id,
        balance,
    }
}

impl PgRepository {
    async fn fetch_obligations(
        &self,
        sql: &str,
        subject_id: Uuid,
        range: Option<DateRange>,
        what: &str,
    ) -> anyhow::Result<Vec<Obligation>> {
        let (from, to) = bounds(range);
        let rows: Vec<ObligationRow> = sqlx::query_as(sql)
            .bind(subject_id)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("select {what} failed"))?;
        rows.into_iter().map(obligation_from_row).collect()
    }

    async fn fetch_payments(
        &self,
        sql: &str,
        subject_id: Uuid,
        range: Option<DateRange>,
        what: &str,
    ) -> anyhow::Result<Vec<MovementRecord>> {
        let (from, to) = bounds(range);
        let rows: Vec<PaymentRow> = sqlx::query_as(sql)
            .bind(subject_id)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("select {what} failed"))?;
        Ok(rows.into_iter().map(payment_from_row).collect())
    }
}

#[async_trait]
impl AccountingRepository for PgRepository {
    async fn get_customer(&self, id: Uuid) -> anyhow::Result<Option<Customer>> {
        let row: Option<(Uuid, String, String, bool, bool, Decimal, Decimal)> = sqlx::query_as(
            "SELECT id, customer_number, name, is_active, is_on_credit_hold, credit_limit, current_balance \
             FROM customers WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("select customers failed")?;

        Ok(row.map(
            |(id, customer_number, name, is_active, is_on_credit_hold, credit_limit, current_balance)| Customer {
                id,
                customer_number,
                name,
                is_active,
                is_on_credit_hold,
                credit_limit,
                current_balance,
            },
        ))
    }

    async fn list_invoices_by_customer(
        &self,
        customer_id: Uuid,
        range: Option<DateRange>,
    ) -> anyhow::Result<Vec<Obligation>> {
        self.fetch_obligations(
            "SELECT id, customer_id, invoice_date, due_date, total_amount, paid_amount, status, paid_date \
             FROM invoices \
             WHERE customer_id = $1 \
               AND ($2::date IS NULL OR invoice_date >= $2) \
               AND ($3::date IS NULL OR invoice_date < $3) \
             ORDER BY invoice_date DESC",
            customer_id,
            range,
            "invoices",
        )
        .await
    }

    async fn list_payments_by_customer(
        &self,
        customer_id: Uuid,
        range: Option<DateRange>,
    ) -> anyhow::Result<Vec<MovementRecord>> {
        self.fetch_payments(
            "SELECT id, customer_id, payment_date, amount \
             FROM customer_payments \
             WHERE customer_id = $1 \
               AND ($2::date IS NULL OR payment_date >= $2) \
               AND ($3::date IS NULL OR payment_date < $3) \
             ORDER BY payment_date",
            customer_id,
            range,
            "customer_payments",
        )
        .await
    }

    async fn get_vendor(&self, id: Uuid) -> anyhow::Result<Option<Vendor>> {
        let row: Option<(Uuid, String, String, bool)> =
            sqlx::query_as("SELECT id, vendor_code, name, is_active FROM vendors WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .context("select vendors failed")?;

        Ok(row.map(|(id, vendor_code, name, is_active)| Vendor {
            id,
            vendor_code,
            name,
            is_active,
        }))
    }

    async fn list_bills_by_vendor(
        &self,
        vendor_id: Uuid,
        range: Option<DateRange>,
    ) -> anyhow::Result<Vec<Obligation>> {
        self.fetch_obligations(
            "SELECT id, vendor_id, bill_date, due_date, total_amount, paid_amount, status, paid_date \
             FROM bills \
             WHERE vendor_id = $1 \
               AND ($2::date IS NULL OR bill_date >= $2) \
               AND ($3::date IS NULL OR bill_date < $3) \
             ORDER BY bill_date DESC",
            vendor_id,
            range,
            "bills",
        )
        .await
    }

    async fn list_vendor_payments(
        &self,
        vendor_id: Uuid,
        range: Option<DateRange>,
    ) -> anyhow::Result<Vec<MovementRecord>> {
        self.fetch_payments(
            "SELECT id, vendor_id, payment_date, amount \
             FROM vendor_payments \
             WHERE vendor_id = $1 \
               AND ($2::date IS NULL OR payment_date >= $2) \
               AND ($3::date IS NULL OR payment_date < $3) \
             ORDER BY payment_date",
            vendor_id,
            range,
            "vendor_payments",
        )
        .await
    }

    async fn get_project(&self, id: Uuid) -> anyhow::Result<Option<Project>> {
        let row: Option<(Uuid, String, String, NaiveDate, Option<NaiveDate>, Decimal, Decimal, Decimal)> =
            sqlx::query_as(
                "SELECT id, name, status, start_date, end_date, budgeted_amount, actual_cost, actual_revenue \
                 FROM projects WHERE id = $1",
            )
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("select projects failed")?;

        let Some((id, name, status, start_date, end_date, budgeted_amount, actual_cost, actual_revenue)) = row
        else {
            return Ok(None);
        };
        Ok(Some(Project {
            id,
            name,
            status: status.parse::<ProjectStatus>()?,
            start_date,
            end_date,
            budgeted_amount,
            actual_cost,
            actual_revenue,
        }))
    }

    async fn list_cost_entries_by_project(
        &self,
        project_id: Uuid,
        range: Option<DateRange>,
    ) -> anyhow::Result<Vec<CostEntry>> {
        let (from, to) = bounds(range);
        let rows: Vec<(Uuid, Uuid, NaiveDate, Decimal, Option<String>, bool, bool)> = sqlx::query_as(
            "SELECT id, project_id, entry_date, amount, category, is_approved, is_billable \
             FROM project_costs \
             WHERE project_id = $1 \
               AND ($2::date IS NULL OR entry_date >= $2) \
               AND ($3::date IS NULL OR entry_date < $3) \
             ORDER BY entry_date",
        )
        .bind(project_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .context("select project_costs failed")?;

        Ok(rows
            .into_iter()
            .map(
                |(id, project_id, entry_date, amount, category, is_approved, is_billable)| CostEntry {
                    id,
                    project_id,
                    entry_date,
                    amount,
                    category,
                    is_approved,
                    is_billable,
                },
            )
            .collect())
    }

    async fn get_account(&self, id: Uuid) -> anyhow::Result<Option<ChartOfAccount>> {
        let row: Option<AccountRow> = sqlx::query_as(
            "SELECT id, account_code, account_name, is_active, is_control_account, parent_account_id, balance \
             FROM chart_of_accounts WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("select chart_of_accounts failed")?;

        Ok(row.map(account_from_row))
    }

    async fn list_journal_lines_by_account(
        &self,
        account_id: Uuid,
        range: Option<DateRange>,
    ) -> anyhow::Result<Vec<MovementRecord>> {
        let (from, to) = bounds(range);
        let rows: Vec<(Uuid, Uuid, NaiveDate, Decimal, Decimal)> = sqlx::query_as(
            "SELECT id, account_id, entry_date, debit_amount, credit_amount \
             FROM journal_lines \
             WHERE account_id = $1 \
               AND ($2::date IS NULL OR entry_date >= $2) \
               AND ($3::date IS NULL OR entry_date < $3) \
             ORDER BY entry_date",
        )
        .bind(account_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .context("select journal_lines failed")?;

        Ok(rows
            .into_iter()
            .map(
                |(id, subject_id, occurred_date, debit_amount, credit_amount)| MovementRecord {
                    id,
                    subject_id,
                    occurred_date,
                    debit_amount,
                    credit_amount,
                },
            )
            .collect())
    }

    async fn list_sub_accounts(&self, parent_id: Uuid) -> anyhow::Result<Vec<ChartOfAccount>> {
        let rows: Vec<AccountRow> = sqlx::query_as(
            "SELECT id, account_code, account_name, is_active, is_control_account, parent_account_id, balance \
             FROM chart_of_accounts WHERE parent_account_id = $1 ORDER BY account_code",
        )
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await
        .context("select sub accounts failed")?;

        Ok(rows.into_iter().map(account_from_row).collect())
    }
}

#[async_trait]
impl MicrofinanceRepository for PgRepository {
    async fn get_loan_product(&self, id: Uuid) -> anyhow::Result<Option<LoanProduct>> {
        let row: Option<(Uuid, String, String, bool, Decimal, Decimal, Decimal)> = sqlx::query_as(
            "SELECT id, code, name, is_active, interest_rate, min_loan_amount, max_loan_amount \
             FROM loan_products WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("select loan_products failed")?;

        Ok(row.map(
            |(id, code, name, is_active, interest_rate, min_loan_amount, max_loan_amount)| LoanProduct {
                id,
                code,
                name,
                is_active,
                interest_rate,
                min_loan_amount,
                max_loan_amount,
            },
        ))
    }

    async fn list_loans_by_product(&self, product_id: Uuid) -> anyhow::Result<Vec<Loan>> {
        let sql = format!("SELECT {LOAN_COLUMNS} FROM loans WHERE product_id = $1");
        let rows: Vec<LoanRow> = sqlx::query_as(&sql)
            .bind(product_id)
            .fetch_all(&self.pool)
            .await
            .context("select loans by product failed")?;
        rows.into_iter().map(loan_from_row).collect()
    }

    async fn list_schedules_by_loans(&self, loan_ids: &[Uuid]) -> anyhow::Result<Vec<ScheduleLine>> {
        if loan_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<(Uuid, Uuid, NaiveDate, Decimal, Decimal, bool)> = sqlx::query_as(
            "SELECT id, loan_id, due_date, total_amount, paid_amount, is_paid \
             FROM loan_schedules WHERE loan_id = ANY($1) ORDER BY due_date",
        )
        .bind(loan_ids)
        .fetch_all(&self.pool)
        .await
        .context("select loan_schedules failed")?;

        Ok(rows
            .into_iter()
            .map(
                |(id, loan_id, due_date, total_amount, paid_amount, is_paid)| ScheduleLine {
                    id,
                    loan_id,
                    due_date,
                    total_amount,
                    paid_amount,
                    is_paid,
                },
            )
            .collect())
    }

    async fn list_repayments_by_loans(
        &self,
        loan_ids: &[Uuid],
        range: Option<DateRange>,
    ) -> anyhow::Result<Vec<MovementRecord>> {
        if loan_ids.is_empty() {
            return Ok(Vec::new());
        }
        let (from, to) = bounds(range);
        let rows: Vec<PaymentRow> = sqlx::query_as(
            "SELECT id, loan_id, repayment_date, amount \
             FROM loan_repayments \
             WHERE loan_id = ANY($1) \
               AND ($2::date IS NULL OR repayment_date >= $2) \
               AND ($3::date IS NULL OR repayment_date < $3) \
             ORDER BY repayment_date",
        )
        .bind(loan_ids)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .context("select loan_repayments failed")?;

        Ok(rows.into_iter().map(payment_from_row).collect())
    }

    async fn get_staff(&self, id: Uuid) -> anyhow::Result<Option<Staff>> {
        let row: Option<(Uuid, String, String, String, NaiveDate)> = sqlx::query_as(
            "SELECT id, employee_number, full_name, status, joining_date FROM staff WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("select staff failed")?;

        Ok(row.map(|(id, employee_number, full_name, status, joining_date)| Staff {
            id,
            employee_number,
            full_name,
            status,
            joining_date,
        }))
    }

    async fn list_assigned_member_ids(&self, staff_id: Uuid) -> anyhow::Result<Vec<Uuid>> {
        sqlx::query_scalar("SELECT member_id FROM member_assignments WHERE staff_id = $1")
            .bind(staff_id)
            .fetch_all(&self.pool)
            .await
            .context("select member_assignments failed")
    }

    async fn list_loans_by_members(&self, member_ids: &[Uuid]) -> anyhow::Result<Vec<Loan>> {
        if member_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!("SELECT {LOAN_COLUMNS} FROM loans WHERE member_id = ANY($1)");
        let rows: Vec<LoanRow> = sqlx::query_as(&sql)
            .bind(member_ids)
            .fetch_all(&self.pool)
            .await
            .context("select loans by members failed")?;
        rows.into_iter().map(loan_from_row).collect()
    }
}
