use crate::domain::records::{
    CostEntry, Loan, LoanStatus, MovementRecord, Obligation, ObligationStatus, ScheduleLine,
};
use crate::domain::subjects::{ChartOfAccount, Customer, Project, ProjectStatus, Vendor};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

pub fn customer(credit_limit: Decimal, current_balance: Decimal) -> Customer {
    Customer {
        id: Uuid::new_v4(),
        customer_number: "C-1001".to_string(),
        name: "Harbor Foods".to_string(),
        is_active: true,
        is_on_credit_hold: false,
        credit_limit,
        current_balance,
    }
}

pub fn vendor() -> Vendor {
    Vendor {
        id: Uuid::new_v4(),
        vendor_code: "V-200".to_string(),
        name: "Northwind Supply".to_string(),
        is_active: true,
    }
}

pub fn project(status: ProjectStatus, start: NaiveDate, budget: Decimal, actual_cost: Decimal) -> Project {
    Project {
        id: Uuid::new_v4(),
        name: "Warehouse Fit-out".to_string(),
        status,
        start_date: start,
        end_date: None,
        budgeted_amount: budget,
        actual_cost,
        actual_revenue: Decimal::ZERO,
    }
}

pub fn account(balance: Decimal) -> ChartOfAccount {
    ChartOfAccount {
        id: Uuid::new_v4(),
        account_code: "1100".to_string(),
        account_name: "Accounts Receivable".to_string(),
        is_active: true,
        is_control_account: false,
        parent_account_id: None,
        balance,
    }
}

pub fn invoice(
    subject_id: Uuid,
    issue_date: NaiveDate,
    due_date: NaiveDate,
    total: Decimal,
    status: ObligationStatus,
) -> Obligation {
    let paid = if status == ObligationStatus::Paid {
        total
    } else {
        Decimal::ZERO
    };
    Obligation {
        id: Uuid::new_v4(),
        subject_id,
        issue_date,
        due_date,
        total_amount: total,
        paid_amount: paid,
        status,
        settled_date: None,
    }
}

pub fn payment(subject_id: Uuid, date: NaiveDate, amount: Decimal) -> MovementRecord {
    MovementRecord {
        id: Uuid::new_v4(),
        subject_id,
        occurred_date: date,
        debit_amount: Decimal::ZERO,
        credit_amount: amount,
    }
}

pub fn journal(subject_id: Uuid, date: NaiveDate, debit: Decimal, credit: Decimal) -> MovementRecord {
    MovementRecord {
        id: Uuid::new_v4(),
        subject_id,
        occurred_date: date,
        debit_amount: debit,
        credit_amount: credit,
    }
}

pub fn cost(project_id: Uuid, date: NaiveDate, amount: Decimal, category: &str, is_approved: bool) -> CostEntry {
    CostEntry {
        id: Uuid::new_v4(),
        project_id,
        entry_date: date,
        amount,
        category: Some(category.to_string()),
        is_approved,
        is_billable: false,
    }
}

pub fn loan(
    product_id: Uuid,
    member_id: Uuid,
    status: LoanStatus,
    principal: Decimal,
    outstanding: Decimal,
    disbursed: Option<NaiveDate>,
) -> Loan {
    Loan {
        id: Uuid::new_v4(),
        product_id,
        member_id,
        status,
        principal_amount: principal,
        outstanding_principal: outstanding,
        outstanding_interest: Decimal::ZERO,
        interest_rate: Decimal::from(18),
        term_months: 12,
        application_date: disbursed.unwrap_or(d(2026, 1, 1)),
        disbursement_date: disbursed,
    }
}

pub fn installment(loan: &Loan, due: NaiveDate, amount: Decimal, is_paid: bool) -> ScheduleLine {
    ScheduleLine {
        id: Uuid::new_v4(),
        loan_id: loan.id,
        due_date: due,
        total_amount: amount,
        paid_amount: if is_paid { amount } else { Decimal::ZERO },
        is_paid,
    }
}
