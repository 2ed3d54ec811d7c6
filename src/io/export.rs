use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::application::{ExpenseFilter, TrackerService};
use crate::domain::{Cents, Expense, Role};

/// Snapshot of a single account for JSON export. Credential material is
/// deliberately absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub role: Role,
    pub balance_cents: Cents,
    pub expenses: Vec<Expense>,
}

/// Exporter for converting tracker data to various formats
pub struct Exporter<'a> {
    service: &'a TrackerService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a TrackerService) -> Self {
        Self { service }
    }

    /// Export an account's expenses to CSV format
    pub async fn export_expenses_csv<W: Write>(&self, username: &str, writer: W) -> Result<usize> {
        let expenses = self
            .service
            .list_expenses(username, ExpenseFilter::default())
            .await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        // Write header
        csv_writer.write_record(["id", "date", "category", "amount_cents", "description"])?;

        let mut count = 0;
        for expense in &expenses {
            csv_writer.write_record(&[
                expense.id.to_string(),
                expense.date.to_string(),
                expense.category.clone(),
                expense.amount_cents.to_string(),
                expense.description.clone().unwrap_or_default(),
            ])?;
            count += 1;
        }

        csv_writer.flush()?;
        Ok(count)
    }

    /// Export all account balances to CSV format. Requires the
    /// user-management capability.
    pub async fn export_balances_csv<W: Write>(&self, acting: &str, writer: W) -> Result<usize> {
        let users = self.service.list_users(acting).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        // Write header
        csv_writer.write_record(["username", "role", "balance_cents"])?;

        let mut count = 0;
        for user in &users {
            csv_writer.write_record(&[
                user.username.clone(),
                user.role.as_str().to_string(),
                user.balance_cents.to_string(),
            ])?;
            count += 1;
        }

        csv_writer.flush()?;
        Ok(count)
    }

    /// Export an account and its expenses as a JSON snapshot
    pub async fn export_account_json<W: Write>(
        &self,
        username: &str,
        writer: W,
    ) -> Result<AccountSnapshot> {
        let user = self.service.get_user(username).await?;
        let expenses = self
            .service
            .list_expenses(username, ExpenseFilter::default())
            .await?;

        let snapshot = AccountSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            username: user.username,
            full_name: user.full_name,
            email: user.email,
            role: user.role,
            balance_cents: user.balance_cents,
            expenses,
        };

        serde_json::to_writer_pretty(writer, &snapshot)?;
        Ok(snapshot)
    }
}
