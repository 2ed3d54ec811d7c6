use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Cents, UserId};

pub type ExpenseId = Uuid;

/// A recorded expense. The category is stored by name, not as a foreign
/// key: deleting or renaming a category leaves existing expenses with their
/// historical label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expense {
    pub id: ExpenseId,
    /// Owning account (balance decreases when the expense is recorded)
    pub user_id: UserId,
    /// Amount in cents (always positive)
    pub amount_cents: Cents,
    /// Category label at the time of recording
    pub category: String,
    /// When the expense occurred in the real world
    pub date: NaiveDate,
    /// Human-readable description
    pub description: Option<String>,
    /// When we recorded this expense in the system
    pub recorded_at: DateTime<Utc>,
}

impl Expense {
    pub fn new(user_id: UserId, amount_cents: Cents, category: String, date: NaiveDate) -> Self {
        assert!(amount_cents > 0, "Expense amount must be positive");
        Self {
            id: Uuid::new_v4(),
            user_id,
            amount_cents,
            category,
            date,
            description: None,
            recorded_at: Utc::now(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Partial update of an expense. `None` fields keep their current value;
/// a patch with nothing set is rejected by the service.
#[derive(Debug, Clone, Default)]
pub struct ExpensePatch {
    pub amount_cents: Option<Cents>,
    pub category: Option<String>,
    pub date: Option<NaiveDate>,
    pub description: Option<String>,
}

impl ExpensePatch {
    pub fn is_empty(&self) -> bool {
        self.amount_cents.is_none()
            && self.category.is_none()
            && self.date.is_none()
            && self.description.is_none()
    }

    /// Produce the expense as it would look with this patch applied.
    pub fn apply_to(&self, expense: &Expense) -> Expense {
        Expense {
            id: expense.id,
            user_id: expense.user_id,
            amount_cents: self.amount_cents.unwrap_or(expense.amount_cents),
            category: self
                .category
                .clone()
                .unwrap_or_else(|| expense.category.clone()),
            date: self.date.unwrap_or(expense.date),
            description: self.description.clone().or_else(|| expense.description.clone()),
            recorded_at: expense.recorded_at,
        }
    }
}
