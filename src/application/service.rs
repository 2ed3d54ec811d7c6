use chrono::NaiveDate;

use crate::domain::{
    adjust_for_update, credit_funds, debit_for_expense, Category, Cents, Expense, ExpenseId,
    ExpensePatch, Role, User,
};
use crate::storage::Repository;

use super::reporting::{CategoryBreakdown, CategorySummary, PeriodReport, ReportPeriod};
use super::AppError;

/// Application service providing high-level operations for the tracker.
/// This is the primary interface for any client (CLI, API, TUI, etc.);
/// credential verification happens outside, so callers identify accounts by
/// username and hand over already-hashed passwords.
pub struct TrackerService {
    repo: Repository,
}

/// Result of an expense mutation, carrying the balance after the ledger
/// adjustment committed.
pub struct ExpenseReceipt {
    pub expense: Expense,
    pub new_balance: Cents,
}

/// Result of adding funds to an account
pub struct FundsReceipt {
    pub amount_cents: Cents,
    pub new_balance: Cents,
}

/// Result of deleting an account (expenses are removed in the same
/// transaction)
pub struct UserDeletion {
    pub username: String,
    pub expenses_removed: u64,
}

/// Filter for querying expenses
#[derive(Debug, Clone, Default)]
pub struct ExpenseFilter {
    pub category: Option<String>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub limit: Option<usize>,
}

impl TrackerService {
    /// Create a new tracker service with the given repository.
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo))
    }

    // ========================
    // Account operations
    // ========================

    /// Register a new account. Registration is open: every new account
    /// starts with the user role and an empty balance.
    pub async fn register_user(
        &self,
        username: String,
        password_hash: String,
        full_name: String,
        email: String,
    ) -> Result<User, AppError> {
        if self.repo.get_user_by_username(&username).await?.is_some() {
            return Err(AppError::UsernameTaken(username));
        }
        if self.repo.get_user_by_email(&email).await?.is_some() {
            return Err(AppError::EmailTaken(email));
        }

        let user = User::new(username, password_hash, full_name, email);
        self.repo.save_user(&user).await?;
        Ok(user)
    }

    /// Create an administrator account. This is the bootstrap seam used at
    /// database initialization; regular registration always produces user
    /// accounts.
    pub async fn create_admin(
        &self,
        username: String,
        password_hash: String,
        full_name: String,
        email: String,
    ) -> Result<User, AppError> {
        if self.repo.get_user_by_username(&username).await?.is_some() {
            return Err(AppError::UsernameTaken(username));
        }
        if self.repo.get_user_by_email(&email).await?.is_some() {
            return Err(AppError::EmailTaken(email));
        }

        let user = User::new(username, password_hash, full_name, email).with_role(Role::Admin);
        self.repo.save_user(&user).await?;
        Ok(user)
    }

    /// Get an account by username.
    pub async fn get_user(&self, username: &str) -> Result<User, AppError> {
        self.repo
            .get_user_by_username(username)
            .await?
            .ok_or_else(|| AppError::UserNotFound(username.to_string()))
    }

    /// List all accounts. Requires the user-management capability.
    pub async fn list_users(&self, acting: &str) -> Result<Vec<User>, AppError> {
        self.require_user_manager(acting).await?;
        Ok(self.repo.list_users().await?)
    }

    /// Change an account's role. Requires the user-management capability.
    pub async fn set_user_role(
        &self,
        acting: &str,
        target: &str,
        role: Role,
    ) -> Result<User, AppError> {
        self.require_user_manager(acting).await?;
        let mut user = self.get_user(target).await?;
        self.repo.set_user_role(user.id, role).await?;
        user.role = role;
        Ok(user)
    }

    /// Delete an account and all of its expenses in one transaction.
    /// Requires the user-management capability; self-deletion is refused.
    pub async fn delete_user(&self, acting: &str, target: &str) -> Result<UserDeletion, AppError> {
        let acting_user = self.require_user_manager(acting).await?;
        if acting_user.username == target {
            return Err(AppError::PermissionDenied {
                username: acting_user.username,
                action: "delete their own account".to_string(),
            });
        }

        let user = self.get_user(target).await?;
        let expenses_removed = self.repo.delete_user_cascade(user.id).await?;
        Ok(UserDeletion {
            username: user.username,
            expenses_removed,
        })
    }

    /// Current stored balance for an account.
    pub async fn get_balance(&self, username: &str) -> Result<Cents, AppError> {
        let user = self.get_user(username).await?;
        Ok(user.balance_cents)
    }

    // ========================
    // Category operations
    // ========================

    /// List all categories. Available to every account.
    pub async fn list_categories(&self) -> Result<Vec<Category>, AppError> {
        Ok(self.repo.list_categories().await?)
    }

    /// Create a new category. Requires the category-management capability.
    pub async fn create_category(&self, acting: &str, name: String) -> Result<Category, AppError> {
        self.require_category_manager(acting).await?;
        if self.repo.get_category_by_name(&name).await?.is_some() {
            return Err(AppError::CategoryAlreadyExists(name));
        }

        let category = Category::new(name);
        self.repo.save_category(&category).await?;
        Ok(category)
    }

    /// Rename a category. Existing expenses keep their historical label.
    pub async fn rename_category(
        &self,
        acting: &str,
        name: &str,
        new_name: String,
    ) -> Result<Category, AppError> {
        self.require_category_manager(acting).await?;
        let mut category = self
            .repo
            .get_category_by_name(name)
            .await?
            .ok_or_else(|| AppError::CategoryNotFound(name.to_string()))?;
        if name != new_name && self.repo.get_category_by_name(&new_name).await?.is_some() {
            return Err(AppError::CategoryAlreadyExists(new_name));
        }

        self.repo.rename_category(category.id, &new_name).await?;
        category.name = new_name;
        Ok(category)
    }

    /// Delete a category. Expenses recorded against it are untouched.
    pub async fn delete_category(&self, acting: &str, name: &str) -> Result<Category, AppError> {
        self.require_category_manager(acting).await?;
        let category = self
            .repo
            .get_category_by_name(name)
            .await?
            .ok_or_else(|| AppError::CategoryNotFound(name.to_string()))?;

        self.repo.delete_category(category.id).await?;
        Ok(category)
    }

    // ========================
    // Expense operations
    // ========================

    /// Record a new expense: the expense row and the balance debit commit
    /// atomically, and the debit is refused if it would push the balance
    /// negative.
    pub async fn add_expense(
        &self,
        username: &str,
        amount_cents: Cents,
        category: &str,
        date: NaiveDate,
        description: Option<String>,
    ) -> Result<ExpenseReceipt, AppError> {
        let user = self.require_spender(username).await?;
        if self.repo.get_category_by_name(category).await?.is_none() {
            return Err(AppError::CategoryNotFound(category.to_string()));
        }

        // Validate against the balance we just read; the store re-checks the
        // same condition atomically at commit time.
        debit_for_expense(user.balance_cents, amount_cents)?;

        let mut expense = Expense::new(user.id, amount_cents, category.to_string(), date);
        if let Some(desc) = description {
            expense = expense.with_description(desc);
        }

        match self.repo.insert_expense_and_debit(&expense).await? {
            Some(new_balance) => Ok(ExpenseReceipt {
                expense,
                new_balance,
            }),
            None => {
                let balance = self.repo.get_balance(user.id).await?;
                Err(AppError::InsufficientFunds {
                    balance,
                    required: amount_cents,
                })
            }
        }
    }

    /// Get a single expense owned by the account.
    pub async fn get_expense(&self, username: &str, id: ExpenseId) -> Result<Expense, AppError> {
        let user = self.get_user(username).await?;
        self.repo
            .get_expense(id, user.id)
            .await?
            .ok_or_else(|| AppError::ExpenseNotFound(id.to_string()))
    }

    /// List the account's expenses, newest first, with optional filters.
    pub async fn list_expenses(
        &self,
        username: &str,
        filter: ExpenseFilter,
    ) -> Result<Vec<Expense>, AppError> {
        let user = self.get_user(username).await?;
        Ok(self
            .repo
            .list_expenses_filtered(
                Some(user.id),
                filter.category.as_deref(),
                filter.from_date,
                filter.to_date,
                filter.limit,
            )
            .await?)
    }

    /// List expenses across all accounts. Requires the user-management
    /// capability.
    pub async fn list_all_expenses(
        &self,
        acting: &str,
        filter: ExpenseFilter,
    ) -> Result<Vec<Expense>, AppError> {
        self.require_user_manager(acting).await?;
        Ok(self
            .repo
            .list_expenses_filtered(
                None,
                filter.category.as_deref(),
                filter.from_date,
                filter.to_date,
                filter.limit,
            )
            .await?)
    }

    /// Update an expense. An amount change moves the balance by exactly
    /// (old - new) as one net adjustment; the insufficient-funds check
    /// applies to the net effect.
    pub async fn update_expense(
        &self,
        username: &str,
        id: ExpenseId,
        patch: ExpensePatch,
    ) -> Result<ExpenseReceipt, AppError> {
        let user = self.require_spender(username).await?;
        let existing = self
            .repo
            .get_expense(id, user.id)
            .await?
            .ok_or_else(|| AppError::ExpenseNotFound(id.to_string()))?;

        if patch.is_empty() {
            return Err(AppError::NothingToUpdate);
        }
        if let Some(category) = &patch.category {
            if self.repo.get_category_by_name(category).await?.is_none() {
                return Err(AppError::CategoryNotFound(category.clone()));
            }
        }

        let updated = patch.apply_to(&existing);
        adjust_for_update(user.balance_cents, existing.amount_cents, updated.amount_cents)?;

        match self
            .repo
            .update_expense_and_adjust(&updated, existing.amount_cents)
            .await?
        {
            Some(new_balance) => Ok(ExpenseReceipt {
                expense: updated,
                new_balance,
            }),
            None => {
                let balance = self.repo.get_balance(user.id).await?;
                Err(AppError::InsufficientFunds {
                    balance,
                    required: updated.amount_cents - existing.amount_cents,
                })
            }
        }
    }

    /// Delete an expense, crediting its amount back to the balance. The
    /// credit has no failure condition.
    pub async fn delete_expense(
        &self,
        username: &str,
        id: ExpenseId,
    ) -> Result<ExpenseReceipt, AppError> {
        let user = self.require_spender(username).await?;
        let expense = self
            .repo
            .get_expense(id, user.id)
            .await?
            .ok_or_else(|| AppError::ExpenseNotFound(id.to_string()))?;

        let new_balance = self.repo.delete_expense_and_credit(&expense).await?;
        Ok(ExpenseReceipt {
            expense,
            new_balance,
        })
    }

    // ========================
    // Funds operations
    // ========================

    /// Add funds to the account's balance. Positive amounts only; no other
    /// failure condition.
    pub async fn add_funds(
        &self,
        username: &str,
        amount_cents: Cents,
    ) -> Result<FundsReceipt, AppError> {
        let user = self.require_spender(username).await?;
        credit_funds(user.balance_cents, amount_cents)?;

        let new_balance = self.repo.add_funds(user.id, amount_cents).await?;
        Ok(FundsReceipt {
            amount_cents,
            new_balance,
        })
    }

    // ========================
    // Reporting operations
    // ========================

    /// Per-category spending breakdown over an inclusive date range.
    pub async fn category_breakdown(
        &self,
        username: &str,
        from_date: NaiveDate,
        to_date: NaiveDate,
    ) -> Result<CategoryBreakdown, AppError> {
        let user = self.get_user(username).await?;
        let aggregates = self
            .repo
            .aggregate_expenses_by_category(user.id, from_date, to_date)
            .await?;

        let total: Cents = aggregates.iter().map(|a| a.total).sum();
        let categories = aggregates
            .into_iter()
            .map(|a| CategorySummary {
                percentage: if total > 0 {
                    (a.total as f64 / total as f64) * 100.0
                } else {
                    0.0
                },
                average: if a.count > 0 { a.total / a.count } else { 0 },
                category: a.category,
                total: a.total,
                count: a.count,
            })
            .collect();

        Ok(CategoryBreakdown {
            from_date,
            to_date,
            categories,
            total,
        })
    }

    /// Spending totals for the Monday-started week containing `anchor`.
    pub async fn weekly_report(
        &self,
        username: &str,
        anchor: NaiveDate,
    ) -> Result<PeriodReport, AppError> {
        self.period_report(username, ReportPeriod::Weekly, anchor)
            .await
    }

    /// Spending totals for the calendar month containing `anchor`.
    pub async fn monthly_report(
        &self,
        username: &str,
        anchor: NaiveDate,
    ) -> Result<PeriodReport, AppError> {
        self.period_report(username, ReportPeriod::Monthly, anchor)
            .await
    }

    async fn period_report(
        &self,
        username: &str,
        period: ReportPeriod,
        anchor: NaiveDate,
    ) -> Result<PeriodReport, AppError> {
        let user = self.get_user(username).await?;
        let (period_start, period_end) = period.bounds(anchor);
        let (expense_count, total) = self
            .repo
            .sum_expenses_in_range(user.id, period_start, period_end)
            .await?;

        Ok(PeriodReport {
            period_start,
            period_end,
            expense_count,
            total,
        })
    }

    // ========================
    // Capability checks
    // ========================

    async fn require_spender(&self, username: &str) -> Result<User, AppError> {
        let user = self.get_user(username).await?;
        if !user.role.can_spend() {
            return Err(AppError::PermissionDenied {
                username: user.username,
                action: "record expenses or add funds".to_string(),
            });
        }
        Ok(user)
    }

    async fn require_user_manager(&self, username: &str) -> Result<User, AppError> {
        let user = self.get_user(username).await?;
        if !user.role.can_manage_users() {
            return Err(AppError::PermissionDenied {
                username: user.username,
                action: "manage accounts".to_string(),
            });
        }
        Ok(user)
    }

    async fn require_category_manager(&self, username: &str) -> Result<User, AppError> {
        let user = self.get_user(username).await?;
        if !user.role.can_manage_categories() {
            return Err(AppError::PermissionDenied {
                username: user.username,
                action: "manage categories".to_string(),
            });
        }
        Ok(user)
    }
}
