use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::application::reporting::CategoryAggregate;
use crate::domain::{Category, CategoryId, Cents, Expense, ExpenseId, Role, User, UserId};

use super::MIGRATION_001_INITIAL;

/// Repository for persisting accounts, categories and expenses.
///
/// Balance adjustments are applied as conditional single-statement updates
/// inside the same transaction as the expense mutation they belong to, so a
/// concurrent mutation of the same account can never produce a lost update
/// or leave an expense without its balance adjustment.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given path.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;

        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    // ========================
    // Account operations
    // ========================

    /// Save a new account to the database.
    pub async fn save_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, password_hash, full_name, email, role, balance_cents, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user.id.to_string())
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .bind(&user.email)
        .bind(user.role.as_str())
        .bind(user.balance_cents)
        .bind(user.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save user")?;
        Ok(())
    }

    /// Get an account by username.
    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT id, username, password_hash, full_name, email, role, balance_cents, created_at
            FROM users
            WHERE username = ?
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch user by username")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_user(&row)?)),
            None => Ok(None),
        }
    }

    /// Get an account by email.
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT id, username, password_hash, full_name, email, role, balance_cents, created_at
            FROM users
            WHERE email = ?
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch user by email")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_user(&row)?)),
            None => Ok(None),
        }
    }

    /// List all accounts, ordered by username.
    pub async fn list_users(&self) -> Result<Vec<User>> {
        let rows = sqlx::query(
            r#"
            SELECT id, username, password_hash, full_name, email, role, balance_cents, created_at
            FROM users
            ORDER BY username
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list users")?;

        rows.iter().map(Self::row_to_user).collect()
    }

    /// Change an account's role.
    pub async fn set_user_role(&self, id: UserId, role: Role) -> Result<()> {
        sqlx::query("UPDATE users SET role = ? WHERE id = ?")
            .bind(role.as_str())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to set user role")?;
        Ok(())
    }

    /// Current stored balance for an account.
    pub async fn get_balance(&self, id: UserId) -> Result<Cents> {
        let row = sqlx::query("SELECT balance_cents FROM users WHERE id = ?")
            .bind(id.to_string())
            .fetch_one(&self.pool)
            .await
            .context("Failed to fetch balance")?;
        Ok(row.get("balance_cents"))
    }

    /// Delete an account and all of its expenses in one transaction.
    /// Returns the number of expenses removed.
    pub async fn delete_user_cascade(&self, id: UserId) -> Result<u64> {
        let id_str = id.to_string();
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let removed = sqlx::query("DELETE FROM expenses WHERE user_id = ?")
            .bind(&id_str)
            .execute(&mut *tx)
            .await
            .context("Failed to delete user's expenses")?
            .rows_affected();

        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(&id_str)
            .execute(&mut *tx)
            .await
            .context("Failed to delete user")?;

        tx.commit().await.context("Failed to commit user deletion")?;
        Ok(removed)
    }

    fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
        let id_str: String = row.get("id");
        let role_str: String = row.get("role");
        let created_at_str: String = row.get("created_at");

        Ok(User {
            id: Uuid::parse_str(&id_str).context("Invalid user ID")?,
            username: row.get("username"),
            password_hash: row.get("password_hash"),
            full_name: row.get("full_name"),
            email: row.get("email"),
            role: Role::from_str(&role_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid role: {}", role_str))?,
            balance_cents: row.get("balance_cents"),
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
        })
    }

    // ========================
    // Category operations
    // ========================

    /// Save a new category to the database.
    pub async fn save_category(&self, category: &Category) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO categories (id, name, created_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(category.id.to_string())
        .bind(&category.name)
        .bind(category.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save category")?;
        Ok(())
    }

    /// Get a category by name.
    pub async fn get_category_by_name(&self, name: &str) -> Result<Option<Category>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, created_at
            FROM categories
            WHERE name = ?
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch category by name")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_category(&row)?)),
            None => Ok(None),
        }
    }

    /// List all categories, ordered by name.
    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, created_at
            FROM categories
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list categories")?;

        rows.iter().map(Self::row_to_category).collect()
    }

    /// Rename a category. Expenses keep the old label.
    pub async fn rename_category(&self, id: CategoryId, new_name: &str) -> Result<()> {
        sqlx::query("UPDATE categories SET name = ? WHERE id = ?")
            .bind(new_name)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to rename category")?;
        Ok(())
    }

    /// Delete a category. Expenses recorded against it are untouched.
    pub async fn delete_category(&self, id: CategoryId) -> Result<()> {
        sqlx::query("DELETE FROM categories WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to delete category")?;
        Ok(())
    }

    fn row_to_category(row: &sqlx::sqlite::SqliteRow) -> Result<Category> {
        let id_str: String = row.get("id");
        let created_at_str: String = row.get("created_at");

        Ok(Category {
            id: Uuid::parse_str(&id_str).context("Invalid category ID")?,
            name: row.get("name"),
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
        })
    }

    // ========================
    // Expense + ledger operations
    // ========================

    /// Insert an expense and debit its amount from the owner's balance in
    /// one transaction. Returns the new balance, or `None` when the debit
    /// would push the balance negative - in which case nothing is persisted.
    pub async fn insert_expense_and_debit(&self, expense: &Expense) -> Result<Option<Cents>> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        // Conditional debit: the WHERE clause makes the insufficient-funds
        // check and the write a single atomic step.
        let row = sqlx::query(
            r#"
            UPDATE users
            SET balance_cents = balance_cents - ?
            WHERE id = ? AND balance_cents - ? >= 0
            RETURNING balance_cents
            "#,
        )
        .bind(expense.amount_cents)
        .bind(expense.user_id.to_string())
        .bind(expense.amount_cents)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to debit balance")?;

        let Some(row) = row else {
            tx.rollback().await.context("Failed to roll back debit")?;
            return Ok(None);
        };
        let new_balance: Cents = row.get("balance_cents");

        sqlx::query(
            r#"
            INSERT INTO expenses (id, user_id, amount_cents, category, date, description, recorded_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(expense.id.to_string())
        .bind(expense.user_id.to_string())
        .bind(expense.amount_cents)
        .bind(&expense.category)
        .bind(expense.date.to_string())
        .bind(&expense.description)
        .bind(expense.recorded_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .context("Failed to save expense")?;

        tx.commit().await.context("Failed to commit expense")?;
        Ok(Some(new_balance))
    }

    /// Update an expense and apply the net balance adjustment in one
    /// transaction. `updated` carries the new state, `old_amount` the amount
    /// currently persisted. Returns the new balance, or `None` when the net
    /// debit would push the balance negative - nothing is changed then.
    pub async fn update_expense_and_adjust(
        &self,
        updated: &Expense,
        old_amount: Cents,
    ) -> Result<Option<Cents>> {
        let delta = updated.amount_cents - old_amount;
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let changed = sqlx::query(
            r#"
            UPDATE expenses
            SET amount_cents = ?, category = ?, date = ?, description = ?
            WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(updated.amount_cents)
        .bind(&updated.category)
        .bind(updated.date.to_string())
        .bind(&updated.description)
        .bind(updated.id.to_string())
        .bind(updated.user_id.to_string())
        .execute(&mut *tx)
        .await
        .context("Failed to update expense")?
        .rows_affected();

        if changed == 0 {
            tx.rollback().await.context("Failed to roll back update")?;
            anyhow::bail!("Expense {} disappeared during update", updated.id);
        }

        let row = sqlx::query(
            r#"
            UPDATE users
            SET balance_cents = balance_cents - ?
            WHERE id = ? AND balance_cents - ? >= 0
            RETURNING balance_cents
            "#,
        )
        .bind(delta)
        .bind(updated.user_id.to_string())
        .bind(delta)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to adjust balance")?;

        let Some(row) = row else {
            tx.rollback().await.context("Failed to roll back adjustment")?;
            return Ok(None);
        };
        let new_balance: Cents = row.get("balance_cents");

        tx.commit().await.context("Failed to commit expense update")?;
        Ok(Some(new_balance))
    }

    /// Delete an expense and credit its amount back to the owner's balance
    /// in one transaction. The credit has no failure condition.
    pub async fn delete_expense_and_credit(&self, expense: &Expense) -> Result<Cents> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let removed = sqlx::query("DELETE FROM expenses WHERE id = ? AND user_id = ?")
            .bind(expense.id.to_string())
            .bind(expense.user_id.to_string())
            .execute(&mut *tx)
            .await
            .context("Failed to delete expense")?
            .rows_affected();

        if removed == 0 {
            tx.rollback().await.context("Failed to roll back deletion")?;
            anyhow::bail!("Expense {} disappeared during deletion", expense.id);
        }

        let row = sqlx::query(
            r#"
            UPDATE users
            SET balance_cents = balance_cents + ?
            WHERE id = ?
            RETURNING balance_cents
            "#,
        )
        .bind(expense.amount_cents)
        .bind(expense.user_id.to_string())
        .fetch_one(&mut *tx)
        .await
        .context("Failed to credit balance")?;
        let new_balance: Cents = row.get("balance_cents");

        tx.commit().await.context("Failed to commit expense deletion")?;
        Ok(new_balance)
    }

    /// Credit a funds addition to an account's balance. A single atomic
    /// read-modify-write; returns the new balance.
    pub async fn add_funds(&self, user_id: UserId, amount_cents: Cents) -> Result<Cents> {
        let row = sqlx::query(
            r#"
            UPDATE users
            SET balance_cents = balance_cents + ?
            WHERE id = ?
            RETURNING balance_cents
            "#,
        )
        .bind(amount_cents)
        .bind(user_id.to_string())
        .fetch_one(&self.pool)
        .await
        .context("Failed to add funds")?;

        Ok(row.get("balance_cents"))
    }

    /// Get an expense by ID, scoped to its owner.
    pub async fn get_expense(&self, id: ExpenseId, user_id: UserId) -> Result<Option<Expense>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, amount_cents, category, date, description, recorded_at
            FROM expenses
            WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch expense")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_expense(&row)?)),
            None => Ok(None),
        }
    }

    /// List expenses with optional filters, newest first. Passing no owner
    /// lists across all accounts (the administrative view).
    pub async fn list_expenses_filtered(
        &self,
        user_id: Option<UserId>,
        category: Option<&str>,
        from_date: Option<NaiveDate>,
        to_date: Option<NaiveDate>,
        limit: Option<usize>,
    ) -> Result<Vec<Expense>> {
        // Build query dynamically based on filters
        let mut query = String::from(
            "SELECT id, user_id, amount_cents, category, date, description, recorded_at FROM expenses WHERE 1=1",
        );

        // Collect all string bindings first so they live long enough
        let user_id_str = user_id.map(|id| id.to_string());
        let from_date_str = from_date.map(|d| d.to_string());
        let to_date_str = to_date.map(|d| d.to_string());

        if user_id.is_some() {
            query.push_str(" AND user_id = ?");
        }
        if category.is_some() {
            query.push_str(" AND category = ?");
        }
        if from_date.is_some() {
            query.push_str(" AND date >= ?");
        }
        if to_date.is_some() {
            query.push_str(" AND date <= ?");
        }

        query.push_str(" ORDER BY date DESC, recorded_at DESC");

        if let Some(lim) = limit {
            query.push_str(&format!(" LIMIT {}", lim));
        }

        let mut sql_query = sqlx::query(&query);

        if let Some(ref uid_str) = user_id_str {
            sql_query = sql_query.bind(uid_str);
        }
        if let Some(cat) = category {
            sql_query = sql_query.bind(cat);
        }
        if let Some(ref fd_str) = from_date_str {
            sql_query = sql_query.bind(fd_str);
        }
        if let Some(ref td_str) = to_date_str {
            sql_query = sql_query.bind(td_str);
        }

        let rows = sql_query
            .fetch_all(&self.pool)
            .await
            .context("Failed to list filtered expenses")?;

        rows.iter().map(Self::row_to_expense).collect()
    }

    /// Aggregate an account's expenses by category over an inclusive date
    /// range, largest totals first.
    pub async fn aggregate_expenses_by_category(
        &self,
        user_id: UserId,
        from_date: NaiveDate,
        to_date: NaiveDate,
    ) -> Result<Vec<CategoryAggregate>> {
        let rows = sqlx::query(
            r#"
            SELECT category, COUNT(*) as count, SUM(amount_cents) as total
            FROM expenses
            WHERE user_id = ? AND date >= ? AND date <= ?
            GROUP BY category
            ORDER BY total DESC
            "#,
        )
        .bind(user_id.to_string())
        .bind(from_date.to_string())
        .bind(to_date.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to aggregate expenses by category")?;

        Ok(rows
            .iter()
            .map(|row| CategoryAggregate {
                category: row.get("category"),
                count: row.get("count"),
                total: row.get("total"),
            })
            .collect())
    }

    /// Count and sum an account's expenses with date >= from and < to.
    pub async fn sum_expenses_in_range(
        &self,
        user_id: UserId,
        from_date: NaiveDate,
        to_date: NaiveDate,
    ) -> Result<(i64, Cents)> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) as count, COALESCE(SUM(amount_cents), 0) as total
            FROM expenses
            WHERE user_id = ? AND date >= ? AND date < ?
            "#,
        )
        .bind(user_id.to_string())
        .bind(from_date.to_string())
        .bind(to_date.to_string())
        .fetch_one(&self.pool)
        .await
        .context("Failed to sum expenses in range")?;

        Ok((row.get("count"), row.get("total")))
    }

    fn row_to_expense(row: &sqlx::sqlite::SqliteRow) -> Result<Expense> {
        let id_str: String = row.get("id");
        let user_id_str: String = row.get("user_id");
        let date_str: String = row.get("date");
        let recorded_at_str: String = row.get("recorded_at");

        Ok(Expense {
            id: Uuid::parse_str(&id_str).context("Invalid expense ID")?,
            user_id: Uuid::parse_str(&user_id_str).context("Invalid user ID")?,
            amount_cents: row.get("amount_cents"),
            category: row.get("category"),
            date: NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").context("Invalid date")?,
            description: row.get("description"),
            recorded_at: DateTime::parse_from_rfc3339(&recorded_at_str)
                .context("Invalid recorded_at")?
                .with_timezone(&Utc),
        })
    }
}
