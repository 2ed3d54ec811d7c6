use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::application::{ExpenseFilter, TrackerService};
use crate::domain::{format_cents, parse_cents, ExpensePatch, Role};

/// Spesa - Balance-Backed Expense Tracker
#[derive(Parser)]
#[command(name = "spesa")]
#[command(about = "An expense tracker where every mutation settles against the account balance")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, default_value = "spesa.db")]
    pub database: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database, optionally seeding an admin account
    Init {
        /// Username for the initial admin account
        #[arg(long)]
        admin: Option<String>,

        /// Password hash for the admin (produced by the external auth layer)
        #[arg(long)]
        admin_password_hash: Option<String>,

        /// Full name for the admin
        #[arg(long)]
        admin_full_name: Option<String>,

        /// Email for the admin
        #[arg(long)]
        admin_email: Option<String>,
    },

    /// Register a new user account
    Register {
        /// Username (must be unique)
        username: String,

        /// Password hash produced by the external auth layer
        #[arg(long)]
        password_hash: String,

        /// Full name
        #[arg(long)]
        full_name: String,

        /// Email address (must be unique)
        #[arg(long)]
        email: String,
    },

    /// Account management commands
    #[command(subcommand)]
    User(UserCommands),

    /// Category management commands
    #[command(subcommand)]
    Category(CategoryCommands),

    /// Expense management commands
    #[command(subcommand)]
    Expense(ExpenseCommands),

    /// Add funds to an account's balance
    Funds {
        /// Amount to add (e.g., "50.00" or "50")
        amount: String,

        /// Acting account
        #[arg(long = "as", value_name = "USERNAME")]
        acting: String,
    },

    /// Show an account's current balance
    Balance {
        /// Acting account
        #[arg(long = "as", value_name = "USERNAME")]
        acting: String,
    },

    /// Generate spending reports
    #[command(subcommand)]
    Report(ReportCommands),

    /// Export data to CSV or JSON
    Export {
        /// What to export: expenses, balances, account
        export_type: String,

        /// Acting account
        #[arg(long = "as", value_name = "USERNAME")]
        acting: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// List all accounts (admin)
    List {
        /// Acting account
        #[arg(long = "as", value_name = "USERNAME")]
        acting: String,
    },

    /// Show account details
    Show {
        /// Username to show
        username: String,
    },

    /// Change an account's role (admin)
    SetRole {
        /// Username to change
        username: String,

        /// New role: user, admin
        role: String,

        /// Acting account
        #[arg(long = "as", value_name = "USERNAME")]
        acting: String,
    },

    /// Delete an account and all of its expenses (admin)
    Delete {
        /// Username to delete
        username: String,

        /// Acting account
        #[arg(long = "as", value_name = "USERNAME")]
        acting: String,
    },
}

#[derive(Subcommand)]
pub enum CategoryCommands {
    /// Create a new category (admin)
    Add {
        /// Category name (must be unique)
        name: String,

        /// Acting account
        #[arg(long = "as", value_name = "USERNAME")]
        acting: String,
    },

    /// List all categories
    List,

    /// Rename a category; existing expenses keep the old label (admin)
    Rename {
        /// Current category name
        name: String,

        /// New category name
        new_name: String,

        /// Acting account
        #[arg(long = "as", value_name = "USERNAME")]
        acting: String,
    },

    /// Delete a category; existing expenses are untouched (admin)
    Delete {
        /// Category name
        name: String,

        /// Acting account
        #[arg(long = "as", value_name = "USERNAME")]
        acting: String,
    },
}

#[derive(Subcommand)]
pub enum ExpenseCommands {
    /// Record a new expense
    Add {
        /// Amount (e.g., "30.00" or "30")
        amount: String,

        /// Category name (must exist)
        #[arg(short, long)]
        category: String,

        /// Date of the expense (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,

        /// Description of the expense
        #[arg(long)]
        description: Option<String>,

        /// Acting account
        #[arg(long = "as", value_name = "USERNAME")]
        acting: String,
    },

    /// List expenses, newest first
    List {
        /// Filter by category
        #[arg(long)]
        category: Option<String>,

        /// Filter from date (YYYY-MM-DD)
        #[arg(long)]
        from_date: Option<String>,

        /// Filter to date (YYYY-MM-DD)
        #[arg(long)]
        to_date: Option<String>,

        /// Maximum number of expenses to show
        #[arg(short, long)]
        limit: Option<usize>,

        /// List across all accounts instead of the acting one (admin)
        #[arg(long)]
        all_users: bool,

        /// Acting account
        #[arg(long = "as", value_name = "USERNAME")]
        acting: String,
    },

    /// Show a single expense
    Show {
        /// Expense ID
        id: String,

        /// Acting account
        #[arg(long = "as", value_name = "USERNAME")]
        acting: String,
    },

    /// Update an expense; an amount change settles as one net adjustment
    Update {
        /// Expense ID
        id: String,

        /// New amount (e.g., "50.00")
        #[arg(long)]
        amount: Option<String>,

        /// New category name (must exist)
        #[arg(long)]
        category: Option<String>,

        /// New date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,

        /// New description
        #[arg(long)]
        description: Option<String>,

        /// Acting account
        #[arg(long = "as", value_name = "USERNAME")]
        acting: String,
    },

    /// Delete an expense, crediting its amount back
    Delete {
        /// Expense ID
        id: String,

        /// Acting account
        #[arg(long = "as", value_name = "USERNAME")]
        acting: String,
    },
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Category spending breakdown
    Categories {
        /// Start date (YYYY-MM-DD, defaults to start of current month)
        #[arg(long)]
        from: Option<String>,

        /// End date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        to: Option<String>,

        /// Output format: table, json, csv
        #[arg(long, default_value = "table")]
        format: String,

        /// Acting account
        #[arg(long = "as", value_name = "USERNAME")]
        acting: String,
    },

    /// Spending for the week containing a date
    Weekly {
        /// Anchor date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,

        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,

        /// Acting account
        #[arg(long = "as", value_name = "USERNAME")]
        acting: String,
    },

    /// Spending for the month containing a date
    Monthly {
        /// Anchor date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,

        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,

        /// Acting account
        #[arg(long = "as", value_name = "USERNAME")]
        acting: String,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Init {
                admin,
                admin_password_hash,
                admin_full_name,
                admin_email,
            } => {
                let service = TrackerService::init(&self.database).await?;
                println!("Database initialized: {}", self.database);

                if let Some(username) = admin {
                    let (Some(password_hash), Some(full_name), Some(email)) =
                        (admin_password_hash, admin_full_name, admin_email)
                    else {
                        anyhow::bail!(
                            "--admin requires --admin-password-hash, --admin-full-name and --admin-email"
                        );
                    };

                    let user = service
                        .create_admin(username, password_hash, full_name, email)
                        .await?;
                    println!("Created admin account: {}", user.username);
                }
            }

            Commands::Register {
                username,
                password_hash,
                full_name,
                email,
            } => {
                let service = TrackerService::connect(&self.database).await?;
                let user = service
                    .register_user(username, password_hash, full_name, email)
                    .await?;
                println!("Registered account: {} ({})", user.username, user.role);
            }

            Commands::User(user_cmd) => {
                let service = TrackerService::connect(&self.database).await?;
                run_user_command(&service, user_cmd).await?;
            }

            Commands::Category(category_cmd) => {
                let service = TrackerService::connect(&self.database).await?;
                run_category_command(&service, category_cmd).await?;
            }

            Commands::Expense(expense_cmd) => {
                let service = TrackerService::connect(&self.database).await?;
                run_expense_command(&service, expense_cmd, self.verbose).await?;
            }

            Commands::Funds { amount, acting } => {
                let service = TrackerService::connect(&self.database).await?;
                let amount_cents =
                    parse_cents(&amount).context("Invalid amount format. Use '50.00' or '50'")?;

                let receipt = service.add_funds(&acting, amount_cents).await?;
                println!(
                    "Added {} to {}. New balance: {}",
                    format_cents(receipt.amount_cents),
                    acting,
                    format_cents(receipt.new_balance)
                );
            }

            Commands::Balance { acting } => {
                let service = TrackerService::connect(&self.database).await?;
                let balance = service.get_balance(&acting).await?;
                println!("{}: {}", acting, format_cents(balance));
            }

            Commands::Report(report_cmd) => {
                let service = TrackerService::connect(&self.database).await?;
                run_report_command(&service, report_cmd).await?;
            }

            Commands::Export {
                export_type,
                acting,
                output,
            } => {
                let service = TrackerService::connect(&self.database).await?;
                run_export_command(&service, &export_type, &acting, output.as_deref()).await?;
            }
        }

        Ok(())
    }
}

async fn run_user_command(service: &TrackerService, cmd: UserCommands) -> Result<()> {
    match cmd {
        UserCommands::List { acting } => {
            let users = service.list_users(&acting).await?;
            if users.is_empty() {
                println!("No accounts found.");
            } else {
                println!(
                    "{:<20} {:<8} {:>12} {:<30}",
                    "USERNAME", "ROLE", "BALANCE", "EMAIL"
                );
                println!("{}", "-".repeat(72));
                for user in users {
                    println!(
                        "{:<20} {:<8} {:>12} {:<30}",
                        truncate(&user.username, 20),
                        user.role,
                        format_cents(user.balance_cents),
                        truncate(&user.email, 30)
                    );
                }
            }
        }

        UserCommands::Show { username } => {
            let user = service.get_user(&username).await?;
            println!("Account: {}", user.username);
            println!("  ID:        {}", user.id);
            println!("  Full name: {}", user.full_name);
            println!("  Email:     {}", user.email);
            println!("  Role:      {}", user.role);
            println!("  Balance:   {}", format_cents(user.balance_cents));
            println!(
                "  Created:   {}",
                user.created_at.format("%Y-%m-%d %H:%M:%S")
            );
        }

        UserCommands::SetRole {
            username,
            role,
            acting,
        } => {
            let role = Role::from_str(&role)
                .ok_or_else(|| anyhow::anyhow!("Invalid role '{}'. Valid roles: user, admin", role))?;

            let user = service.set_user_role(&acting, &username, role).await?;
            println!("Account {} is now {}", user.username, user.role);
        }

        UserCommands::Delete { username, acting } => {
            let deletion = service.delete_user(&acting, &username).await?;
            println!(
                "Deleted account {} and {} expense(s)",
                deletion.username, deletion.expenses_removed
            );
        }
    }
    Ok(())
}

async fn run_category_command(service: &TrackerService, cmd: CategoryCommands) -> Result<()> {
    match cmd {
        CategoryCommands::Add { name, acting } => {
            let category = service.create_category(&acting, name).await?;
            println!("Created category: {}", category.name);
        }

        CategoryCommands::List => {
            let categories = service.list_categories().await?;
            if categories.is_empty() {
                println!("No categories found.");
            } else {
                for category in categories {
                    println!("{}", category.name);
                }
            }
        }

        CategoryCommands::Rename {
            name,
            new_name,
            acting,
        } => {
            let category = service.rename_category(&acting, &name, new_name).await?;
            println!("Renamed category {} -> {}", name, category.name);
        }

        CategoryCommands::Delete { name, acting } => {
            service.delete_category(&acting, &name).await?;
            println!("Deleted category: {}", name);
        }
    }
    Ok(())
}

async fn run_expense_command(
    service: &TrackerService,
    cmd: ExpenseCommands,
    verbose: bool,
) -> Result<()> {
    match cmd {
        ExpenseCommands::Add {
            amount,
            category,
            date,
            description,
            acting,
        } => {
            let amount_cents =
                parse_cents(&amount).context("Invalid amount format. Use '30.00' or '30'")?;
            let date = match date {
                Some(date_str) => parse_date(&date_str)?,
                None => Utc::now().date_naive(),
            };

            let receipt = service
                .add_expense(&acting, amount_cents, &category, date, description)
                .await?;

            println!(
                "Recorded expense: {} {} on {} ({})",
                format_cents(receipt.expense.amount_cents),
                receipt.expense.category,
                receipt.expense.date,
                receipt.expense.id
            );
            println!("New balance: {}", format_cents(receipt.new_balance));
            if verbose {
                eprintln!(
                    "[ledger] debit {}: {} -> {}",
                    format_cents(receipt.expense.amount_cents),
                    format_cents(receipt.new_balance + receipt.expense.amount_cents),
                    format_cents(receipt.new_balance)
                );
            }
        }

        ExpenseCommands::List {
            category,
            from_date,
            to_date,
            limit,
            all_users,
            acting,
        } => {
            let filter = ExpenseFilter {
                category,
                from_date: from_date.as_deref().map(parse_date).transpose()?,
                to_date: to_date.as_deref().map(parse_date).transpose()?,
                limit,
            };

            let expenses = if all_users {
                service.list_all_expenses(&acting, filter).await?
            } else {
                service.list_expenses(&acting, filter).await?
            };

            if expenses.is_empty() {
                println!("No expenses found.");
            } else {
                println!(
                    "{:<12} {:<16} {:>12} {:<30} {:<36}",
                    "DATE", "CATEGORY", "AMOUNT", "DESCRIPTION", "ID"
                );
                println!("{}", "-".repeat(108));
                let mut total = 0;
                for expense in &expenses {
                    total += expense.amount_cents;
                    println!(
                        "{:<12} {:<16} {:>12} {:<30} {:<36}",
                        expense.date.to_string(),
                        truncate(&expense.category, 16),
                        format_cents(expense.amount_cents),
                        truncate(expense.description.as_deref().unwrap_or(""), 30),
                        expense.id
                    );
                }
                println!("{}", "-".repeat(108));
                println!("Total: {}", format_cents(total));
            }
        }

        ExpenseCommands::Show { id, acting } => {
            let expense_id =
                Uuid::parse_str(&id).context("Invalid expense ID format (expected UUID)")?;
            let expense = service.get_expense(&acting, expense_id).await?;

            println!("Expense: {}", expense.id);
            println!("  Amount:      {}", format_cents(expense.amount_cents));
            println!("  Category:    {}", expense.category);
            println!("  Date:        {}", expense.date);
            if let Some(desc) = &expense.description {
                println!("  Description: {}", desc);
            }
            println!(
                "  Recorded:    {}",
                expense.recorded_at.format("%Y-%m-%d %H:%M:%S")
            );
        }

        ExpenseCommands::Update {
            id,
            amount,
            category,
            date,
            description,
            acting,
        } => {
            let expense_id =
                Uuid::parse_str(&id).context("Invalid expense ID format (expected UUID)")?;

            let patch = ExpensePatch {
                amount_cents: amount
                    .as_deref()
                    .map(parse_cents)
                    .transpose()
                    .context("Invalid amount format. Use '50.00' or '50'")?,
                category,
                date: date.as_deref().map(parse_date).transpose()?,
                description,
            };

            let receipt = service.update_expense(&acting, expense_id, patch).await?;
            println!(
                "Updated expense: {} {} on {}",
                format_cents(receipt.expense.amount_cents),
                receipt.expense.category,
                receipt.expense.date
            );
            println!("New balance: {}", format_cents(receipt.new_balance));
        }

        ExpenseCommands::Delete { id, acting } => {
            let expense_id =
                Uuid::parse_str(&id).context("Invalid expense ID format (expected UUID)")?;

            let receipt = service.delete_expense(&acting, expense_id).await?;
            println!(
                "Deleted expense: {} {}",
                format_cents(receipt.expense.amount_cents),
                receipt.expense.category
            );
            println!("New balance: {}", format_cents(receipt.new_balance));
            if verbose {
                eprintln!(
                    "[ledger] credit {}: {} -> {}",
                    format_cents(receipt.expense.amount_cents),
                    format_cents(receipt.new_balance - receipt.expense.amount_cents),
                    format_cents(receipt.new_balance)
                );
            }
        }
    }
    Ok(())
}

async fn run_report_command(service: &TrackerService, cmd: ReportCommands) -> Result<()> {
    match cmd {
        ReportCommands::Categories {
            from,
            to,
            format,
            acting,
        } => {
            let today = Utc::now().date_naive();
            let from_date = match from {
                Some(s) => parse_date(&s)?,
                None => today.with_day(1).unwrap(),
            };
            let to_date = match to {
                Some(s) => parse_date(&s)?,
                None => today,
            };

            let report = service
                .category_breakdown(&acting, from_date, to_date)
                .await?;

            match format.as_str() {
                "json" => {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
                "csv" => {
                    println!("category,total,count,average,percentage");
                    for cat in &report.categories {
                        println!(
                            "{},{},{},{},{:.2}",
                            cat.category, cat.total, cat.count, cat.average, cat.percentage
                        );
                    }
                }
                _ => {
                    println!("Category Spending Report");
                    println!("Period: {} to {}", report.from_date, report.to_date);
                    println!();
                    println!(
                        "{:<20} {:>12} {:>8} {:>12} {:>8}",
                        "CATEGORY", "TOTAL", "COUNT", "AVERAGE", "PERCENT"
                    );
                    println!("{}", "-".repeat(65));

                    for cat in &report.categories {
                        println!(
                            "{:<20} {:>12} {:>8} {:>12} {:>7.1}%",
                            truncate(&cat.category, 20),
                            format_cents(cat.total),
                            cat.count,
                            format_cents(cat.average),
                            cat.percentage
                        );
                    }

                    println!("{}", "-".repeat(65));
                    println!("{:<20} {:>12}", "TOTAL", format_cents(report.total));
                }
            }
        }

        ReportCommands::Weekly {
            date,
            format,
            acting,
        } => {
            let anchor = match date {
                Some(s) => parse_date(&s)?,
                None => Utc::now().date_naive(),
            };
            let report = service.weekly_report(&acting, anchor).await?;
            print_period_report("Weekly", &report, &format)?;
        }

        ReportCommands::Monthly {
            date,
            format,
            acting,
        } => {
            let anchor = match date {
                Some(s) => parse_date(&s)?,
                None => Utc::now().date_naive(),
            };
            let report = service.monthly_report(&acting, anchor).await?;
            print_period_report("Monthly", &report, &format)?;
        }
    }
    Ok(())
}

fn print_period_report(
    label: &str,
    report: &crate::application::PeriodReport,
    format: &str,
) -> Result<()> {
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        _ => {
            println!("{} Spending Report", label);
            println!(
                "Period: {} to {} (exclusive)",
                report.period_start, report.period_end
            );
            println!("Expenses: {}", report.expense_count);
            println!("Total:    {}", format_cents(report.total));
        }
    }
    Ok(())
}

async fn run_export_command(
    service: &TrackerService,
    export_type: &str,
    acting: &str,
    output: Option<&str>,
) -> Result<()> {
    use crate::io::Exporter;
    use std::fs::File;
    use std::io::{stdout, Write};

    let exporter = Exporter::new(service);

    // Determine output writer
    let writer: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdout()),
    };

    match export_type {
        "expenses" => {
            let count = exporter.export_expenses_csv(acting, writer).await?;
            if output.is_some() {
                eprintln!("Exported {} expenses", count);
            }
        }
        "balances" => {
            let count = exporter.export_balances_csv(acting, writer).await?;
            if output.is_some() {
                eprintln!("Exported {} balances", count);
            }
        }
        "account" => {
            let snapshot = exporter.export_account_json(acting, writer).await?;
            if output.is_some() {
                eprintln!(
                    "Exported account {}: {} expenses",
                    snapshot.username,
                    snapshot.expenses.len()
                );
            }
        }
        _ => {
            anyhow::bail!(
                "Invalid export type '{}'. Valid types: expenses, balances, account",
                export_type
            );
        }
    }

    Ok(())
}

/// Parse a YYYY-MM-DD date argument.
fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("Invalid date format '{}'. Use YYYY-MM-DD", s))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let prefix: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", prefix)
    }
}
