// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use chrono::NaiveDate;
use spesa::application::TrackerService;
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(TrackerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = TrackerService::init(db_path.to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// Helper to parse a date string into NaiveDate
pub fn parse_date(date_str: &str) -> NaiveDate {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d").unwrap()
}

/// Test fixture: standard account and category setup
pub struct Fixtures;

impl Fixtures {
    /// Create the bootstrap admin account "root"
    pub async fn seed_admin(service: &TrackerService) -> Result<()> {
        service
            .create_admin(
                "root".into(),
                "$hash$root".into(),
                "Root Admin".into(),
                "root@example.com".into(),
            )
            .await?;
        Ok(())
    }

    /// Register a regular account named `username`
    pub async fn seed_user(service: &TrackerService, username: &str) -> Result<()> {
        service
            .register_user(
                username.into(),
                format!("$hash${}", username),
                format!("{} Example", username),
                format!("{}@example.com", username),
            )
            .await?;
        Ok(())
    }

    /// Create the admin plus a standard category set
    pub async fn seed_categories(service: &TrackerService) -> Result<()> {
        Self::seed_admin(service).await?;
        for name in ["groceries", "dining", "transport"] {
            service.create_category("root", name.into()).await?;
        }
        Ok(())
    }

    /// Register `username` and credit an opening balance
    pub async fn seed_funded_user(
        service: &TrackerService,
        username: &str,
        cents: i64,
    ) -> Result<()> {
        Self::seed_user(service, username).await?;
        service.add_funds(username, cents).await?;
        Ok(())
    }
}
