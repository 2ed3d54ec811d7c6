mod common;

use anyhow::Result;
use common::{parse_date, test_service, Fixtures};
use spesa::io::Exporter;

#[tokio::test]
async fn test_export_expenses_csv() -> Result<()> {
    let (service, _temp) = test_service().await?;
    Fixtures::seed_categories(&service).await?;
    Fixtures::seed_funded_user(&service, "alice", 10000).await?;

    service
        .add_expense(
            "alice",
            1500,
            "groceries",
            parse_date("2024-01-10"),
            Some("weekly shop".into()),
        )
        .await?;
    service
        .add_expense("alice", 500, "dining", parse_date("2024-01-12"), None)
        .await?;

    let exporter = Exporter::new(&service);
    let mut buffer = Vec::new();
    let count = exporter.export_expenses_csv("alice", &mut buffer).await?;

    assert_eq!(count, 2);
    let csv = String::from_utf8(buffer)?;
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "id,date,category,amount_cents,description");
    assert!(lines[1].contains("2024-01-12,dining,500"));
    assert!(lines[2].contains("2024-01-10,groceries,1500,weekly shop"));

    Ok(())
}

#[tokio::test]
async fn test_export_balances_requires_admin() -> Result<()> {
    let (service, _temp) = test_service().await?;
    Fixtures::seed_categories(&service).await?;
    Fixtures::seed_funded_user(&service, "alice", 2500).await?;

    let exporter = Exporter::new(&service);

    let mut buffer = Vec::new();
    assert!(exporter
        .export_balances_csv("alice", &mut buffer)
        .await
        .is_err());

    let mut buffer = Vec::new();
    let count = exporter.export_balances_csv("root", &mut buffer).await?;
    assert_eq!(count, 2);
    let csv = String::from_utf8(buffer)?;
    assert!(csv.contains("alice,user,2500"));
    assert!(csv.contains("root,admin,0"));

    Ok(())
}

#[tokio::test]
async fn test_export_account_json_omits_credentials() -> Result<()> {
    let (service, _temp) = test_service().await?;
    Fixtures::seed_categories(&service).await?;
    Fixtures::seed_funded_user(&service, "alice", 10000).await?;
    service
        .add_expense("alice", 1500, "groceries", parse_date("2024-01-10"), None)
        .await?;

    let exporter = Exporter::new(&service);
    let mut buffer = Vec::new();
    let snapshot = exporter.export_account_json("alice", &mut buffer).await?;

    assert_eq!(snapshot.username, "alice");
    assert_eq!(snapshot.balance_cents, 8500);
    assert_eq!(snapshot.expenses.len(), 1);

    let json = String::from_utf8(buffer)?;
    assert!(json.contains("\"username\": \"alice\""));
    assert!(!json.contains("password"), "No credential material in exports");

    Ok(())
}
