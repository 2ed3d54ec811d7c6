mod common;

use anyhow::Result;
use common::{parse_date, test_service, Fixtures};
use spesa::application::{AppError, ExpenseFilter};
use spesa::domain::ExpensePatch;
use uuid::Uuid;

#[tokio::test]
async fn test_expense_requires_existing_category() -> Result<()> {
    let (service, _temp) = test_service().await?;
    Fixtures::seed_categories(&service).await?;
    Fixtures::seed_funded_user(&service, "alice", 10000).await?;

    let result = service
        .add_expense("alice", 1000, "holidays", parse_date("2024-01-15"), None)
        .await;
    assert!(matches!(result, Err(AppError::CategoryNotFound(_))));
    assert_eq!(service.get_balance("alice").await?, 10000);

    Ok(())
}

#[tokio::test]
async fn test_list_expenses_newest_first() -> Result<()> {
    let (service, _temp) = test_service().await?;
    Fixtures::seed_categories(&service).await?;
    Fixtures::seed_funded_user(&service, "alice", 50000).await?;

    service
        .add_expense("alice", 1000, "groceries", parse_date("2024-01-05"), None)
        .await?;
    service
        .add_expense("alice", 2000, "dining", parse_date("2024-01-20"), None)
        .await?;
    service
        .add_expense("alice", 3000, "transport", parse_date("2024-01-10"), None)
        .await?;

    let expenses = service
        .list_expenses("alice", ExpenseFilter::default())
        .await?;
    let dates: Vec<String> = expenses.iter().map(|e| e.date.to_string()).collect();
    assert_eq!(dates, vec!["2024-01-20", "2024-01-10", "2024-01-05"]);

    Ok(())
}

#[tokio::test]
async fn test_list_expenses_filtering() -> Result<()> {
    let (service, _temp) = test_service().await?;
    Fixtures::seed_categories(&service).await?;
    Fixtures::seed_funded_user(&service, "alice", 100000).await?;

    service
        .add_expense("alice", 1500, "groceries", parse_date("2024-01-10"), None)
        .await?;
    service
        .add_expense("alice", 850, "groceries", parse_date("2024-01-20"), None)
        .await?;
    service
        .add_expense("alice", 500, "dining", parse_date("2024-01-15"), None)
        .await?;
    service
        .add_expense("alice", 2000, "groceries", parse_date("2024-02-05"), None)
        .await?;

    // By category
    let filtered = service
        .list_expenses(
            "alice",
            ExpenseFilter {
                category: Some("groceries".into()),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(filtered.len(), 3, "Should have 3 grocery expenses");

    // By inclusive date range
    let filtered = service
        .list_expenses(
            "alice",
            ExpenseFilter {
                from_date: Some(parse_date("2024-01-01")),
                to_date: Some(parse_date("2024-01-31")),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(filtered.len(), 3, "Should have 3 expenses in January");

    // Combined, with a limit
    let filtered = service
        .list_expenses(
            "alice",
            ExpenseFilter {
                category: Some("groceries".into()),
                from_date: Some(parse_date("2024-01-01")),
                to_date: Some(parse_date("2024-01-31")),
                limit: Some(1),
            },
        )
        .await?;
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].date, parse_date("2024-01-20"));

    Ok(())
}

#[tokio::test]
async fn test_update_without_amount_leaves_balance_alone() -> Result<()> {
    let (service, _temp) = test_service().await?;
    Fixtures::seed_categories(&service).await?;
    Fixtures::seed_funded_user(&service, "alice", 10000).await?;

    let receipt = service
        .add_expense("alice", 3000, "groceries", parse_date("2024-01-15"), None)
        .await?;

    let receipt = service
        .update_expense(
            "alice",
            receipt.expense.id,
            ExpensePatch {
                category: Some("dining".into()),
                date: Some(parse_date("2024-01-16")),
                description: Some("dinner out".into()),
                ..Default::default()
            },
        )
        .await?;

    assert_eq!(receipt.new_balance, 7000);
    let expense = service.get_expense("alice", receipt.expense.id).await?;
    assert_eq!(expense.amount_cents, 3000);
    assert_eq!(expense.category, "dining");
    assert_eq!(expense.date, parse_date("2024-01-16"));
    assert_eq!(expense.description, Some("dinner out".to_string()));

    Ok(())
}

#[tokio::test]
async fn test_update_rejects_unknown_category_and_empty_patch() -> Result<()> {
    let (service, _temp) = test_service().await?;
    Fixtures::seed_categories(&service).await?;
    Fixtures::seed_funded_user(&service, "alice", 10000).await?;

    let receipt = service
        .add_expense("alice", 3000, "groceries", parse_date("2024-01-15"), None)
        .await?;

    let result = service
        .update_expense(
            "alice",
            receipt.expense.id,
            ExpensePatch {
                category: Some("holidays".into()),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(result, Err(AppError::CategoryNotFound(_))));

    let result = service
        .update_expense("alice", receipt.expense.id, ExpensePatch::default())
        .await;
    assert!(matches!(result, Err(AppError::NothingToUpdate)));

    Ok(())
}

#[tokio::test]
async fn test_unknown_expense_id() -> Result<()> {
    let (service, _temp) = test_service().await?;
    Fixtures::seed_categories(&service).await?;
    Fixtures::seed_funded_user(&service, "alice", 10000).await?;

    let result = service.get_expense("alice", Uuid::new_v4()).await;
    assert!(matches!(result, Err(AppError::ExpenseNotFound(_))));

    let result = service.delete_expense("alice", Uuid::new_v4()).await;
    assert!(matches!(result, Err(AppError::ExpenseNotFound(_))));

    Ok(())
}

#[tokio::test]
async fn test_expenses_are_owner_scoped() -> Result<()> {
    let (service, _temp) = test_service().await?;
    Fixtures::seed_categories(&service).await?;
    Fixtures::seed_funded_user(&service, "alice", 10000).await?;
    Fixtures::seed_funded_user(&service, "bob", 10000).await?;

    let receipt = service
        .add_expense("alice", 3000, "groceries", parse_date("2024-01-15"), None)
        .await?;

    // Bob can neither see nor mutate Alice's expense
    let result = service.get_expense("bob", receipt.expense.id).await;
    assert!(matches!(result, Err(AppError::ExpenseNotFound(_))));

    let result = service.delete_expense("bob", receipt.expense.id).await;
    assert!(matches!(result, Err(AppError::ExpenseNotFound(_))));

    let result = service
        .update_expense(
            "bob",
            receipt.expense.id,
            ExpensePatch {
                amount_cents: Some(1),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(result, Err(AppError::ExpenseNotFound(_))));

    // And Bob's listing stays empty while Alice's balance is untouched
    let expenses = service.list_expenses("bob", ExpenseFilter::default()).await?;
    assert!(expenses.is_empty());
    assert_eq!(service.get_balance("alice").await?, 7000);

    Ok(())
}
