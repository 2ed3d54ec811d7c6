//! Pure balance arithmetic for a single account.
//!
//! Every expense mutation and funds addition maps to exactly one of these
//! adjustments. The storage layer applies the same adjustment with an atomic
//! conditional update, so the checks here are authoritative for the state
//! the caller read, and the store re-validates against the freshest
//! committed balance.
//!
//! Invariant maintained across any sequence of operations:
//! balance_after = balance_before - sum(current expense amounts) + sum(funds added)

use super::Cents;

/// Debit a new expense. The amount must be positive and the resulting
/// balance must not go negative.
pub fn debit_for_expense(balance: Cents, amount: Cents) -> Result<Cents, LedgerError> {
    if amount <= 0 {
        return Err(LedgerError::NonPositiveAmount(amount));
    }
    if balance - amount < 0 {
        return Err(LedgerError::InsufficientFunds {
            balance,
            required: amount,
        });
    }
    Ok(balance - amount)
}

/// Adjust the balance for an expense whose amount changes from `old_amount`
/// to `new_amount`. The delta is applied as a single net adjustment (never
/// charge-then-refund), so changing 30.00 to 50.00 moves the balance by
/// exactly -20.00. The insufficient-funds check applies to the net effect
/// only; shrinking an expense always succeeds.
pub fn adjust_for_update(
    balance: Cents,
    old_amount: Cents,
    new_amount: Cents,
) -> Result<Cents, LedgerError> {
    if new_amount <= 0 {
        return Err(LedgerError::NonPositiveAmount(new_amount));
    }
    let delta = new_amount - old_amount;
    if balance - delta < 0 {
        return Err(LedgerError::InsufficientFunds {
            balance,
            required: delta,
        });
    }
    Ok(balance - delta)
}

/// Credit a deleted expense's amount back to the balance. No failure
/// condition: the amount was validated when the expense was recorded.
pub fn credit_for_deletion(balance: Cents, amount: Cents) -> Cents {
    balance + amount
}

/// Credit a funds addition. The amount must be positive; there is no other
/// failure condition.
pub fn credit_funds(balance: Cents, amount: Cents) -> Result<Cents, LedgerError> {
    if amount <= 0 {
        return Err(LedgerError::NonPositiveAmount(amount));
    }
    Ok(balance + amount)
}

/// Reconcile a balance from first principles: what the balance should be
/// given the initial value, the amounts of all currently recorded expenses,
/// and all funds ever added. Used by tests to assert the ledger invariant.
pub fn expected_balance(initial: Cents, expense_amounts: &[Cents], funds_added: &[Cents]) -> Cents {
    let spent: Cents = expense_amounts.iter().sum();
    let added: Cents = funds_added.iter().sum();
    initial - spent + added
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    InsufficientFunds { balance: Cents, required: Cents },
    NonPositiveAmount(Cents),
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerError::InsufficientFunds { balance, required } => {
                write!(
                    f,
                    "insufficient funds: balance {} cents, required {} cents",
                    balance, required
                )
            }
            LedgerError::NonPositiveAmount(amount) => {
                write!(f, "amount must be positive, got {} cents", amount)
            }
        }
    }
}

impl std::error::Error for LedgerError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debit_for_expense() {
        assert_eq!(debit_for_expense(10000, 3000), Ok(7000));
        assert_eq!(debit_for_expense(3000, 3000), Ok(0));
    }

    #[test]
    fn test_debit_rejects_overdraft() {
        assert_eq!(
            debit_for_expense(5000, 100000),
            Err(LedgerError::InsufficientFunds {
                balance: 5000,
                required: 100000,
            })
        );
    }

    #[test]
    fn test_debit_rejects_non_positive_amounts() {
        assert_eq!(
            debit_for_expense(10000, 0),
            Err(LedgerError::NonPositiveAmount(0))
        );
        assert_eq!(
            debit_for_expense(10000, -500),
            Err(LedgerError::NonPositiveAmount(-500))
        );
    }

    #[test]
    fn test_adjust_applies_net_delta_only() {
        // Growing 30.00 -> 50.00 moves the balance by -20.00, never by -80.00
        assert_eq!(adjust_for_update(7000, 3000, 5000), Ok(5000));
        // Shrinking credits the difference back
        assert_eq!(adjust_for_update(5000, 5000, 3000), Ok(7000));
        // No change is a no-op
        assert_eq!(adjust_for_update(7000, 3000, 3000), Ok(7000));
    }

    #[test]
    fn test_adjust_checks_net_effect() {
        // Balance 10.00, expense grows 5.00 -> 100.00: net delta 95.00 exceeds funds
        assert_eq!(
            adjust_for_update(1000, 500, 10000),
            Err(LedgerError::InsufficientFunds {
                balance: 1000,
                required: 9500,
            })
        );
        // Shrinking always succeeds, even at zero balance
        assert_eq!(adjust_for_update(0, 5000, 1000), Ok(4000));
    }

    #[test]
    fn test_adjust_rejects_non_positive_new_amount() {
        assert_eq!(
            adjust_for_update(10000, 3000, 0),
            Err(LedgerError::NonPositiveAmount(0))
        );
    }

    #[test]
    fn test_credit_for_deletion() {
        assert_eq!(credit_for_deletion(7000, 3000), 10000);
        assert_eq!(credit_for_deletion(0, 1), 1);
    }

    #[test]
    fn test_credit_funds() {
        assert_eq!(credit_funds(0, 10000), Ok(10000));
        assert_eq!(credit_funds(10000, 1), Ok(10001));
        assert_eq!(credit_funds(10000, 0), Err(LedgerError::NonPositiveAmount(0)));
        assert_eq!(
            credit_funds(10000, -1),
            Err(LedgerError::NonPositiveAmount(-1))
        );
    }

    #[test]
    fn test_documented_sequence() {
        // balance=100, add expense 30 -> 70; update to 50 -> 50; delete -> 100
        let balance = 10000;
        let balance = debit_for_expense(balance, 3000).unwrap();
        assert_eq!(balance, 7000);
        let balance = adjust_for_update(balance, 3000, 5000).unwrap();
        assert_eq!(balance, 5000);
        let balance = credit_for_deletion(balance, 5000);
        assert_eq!(balance, 10000);
    }

    #[test]
    fn test_delete_then_identical_re_add_round_trips() {
        let start = 12345;
        let after_delete = credit_for_deletion(start, 700);
        let after_re_add = debit_for_expense(after_delete, 700).unwrap();
        assert_eq!(after_re_add, start);
    }

    #[test]
    fn test_expected_balance_reconciles() {
        let balance = expected_balance(0, &[3000, 1500], &[10000]);
        assert_eq!(balance, 5500);

        // Mirror a full operation sequence against the reconciliation
        let mut live = 0;
        live = credit_funds(live, 10000).unwrap();
        live = debit_for_expense(live, 3000).unwrap();
        live = debit_for_expense(live, 2000).unwrap();
        live = adjust_for_update(live, 2000, 1500).unwrap();
        assert_eq!(live, expected_balance(0, &[3000, 1500], &[10000]));
    }
}
