//! Bank accounts: balances changed only through recorded transactions.

use crate::error::StoreError;
use crate::record::{Keyed, Record};
use crate::store::RecordStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Opened,
    Deposit,
    Withdrawal,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Opened => "opened",
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdrawal => "withdrawal",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub kind: TransactionKind,
    pub amount: f64,
    pub balance_after: f64,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub holder: String,
    balance: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    history: Vec<Transaction>,
    /// Deposits and withdrawals recorded so far (the opening entry excluded).
    #[serde(default)]
    transaction_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountPatch {
    pub holder: Option<String>,
}

impl Account {
    pub fn open(holder: impl Into<String>, initial_balance: f64) -> Self {
        Self::open_at(holder, initial_balance, Utc::now())
    }

    pub fn open_at(holder: impl Into<String>, initial_balance: f64, at: DateTime<Utc>) -> Self {
        Self {
            holder: holder.into(),
            balance: initial_balance,
            history: vec![Transaction {
                kind: TransactionKind::Opened,
                amount: initial_balance,
                balance_after: initial_balance,
                at,
            }],
            transaction_count: 0,
        }
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn history(&self) -> &[Transaction] {
        &self.history
    }

    pub fn transaction_count(&self) -> usize {
        self.transaction_count
    }

    fn deposit(&mut self, amount: f64, at: DateTime<Utc>) -> Result<f64, StoreError> {
        require_positive(amount, "deposit")?;
        self.balance += amount;
        self.record(TransactionKind::Deposit, amount, at);
        Ok(self.balance)
    }

    fn withdraw(&mut self, amount: f64, at: DateTime<Utc>) -> Result<f64, StoreError> {
        require_positive(amount, "withdrawal")?;
        if amount > self.balance {
            return Err(StoreError::InsufficientFunds {
                available: self.balance,
                requested: amount,
            });
        }
        self.balance -= amount;
        self.record(TransactionKind::Withdrawal, amount, at);
        Ok(self.balance)
    }

    fn record(&mut self, kind: TransactionKind, amount: f64, at: DateTime<Utc>) {
        self.history.push(Transaction {
            kind,
            amount,
            balance_after: self.balance,
            at,
        });
    }
}

fn require_positive(amount: f64, field: &'static str) -> Result<(), StoreError> {
    if amount.is_finite() && amount > 0.0 {
        Ok(())
    } else {
        Err(StoreError::invalid_field(
            field,
            format!("amount must be positive, got {amount}"),
        ))
    }
}

impl Record for Account {
    type Patch = AccountPatch;

    fn derive(&mut self) {
        self.transaction_count = self
            .history
            .iter()
            .filter(|tx| tx.kind != TransactionKind::Opened)
            .count();
    }

    fn validate(&self) -> Result<(), StoreError> {
        if self.holder.trim().is_empty() {
            return Err(StoreError::invalid_field("holder", "must not be empty"));
        }
        if !self.balance.is_finite() || self.balance < 0.0 {
            return Err(StoreError::invalid_field(
                "balance",
                format!("must not be negative, got {}", self.balance),
            ));
        }
        Ok(())
    }

    fn apply(&mut self, patch: AccountPatch) {
        if let Some(holder) = patch.holder {
            self.holder = holder;
        }
    }

    fn name(&self) -> &str {
        &self.holder
    }

    fn measure(&self) -> Option<f64> {
        Some(self.balance)
    }
}

/// Accounts keyed by caller-chosen account number.
#[derive(Debug, Clone, Default)]
pub struct AccountBook {
    accounts: RecordStore<String, Account>,
}

impl From<RecordStore<String, Account>> for AccountBook {
    fn from(accounts: RecordStore<String, Account>) -> Self {
        Self { accounts }
    }
}

impl AccountBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accounts(&self) -> &RecordStore<String, Account> {
        &self.accounts
    }

    pub fn into_store(self) -> RecordStore<String, Account> {
        self.accounts
    }

    /// Open an account; the number must be unused and the deposit non-negative.
    pub fn open(
        &mut self,
        number: impl Into<String>,
        holder: impl Into<String>,
        initial_balance: f64,
    ) -> Result<&Keyed<String, Account>, StoreError> {
        let number = number.into();
        let key = self
            .accounts
            .create_with_key(number, Account::open(holder, initial_balance))?;
        self.accounts.read(key.as_str())
    }

    /// Deposit `amount`, returning the new balance.
    pub fn deposit(&mut self, number: &str, amount: f64) -> Result<f64, StoreError> {
        let at = Utc::now();
        self.accounts
            .modify(number, |account| account.deposit(amount, at))
    }

    /// Withdraw `amount`, returning the new balance.
    pub fn withdraw(&mut self, number: &str, amount: f64) -> Result<f64, StoreError> {
        let at = Utc::now();
        self.accounts
            .modify(number, |account| account.withdraw(amount, at))
    }

    pub fn balance(&self, number: &str) -> Result<f64, StoreError> {
        Ok(self.accounts.read(number)?.record.balance)
    }

    pub fn history(&self, number: &str) -> Result<&[Transaction], StoreError> {
        Ok(&self.accounts.read(number)?.record.history)
    }

    pub fn rename_holder(
        &mut self,
        number: &str,
        holder: impl Into<String>,
    ) -> Result<&Keyed<String, Account>, StoreError> {
        self.accounts.update(
            number,
            AccountPatch {
                holder: Some(holder.into()),
            },
        )
    }

    pub fn close(&mut self, number: &str) -> Result<Keyed<String, Account>, StoreError> {
        self.accounts.delete(number)
    }
}
