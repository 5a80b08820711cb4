//! Banking records: users, accounts, transactions and cards.
//!
//! Multi-row writes (registration, transfers) run in one transaction so a
//! failure never leaves half a transfer behind.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::database::{format_datetime, parse_datetime, Database};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Database(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Checking,
    Savings,
}

impl AccountType {
    fn as_str(self) -> &'static str {
        match self {
            AccountType::Checking => "checking",
            AccountType::Savings => "savings",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    pub id: i64,
    pub user_id: i64,
    pub account_number: String,
    pub account_type: AccountType,
    pub balance_cents: i64,
    pub currency: String,
    pub routing_number: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Credit,
    Debit,
}

impl TransactionKind {
    fn as_str(self) -> &'static str {
        match self {
            TransactionKind::Credit => "credit",
            TransactionKind::Debit => "debit",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    pub id: i64,
    pub account_id: i64,
    pub kind: TransactionKind,
    pub amount_cents: i64,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Card {
    pub id: i64,
    pub user_id: i64,
    pub last_four: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Account plus recent activity, as shown on an account page.
#[derive(Debug, Clone, Serialize)]
pub struct AccountSummary {
    pub account: Account,
    pub recent_transactions: Vec<Transaction>,
    pub total_credits_cents: i64,
    pub total_debits_cents: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
}

/// Everything registration creates.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub user: User,
    pub accounts: Vec<Account>,
    pub card: Card,
}

/// Both legs of a completed transfer.
#[derive(Debug, Clone, Serialize)]
pub struct TransferReceipt {
    pub debit: Transaction,
    pub credit: Transaction,
}

const SUMMARY_TRANSACTIONS: u32 = 10;

const ACCOUNT_COLUMNS: &str = "id, user_id, account_number, account_type, balance_cents, \
                               currency, routing_number, created_at";
const TRANSACTION_COLUMNS: &str = "id, account_id, kind, amount_cents, description, created_at";

/// Banking queries over the shared [`Database`].
#[derive(Clone)]
pub struct BankStore {
    db: Arc<Database>,
}

impl BankStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Create a user with a checking account, a savings account and an
    /// active debit card.
    pub fn register_user(&self, new_user: &NewUser) -> Result<Registration> {
        let name = new_user.name.trim();
        let email = new_user.email.trim().to_ascii_lowercase();
        if name.is_empty() {
            return Err(StoreError::Invalid("Name is required".into()));
        }
        if !is_plausible_email(&email) {
            return Err(StoreError::Invalid("A valid email address is required".into()));
        }

        let mut conn = self.db.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
            params![email],
            |row| row.get(0),
        )?;
        if exists {
            return Err(StoreError::Conflict("Email already registered".into()));
        }

        let now = format_datetime(Utc::now());
        tx.execute(
            "INSERT INTO users (email, name, created_at) VALUES (?1, ?2, ?3)",
            params![email, name, now],
        )?;
        let user_id = tx.last_insert_rowid();

        for account_type in [AccountType::Checking, AccountType::Savings] {
            tx.execute(
                "INSERT INTO accounts (user_id, account_number, account_type, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![user_id, generate_digits(10), account_type.as_str(), now],
            )?;
        }
        tx.execute(
            "INSERT INTO cards (user_id, last_four, created_at) VALUES (?1, ?2, ?3)",
            params![user_id, generate_digits(4), now],
        )?;

        let user = query_user(&tx, user_id)?;
        let accounts = query_accounts_for_user(&tx, user_id)?;
        let card = query_cards_for_user(&tx, user_id)?
            .pop()
            .ok_or_else(|| StoreError::NotFound(format!("Card for user {user_id} not found")))?;
        tx.commit()?;

        tracing::info!(user_id, "Registered user");
        Ok(Registration {
            user,
            accounts,
            card,
        })
    }

    pub fn accounts_for_user(&self, user_id: i64) -> Result<Vec<Account>> {
        let conn = self.db.lock();
        query_user(&conn, user_id)?;
        query_accounts_for_user(&conn, user_id)
    }

    pub fn cards_for_user(&self, user_id: i64) -> Result<Vec<Card>> {
        let conn = self.db.lock();
        query_user(&conn, user_id)?;
        query_cards_for_user(&conn, user_id)
    }

    pub fn account(&self, account_id: i64) -> Result<Account> {
        query_account(&self.db.lock(), account_id)
    }

    pub fn account_summary(&self, account_id: i64) -> Result<AccountSummary> {
        let conn = self.db.lock();
        let account = query_account(&conn, account_id)?;
        let recent_transactions = query_transactions(&conn, account_id, SUMMARY_TRANSACTIONS)?;
        let (total_credits_cents, total_debits_cents) = conn.query_row(
            "SELECT
                COALESCE(SUM(CASE WHEN kind = 'credit' THEN amount_cents END), 0),
                COALESCE(SUM(CASE WHEN kind = 'debit' THEN amount_cents END), 0)
             FROM transactions WHERE account_id = ?1",
            params![account_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(AccountSummary {
            account,
            recent_transactions,
            total_credits_cents,
            total_debits_cents,
        })
    }

    /// Most recent transactions first.
    pub fn transactions_for_account(&self, account_id: i64, limit: u32) -> Result<Vec<Transaction>> {
        let conn = self.db.lock();
        query_account(&conn, account_id)?;
        query_transactions(&conn, account_id, limit)
    }

    /// Move money between two accounts as a debit/credit pair.
    pub fn transfer(
        &self,
        from_account_id: i64,
        to_account_id: i64,
        amount_cents: i64,
        description: &str,
    ) -> Result<TransferReceipt> {
        if amount_cents <= 0 {
            return Err(StoreError::Invalid("Transfer amount must be positive".into()));
        }
        if from_account_id == to_account_id {
            return Err(StoreError::Invalid(
                "Cannot transfer to the same account".into(),
            ));
        }

        let mut conn = self.db.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let from = query_account(&tx, from_account_id)?;
        query_account(&tx, to_account_id)?;
        if from.balance_cents < amount_cents {
            return Err(StoreError::Invalid("Insufficient funds".into()));
        }

        let description = if description.trim().is_empty() {
            "Transfer"
        } else {
            description.trim()
        };
        let now = format_datetime(Utc::now());

        tx.execute(
            "UPDATE accounts SET balance_cents = balance_cents - ?1 WHERE id = ?2",
            params![amount_cents, from_account_id],
        )?;
        tx.execute(
            "UPDATE accounts SET balance_cents = balance_cents + ?1 WHERE id = ?2",
            params![amount_cents, to_account_id],
        )?;
        let debit = insert_transaction(
            &tx,
            from_account_id,
            TransactionKind::Debit,
            amount_cents,
            description,
            &now,
        )?;
        let credit = insert_transaction(
            &tx,
            to_account_id,
            TransactionKind::Credit,
            amount_cents,
            description,
            &now,
        )?;
        tx.commit()?;

        tracing::info!(from_account_id, to_account_id, amount_cents, "Transfer completed");
        Ok(TransferReceipt { debit, credit })
    }

    /// Credit an account, e.g. from a mobile cheque deposit.
    pub fn deposit(&self, account_id: i64, amount_cents: i64, description: &str) -> Result<Transaction> {
        if amount_cents <= 0 {
            return Err(StoreError::Invalid("Deposit amount must be positive".into()));
        }

        let mut conn = self.db.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        query_account(&tx, account_id)?;

        tx.execute(
            "UPDATE accounts SET balance_cents = balance_cents + ?1 WHERE id = ?2",
            params![amount_cents, account_id],
        )?;
        let credit = insert_transaction(
            &tx,
            account_id,
            TransactionKind::Credit,
            amount_cents,
            description,
            &format_datetime(Utc::now()),
        )?;
        tx.commit()?;

        Ok(credit)
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    }
}

/// Decimal digits taken from a fresh v4 UUID.
fn generate_digits(len: usize) -> String {
    let value = Uuid::new_v4().as_u128();
    let digits = format!("{:039}", value);
    digits[digits.len() - len..].to_string()
}

fn query_user(conn: &Connection, user_id: i64) -> Result<User> {
    conn.query_row(
        "SELECT id, name, email, role, created_at FROM users WHERE id = ?1",
        params![user_id],
        |row| {
            Ok(User {
                id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
                role: row.get(3)?,
                created_at: parse_datetime(&row.get::<_, String>(4)?),
            })
        },
    )
    .optional()?
    .ok_or_else(|| StoreError::NotFound(format!("User {user_id} not found")))
}

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<Account> {
    let account_type = match row.get::<_, String>(3)?.as_str() {
        "savings" => AccountType::Savings,
        _ => AccountType::Checking,
    };
    Ok(Account {
        id: row.get(0)?,
        user_id: row.get(1)?,
        account_number: row.get(2)?,
        account_type,
        balance_cents: row.get(4)?,
        currency: row.get(5)?,
        routing_number: row.get(6)?,
        created_at: parse_datetime(&row.get::<_, String>(7)?),
    })
}

fn query_account(conn: &Connection, account_id: i64) -> Result<Account> {
    conn.query_row(
        &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1"),
        params![account_id],
        account_from_row,
    )
    .optional()?
    .ok_or_else(|| StoreError::NotFound(format!("Account {account_id} not found")))
}

fn query_accounts_for_user(conn: &Connection, user_id: i64) -> Result<Vec<Account>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE user_id = ?1 ORDER BY id"
    ))?;
    let accounts = stmt
        .query_map(params![user_id], account_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(accounts)
}

fn query_cards_for_user(conn: &Connection, user_id: i64) -> Result<Vec<Card>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, last_four, status, created_at FROM cards WHERE user_id = ?1 ORDER BY id",
    )?;
    let cards = stmt
        .query_map(params![user_id], |row| {
            Ok(Card {
                id: row.get(0)?,
                user_id: row.get(1)?,
                last_four: row.get(2)?,
                status: row.get(3)?,
                created_at: parse_datetime(&row.get::<_, String>(4)?),
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(cards)
}

fn transaction_from_row(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    let kind = match row.get::<_, String>(2)?.as_str() {
        "debit" => TransactionKind::Debit,
        _ => TransactionKind::Credit,
    };
    Ok(Transaction {
        id: row.get(0)?,
        account_id: row.get(1)?,
        kind,
        amount_cents: row.get(3)?,
        description: row.get(4)?,
        created_at: parse_datetime(&row.get::<_, String>(5)?),
    })
}

fn query_transactions(conn: &Connection, account_id: i64, limit: u32) -> Result<Vec<Transaction>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TRANSACTION_COLUMNS} FROM transactions
         WHERE account_id = ?1
         ORDER BY created_at DESC, id DESC
         LIMIT ?2"
    ))?;
    let transactions = stmt
        .query_map(params![account_id, limit], transaction_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(transactions)
}

fn insert_transaction(
    conn: &Connection,
    account_id: i64,
    kind: TransactionKind,
    amount_cents: i64,
    description: &str,
    created_at: &str,
) -> Result<Transaction> {
    conn.execute(
        "INSERT INTO transactions (account_id, kind, amount_cents, description, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![account_id, kind.as_str(), amount_cents, description, created_at],
    )?;
    let id = conn.last_insert_rowid();
    Ok(conn.query_row(
        &format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = ?1"),
        params![id],
        transaction_from_row,
    )?)
}
