//! SQLite persistence for bank tables.
//!
//! Persists state between CLI invocations:
//! - Creditor, plan, dividend and safe creditor tables
//! - The mirrored ledger balances used by the in-memory ledger
//!
//! Snapshots in JSON form seed a fresh database (`import`).

mod snapshot;

pub use snapshot::{BalanceEntry, BankSnapshot, DividendEntry};

use crate::chain::{AccountName, Asset, InMemoryLedger};
use crate::tables::{BankState, CreditorRecord, PlanRecord, Pool};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use tracing::{debug, info, warn};

/// SQLite-based table store.
pub struct StateStore {
    conn: Connection,
}

impl StateStore {
    /// Open the store, initializing the database if needed.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref())
            .with_context(|| format!("Failed to open database at {:?}", db_path.as_ref()))?;

        let store = Self { conn };
        store.init_schema()?;

        info!("State store initialized at {:?}", db_path.as_ref());
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS creditors (
                account TEXT PRIMARY KEY,
                pool TEXT NOT NULL,
                balance TEXT NOT NULL,
                is_active INTEGER NOT NULL,
                updated_at TEXT NOT NULL,
                payer TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_creditors_updated ON creditors(updated_at);

            CREATE TABLE IF NOT EXISTS plans (
                id INTEGER PRIMARY KEY,
                cpu_cost TEXT NOT NULL,
                net_cost TEXT NOT NULL,
                is_free INTEGER NOT NULL,
                is_active INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS dividends (
                account TEXT PRIMARY KEY,
                percentage INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS safe_creditors (
                account TEXT PRIMARY KEY
            );

            -- Mirrored token balances; NULL balance marks a known account without one
            CREATE TABLE IF NOT EXISTS ledger_balances (
                account TEXT PRIMARY KEY,
                balance TEXT
            );
            "#,
        )?;

        debug!("Database schema initialized");
        Ok(())
    }

    /// Replace all bank tables with `state`.
    pub fn save_state(&self, state: &BankState) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;

        tx.execute_batch(
            r#"
            DELETE FROM creditors;
            DELETE FROM plans;
            DELETE FROM dividends;
            DELETE FROM safe_creditors;
            "#,
        )?;

        for record in state.creditors.iter() {
            tx.execute(
                r#"
                INSERT INTO creditors (account, pool, balance, is_active, updated_at, payer)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    record.account.as_str(),
                    record.pool.as_str(),
                    record.balance.to_string(),
                    record.is_active,
                    record.updated_at.to_rfc3339(),
                    record.payer.as_str(),
                ],
            )?;
        }

        for plan in state.plans.iter() {
            let id = i64::try_from(plan.id)
                .with_context(|| format!("Plan id {} does not fit in SQLite", plan.id))?;
            tx.execute(
                r#"
                INSERT INTO plans (id, cpu_cost, net_cost, is_free, is_active)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![
                    id,
                    plan.cpu_cost.to_string(),
                    plan.net_cost.to_string(),
                    plan.is_free,
                    plan.is_active,
                ],
            )?;
        }

        for (account, percentage) in state.dividends.iter() {
            tx.execute(
                "INSERT INTO dividends (account, percentage) VALUES (?1, ?2)",
                params![account.as_str(), percentage],
            )?;
        }

        for account in state.safe_creditors.iter() {
            tx.execute(
                "INSERT INTO safe_creditors (account) VALUES (?1)",
                params![account.as_str()],
            )?;
        }

        tx.commit()?;

        debug!(
            creditors = state.creditors.len(),
            plans = state.plans.len(),
            "State saved to database"
        );
        Ok(())
    }

    /// Load all bank tables. An empty database yields empty tables.
    pub fn load_state(&self) -> Result<BankState> {
        let mut state = BankState::new();

        let mut stmt = self.conn.prepare(
            "SELECT account, pool, balance, is_active, updated_at, payer FROM creditors",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, bool>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        for (account, pool, balance, is_active, updated_at, payer) in rows {
            let record = CreditorRecord {
                account: parse_account(&account)?,
                pool: pool.parse::<Pool>()?,
                balance: parse_asset(&balance)?,
                is_active,
                updated_at: parse_timestamp(&updated_at)?,
                payer: parse_account(&payer)?,
            };
            state.creditors.insert(record);
        }

        let mut stmt = self
            .conn
            .prepare("SELECT id, cpu_cost, net_cost, is_free, is_active FROM plans")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, bool>(3)?,
                    row.get::<_, bool>(4)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        for (id, cpu_cost, net_cost, is_free, is_active) in rows {
            state.plans.insert(PlanRecord {
                id: u64::try_from(id).with_context(|| format!("Negative plan id {}", id))?,
                cpu_cost: parse_asset(&cpu_cost)?,
                net_cost: parse_asset(&net_cost)?,
                is_free,
                is_active,
            });
        }

        let mut stmt = self
            .conn
            .prepare("SELECT account, percentage FROM dividends")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, u8>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for (account, percentage) in rows {
            state.dividends.insert(parse_account(&account)?, percentage);
        }

        let mut stmt = self.conn.prepare("SELECT account FROM safe_creditors")?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for account in rows {
            state.safe_creditors.insert(parse_account(&account)?);
        }

        info!(
            creditors = state.creditors.len(),
            plans = state.plans.len(),
            "Loaded state from database"
        );
        Ok(state)
    }

    /// Replace the mirrored ledger balances.
    pub fn save_ledger(&self, ledger: &InMemoryLedger) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM ledger_balances", [])?;

        for (account, balance) in ledger.balances() {
            tx.execute(
                "INSERT INTO ledger_balances (account, balance) VALUES (?1, ?2)",
                params![account.as_str(), balance.to_string()],
            )?;
        }
        for account in ledger.accounts() {
            tx.execute(
                "INSERT OR IGNORE INTO ledger_balances (account, balance) VALUES (?1, NULL)",
                params![account.as_str()],
            )?;
        }

        tx.commit()?;
        debug!("Ledger balances saved to database");
        Ok(())
    }

    pub fn load_ledger(&self) -> Result<InMemoryLedger> {
        let mut stmt = self
            .conn
            .prepare("SELECT account, balance FROM ledger_balances")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut ledger = InMemoryLedger::new();
        for (account, balance) in rows {
            let account = parse_account(&account)?;
            match balance {
                Some(balance) => ledger.set_balance(account, parse_asset(&balance)?),
                None => ledger.add_account(account),
            }
        }
        Ok(ledger)
    }

    /// Replace everything with the contents of a snapshot.
    pub fn import(&self, snapshot: BankSnapshot) -> Result<(BankState, InMemoryLedger)> {
        let (state, ledger) = snapshot.into_parts();
        self.save_state(&state)?;
        self.save_ledger(&ledger)?;

        info!(
            creditors = state.creditors.len(),
            plans = state.plans.len(),
            "Imported snapshot"
        );
        Ok((state, ledger))
    }

    /// Check if any creditor has been stored.
    pub fn has_state(&self) -> Result<bool> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM creditors", [], |row| row.get(0))?;
        Ok(count > 0)
    }

    /// Clear all data.
    pub fn clear_all(&self) -> Result<()> {
        warn!("Clearing all persisted bank tables");
        self.conn.execute_batch(
            r#"
            DELETE FROM creditors;
            DELETE FROM plans;
            DELETE FROM dividends;
            DELETE FROM safe_creditors;
            DELETE FROM ledger_balances;
            "#,
        )?;
        Ok(())
    }
}

fn parse_account(raw: &str) -> Result<AccountName> {
    raw.parse()
        .with_context(|| format!("Corrupt account name in database: {:?}", raw))
}

fn parse_asset(raw: &str) -> Result<Asset> {
    raw.parse()
        .with_context(|| format!("Corrupt asset in database: {:?}", raw))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("Corrupt timestamp in database: {:?}", raw))
}
