// ==========================================
// BOM 成本核算系统 - 伙伴与余额调整仓储
// ==========================================
// 职责: 管理 partner / balance_reset / balance_reset_line 三表
// 红线: Repository 不含业务逻辑
// ==========================================

use crate::domain::partner::{BalanceReset, BalanceResetLine, Partner};
use crate::domain::types::{AccountType, ResetState};
use crate::importer::PartnerDirectory;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Result as SqliteResult};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

// ==========================================
// PartnerRepository - 往来伙伴仓储
// ==========================================
pub struct PartnerRepository {
    conn: Arc<Mutex<Connection>>,
}

impl PartnerRepository {
    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 写入伙伴（存在则覆盖）
    pub fn upsert(&self, partner: &Partner) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO partner (partner_id, ref, name) VALUES (?1, ?2, ?3)",
            params![partner.partner_id, partner.partner_ref, partner.name],
        )?;
        Ok(())
    }

    fn find_one(&self, sql: &str, key: &str) -> RepositoryResult<Option<Partner>> {
        let conn = self.get_conn()?;
        let result = conn.query_row(sql, params![key], map_partner_row);

        match result {
            Ok(p) => Ok(Some(p)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl PartnerDirectory for PartnerRepository {
    fn find_by_id(&self, partner_id: &str) -> RepositoryResult<Option<Partner>> {
        self.find_one(
            "SELECT partner_id, ref, name FROM partner WHERE partner_id = ?1",
            partner_id,
        )
    }

    fn find_by_ref(&self, partner_ref: &str) -> RepositoryResult<Option<Partner>> {
        self.find_one(
            "SELECT partner_id, ref, name FROM partner WHERE ref = ?1",
            partner_ref,
        )
    }

    fn find_by_name(&self, name: &str) -> RepositoryResult<Option<Partner>> {
        // 名称匹配不区分大小写
        self.find_one(
            "SELECT partner_id, ref, name FROM partner WHERE name = ?1 COLLATE NOCASE",
            name,
        )
    }
}

// ==========================================
// BalanceResetRepository - 余额调整仓储
// ==========================================
pub struct BalanceResetRepository {
    conn: Arc<Mutex<Connection>>,
}

impl BalanceResetRepository {
    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 保存调整记录（主表 + 行，单事务整体替换）
    pub fn save(&self, reset: &BalanceReset) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        tx.execute(
            r#"
            INSERT OR REPLACE INTO balance_reset (
                reset_id, name, reset_date, state, total_adjustment
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                reset.reset_id,
                reset.name,
                reset.reset_date.to_string(),
                reset.state.to_string(),
                reset.total_adjustment(),
            ],
        )?;

        tx.execute(
            "DELETE FROM balance_reset_line WHERE reset_id = ?1",
            params![reset.reset_id],
        )?;
        for (seq_no, line) in reset.lines.iter().enumerate() {
            tx.execute(
                r#"
                INSERT INTO balance_reset_line (
                    reset_id, seq_no, partner_id, account_type,
                    current_balance, new_balance, state, ledger_entry_id
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
                params![
                    reset.reset_id,
                    seq_no as i64,
                    line.partner_id,
                    line.account_type.to_string(),
                    line.current_balance,
                    line.new_balance,
                    line.state.to_string(),
                    line.ledger_entry_id,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// 按主键查询（含调整行）
    pub fn find_by_id(&self, reset_id: &str) -> RepositoryResult<Option<BalanceReset>> {
        let conn = self.get_conn()?;

        let result = conn.query_row(
            "SELECT reset_id, name, reset_date, state FROM balance_reset WHERE reset_id = ?1",
            params![reset_id],
            |row| {
                Ok(BalanceReset {
                    reset_id: row.get(0)?,
                    name: row.get(1)?,
                    reset_date: parse_date(&row.get::<_, String>(2)?),
                    state: ResetState::from_str(&row.get::<_, String>(3)?)
                        .unwrap_or(ResetState::Draft),
                    lines: Vec::new(),
                })
            },
        );

        let mut reset = match result {
            Ok(r) => r,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut stmt = conn.prepare(
            r#"
            SELECT partner_id, account_type, current_balance, new_balance, state, ledger_entry_id
            FROM balance_reset_line
            WHERE reset_id = ?1
            ORDER BY seq_no
            "#,
        )?;
        reset.lines = stmt
            .query_map(params![reset_id], |row| {
                Ok(BalanceResetLine {
                    partner_id: row.get(0)?,
                    account_type: AccountType::from_str(&row.get::<_, String>(1)?)
                        .unwrap_or(AccountType::Receivable),
                    current_balance: row.get(2)?,
                    new_balance: row.get(3)?,
                    state: ResetState::from_str(&row.get::<_, String>(4)?)
                        .unwrap_or(ResetState::Draft),
                    ledger_entry_id: row.get(5)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(Some(reset))
    }
}

// ==========================================
// 辅助函数
// ==========================================

fn map_partner_row(row: &rusqlite::Row<'_>) -> SqliteResult<Partner> {
    Ok(Partner {
        partner_id: row.get(0)?,
        partner_ref: row.get(1)?,
        name: row.get(2)?,
    })
}

fn parse_date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .unwrap_or_else(|_| NaiveDate::from_ymd_opt(1970, 1, 1).unwrap())
}
