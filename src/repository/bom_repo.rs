// ==========================================
// BOM 成本核算系统 - BOM 仓储
// ==========================================
// 职责: 管理 bom / bom_line / bom_operation 三表
// 红线: Repository 不含业务逻辑
// ==========================================

use crate::domain::bom::{Bom, BomLine, Operation};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Result as SqliteResult};
use std::sync::{Arc, Mutex};

// ==========================================
// BomRepository - 物料清单仓储
// ==========================================
pub struct BomRepository {
    conn: Arc<Mutex<Connection>>,
}

impl BomRepository {
    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 写入 BOM（主表 + 组件行 + 工序，单事务整体替换）
    pub fn save(&self, bom: &Bom) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        tx.execute(
            r#"
            INSERT OR REPLACE INTO bom (
                bom_id, product_id, product_qty, uom_id, company_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                bom.bom_id,
                bom.product_id,
                bom.product_qty,
                bom.uom_id,
                bom.company_id,
                bom.created_at.to_rfc3339(),
            ],
        )?;

        // 明细整体删除重建
        tx.execute("DELETE FROM bom_line WHERE bom_id = ?1", params![bom.bom_id])?;
        tx.execute(
            "DELETE FROM bom_operation WHERE bom_id = ?1",
            params![bom.bom_id],
        )?;

        for (seq_no, line) in bom.lines.iter().enumerate() {
            let skip_json = serde_json::to_string(&line.skip_for_products)
                .map_err(|e| RepositoryError::InternalError(e.to_string()))?;
            tx.execute(
                r#"
                INSERT INTO bom_line (
                    bom_id, seq_no, product_id, product_qty, uom_id, skip_for_products
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    bom.bom_id,
                    seq_no as i64,
                    line.product_id,
                    line.product_qty,
                    line.uom_id,
                    skip_json,
                ],
            )?;
        }

        for (seq_no, op) in bom.operations.iter().enumerate() {
            let skip_json = serde_json::to_string(&op.skip_for_products)
                .map_err(|e| RepositoryError::InternalError(e.to_string()))?;
            tx.execute(
                r#"
                INSERT INTO bom_operation (
                    bom_id, seq_no, name, workcenter,
                    time_cycle, time_cycle_manual, duration_expected,
                    cost_per_hour, skip_for_products
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
                params![
                    bom.bom_id,
                    seq_no as i64,
                    op.name,
                    op.workcenter,
                    op.time_cycle,
                    op.time_cycle_manual,
                    op.duration_expected,
                    op.cost_per_hour,
                    skip_json,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// 按主键查询（含组件行与工序）
    pub fn find_by_id(&self, bom_id: &str) -> RepositoryResult<Option<Bom>> {
        let conn = self.get_conn()?;

        let result = conn.query_row(
            r#"
            SELECT bom_id, product_id, product_qty, uom_id, company_id, created_at
            FROM bom
            WHERE bom_id = ?1
            "#,
            params![bom_id],
            map_bom_row,
        );

        let mut bom = match result {
            Ok(bom) => bom,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        bom.lines = load_lines(&conn, bom_id)?;
        bom.operations = load_operations(&conn, bom_id)?;
        Ok(Some(bom))
    }

    /// 查询所有 BOM（含明细）
    pub fn find_all(&self) -> RepositoryResult<Vec<Bom>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT bom_id, product_id, product_qty, uom_id, company_id, created_at
            FROM bom
            ORDER BY bom_id
            "#,
        )?;
        let mut boms = stmt
            .query_map([], map_bom_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        for bom in boms.iter_mut() {
            bom.lines = load_lines(&conn, &bom.bom_id)?;
            bom.operations = load_operations(&conn, &bom.bom_id)?;
        }

        Ok(boms)
    }

    /// 删除 BOM（明细随外键级联删除）
    pub fn delete(&self, bom_id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute("DELETE FROM bom WHERE bom_id = ?1", params![bom_id])?;
        Ok(())
    }
}

// ==========================================
// 辅助函数
// ==========================================

fn map_bom_row(row: &rusqlite::Row<'_>) -> SqliteResult<Bom> {
    Ok(Bom {
        bom_id: row.get(0)?,
        product_id: row.get(1)?,
        product_qty: row.get(2)?,
        uom_id: row.get(3)?,
        company_id: row.get(4)?,
        created_at: parse_datetime(&row.get::<_, String>(5)?),
        lines: Vec::new(),
        operations: Vec::new(),
    })
}

fn load_lines(conn: &Connection, bom_id: &str) -> RepositoryResult<Vec<BomLine>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT product_id, product_qty, uom_id, skip_for_products
        FROM bom_line
        WHERE bom_id = ?1
        ORDER BY seq_no
        "#,
    )?;

    let lines = stmt
        .query_map(params![bom_id], |row| {
            Ok(BomLine {
                product_id: row.get(0)?,
                product_qty: row.get(1)?,
                uom_id: row.get(2)?,
                skip_for_products: parse_skip_list(row.get::<_, Option<String>>(3)?),
            })
        })?
        .collect::<SqliteResult<Vec<_>>>()?;

    Ok(lines)
}

fn load_operations(conn: &Connection, bom_id: &str) -> RepositoryResult<Vec<Operation>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT name, workcenter, time_cycle, time_cycle_manual,
               duration_expected, cost_per_hour, skip_for_products
        FROM bom_operation
        WHERE bom_id = ?1
        ORDER BY seq_no
        "#,
    )?;

    let operations = stmt
        .query_map(params![bom_id], |row| {
            Ok(Operation {
                name: row.get(0)?,
                workcenter: row.get(1)?,
                time_cycle: row.get(2)?,
                time_cycle_manual: row.get(3)?,
                duration_expected: row.get(4)?,
                cost_per_hour: row.get(5)?,
                skip_for_products: parse_skip_list(row.get::<_, Option<String>>(6)?),
            })
        })?
        .collect::<SqliteResult<Vec<_>>>()?;

    Ok(operations)
}

/// 解析跳过清单 JSON（空值/格式错误按空清单处理）
fn parse_skip_list(raw: Option<String>) -> Vec<String> {
    raw.and_then(|s| serde_json::from_str::<Vec<String>>(&s).ok())
        .unwrap_or_default()
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| DateTime::<Utc>::default())
}
