// ==========================================
// BOM 成本核算系统 - 核算快照仓储
// ==========================================
// 职责: 管理 cost_snapshot / cost_line / product_cost_line 三表
// 红线: 重算时明细行整体删除重建，不做增量更新
// ==========================================

use crate::domain::calculator::{CostLine, CostSnapshot, ProductCostLine};
use crate::domain::types::{CalcState, CostType};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Result as SqliteResult};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

// ==========================================
// SnapshotRepository - 核算快照仓储
// ==========================================
pub struct SnapshotRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SnapshotRepository {
    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 保存快照（主表 + 产品行 + 明细行，单事务整体替换）
    pub fn save(&self, snapshot: &CostSnapshot) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        tx.execute(
            r#"
            INSERT OR REPLACE INTO cost_snapshot (
                snapshot_id, name, calc_date, product_id, bom_id,
                include_operations, state,
                total_material_cost, total_operation_cost,
                total_jobwork_cost, total_freight_cost, total_packing_cost,
                cushion, gross_profit_add, other_cost, total_cost
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            "#,
            params![
                snapshot.snapshot_id,
                snapshot.name,
                snapshot.calc_date.to_rfc3339(),
                snapshot.product_id,
                snapshot.bom_id,
                snapshot.include_operations as i32,
                snapshot.state.to_string(),
                snapshot.total_material_cost,
                snapshot.total_operation_cost,
                snapshot.total_jobwork_cost,
                snapshot.total_freight_cost,
                snapshot.total_packing_cost,
                snapshot.cushion,
                snapshot.gross_profit_add,
                snapshot.other_cost,
                snapshot.total_cost,
            ],
        )?;

        tx.execute(
            "DELETE FROM product_cost_line WHERE snapshot_id = ?1",
            params![snapshot.snapshot_id],
        )?;
        for line in snapshot.product_lines.iter() {
            tx.execute(
                r#"
                INSERT INTO product_cost_line (
                    snapshot_id, product_id, is_manufacture, bom_id,
                    material_cost, operation_cost,
                    jobwork_cost, freight_cost, packing_cost,
                    cushion, gross_profit_add, base_cost, state
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                "#,
                params![
                    snapshot.snapshot_id,
                    line.product_id,
                    line.is_manufacture as i32,
                    line.bom_id,
                    line.material_cost,
                    line.operation_cost,
                    line.jobwork_cost,
                    line.freight_cost,
                    line.packing_cost,
                    line.cushion,
                    line.gross_profit_add,
                    line.base_cost,
                    line.state.to_string(),
                ],
            )?;
        }

        tx.execute(
            "DELETE FROM cost_line WHERE snapshot_id = ?1",
            params![snapshot.snapshot_id],
        )?;
        for (seq_no, line) in snapshot.cost_lines.iter().enumerate() {
            tx.execute(
                r#"
                INSERT INTO cost_line (
                    snapshot_id, seq_no, name, cost_type, product_id, operation,
                    quantity, duration, unit_cost, cost, bom_level, bom_qty
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                "#,
                params![
                    snapshot.snapshot_id,
                    seq_no as i64,
                    line.name,
                    line.cost_type.to_string(),
                    line.product_id,
                    line.operation,
                    line.quantity,
                    line.duration,
                    line.unit_cost,
                    line.cost,
                    line.bom_level as i64,
                    line.bom_qty,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// 按主键查询（含产品行与明细行）
    pub fn find_by_id(&self, snapshot_id: &str) -> RepositoryResult<Option<CostSnapshot>> {
        let conn = self.get_conn()?;

        let result = conn.query_row(
            r#"
            SELECT
                snapshot_id, name, calc_date, product_id, bom_id,
                include_operations, state,
                total_material_cost, total_operation_cost,
                total_jobwork_cost, total_freight_cost, total_packing_cost,
                cushion, gross_profit_add, other_cost, total_cost
            FROM cost_snapshot
            WHERE snapshot_id = ?1
            "#,
            params![snapshot_id],
            map_snapshot_row,
        );

        let mut snapshot = match result {
            Ok(s) => s,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        snapshot.product_lines = load_product_lines(&conn, snapshot_id)?;
        snapshot.cost_lines = load_cost_lines(&conn, snapshot_id)?;
        Ok(Some(snapshot))
    }

    /// 查询产品最近一次已核算快照（用于已核算组件的成本替换）
    ///
    /// 以产品行状态为准: 产品在某快照中 state='calculated' 即视为已核算。
    pub fn find_latest_calculated_for_product(
        &self,
        product_id: &str,
    ) -> RepositoryResult<Option<(CostSnapshot, ProductCostLine)>> {
        let conn = self.get_conn()?;

        let result = conn.query_row(
            r#"
            SELECT s.snapshot_id
            FROM cost_snapshot s
            JOIN product_cost_line pcl ON pcl.snapshot_id = s.snapshot_id
            WHERE pcl.product_id = ?1 AND pcl.state = 'calculated'
            ORDER BY s.calc_date DESC
            LIMIT 1
            "#,
            params![product_id],
            |row| row.get::<_, String>(0),
        );

        let snapshot_id = match result {
            Ok(id) => id,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        drop(conn);

        let snapshot = self.find_by_id(&snapshot_id)?.ok_or_else(|| {
            RepositoryError::NotFound {
                entity: "cost_snapshot".to_string(),
                id: snapshot_id.clone(),
            }
        })?;
        let line = snapshot
            .product_lines
            .iter()
            .find(|l| l.product_id == product_id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "product_cost_line".to_string(),
                id: product_id.to_string(),
            })?;

        Ok(Some((snapshot, line)))
    }

    /// 查询所有快照主档（不含明细）
    pub fn find_all_headers(&self) -> RepositoryResult<Vec<CostSnapshot>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT
                snapshot_id, name, calc_date, product_id, bom_id,
                include_operations, state,
                total_material_cost, total_operation_cost,
                total_jobwork_cost, total_freight_cost, total_packing_cost,
                cushion, gross_profit_add, other_cost, total_cost
            FROM cost_snapshot
            ORDER BY calc_date DESC
            "#,
        )?;

        let snapshots = stmt
            .query_map([], map_snapshot_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(snapshots)
    }

    /// 删除快照（明细随外键级联删除）
    pub fn delete(&self, snapshot_id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "DELETE FROM cost_snapshot WHERE snapshot_id = ?1",
            params![snapshot_id],
        )?;
        Ok(())
    }
}

// ==========================================
// 辅助函数
// ==========================================

fn map_snapshot_row(row: &rusqlite::Row<'_>) -> SqliteResult<CostSnapshot> {
    Ok(CostSnapshot {
        snapshot_id: row.get(0)?,
        name: row.get(1)?,
        calc_date: parse_datetime(&row.get::<_, String>(2)?),
        product_id: row.get(3)?,
        bom_id: row.get(4)?,
        include_operations: row.get::<_, i32>(5)? != 0,
        state: CalcState::from_str(&row.get::<_, String>(6)?).unwrap_or(CalcState::Draft),
        total_material_cost: row.get(7)?,
        total_operation_cost: row.get(8)?,
        total_jobwork_cost: row.get(9)?,
        total_freight_cost: row.get(10)?,
        total_packing_cost: row.get(11)?,
        cushion: row.get(12)?,
        gross_profit_add: row.get(13)?,
        other_cost: row.get(14)?,
        total_cost: row.get(15)?,
        cost_lines: Vec::new(),
        product_lines: Vec::new(),
    })
}

fn load_product_lines(
    conn: &Connection,
    snapshot_id: &str,
) -> RepositoryResult<Vec<ProductCostLine>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT
            product_id, is_manufacture, bom_id,
            material_cost, operation_cost,
            jobwork_cost, freight_cost, packing_cost,
            cushion, gross_profit_add, base_cost, state
        FROM product_cost_line
        WHERE snapshot_id = ?1
        ORDER BY product_id
        "#,
    )?;

    let lines = stmt
        .query_map(params![snapshot_id], |row| {
            Ok(ProductCostLine {
                product_id: row.get(0)?,
                is_manufacture: row.get::<_, i32>(1)? != 0,
                bom_id: row.get(2)?,
                material_cost: row.get(3)?,
                operation_cost: row.get(4)?,
                jobwork_cost: row.get(5)?,
                freight_cost: row.get(6)?,
                packing_cost: row.get(7)?,
                cushion: row.get(8)?,
                gross_profit_add: row.get(9)?,
                base_cost: row.get(10)?,
                state: CalcState::from_str(&row.get::<_, String>(11)?)
                    .unwrap_or(CalcState::Draft),
            })
        })?
        .collect::<SqliteResult<Vec<_>>>()?;

    Ok(lines)
}

fn load_cost_lines(conn: &Connection, snapshot_id: &str) -> RepositoryResult<Vec<CostLine>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT
            name, cost_type, product_id, operation,
            quantity, duration, unit_cost, cost, bom_level, bom_qty
        FROM cost_line
        WHERE snapshot_id = ?1
        ORDER BY seq_no
        "#,
    )?;

    let lines = stmt
        .query_map(params![snapshot_id], |row| {
            Ok(CostLine {
                name: row.get(0)?,
                cost_type: CostType::from_str(&row.get::<_, String>(1)?)
                    .unwrap_or(CostType::Material),
                product_id: row.get(2)?,
                operation: row.get(3)?,
                quantity: row.get(4)?,
                duration: row.get(5)?,
                unit_cost: row.get(6)?,
                cost: row.get(7)?,
                bom_level: row.get::<_, i64>(8)? as usize,
                bom_qty: row.get(9)?,
            })
        })?
        .collect::<SqliteResult<Vec<_>>>()?;

    Ok(lines)
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| DateTime::<Utc>::default())
}
