// ==========================================
// BOM 成本核算系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为，避免“部分模块外键开启/部分不开启”
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 提供内置 schema 引导（单库、小表集，不走迁移脚本）
// ==========================================

use rusqlite::Connection;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 初始化数据库 schema（幂等）
///
/// 所有表使用 CREATE TABLE IF NOT EXISTS，可安全重复调用。
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- 计量单位
        CREATE TABLE IF NOT EXISTS uom (
            uom_id        TEXT PRIMARY KEY,
            name          TEXT NOT NULL,
            category      TEXT NOT NULL,
            factor        REAL NOT NULL DEFAULT 1.0
        );

        -- 产品主档
        CREATE TABLE IF NOT EXISTS product (
            product_id          TEXT PRIMARY KEY,
            name                TEXT NOT NULL,
            uom_id              TEXT NOT NULL,
            standard_price      REAL NOT NULL DEFAULT 0.0,
            sale_ok             INTEGER NOT NULL DEFAULT 1,
            include_in_pricelist INTEGER NOT NULL DEFAULT 0,
            jobwork_cost        REAL NOT NULL DEFAULT 0.0,
            freight_cost        REAL NOT NULL DEFAULT 0.0,
            packing_cost        REAL NOT NULL DEFAULT 0.0,
            cushion             REAL NOT NULL DEFAULT 0.0,
            gross_profit_add    REAL NOT NULL DEFAULT 0.0,
            FOREIGN KEY (uom_id) REFERENCES uom(uom_id)
        );

        -- BOM 主表
        CREATE TABLE IF NOT EXISTS bom (
            bom_id        TEXT PRIMARY KEY,
            product_id    TEXT NOT NULL,
            product_qty   REAL NOT NULL DEFAULT 1.0,
            uom_id        TEXT NOT NULL,
            company_id    TEXT,
            created_at    TEXT NOT NULL,
            FOREIGN KEY (product_id) REFERENCES product(product_id),
            FOREIGN KEY (uom_id) REFERENCES uom(uom_id)
        );

        -- BOM 组件行
        CREATE TABLE IF NOT EXISTS bom_line (
            bom_id            TEXT NOT NULL,
            seq_no            INTEGER NOT NULL,
            product_id        TEXT NOT NULL,
            product_qty       REAL NOT NULL,
            uom_id            TEXT NOT NULL,
            skip_for_products TEXT,           -- JSON 数组: 对这些目标产品跳过
            PRIMARY KEY (bom_id, seq_no),
            FOREIGN KEY (bom_id) REFERENCES bom(bom_id) ON DELETE CASCADE,
            FOREIGN KEY (product_id) REFERENCES product(product_id)
        );

        -- BOM 工序
        CREATE TABLE IF NOT EXISTS bom_operation (
            bom_id            TEXT NOT NULL,
            seq_no            INTEGER NOT NULL,
            name              TEXT NOT NULL,
            workcenter        TEXT NOT NULL,
            time_cycle        REAL NOT NULL DEFAULT 0.0,
            time_cycle_manual REAL NOT NULL DEFAULT 0.0,
            duration_expected REAL NOT NULL DEFAULT 0.0,
            cost_per_hour     REAL NOT NULL DEFAULT 0.0,
            skip_for_products TEXT,
            PRIMARY KEY (bom_id, seq_no),
            FOREIGN KEY (bom_id) REFERENCES bom(bom_id) ON DELETE CASCADE
        );

        -- 成本核算快照
        CREATE TABLE IF NOT EXISTS cost_snapshot (
            snapshot_id         TEXT PRIMARY KEY,
            name                TEXT NOT NULL,
            calc_date           TEXT NOT NULL,
            product_id          TEXT,
            bom_id              TEXT,
            include_operations  INTEGER NOT NULL DEFAULT 1,
            state               TEXT NOT NULL DEFAULT 'draft',
            total_material_cost REAL NOT NULL DEFAULT 0.0,
            total_operation_cost REAL NOT NULL DEFAULT 0.0,
            total_jobwork_cost  REAL NOT NULL DEFAULT 0.0,
            total_freight_cost  REAL NOT NULL DEFAULT 0.0,
            total_packing_cost  REAL NOT NULL DEFAULT 0.0,
            cushion             REAL NOT NULL DEFAULT 0.0,
            gross_profit_add    REAL NOT NULL DEFAULT 0.0,
            other_cost          REAL NOT NULL DEFAULT 0.0,
            total_cost          REAL NOT NULL DEFAULT 0.0
        );

        -- 成本明细行（重算时整体删除重建）
        CREATE TABLE IF NOT EXISTS cost_line (
            snapshot_id   TEXT NOT NULL,
            seq_no        INTEGER NOT NULL,
            name          TEXT NOT NULL,
            cost_type     TEXT NOT NULL,
            product_id    TEXT,
            operation     TEXT,
            quantity      REAL NOT NULL DEFAULT 0.0,
            duration      REAL NOT NULL DEFAULT 0.0,
            unit_cost     REAL NOT NULL DEFAULT 0.0,
            cost          REAL NOT NULL DEFAULT 0.0,
            bom_level     INTEGER NOT NULL DEFAULT 0,
            bom_qty       REAL NOT NULL DEFAULT 0.0,
            PRIMARY KEY (snapshot_id, seq_no),
            FOREIGN KEY (snapshot_id) REFERENCES cost_snapshot(snapshot_id) ON DELETE CASCADE
        );

        -- 快照下的产品核算行
        CREATE TABLE IF NOT EXISTS product_cost_line (
            snapshot_id     TEXT NOT NULL,
            product_id      TEXT NOT NULL,
            is_manufacture  INTEGER NOT NULL DEFAULT 0,
            bom_id          TEXT,
            material_cost   REAL NOT NULL DEFAULT 0.0,
            operation_cost  REAL NOT NULL DEFAULT 0.0,
            jobwork_cost    REAL NOT NULL DEFAULT 0.0,
            freight_cost    REAL NOT NULL DEFAULT 0.0,
            packing_cost    REAL NOT NULL DEFAULT 0.0,
            cushion         REAL NOT NULL DEFAULT 0.0,
            gross_profit_add REAL NOT NULL DEFAULT 0.0,
            base_cost       REAL NOT NULL DEFAULT 0.0,
            state           TEXT NOT NULL DEFAULT 'draft',
            PRIMARY KEY (snapshot_id, product_id),
            FOREIGN KEY (snapshot_id) REFERENCES cost_snapshot(snapshot_id) ON DELETE CASCADE
        );

        -- 伙伴主档
        CREATE TABLE IF NOT EXISTS partner (
            partner_id  TEXT PRIMARY KEY,
            ref         TEXT,
            name        TEXT NOT NULL
        );

        -- 伙伴余额调整记录
        CREATE TABLE IF NOT EXISTS balance_reset (
            reset_id    TEXT PRIMARY KEY,
            name        TEXT NOT NULL,
            reset_date  TEXT NOT NULL,
            state       TEXT NOT NULL DEFAULT 'draft',
            total_adjustment REAL NOT NULL DEFAULT 0.0
        );

        CREATE TABLE IF NOT EXISTS balance_reset_line (
            reset_id        TEXT NOT NULL,
            seq_no          INTEGER NOT NULL,
            partner_id      TEXT NOT NULL,
            account_type    TEXT NOT NULL,
            current_balance REAL NOT NULL DEFAULT 0.0,
            new_balance     REAL NOT NULL DEFAULT 0.0,
            state           TEXT NOT NULL DEFAULT 'draft',
            ledger_entry_id TEXT,
            PRIMARY KEY (reset_id, seq_no),
            FOREIGN KEY (reset_id) REFERENCES balance_reset(reset_id) ON DELETE CASCADE
        );

        -- 配置 KV
        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id    TEXT NOT NULL DEFAULT 'global',
            key         TEXT NOT NULL,
            value       TEXT NOT NULL,
            updated_at  TEXT NOT NULL,
            PRIMARY KEY (scope_id, key)
        );
        "#,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        // 重复调用不应报错
        init_schema(&conn).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='bom'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }
}
