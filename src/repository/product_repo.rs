// ==========================================
// BOM 成本核算系统 - 产品与单位仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================

use crate::domain::product::{AdditionalCosts, Product};
use crate::domain::uom::Uom;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, Result as SqliteResult};
use std::sync::{Arc, Mutex};

// ==========================================
// UomRepository - 计量单位仓储
// ==========================================
pub struct UomRepository {
    conn: Arc<Mutex<Connection>>,
}

impl UomRepository {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 写入单位（存在则覆盖）
    pub fn upsert(&self, uom: &Uom) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO uom (uom_id, name, category, factor)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![uom.uom_id, uom.name, uom.category, uom.factor],
        )?;
        Ok(())
    }

    /// 查询所有单位
    pub fn find_all(&self) -> RepositoryResult<Vec<Uom>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT uom_id, name, category, factor FROM uom ORDER BY uom_id")?;

        let uoms = stmt
            .query_map([], |row| {
                Ok(Uom {
                    uom_id: row.get(0)?,
                    name: row.get(1)?,
                    category: row.get(2)?,
                    factor: row.get(3)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(uoms)
    }
}

// ==========================================
// ProductRepository - 产品主档仓储
// ==========================================
/// 产品主档仓储
/// 职责: 管理 product 表的 CRUD 操作
/// 红线: 不含业务逻辑，只负责数据访问
pub struct ProductRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ProductRepository {
    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 写入产品（存在则覆盖）
    pub fn upsert(&self, product: &Product) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO product (
                product_id, name, uom_id, standard_price,
                sale_ok, include_in_pricelist,
                jobwork_cost, freight_cost, packing_cost, cushion, gross_profit_add
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                product.product_id,
                product.name,
                product.uom_id,
                product.standard_price,
                product.sale_ok as i32,
                product.include_in_pricelist as i32,
                product.additional_costs.jobwork_cost,
                product.additional_costs.freight_cost,
                product.additional_costs.packing_cost,
                product.additional_costs.cushion,
                product.additional_costs.gross_profit_add,
            ],
        )?;
        Ok(())
    }

    /// 按主键查询
    pub fn find_by_id(&self, product_id: &str) -> RepositoryResult<Option<Product>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT
                product_id, name, uom_id, standard_price,
                sale_ok, include_in_pricelist,
                jobwork_cost, freight_cost, packing_cost, cushion, gross_profit_add
            FROM product
            WHERE product_id = ?1
            "#,
        )?;

        let result = stmt.query_row(params![product_id], map_product_row);

        match result {
            Ok(product) => Ok(Some(product)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询所有产品
    pub fn find_all(&self) -> RepositoryResult<Vec<Product>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT
                product_id, name, uom_id, standard_price,
                sale_ok, include_in_pricelist,
                jobwork_cost, freight_cost, packing_cost, cushion, gross_profit_add
            FROM product
            ORDER BY product_id
            "#,
        )?;

        let products = stmt
            .query_map([], map_product_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(products)
    }

    /// 更新标准价（价格覆写落库）
    pub fn update_standard_price(
        &self,
        product_id: &str,
        new_price: f64,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE product SET standard_price = ?2 WHERE product_id = ?1",
            params![product_id, new_price],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "product".to_string(),
                id: product_id.to_string(),
            });
        }
        Ok(())
    }
}

// ==========================================
// 辅助函数
// ==========================================

fn map_product_row(row: &rusqlite::Row<'_>) -> SqliteResult<Product> {
    Ok(Product {
        product_id: row.get(0)?,
        name: row.get(1)?,
        uom_id: row.get(2)?,
        standard_price: row.get(3)?,
        sale_ok: row.get::<_, i32>(4)? != 0,
        include_in_pricelist: row.get::<_, i32>(5)? != 0,
        additional_costs: AdditionalCosts {
            jobwork_cost: row.get(6)?,
            freight_cost: row.get(7)?,
            packing_cost: row.get(8)?,
            cushion: row.get(9)?,
            gross_profit_add: row.get(10)?,
        },
    })
}
