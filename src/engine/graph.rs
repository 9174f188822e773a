// ==========================================
// BOM 成本核算系统 - 引擎只读数据视图
// ==========================================
// 职责: 聚合一次核算所需的产品/单位/BOM/已核算快照
// 红线: 核算期间只读; 价格覆写只对本视图生效，不改主档
// ==========================================

use crate::domain::bom::Bom;
use crate::domain::calculator::CostSnapshot;
use crate::domain::product::Product;
use crate::domain::uom::Uom;
use crate::engine::error::{EngineError, EngineResult};
use std::collections::HashMap;
use tracing::debug;

// ==========================================
// SnapshotCost - 已核算组件的替换成本
// ==========================================
// 注册快照时一次性取数，替换路径不再触碰 BOM 图——
// 即使组件自身的 BOM 已不可解析，替换仍须生效。
#[derive(Debug, Clone)]
pub struct SnapshotCost {
    pub snapshot_id: String,
    pub unit_cost: f64,             // 快照总成本 / 快照 BOM 产出数量
    pub bom_uom_id: Option<String>, // 快照 BOM 的产出单位（跨单位替换时换算用）
}

// ==========================================
// CostGraph - 成本核算数据视图
// ==========================================
#[derive(Debug, Default)]
pub struct CostGraph {
    products: HashMap<String, Product>,
    uoms: HashMap<String, Uom>,
    boms: Vec<Bom>,
    calculated_costs: HashMap<String, SnapshotCost>, // product_id -> 最新已核算快照
    price_overrides: HashMap<String, f64>,           // 仅本轮核算生效的价格覆写
}

impl CostGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // ===== 建图 =====

    pub fn add_uom(&mut self, uom: Uom) {
        self.uoms.insert(uom.uom_id.clone(), uom);
    }

    pub fn add_product(&mut self, product: Product) {
        self.products.insert(product.product_id.clone(), product);
    }

    pub fn add_bom(&mut self, bom: Bom) {
        self.boms.push(bom);
    }

    /// 注册某产品的已核算快照（替换/缓存策略的数据来源）
    ///
    /// # 参数
    /// - snapshot: 状态必须为已核算（调用方保证）
    /// - bom_output_qty / bom_uom_id: 快照当时引用 BOM 的产出数量与单位
    pub fn register_snapshot(
        &mut self,
        snapshot: &CostSnapshot,
        product_id: &str,
        bom_output_qty: Option<f64>,
        bom_uom_id: Option<String>,
    ) {
        let unit_cost = snapshot.unit_cost(bom_output_qty);
        self.register_calculated_cost(&snapshot.snapshot_id, product_id, unit_cost, bom_uom_id);
    }

    /// 直接注册替换成本（批量快照中的产品行已自带单件成本时使用）
    pub fn register_calculated_cost(
        &mut self,
        snapshot_id: &str,
        product_id: &str,
        unit_cost: f64,
        bom_uom_id: Option<String>,
    ) {
        debug!(
            product_id = %product_id,
            snapshot_id = %snapshot_id,
            unit_cost = unit_cost,
            "注册已核算快照作为替换成本"
        );
        self.calculated_costs.insert(
            product_id.to_string(),
            SnapshotCost {
                snapshot_id: snapshot_id.to_string(),
                unit_cost,
                bom_uom_id,
            },
        );
    }

    /// 设置本轮核算的价格覆写（不改产品主档）
    pub fn set_price_overrides(&mut self, overrides: HashMap<String, f64>) {
        self.price_overrides = overrides;
    }

    // ===== 查询 =====

    pub fn product(&self, product_id: &str) -> EngineResult<&Product> {
        self.products
            .get(product_id)
            .ok_or_else(|| EngineError::not_found("product", product_id))
    }

    pub fn uom(&self, uom_id: &str) -> EngineResult<&Uom> {
        self.uoms
            .get(uom_id)
            .ok_or_else(|| EngineError::not_found("uom", uom_id))
    }

    pub fn bom_by_id(&self, bom_id: &str) -> EngineResult<&Bom> {
        self.boms
            .iter()
            .find(|b| b.bom_id == bom_id)
            .ok_or_else(|| EngineError::not_found("bom", bom_id))
    }

    /// BOM 解析: 给定组件与制造上下文，返回适用 BOM
    ///
    /// 同产品多 BOM 时取 (created_at, product_qty) 最大者;
    /// company_id 提供时优先匹配同公司，放宽到无公司归属的 BOM。
    pub fn find_bom(&self, product_id: &str, company_id: Option<&str>) -> Option<&Bom> {
        self.boms
            .iter()
            .filter(|b| b.product_id == product_id)
            .filter(|b| match (company_id, b.company_id.as_deref()) {
                (Some(ctx), Some(own)) => ctx == own,
                _ => true,
            })
            .max_by(|a, b| {
                (a.created_at, a.product_qty)
                    .partial_cmp(&(b.created_at, b.product_qty))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    }

    /// 已核算快照的替换成本（无则需递归核算）
    pub fn calculated_cost(&self, product_id: &str) -> Option<&SnapshotCost> {
        self.calculated_costs.get(product_id)
    }

    /// 原材料有效价格: 本轮覆写优先，否则主档标准价
    pub fn effective_price(&self, product: &Product) -> f64 {
        self.price_overrides
            .get(&product.product_id)
            .copied()
            .unwrap_or(product.standard_price)
    }
}
