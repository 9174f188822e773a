// ==========================================
// BOM 成本核算系统 - 原材料价格覆写会话
// ==========================================
// 职责: 展平原材料 -> 编辑拟定价 -> 预览总值 -> 显式确认后生效
// 红线: 确认前不得触碰产品主档价格
// ==========================================

use crate::domain::bom::Bom;
use crate::engine::error::EngineResult;
use crate::engine::flattener::RawMaterialFlattener;
use crate::engine::graph::CostGraph;
use std::collections::{BTreeSet, HashMap};
use tracing::info;
use uuid::Uuid;

// ==========================================
// PriceOverrideLine - 可编辑的价格行
// ==========================================
#[derive(Debug, Clone)]
pub struct PriceOverrideLine {
    pub product_id: String,
    pub name: String,
    pub current_price: f64,          // 主档当前标准价
    pub new_price: f64,              // 拟定价（初始等于当前价）
    pub quantity: f64,               // 整树累计需求数量
    pub bom_levels: BTreeSet<usize>, // 出现层级
    pub is_raw_material: bool,
}

impl PriceOverrideLine {
    /// 预览总值 = 数量 × 拟定价
    pub fn total_value(&self) -> f64 {
        self.quantity * self.new_price
    }

    /// 价格变动百分比
    pub fn price_difference_pct(&self) -> f64 {
        if self.current_price != 0.0 {
            (self.new_price / self.current_price - 1.0) * 100.0
        } else {
            0.0
        }
    }

    pub fn is_modified(&self) -> bool {
        self.new_price != self.current_price
    }
}

// ==========================================
// PriceOverrideSession - 价格覆写会话
// ==========================================
#[derive(Debug)]
pub struct PriceOverrideSession {
    pub session_id: String, // 本次编辑会话标识
    pub lines: Vec<PriceOverrideLine>,
}

impl PriceOverrideSession {
    /// 从 BOM 展平结果构建编辑会话
    pub fn build(graph: &CostGraph, bom: &Bom, depth_limit: usize) -> EngineResult<Self> {
        let flattener = RawMaterialFlattener::new();
        let materials = flattener.flatten(graph, bom, depth_limit)?;

        let mut lines: Vec<PriceOverrideLine> = Vec::with_capacity(materials.len());
        for (product_id, req) in materials {
            let product = graph.product(&product_id)?;
            lines.push(PriceOverrideLine {
                product_id,
                name: product.name.clone(),
                current_price: product.standard_price,
                new_price: product.standard_price,
                quantity: req.quantity,
                bom_levels: req.bom_levels,
                is_raw_material: req.is_raw_material,
            });
        }
        // 稳定展示顺序
        lines.sort_by(|a, b| a.product_id.cmp(&b.product_id));

        Ok(Self {
            session_id: Uuid::new_v4().to_string(),
            lines,
        })
    }

    /// 设置某原材料的拟定价
    pub fn set_price(&mut self, product_id: &str, new_price: f64) -> bool {
        match self.lines.iter_mut().find(|l| l.product_id == product_id) {
            Some(line) => {
                line.new_price = new_price;
                true
            }
            None => false,
        }
    }

    /// 预览总值合计
    pub fn total_value(&self) -> f64 {
        self.lines.iter().map(|l| l.total_value()).sum()
    }

    /// 发生修改的价格（用于"仅本轮核算生效"的覆写）
    pub fn as_calculation_overrides(&self) -> HashMap<String, f64> {
        let overrides: HashMap<String, f64> = self
            .lines
            .iter()
            .filter(|l| l.is_modified())
            .map(|l| (l.product_id.clone(), l.new_price))
            .collect();
        info!(
            session_id = %self.session_id,
            modified = overrides.len(),
            "生成本轮核算价格覆写"
        );
        overrides
    }

    /// 发生修改的 (产品, 新价) 列表（用于回写产品主档）
    pub fn changed_prices(&self) -> Vec<(String, f64)> {
        self.lines
            .iter()
            .filter(|l| l.is_modified())
            .map(|l| (l.product_id.clone(), l.new_price))
            .collect()
    }
}
