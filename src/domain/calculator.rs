// ==========================================
// BOM 成本核算系统 - 成本核算快照模型
// ==========================================
// 职责: 一次成本核算的版本化结果 (快照 + 明细行 + 产品行)
// 红线: 快照由创建它的核算独占写入; 重算先删旧明细再生成
// ==========================================

use crate::domain::types::{CalcState, CostType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ==========================================
// CostLine - 成本明细行
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostLine {
    pub name: String,               // 行描述
    pub cost_type: CostType,        // material / operation
    pub product_id: Option<String>, // 材料行: 组件产品
    pub operation: Option<String>,  // 工序行: 工作中心/工序名
    pub quantity: f64,              // 数量（组件自身单位）
    pub duration: f64,              // 工序时长（分钟）
    pub unit_cost: f64,             // 单位成本 / 小时费率
    pub cost: f64,                  // 行成本
    pub bom_level: usize,           // 产生于第几层 BOM（顶层为 0）
    pub bom_qty: f64,               // 所在 BOM 的产出数量
}

// ==========================================
// ProductCostLine - 快照下的产品核算行
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductCostLine {
    pub product_id: String,
    pub is_manufacture: bool,   // 是否制造件（有 BOM）
    pub bom_id: Option<String>, // 指定 BOM
    pub material_cost: f64,
    pub operation_cost: f64,
    pub jobwork_cost: f64,
    pub freight_cost: f64,
    pub packing_cost: f64,
    pub cushion: f64,
    pub gross_profit_add: f64,
    pub base_cost: f64, // 非制造件: 直接取标准价
    pub state: CalcState,
}

impl ProductCostLine {
    pub fn new(product_id: &str) -> Self {
        Self {
            product_id: product_id.to_string(),
            is_manufacture: false,
            bom_id: None,
            material_cost: 0.0,
            operation_cost: 0.0,
            jobwork_cost: 0.0,
            freight_cost: 0.0,
            packing_cost: 0.0,
            cushion: 0.0,
            gross_profit_add: 0.0,
            base_cost: 0.0,
            state: CalcState::Draft,
        }
    }

    /// 附加成本合计（委外 + 运费 + 包装 + 缓冲 + 毛利加成）
    pub fn other_cost(&self) -> f64 {
        self.jobwork_cost
            + self.freight_cost
            + self.packing_cost
            + self.cushion
            + self.gross_profit_add
    }

    /// 行总成本
    ///
    /// 制造件: 材料 + 工序 + 附加; 非制造件: 基础成本 + 附加
    pub fn total_cost(&self) -> f64 {
        if self.is_manufacture {
            self.material_cost + self.operation_cost + self.other_cost()
        } else {
            self.base_cost + self.other_cost()
        }
    }

    /// 单件成本: 总成本 / BOM 产出数量（非制造件即总成本）
    pub fn unit_cost(&self, bom_output_qty: Option<f64>) -> f64 {
        match (self.is_manufacture, bom_output_qty) {
            (true, Some(qty)) if qty > 0.0 => self.total_cost() / qty,
            _ => self.total_cost(),
        }
    }
}

// ==========================================
// CostSnapshot - 成本核算快照
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostSnapshot {
    pub snapshot_id: String,
    pub name: String,             // 单据号
    pub calc_date: DateTime<Utc>, // 核算时间
    pub product_id: Option<String>,
    pub bom_id: Option<String>,
    pub include_operations: bool, // 是否计入工序成本
    pub state: CalcState,

    // ===== 汇总成本 =====
    pub total_material_cost: f64,
    pub total_operation_cost: f64,
    pub total_jobwork_cost: f64,
    pub total_freight_cost: f64,
    pub total_packing_cost: f64,
    pub cushion: f64,
    pub gross_profit_add: f64,
    pub other_cost: f64,
    pub total_cost: f64,

    // ===== 明细 =====
    pub cost_lines: Vec<CostLine>,          // 重算时整体替换
    pub product_lines: Vec<ProductCostLine>, // 待核算产品行
}

impl CostSnapshot {
    pub fn new(snapshot_id: &str, name: &str) -> Self {
        Self {
            snapshot_id: snapshot_id.to_string(),
            name: name.to_string(),
            calc_date: Utc::now(),
            product_id: None,
            bom_id: None,
            include_operations: true,
            state: CalcState::Draft,
            total_material_cost: 0.0,
            total_operation_cost: 0.0,
            total_jobwork_cost: 0.0,
            total_freight_cost: 0.0,
            total_packing_cost: 0.0,
            cushion: 0.0,
            gross_profit_add: 0.0,
            other_cost: 0.0,
            total_cost: 0.0,
            cost_lines: Vec::new(),
            product_lines: Vec::new(),
        }
    }

    /// 单件成本: 总成本 / BOM 产出数量（无 BOM 或数量非正时即总成本）
    pub fn unit_cost(&self, bom_output_qty: Option<f64>) -> f64 {
        match bom_output_qty {
            Some(qty) if qty > 0.0 => self.total_cost / qty,
            _ => self.total_cost,
        }
    }
}

// ==========================================
// RawMaterialRequirement - 原材料需求累计
// ==========================================
// 用途: 价格覆写预览（展平整棵树后按终端组件聚合）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMaterialRequirement {
    pub product_id: String,
    pub quantity: f64,               // 累计需求数量（组件自身单位）
    pub bom_levels: BTreeSet<usize>, // 出现过的 BOM 层级
    pub is_raw_material: bool,       // 终端组件（自身无 BOM）
}

impl RawMaterialRequirement {
    pub fn new(product_id: &str, quantity: f64, level: usize) -> Self {
        let mut bom_levels = BTreeSet::new();
        bom_levels.insert(level);
        Self {
            product_id: product_id.to_string(),
            quantity,
            bom_levels,
            is_raw_material: true,
        }
    }

    /// 合并另一条路径上的同一组件
    pub fn merge(&mut self, quantity: f64, levels: &BTreeSet<usize>) {
        self.quantity += quantity;
        self.bom_levels.extend(levels.iter().copied());
    }
}
