// ==========================================
// BOM 成本核算系统 - BOM 领域模型
// ==========================================
// 职责: 物料清单结构 (产出 + 组件行 + 工序)
// 红线: 成本核算期间 BOM 图为只读
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// BomLine - BOM 组件行
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BomLine {
    pub product_id: String, // 组件产品
    pub product_qty: f64,   // 需求数量（按行单位）
    pub uom_id: String,     // 行计量单位
    // 变体专用路由: 对这些目标产品，本行在成本汇总中跳过
    pub skip_for_products: Vec<String>,
}

impl BomLine {
    pub fn new(product_id: &str, product_qty: f64, uom_id: &str) -> Self {
        Self {
            product_id: product_id.to_string(),
            product_qty,
            uom_id: uom_id.to_string(),
            skip_for_products: Vec::new(),
        }
    }

    /// 本行对目标产品是否跳过
    ///
    /// 跳过谓词按“正在核算的目标产品”评估，而不是按 BOM 本身，
    /// 同一 BOM 对不同变体可表现不同。
    pub fn skip_for(&self, target_product_id: &str) -> bool {
        self.skip_for_products
            .iter()
            .any(|p| p == target_product_id)
    }
}

// ==========================================
// Operation - BOM 工序
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    pub name: String,              // 工序名称
    pub workcenter: String,        // 工作中心
    pub time_cycle: f64,           // 标准周期（分钟）
    pub time_cycle_manual: f64,    // 手工周期（分钟）
    pub duration_expected: f64,    // 预期时长（分钟）
    pub cost_per_hour: f64,        // 小时费率
    pub skip_for_products: Vec<String>,
}

impl Operation {
    pub fn new(name: &str, workcenter: &str, time_cycle: f64, cost_per_hour: f64) -> Self {
        Self {
            name: name.to_string(),
            workcenter: workcenter.to_string(),
            time_cycle,
            time_cycle_manual: 0.0,
            duration_expected: 0.0,
            cost_per_hour,
            skip_for_products: Vec::new(),
        }
    }

    /// 有效时长（分钟）: time_cycle > time_cycle_manual > duration_expected > 0
    pub fn effective_duration(&self) -> f64 {
        if self.time_cycle > 0.0 {
            self.time_cycle
        } else if self.time_cycle_manual > 0.0 {
            self.time_cycle_manual
        } else if self.duration_expected > 0.0 {
            self.duration_expected
        } else {
            0.0
        }
    }

    /// 工序成本 = 时长（分钟）× 分钟费率
    pub fn cost(&self) -> f64 {
        self.effective_duration() * (self.cost_per_hour / 60.0)
    }

    pub fn skip_for(&self, target_product_id: &str) -> bool {
        self.skip_for_products
            .iter()
            .any(|p| p == target_product_id)
    }
}

// ==========================================
// Bom - 物料清单
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bom {
    pub bom_id: String,          // BOM 唯一标识
    pub product_id: String,      // 产出产品
    pub product_qty: f64,        // 产出数量
    pub uom_id: String,          // 产出计量单位
    pub company_id: Option<String>, // 归属公司（BOM 解析上下文）
    pub created_at: DateTime<Utc>,  // 建档时间（解析时取最新）
    pub lines: Vec<BomLine>,     // 组件行
    pub operations: Vec<Operation>, // 工序
}

impl Bom {
    pub fn new(bom_id: &str, product_id: &str, product_qty: f64, uom_id: &str) -> Self {
        Self {
            bom_id: bom_id.to_string(),
            product_id: product_id.to_string(),
            product_qty,
            uom_id: uom_id.to_string(),
            company_id: None,
            created_at: Utc::now(),
            lines: Vec::new(),
            operations: Vec::new(),
        }
    }

    /// 成本分母用的产出数量: 0/负数按 1.0 处理，避免除零
    pub fn output_qty_or_one(&self) -> f64 {
        if self.product_qty > 0.0 {
            self.product_qty
        } else {
            1.0
        }
    }
}
