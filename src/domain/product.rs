// ==========================================
// BOM 成本核算系统 - 产品领域模型
// ==========================================
// 用途: 成本核算只读输入; 原材料价格覆写可回写 standard_price
// ==========================================

use serde::{Deserialize, Serialize};

// ==========================================
// AdditionalCosts - 附加成本
// ==========================================
// 显式可选字段结构，全部默认为 0.0
// (代替源系统按字段是否存在的动态探测)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdditionalCosts {
    pub jobwork_cost: f64,     // 委外加工费
    pub freight_cost: f64,     // 运费
    pub packing_cost: f64,     // 包装费
    pub cushion: f64,          // 缓冲加成
    pub gross_profit_add: f64, // 毛利加成
}

impl AdditionalCosts {
    /// 单件附加成本合计
    pub fn per_unit_total(&self) -> f64 {
        self.jobwork_cost + self.freight_cost + self.packing_cost + self.cushion
            + self.gross_profit_add
    }
}

// ==========================================
// Product - 产品主档
// ==========================================
// 红线: 引擎层只读; 只有价格覆写提交会改 standard_price
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub product_id: String,           // 产品唯一标识
    pub name: String,                 // 产品名称
    pub uom_id: String,               // 产品自身计量单位
    pub standard_price: f64,          // 标准价（原材料成本来源）
    pub sale_ok: bool,                // 可销售
    pub include_in_pricelist: bool,   // 是否纳入价目表
    pub additional_costs: AdditionalCosts, // 附加成本
}

impl Product {
    pub fn new(product_id: &str, name: &str, uom_id: &str, standard_price: f64) -> Self {
        Self {
            product_id: product_id.to_string(),
            name: name.to_string(),
            uom_id: uom_id.to_string(),
            standard_price,
            sale_ok: true,
            include_in_pricelist: false,
            additional_costs: AdditionalCosts::default(),
        }
    }
}
