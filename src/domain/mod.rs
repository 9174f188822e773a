// ==========================================
// BOM 成本核算系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、业务规则接口
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod bom;
pub mod calculator;
pub mod partner;
pub mod product;
pub mod types;
pub mod uom;

// 重导出核心类型
pub use bom::{Bom, BomLine, Operation};
pub use calculator::{CostLine, CostSnapshot, ProductCostLine, RawMaterialRequirement};
pub use partner::{BalanceReset, BalanceResetLine, Partner};
pub use product::{AdditionalCosts, Product};
pub use types::{AccountType, CalcState, CostType, PartnerLookup, ResetState};
pub use uom::{ConversionError, Uom};
