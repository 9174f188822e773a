// ==========================================
// BOM 成本核算系统 - API 层
// ==========================================
// 职责: 面向调用方的门面，组装仓储/引擎/导入服务
// ==========================================

pub mod balance_reset_api;
pub mod cost_api;
pub mod error;

pub use balance_reset_api::BalanceResetApi;
pub use cost_api::CostApi;
pub use error::{ApiError, ApiResult};
