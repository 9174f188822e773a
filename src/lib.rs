// ==========================================
// BOM 成本核算系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 制造/财务决策支持核心 (成本汇总 + 余额调整)
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "zh-CN");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 成本核算业务规则
pub mod engine;

// 导入层 - 伙伴余额 CSV 导入
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{AccountType, CalcState, CostType, PartnerLookup};

// 领域实体
pub use domain::{
    AdditionalCosts, BalanceReset, BalanceResetLine, Bom, BomLine, CostLine, CostSnapshot,
    Operation, Partner, Product, ProductCostLine, RawMaterialRequirement, Uom,
};

// 引擎
pub use engine::{
    BatchCalculator, CalcRun, CostAggregator, CostGraph, CostTotals, EngineError,
    PriceOverrideSession, RawMaterialFlattener,
};

// 导入器
pub use importer::{BalanceResetService, ImportError, ResetPreview};

// API
pub use api::{ApiError, ApiResult, BalanceResetApi, CostApi};
