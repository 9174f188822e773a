// ==========================================
// BOM 成本核算系统 - 引擎层
// ==========================================
// 职责: 实现成本核算业务规则,不拼 SQL
// 红线: Engine 不拼 SQL, 所有校验违规必须输出可读原因
// ==========================================

pub mod cost_aggregator;
pub mod error;
pub mod flattener;
pub mod graph;
pub mod orchestrator;
pub mod price_override;
pub mod validation;

// 重导出核心引擎
pub use cost_aggregator::{CalcRun, CostAggregator, CostTotals};
pub use error::{EngineError, EngineResult};
pub use flattener::{RawMaterialFlattener, DEFAULT_FLATTEN_DEPTH};
pub use graph::{CostGraph, SnapshotCost};
pub use orchestrator::{BatchCalculator, BatchResult};
pub use price_override::{PriceOverrideLine, PriceOverrideSession};
pub use validation::BatchValidator;
