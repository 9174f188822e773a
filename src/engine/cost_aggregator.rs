// ==========================================
// BOM 成本核算系统 - 成本聚合引擎
// ==========================================
// 红线: 同一路径重复进入同一 BOM 时静默归零（不报错，见批量校验的环检测）
// 红线: 单位不兼容必须报错，禁止用未换算数字继续算
// ==========================================
// 职责: 递归汇总 材料成本 + 工序成本 + 时长
// 输入: 成本数据视图 + BOM + 目标产品
// 输出: (材料成本, 工序成本, 时长) 三元组 + 可选明细行
// ==========================================

mod core;

#[cfg(test)]
mod tests;

pub use core::{CalcRun, CostAggregator, CostTotals};
