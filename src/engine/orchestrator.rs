// ==========================================
// BOM 成本核算系统 - 批量核算编排器
// ==========================================
// 职责: 先全量校验，再逐行核算，最后汇总写回快照
// 红线: 校验未通过不得发生任何写入（全量或全无）
// 红线: 任一行核算失败整批中止，不提交部分汇总
// ==========================================

use crate::domain::calculator::{CostLine, CostSnapshot, ProductCostLine};
use crate::domain::types::CalcState;
use crate::engine::cost_aggregator::{CalcRun, CostAggregator};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::graph::CostGraph;
use crate::engine::validation::BatchValidator;
use std::collections::HashSet;
use tracing::{error, info, instrument};

// ==========================================
// BatchResult - 批量核算结果
// ==========================================
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub product_count: usize,      // 核算产品行数
    pub manufactured_count: usize, // 其中制造件数
    pub total_material_cost: f64,
    pub total_operation_cost: f64,
    pub total_other_cost: f64,
    pub total_cost: f64,
    pub elapsed_ms: i64, // 耗时(毫秒)
}

// ==========================================
// BatchCalculator - 批量核算编排器
// ==========================================
pub struct BatchCalculator {
    validator: BatchValidator,
}

impl BatchCalculator {
    pub fn new() -> Self {
        Self {
            validator: BatchValidator::new(),
        }
    }

    /// 批量核算快照下所有产品行
    ///
    /// # 流程
    /// 1. 产品行为空 → 校验错误
    /// 2. 全量前置校验，聚合所有违规一次性上报
    /// 3. 逐行核算到临时区（任一行失败整批中止）
    /// 4. 全部成功后一次性写回产品行与快照汇总，状态置为已核算
    #[instrument(skip(self, graph, snapshot), fields(snapshot_id = %snapshot.snapshot_id))]
    pub fn calculate_all(
        &self,
        graph: &CostGraph,
        snapshot: &mut CostSnapshot,
    ) -> EngineResult<BatchResult> {
        let started = std::time::Instant::now();

        if snapshot.product_lines.is_empty() {
            return Err(EngineError::Validation {
                violations: vec!["请至少选择一个待核算产品".to_string()],
            });
        }

        // ===== 全量前置校验 =====
        let violations = self.validator.validate(
            graph,
            &snapshot.product_lines,
            snapshot.include_operations,
        )?;
        if !violations.is_empty() {
            return Err(EngineError::Validation { violations });
        }

        // ===== 逐行核算（写入临时区，保证全量或全无）=====
        let aggregator = CostAggregator::new(snapshot.include_operations);
        let mut run = CalcRun::new();

        let mut calculated_lines: Vec<ProductCostLine> = Vec::new();
        let mut manufactured_count = 0usize;
        let mut total_material_cost = 0.0;
        let mut total_operation_cost = 0.0;
        let mut total_other_cost = 0.0;

        for line in &snapshot.product_lines {
            let product = graph.product(&line.product_id)?;
            let mut updated = line.clone();

            let bom = match (&line.is_manufacture, line.bom_id.as_deref()) {
                (true, Some(bom_id)) => Some(graph.bom_by_id(bom_id)?),
                _ => None,
            };

            match bom {
                None => {
                    // 非制造件: 基础成本即标准价
                    updated.base_cost = graph.effective_price(product);
                    updated.material_cost = 0.0;
                    updated.operation_cost = 0.0;
                    updated.state = CalcState::Calculated;
                }
                Some(bom) => {
                    let totals = aggregator
                        .compute_cost(
                            graph,
                            Some(bom),
                            &mut run,
                            &HashSet::new(),
                            false,
                            0,
                            product,
                        )
                        .map_err(|e| {
                            // 核算阶段失败: 整批中止，记录肇事产品
                            error!(
                                product_id = %product.product_id,
                                error = %e,
                                "产品成本核算失败，整批中止"
                            );
                            e
                        })?;

                    // 附加成本按 BOM 产出数量放大
                    let bom_qty = bom.output_qty_or_one();
                    let extra = &product.additional_costs;

                    updated.material_cost = totals.material;
                    updated.operation_cost = totals.operation;
                    updated.jobwork_cost = extra.jobwork_cost * bom_qty;
                    updated.freight_cost = extra.freight_cost * bom_qty;
                    updated.packing_cost = extra.packing_cost * bom_qty;
                    updated.cushion = extra.cushion * bom_qty;
                    updated.gross_profit_add = extra.gross_profit_add * bom_qty;
                    updated.state = CalcState::Calculated;

                    manufactured_count += 1;
                    total_material_cost += totals.material;
                    total_operation_cost += totals.operation;
                    total_other_cost += updated.other_cost();
                }
            }

            calculated_lines.push(updated);
        }

        // ===== 一次性写回 =====
        snapshot.product_lines = calculated_lines;
        snapshot.total_material_cost = total_material_cost;
        snapshot.total_operation_cost = total_operation_cost;
        snapshot.total_jobwork_cost =
            snapshot.product_lines.iter().map(|l| l.jobwork_cost).sum();
        snapshot.total_freight_cost =
            snapshot.product_lines.iter().map(|l| l.freight_cost).sum();
        snapshot.total_packing_cost =
            snapshot.product_lines.iter().map(|l| l.packing_cost).sum();
        snapshot.cushion = snapshot.product_lines.iter().map(|l| l.cushion).sum();
        snapshot.gross_profit_add = snapshot
            .product_lines
            .iter()
            .map(|l| l.gross_profit_add)
            .sum();
        snapshot.other_cost = total_other_cost;
        snapshot.total_cost = total_material_cost + total_operation_cost + total_other_cost;
        snapshot.state = CalcState::Calculated;

        let elapsed_ms = started.elapsed().as_millis() as i64;
        info!(
            products = snapshot.product_lines.len(),
            manufactured = manufactured_count,
            total_cost = snapshot.total_cost,
            elapsed_ms = elapsed_ms,
            "批量成本核算完成"
        );

        Ok(BatchResult {
            product_count: snapshot.product_lines.len(),
            manufactured_count,
            total_material_cost,
            total_operation_cost,
            total_other_cost,
            total_cost: snapshot.total_cost,
            elapsed_ms,
        })
    }

    /// 为单个产品生成成本明细行（重算先清空旧明细）
    ///
    /// # 参数
    /// - `product_id` / `bom_id`: 目标产品及其 BOM
    /// - `include_operations`: 是否生成工序明细
    ///
    /// # 返回
    /// 新生成的明细行（同时写入 snapshot.cost_lines）
    pub fn compute_details(
        &self,
        graph: &CostGraph,
        snapshot: &mut CostSnapshot,
        product_id: &str,
        bom_id: &str,
    ) -> EngineResult<Vec<CostLine>> {
        let product = graph.product(product_id)?;
        let bom = graph.bom_by_id(bom_id)?;

        let aggregator = CostAggregator::new(snapshot.include_operations);
        let mut run = CalcRun::new();

        aggregator.compute_cost(graph, Some(bom), &mut run, &HashSet::new(), true, 0, product)?;

        // 先删后建: 旧明细整体替换
        snapshot.cost_lines = run.take_detail_lines();
        Ok(snapshot.cost_lines.clone())
    }
}

impl Default for BatchCalculator {
    fn default() -> Self {
        Self::new()
    }
}
