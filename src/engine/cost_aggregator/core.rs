// ==========================================
// BOM 成本核算系统 - 成本聚合引擎核心
// ==========================================
// 算法要点:
// - 每个分支持有 visited 集合的独立副本，兄弟分支不互相屏蔽
// - 只有原材料叶子贡献"新"材料成本，中间层只按数量比例透传
// - 已核算快照直接按单件成本替换，不再递归
// ==========================================

use crate::domain::bom::Bom;
use crate::domain::calculator::CostLine;
use crate::domain::product::Product;
use crate::domain::types::CostType;
use crate::engine::error::EngineResult;
use crate::engine::graph::CostGraph;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

// ==========================================
// CostTotals - 汇总三元组
// ==========================================
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CostTotals {
    pub material: f64,         // 材料成本
    pub operation: f64,        // 工序成本
    pub duration_minutes: f64, // 工序时长（分钟）
}

impl CostTotals {
    pub const ZERO: CostTotals = CostTotals {
        material: 0.0,
        operation: 0.0,
        duration_minutes: 0.0,
    };

    fn add_scaled(&mut self, other: CostTotals, ratio: f64) {
        self.material += other.material * ratio;
        self.operation += other.operation * ratio;
        self.duration_minutes += other.duration_minutes * ratio;
    }
}

// ==========================================
// CalcRun - 单轮核算状态
// ==========================================
// 生命周期: 每次顶层核算创建，结束即丢弃（无环境可变状态）
// 缓存键: (bom_id, target_product_id, level, emit_detail)
// 注: 明细模式不读缓存，否则明细行会缺失
#[derive(Debug, Default)]
pub struct CalcRun {
    cache: HashMap<(String, String, usize, bool), CostTotals>,
    pub detail_lines: Vec<CostLine>,
}

impl CalcRun {
    pub fn new() -> Self {
        Self::default()
    }

    /// 取走本轮生成的明细行
    pub fn take_detail_lines(&mut self) -> Vec<CostLine> {
        std::mem::take(&mut self.detail_lines)
    }
}

// ==========================================
// CostAggregator - 成本聚合引擎
// ==========================================
// 无状态引擎，是否计入工序成本通过构造参数传入
pub struct CostAggregator {
    include_operations: bool,
}

impl CostAggregator {
    pub fn new(include_operations: bool) -> Self {
        Self { include_operations }
    }

    /// 递归汇总一个 BOM 的成本
    ///
    /// # 参数
    /// - `graph`: 成本数据视图（只读）
    /// - `bom`: 待汇总 BOM（缺失直接返回零）
    /// - `run`: 本轮核算状态（缓存 + 明细行收集）
    /// - `visited`: 当前路径已进入的 BOM 集合（环保护）
    /// - `emit_detail`: 是否生成成本明细行
    /// - `level`: 当前嵌套层级（顶层为 0）
    /// - `target`: 正在核算的目标产品（跳过谓词按它评估）
    ///
    /// # 返回
    /// (材料成本, 工序成本, 时长) 三元组
    pub fn compute_cost(
        &self,
        graph: &CostGraph,
        bom: Option<&Bom>,
        run: &mut CalcRun,
        visited: &HashSet<String>,
        emit_detail: bool,
        level: usize,
        target: &Product,
    ) -> EngineResult<CostTotals> {
        let bom = match bom {
            Some(b) => b,
            None => return Ok(CostTotals::ZERO),
        };

        let cache_key = (
            bom.bom_id.clone(),
            target.product_id.clone(),
            level,
            emit_detail,
        );

        // 明细模式不可复用缓存，否则明细行会被吞掉
        if !emit_detail {
            if let Some(cached) = run.cache.get(&cache_key) {
                return Ok(*cached);
            }
        }

        // 环保护: 当前路径重复进入同一 BOM 时归零返回
        // （病态环被静默截断; 批量校验的环扫描会显式报错）
        if visited.contains(&bom.bom_id) {
            warn!(
                bom_id = %bom.bom_id,
                target = %target.product_id,
                level = level,
                "当前路径重复进入同一 BOM，子树成本按零计"
            );
            return Ok(CostTotals::ZERO);
        }

        // 每个分支独立副本: 兄弟分支使用相同子装配时不被错误屏蔽
        let mut visited = visited.clone();
        visited.insert(bom.bom_id.clone());

        let mut totals = CostTotals::ZERO;

        // ===== 工序成本 =====
        if self.include_operations {
            for operation in &bom.operations {
                if operation.skip_for(&target.product_id) {
                    continue;
                }

                let duration = operation.effective_duration();
                let operation_cost = operation.cost();

                totals.duration_minutes += duration;
                totals.operation += operation_cost;

                if emit_detail {
                    run.detail_lines.push(CostLine {
                        name: format!(
                            "{} - {}（{}）",
                            target.name, operation.workcenter, operation.name
                        ),
                        cost_type: CostType::Operation,
                        product_id: None,
                        operation: Some(operation.name.clone()),
                        quantity: 0.0,
                        duration,
                        unit_cost: operation.cost_per_hour,
                        cost: operation_cost,
                        bom_level: level,
                        bom_qty: bom.product_qty,
                    });
                }
            }
        }

        // ===== 材料成本 =====
        for line in &bom.lines {
            if line.skip_for(&target.product_id) {
                continue;
            }

            let component = graph.product(&line.product_id)?;
            let line_uom = graph.uom(&line.uom_id)?;
            let component_uom = graph.uom(&component.uom_id)?;

            // 行数量换算到组件自身单位
            let line_qty = line_uom.convert_qty(line.product_qty, component_uom)?;

            // 替换策略优先: 已核算子装配按其最近单件成本计价——
            // 即使组件自身的 BOM 图已不可解析，替换路径也必须生效，
            // 且不得进入递归。
            if let Some(snapshot_cost) = graph.calculated_cost(&line.product_id) {
                let component_cost = match snapshot_cost.bom_uom_id.as_deref() {
                    Some(snap_uom_id) if snap_uom_id != line.uom_id => {
                        let snap_uom = graph.uom(snap_uom_id)?;
                        let converted =
                            snap_uom.convert_price(snapshot_cost.unit_cost, line_uom)?;
                        converted * line.product_qty
                    }
                    _ => snapshot_cost.unit_cost * line_qty,
                };
                totals.material += component_cost;

                debug!(
                    component = %line.product_id,
                    snapshot_id = %snapshot_cost.snapshot_id,
                    unit_cost = snapshot_cost.unit_cost,
                    cost = component_cost,
                    "使用已核算快照替换子装配成本"
                );

                if emit_detail {
                    run.detail_lines.push(CostLine {
                        name: format!("{}（已核算组件）", component.name),
                        cost_type: CostType::Material,
                        product_id: Some(component.product_id.clone()),
                        operation: None,
                        quantity: line_qty,
                        duration: 0.0,
                        unit_cost: snapshot_cost.unit_cost,
                        cost: component_cost,
                        bom_level: level,
                        bom_qty: bom.product_qty,
                    });
                }
                continue;
            }

            let child_bom = graph.find_bom(&line.product_id, bom.company_id.as_deref());

            match child_bom {
                None => {
                    // 原材料: 标准价 × 数量（本轮覆写价优先）
                    let unit_price = graph.effective_price(component);
                    let component_cost = unit_price * line_qty;
                    totals.material += component_cost;

                    if emit_detail {
                        run.detail_lines.push(CostLine {
                            name: format!("{}（原材料）", component.name),
                            cost_type: CostType::Material,
                            product_id: Some(component.product_id.clone()),
                            operation: None,
                            quantity: line_qty,
                            duration: 0.0,
                            unit_cost: unit_price,
                            cost: component_cost,
                            bom_level: level,
                            bom_qty: bom.product_qty,
                        });
                    }
                }
                Some(child_bom) => {
                    // 无快照: 递归子 BOM，按数量比例透传（不重复计材料）
                    let child = self.compute_cost(
                        graph,
                        Some(child_bom),
                        run,
                        &visited,
                        emit_detail,
                        level + 1,
                        component,
                    )?;

                    // 数量比例: 子 BOM 产出数量先换算到行单位再作分母
                    let qty_ratio = if child_bom.uom_id != line.uom_id {
                        let child_uom = graph.uom(&child_bom.uom_id)?;
                        let child_qty_in_line_uom =
                            child_uom.convert_qty(child_bom.product_qty, line_uom)?;
                        let denom = if child_qty_in_line_uom > 0.0 {
                            child_qty_in_line_uom
                        } else {
                            1.0
                        };
                        line.product_qty / denom
                    } else {
                        line.product_qty / child_bom.output_qty_or_one()
                    };

                    totals.add_scaled(child, qty_ratio);

                    if emit_detail {
                        // 单件成本按子 BOM 产出数量折算，单位不同再换算
                        let mut unit_cost = child.material / child_bom.output_qty_or_one();
                        if child_bom.uom_id != line.uom_id {
                            let child_uom = graph.uom(&child_bom.uom_id)?;
                            unit_cost = child_uom.convert_price(unit_cost, line_uom)?;
                        }

                        run.detail_lines.push(CostLine {
                            name: format!("{}（BOM 组件）", component.name),
                            cost_type: CostType::Material,
                            product_id: Some(component.product_id.clone()),
                            operation: None,
                            quantity: line_qty,
                            duration: 0.0,
                            unit_cost,
                            cost: child.material * qty_ratio,
                            bom_level: level,
                            bom_qty: bom.product_qty,
                        });
                    }
                }
            }
        }

        if !emit_detail {
            run.cache.insert(cache_key, totals);
        }

        Ok(totals)
    }
}
