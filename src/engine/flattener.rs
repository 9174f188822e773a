// ==========================================
// BOM 成本核算系统 - 原材料展平引擎
// ==========================================
// 职责: 递归展平 BOM 树，按终端组件累计原材料需求
// 用途: 原材料价格覆写预览
// 红线: 深度上限与环保护双重兜底，互不替代
// ==========================================

use crate::domain::bom::Bom;
use crate::domain::calculator::RawMaterialRequirement;
use crate::engine::error::EngineResult;
use crate::engine::graph::CostGraph;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// 默认展平深度上限
pub const DEFAULT_FLATTEN_DEPTH: usize = 5;

// ==========================================
// RawMaterialFlattener - 原材料展平引擎
// ==========================================
// 无状态引擎
pub struct RawMaterialFlattener;

impl RawMaterialFlattener {
    pub fn new() -> Self {
        Self
    }

    /// 展平 BOM 树，累计终端（无 BOM）组件的需求数量
    ///
    /// # 参数
    /// - `graph`: 成本数据视图
    /// - `bom`: 顶层 BOM
    /// - `depth_limit`: 剩余允许递归深度（默认 5）
    ///
    /// # 返回
    /// 组件产品 -> 需求累计（数量 + 出现层级集合）
    ///
    /// # 说明
    /// - 同一组件经多条路径出现时数量合并，层级集合取并集
    /// - 环与深度上限处的子树直接丢弃，不重复计数
    pub fn flatten(
        &self,
        graph: &CostGraph,
        bom: &Bom,
        depth_limit: usize,
    ) -> EngineResult<HashMap<String, RawMaterialRequirement>> {
        let result = self.flatten_inner(graph, bom, depth_limit, &HashSet::new(), 1)?;
        debug!(
            bom_id = %bom.bom_id,
            depth_limit = depth_limit,
            materials = result.len(),
            "原材料展平完成"
        );
        Ok(result)
    }

    fn flatten_inner(
        &self,
        graph: &CostGraph,
        bom: &Bom,
        depth_left: usize,
        visited: &HashSet<String>,
        level: usize,
    ) -> EngineResult<HashMap<String, RawMaterialRequirement>> {
        if depth_left == 0 || visited.contains(&bom.bom_id) {
            return Ok(HashMap::new());
        }

        let mut visited = visited.clone();
        visited.insert(bom.bom_id.clone());

        let mut materials: HashMap<String, RawMaterialRequirement> = HashMap::new();

        for line in &bom.lines {
            let component = graph.product(&line.product_id)?;
            let line_uom = graph.uom(&line.uom_id)?;
            let component_uom = graph.uom(&component.uom_id)?;
            let line_qty = line_uom.convert_qty(line.product_qty, component_uom)?;

            let child_bom = graph.find_bom(&line.product_id, bom.company_id.as_deref());

            match child_bom {
                Some(child_bom) => {
                    // 递归展平子装配，子需求按行数量放大
                    let child_materials = self.flatten_inner(
                        graph,
                        child_bom,
                        depth_left - 1,
                        &visited,
                        level + 1,
                    )?;

                    for (product_id, child_req) in child_materials {
                        let scaled_qty = child_req.quantity * line_qty;
                        match materials.get_mut(&product_id) {
                            Some(existing) => {
                                existing.merge(scaled_qty, &child_req.bom_levels);
                            }
                            None => {
                                let mut req = child_req.clone();
                                req.quantity = scaled_qty;
                                materials.insert(product_id, req);
                            }
                        }
                    }
                }
                None => {
                    // 终端组件: 直接累计
                    match materials.get_mut(&line.product_id) {
                        Some(existing) => {
                            existing.quantity += line_qty;
                            existing.bom_levels.insert(level);
                        }
                        None => {
                            materials.insert(
                                line.product_id.clone(),
                                RawMaterialRequirement::new(&line.product_id, line_qty, level),
                            );
                        }
                    }
                }
            }
        }

        Ok(materials)
    }
}

impl Default for RawMaterialFlattener {
    fn default() -> Self {
        Self::new()
    }
}
