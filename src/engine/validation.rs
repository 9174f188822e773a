// ==========================================
// BOM 成本核算系统 - 批量前置校验
// ==========================================
// 职责: 核算前全量体检，一次性聚合所有违规
// 红线: 不允许快速失败——用户必须能一轮修完所有问题
// 红线: 单位兼容性用试换算探测，不信任任何标志位
// ==========================================
// 检查项:
// 1. 制造件必须指定 BOM
// 2. BOM 必须有组件行
// 3. 可达原材料叶子必须有正标准价
// 4. BOM 不得（直接或传递）包含其产出产品（广度优先，带路径诊断）
// 5. 计入工序时，工序必须有正时长与正费率
// 6. BOM 单位与产品单位、组件行单位与组件单位必须可换算
// ==========================================

use crate::domain::bom::Bom;
use crate::domain::calculator::ProductCostLine;
use crate::engine::error::EngineResult;
use crate::engine::graph::CostGraph;
use std::collections::{HashSet, VecDeque};
use tracing::{debug, warn};

// ==========================================
// BatchValidator - 批量校验器
// ==========================================
// 无状态引擎
pub struct BatchValidator;

impl BatchValidator {
    pub fn new() -> Self {
        Self
    }

    /// 校验整个批次，返回全部违规描述（空即通过）
    ///
    /// # 参数
    /// - `graph`: 成本数据视图
    /// - `lines`: 待核算产品行
    /// - `include_operations`: 是否计入工序成本（决定第 5 项是否执行）
    pub fn validate(
        &self,
        graph: &CostGraph,
        lines: &[ProductCostLine],
        include_operations: bool,
    ) -> EngineResult<Vec<String>> {
        let mut violations = Vec::new();

        self.check_missing_boms(graph, lines, &mut violations)?;
        self.check_empty_boms(graph, lines, &mut violations)?;
        self.check_raw_material_costs(graph, lines, &mut violations)?;
        self.check_circular_references(graph, lines, &mut violations)?;
        if include_operations {
            self.check_operations(graph, lines, &mut violations)?;
        }
        self.check_uom_consistency(graph, lines, &mut violations)?;

        if violations.is_empty() {
            debug!(lines = lines.len(), "批量前置校验通过");
        } else {
            warn!(
                lines = lines.len(),
                violations = violations.len(),
                "批量前置校验发现违规"
            );
        }

        Ok(violations)
    }

    /// 取某行的制造 BOM（未指定或查不到返回 None，缺失本身由第 1 项报告）
    fn manufacture_bom<'a>(
        &self,
        graph: &'a CostGraph,
        line: &ProductCostLine,
    ) -> Option<&'a Bom> {
        if !line.is_manufacture {
            return None;
        }
        line.bom_id
            .as_deref()
            .and_then(|bom_id| graph.bom_by_id(bom_id).ok())
    }

    // ===== 1. 制造件缺 BOM =====
    fn check_missing_boms(
        &self,
        graph: &CostGraph,
        lines: &[ProductCostLine],
        violations: &mut Vec<String>,
    ) -> EngineResult<()> {
        for line in lines {
            if line.is_manufacture && line.bom_id.is_none() {
                let product = graph.product(&line.product_id)?;
                violations.push(format!(
                    "产品 {} 标记为制造件但未指定 BOM，请指定 BOM 或取消制造标记",
                    product.name
                ));
            }
        }
        Ok(())
    }

    // ===== 2. BOM 无组件 =====
    fn check_empty_boms(
        &self,
        graph: &CostGraph,
        lines: &[ProductCostLine],
        violations: &mut Vec<String>,
    ) -> EngineResult<()> {
        for line in lines {
            if let Some(bom) = self.manufacture_bom(graph, line) {
                if bom.lines.is_empty() {
                    let product = graph.product(&line.product_id)?;
                    violations.push(format!(
                        "产品 {} 的 BOM {} 没有任何组件行，请先补充组件",
                        product.name, bom.bom_id
                    ));
                }
            }
        }
        Ok(())
    }

    // ===== 3. 原材料缺成本 =====
    // 深度优先递归收集所有可达的零价原材料叶子，按顶层产品归组
    fn check_raw_material_costs(
        &self,
        graph: &CostGraph,
        lines: &[ProductCostLine],
        violations: &mut Vec<String>,
    ) -> EngineResult<()> {
        for line in lines {
            let bom = match self.manufacture_bom(graph, line) {
                Some(b) => b,
                None => continue,
            };
            let target = graph.product(&line.product_id)?;

            let mut missing = Vec::new();
            self.collect_missing_costs(
                graph,
                bom,
                &target.product_id,
                &HashSet::new(),
                &mut missing,
            )?;

            if !missing.is_empty() {
                violations.push(format!(
                    "产品 {} 的 BOM 含未定义成本的组件：{}，请先维护标准价",
                    target.name,
                    missing.join("、")
                ));
            }
        }
        Ok(())
    }

    fn collect_missing_costs(
        &self,
        graph: &CostGraph,
        bom: &Bom,
        target_product_id: &str,
        visited: &HashSet<String>,
        missing: &mut Vec<String>,
    ) -> EngineResult<()> {
        if visited.contains(&bom.bom_id) {
            return Ok(());
        }
        let mut visited = visited.clone();
        visited.insert(bom.bom_id.clone());

        for component in &bom.lines {
            // 核算时会跳过的行不参与成本检查
            if component.skip_for(target_product_id) {
                continue;
            }

            let product = graph.product(&component.product_id)?;

            match graph.find_bom(&component.product_id, bom.company_id.as_deref()) {
                Some(child_bom) => {
                    self.collect_missing_costs(
                        graph,
                        child_bom,
                        target_product_id,
                        &visited,
                        missing,
                    )?;
                }
                None => {
                    // 与聚合引擎同口径: 覆写价生效后再判零
                    if graph.effective_price(product) <= 0.0 {
                        missing.push(product.name.clone());
                    }
                }
            }
        }
        Ok(())
    }

    // ===== 4. 循环引用 =====
    // 广度优先、带路径追踪（区别于聚合引擎的深度优先静默截断）；
    // 报告格式: 目标产品: 链路 → 目标产品
    fn check_circular_references(
        &self,
        graph: &CostGraph,
        lines: &[ProductCostLine],
        violations: &mut Vec<String>,
    ) -> EngineResult<()> {
        for line in lines {
            let bom = match self.manufacture_bom(graph, line) {
                Some(b) => b,
                None => continue,
            };
            let target = graph.product(&line.product_id)?;

            let mut processed: HashSet<String> = HashSet::new();
            let mut queue: VecDeque<(&Bom, Vec<String>)> = VecDeque::new();
            queue.push_back((bom, Vec::new()));

            while let Some((current, path)) = queue.pop_front() {
                if processed.contains(&current.bom_id) {
                    continue;
                }
                processed.insert(current.bom_id.clone());

                let producer = graph.product(&current.product_id)?;
                let mut current_path = path.clone();
                current_path.push(producer.name.clone());

                // 命中后继续排空队列: 同一目标可能经多个分支成环，
                // 每条链路都要报告；processed 保证扫描有界
                for component in &current.lines {
                    if component.product_id == line.product_id {
                        violations.push(format!(
                            "检测到循环引用：{}: {} → {}",
                            target.name,
                            current_path.join(" → "),
                            target.name
                        ));
                        break;
                    }

                    if let Some(child_bom) =
                        graph.find_bom(&component.product_id, current.company_id.as_deref())
                    {
                        queue.push_back((child_bom, current_path.clone()));
                    }
                }
            }
        }
        Ok(())
    }

    // ===== 5. 工序时长/费率 =====
    fn check_operations(
        &self,
        graph: &CostGraph,
        lines: &[ProductCostLine],
        violations: &mut Vec<String>,
    ) -> EngineResult<()> {
        for line in lines {
            let bom = match self.manufacture_bom(graph, line) {
                Some(b) => b,
                None => continue,
            };
            let target = graph.product(&line.product_id)?;

            for operation in &bom.operations {
                if operation.skip_for(&target.product_id) {
                    continue;
                }

                if operation.effective_duration() <= 0.0 {
                    violations.push(format!(
                        "产品 {} 的工序 {}（工作中心 {}）未定义时长",
                        target.name, operation.name, operation.workcenter
                    ));
                }
                if operation.cost_per_hour <= 0.0 {
                    violations.push(format!(
                        "产品 {} 的工序 {}（工作中心 {}）未定义费率",
                        target.name, operation.name, operation.workcenter
                    ));
                }
            }
        }
        Ok(())
    }

    // ===== 6. 单位兼容性 =====
    // 每一对单位做 1.0 试换算
    fn check_uom_consistency(
        &self,
        graph: &CostGraph,
        lines: &[ProductCostLine],
        violations: &mut Vec<String>,
    ) -> EngineResult<()> {
        for line in lines {
            let bom = match self.manufacture_bom(graph, line) {
                Some(b) => b,
                None => continue,
            };
            let target = graph.product(&line.product_id)?;

            let bom_uom = graph.uom(&bom.uom_id)?;
            let product_uom = graph.uom(&target.uom_id)?;
            if bom_uom.probe_compatible(product_uom).is_err() {
                violations.push(format!(
                    "产品 {}: BOM 使用 {} 而产品使用 {}，单位不可换算",
                    target.name, bom_uom.name, product_uom.name
                ));
            }

            for component in &bom.lines {
                let component_product = graph.product(&component.product_id)?;
                let line_uom = graph.uom(&component.uom_id)?;
                let component_uom = graph.uom(&component_product.uom_id)?;
                if line_uom.probe_compatible(component_uom).is_err() {
                    violations.push(format!(
                        "产品 {}: 组件 {} 单位不兼容（{} 与 {}）",
                        target.name, component_product.name, line_uom.name, component_uom.name
                    ));
                }
            }
        }
        Ok(())
    }
}

impl Default for BatchValidator {
    fn default() -> Self {
        Self::new()
    }
}
