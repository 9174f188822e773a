use super::*;
use crate::domain::bom::{Bom, BomLine, Operation};
use crate::domain::calculator::CostSnapshot;
use crate::domain::product::Product;
use crate::domain::types::CostType;
use crate::domain::uom::Uom;
use crate::engine::graph::CostGraph;
use std::collections::HashSet;

// ==========================================
// 测试辅助函数
// ==========================================

/// 创建带基础单位的空视图
fn create_test_graph() -> CostGraph {
    let mut graph = CostGraph::new();
    graph.add_uom(Uom::new("unit", "件", "unit", 1.0));
    graph.add_uom(Uom::new("dozen", "打", "unit", 12.0));
    graph.add_uom(Uom::new("kg", "千克", "weight", 1.0));
    graph.add_uom(Uom::new("t", "吨", "weight", 1000.0));
    graph
}

fn add_product(graph: &mut CostGraph, product_id: &str, uom_id: &str, price: f64) {
    graph.add_product(Product::new(product_id, product_id, uom_id, price));
}

fn make_bom(bom_id: &str, product_id: &str, qty: f64, uom_id: &str) -> Bom {
    Bom::new(bom_id, product_id, qty, uom_id)
}

fn compute(
    graph: &CostGraph,
    bom: &Bom,
    target_id: &str,
    include_operations: bool,
) -> CostTotals {
    let aggregator = CostAggregator::new(include_operations);
    let mut run = CalcRun::new();
    let target = graph.product(target_id).unwrap().clone();
    aggregator
        .compute_cost(graph, Some(bom), &mut run, &HashSet::new(), false, 0, &target)
        .unwrap()
}

// ==========================================
// 场景测试
// ==========================================

#[test]
fn test_scenario_1_absent_bom_returns_zero() {
    let mut graph = create_test_graph();
    add_product(&mut graph, "P1", "unit", 0.0);
    let target = graph.product("P1").unwrap().clone();

    let aggregator = CostAggregator::new(true);
    let mut run = CalcRun::new();
    let totals = aggregator
        .compute_cost(&graph, None, &mut run, &HashSet::new(), false, 0, &target)
        .unwrap();
    assert_eq!(totals, CostTotals::ZERO);
}

#[test]
fn test_scenario_2_empty_bom_returns_zero() {
    let mut graph = create_test_graph();
    add_product(&mut graph, "P1", "unit", 0.0);
    let bom = make_bom("B1", "P1", 1.0, "unit");
    graph.add_bom(bom.clone());

    let totals = compute(&graph, &bom, "P1", true);
    assert_eq!(totals, CostTotals::ZERO);
}

#[test]
fn test_scenario_3_single_raw_material_line() {
    let mut graph = create_test_graph();
    add_product(&mut graph, "P1", "unit", 0.0);
    add_product(&mut graph, "R1", "kg", 7.5);

    let mut bom = make_bom("B1", "P1", 1.0, "unit");
    bom.lines.push(BomLine::new("R1", 4.0, "kg"));
    graph.add_bom(bom.clone());

    let totals = compute(&graph, &bom, "P1", true);
    // 材料 = 4 kg × 7.5 元/kg
    assert!((totals.material - 30.0).abs() < 1e-9);
    assert_eq!(totals.operation, 0.0);
}

#[test]
fn test_scenario_4_operation_cost_per_minute() {
    let mut graph = create_test_graph();
    add_product(&mut graph, "P1", "unit", 0.0);

    let mut bom = make_bom("B1", "P1", 1.0, "unit");
    bom.operations.push(Operation::new("冲压", "WC-01", 30.0, 120.0));
    graph.add_bom(bom.clone());

    let totals = compute(&graph, &bom, "P1", true);
    // 30 分钟 × (120/60) = 60 元
    assert!((totals.operation - 60.0).abs() < 1e-9);
    assert!((totals.duration_minutes - 30.0).abs() < 1e-9);

    // 不计工序时归零
    let totals = compute(&graph, &bom, "P1", false);
    assert_eq!(totals.operation, 0.0);
    assert_eq!(totals.duration_minutes, 0.0);
}

#[test]
fn test_scenario_5_two_level_quantity_ratio() {
    // P 的 BOM 产出 5，消耗 10 件 C；C 的 BOM 产出 1，消耗 3 kg R（10 元/kg）
    // C 单批成本 30，比例 10/1 → 父级材料成本 300
    let mut graph = create_test_graph();
    add_product(&mut graph, "P", "unit", 0.0);
    add_product(&mut graph, "C", "unit", 0.0);
    add_product(&mut graph, "R", "kg", 10.0);

    let mut parent = make_bom("B-P", "P", 5.0, "unit");
    parent.lines.push(BomLine::new("C", 10.0, "unit"));
    graph.add_bom(parent.clone());

    let mut child = make_bom("B-C", "C", 1.0, "unit");
    child.lines.push(BomLine::new("R", 3.0, "kg"));
    graph.add_bom(child);

    let totals = compute(&graph, &parent, "P", true);
    assert!((totals.material - 300.0).abs() < 1e-9);
}

#[test]
fn test_scenario_6_deterministic_repeat() {
    let mut graph = create_test_graph();
    add_product(&mut graph, "P", "unit", 0.0);
    add_product(&mut graph, "C", "unit", 0.0);
    add_product(&mut graph, "R", "kg", 2.5);

    let mut parent = make_bom("B-P", "P", 2.0, "unit");
    parent.lines.push(BomLine::new("C", 4.0, "unit"));
    graph.add_bom(parent.clone());

    let mut child = make_bom("B-C", "C", 1.0, "unit");
    child.lines.push(BomLine::new("R", 2.0, "kg"));
    child.operations.push(Operation::new("焊接", "WC-02", 10.0, 60.0));
    graph.add_bom(child);

    let first = compute(&graph, &parent, "P", true);
    let second = compute(&graph, &parent, "P", true);
    assert_eq!(first, second);
}

#[test]
fn test_scenario_7_self_cycle_finite() {
    // P 的 BOM 直接包含 P 自己: 子树归零，不得无限递归
    let mut graph = create_test_graph();
    add_product(&mut graph, "P", "unit", 0.0);
    add_product(&mut graph, "R", "kg", 5.0);

    let mut bom = make_bom("B-P", "P", 1.0, "unit");
    bom.lines.push(BomLine::new("R", 2.0, "kg"));
    bom.lines.push(BomLine::new("P", 1.0, "unit"));
    graph.add_bom(bom.clone());

    let totals = compute(&graph, &bom, "P", true);
    // 原材料正常计入，循环分支按零计
    assert!((totals.material - 10.0).abs() < 1e-9);
    assert!(totals.material.is_finite());
}

#[test]
fn test_scenario_8_indirect_cycle_finite() {
    // P → C → P 间接循环
    let mut graph = create_test_graph();
    add_product(&mut graph, "P", "unit", 0.0);
    add_product(&mut graph, "C", "unit", 0.0);
    add_product(&mut graph, "R", "kg", 4.0);

    let mut parent = make_bom("B-P", "P", 1.0, "unit");
    parent.lines.push(BomLine::new("C", 1.0, "unit"));
    graph.add_bom(parent.clone());

    let mut child = make_bom("B-C", "C", 1.0, "unit");
    child.lines.push(BomLine::new("R", 1.0, "kg"));
    child.lines.push(BomLine::new("P", 1.0, "unit"));
    graph.add_bom(child);

    let totals = compute(&graph, &parent, "P", true);
    assert!((totals.material - 4.0).abs() < 1e-9);
}

#[test]
fn test_scenario_9_sibling_branches_not_blocked() {
    // 两个兄弟行使用同一个子装配 S: visited 按分支复制，第二个分支不被屏蔽
    let mut graph = create_test_graph();
    add_product(&mut graph, "P", "unit", 0.0);
    add_product(&mut graph, "S", "unit", 0.0);
    add_product(&mut graph, "R", "kg", 3.0);

    let mut parent = make_bom("B-P", "P", 1.0, "unit");
    parent.lines.push(BomLine::new("S", 1.0, "unit"));
    parent.lines.push(BomLine::new("S", 2.0, "unit"));
    graph.add_bom(parent.clone());

    let mut sub = make_bom("B-S", "S", 1.0, "unit");
    sub.lines.push(BomLine::new("R", 1.0, "kg"));
    graph.add_bom(sub);

    let totals = compute(&graph, &parent, "P", true);
    // 第一行 1×3 + 第二行 2×3 = 9
    assert!((totals.material - 9.0).abs() < 1e-9);
}

#[test]
fn test_scenario_10_snapshot_substitution_skips_recursion() {
    // C 有已核算快照 (单件成本 12): 父级材料 = 数量 × 12，
    // 且无论 C 的 BOM 是否仍可解析结果一致
    let mut graph = create_test_graph();
    add_product(&mut graph, "P", "unit", 0.0);
    add_product(&mut graph, "C", "unit", 0.0);
    add_product(&mut graph, "R", "kg", 999.0); // 若递归发生会产生完全不同的数字

    let mut snapshot = CostSnapshot::new("S-C", "CALC/001");
    snapshot.total_cost = 24.0;
    graph.register_snapshot(&snapshot, "C", Some(2.0), Some("unit".to_string()));

    let mut parent = make_bom("B-P", "P", 1.0, "unit");
    parent.lines.push(BomLine::new("C", 5.0, "unit"));
    graph.add_bom(parent.clone());

    // 情形 A: C 的 BOM 存在
    let mut child = make_bom("B-C", "C", 2.0, "unit");
    child.lines.push(BomLine::new("R", 1.0, "kg"));
    let mut graph_with_child = create_test_graph();
    add_product(&mut graph_with_child, "P", "unit", 0.0);
    add_product(&mut graph_with_child, "C", "unit", 0.0);
    add_product(&mut graph_with_child, "R", "kg", 999.0);
    graph_with_child.register_snapshot(&snapshot, "C", Some(2.0), Some("unit".to_string()));
    graph_with_child.add_bom(parent.clone());
    graph_with_child.add_bom(child);

    let with_child = compute(&graph_with_child, &parent, "P", true);
    // 情形 B: C 的 BOM 不存在
    let without_child = compute(&graph, &parent, "P", true);

    assert!((with_child.material - 60.0).abs() < 1e-9); // 5 × (24/2)
    assert_eq!(with_child.material, without_child.material);
}

#[test]
fn test_scenario_11_snapshot_substitution_uom_conversion() {
    // 快照 BOM 按吨计价，行按千克领用: 单价需换算后再乘行数量
    let mut graph = create_test_graph();
    add_product(&mut graph, "P", "unit", 0.0);
    add_product(&mut graph, "C", "kg", 0.0);

    let mut snapshot = CostSnapshot::new("S-C", "CALC/002");
    snapshot.total_cost = 3000.0; // 1 吨成本 3000 → 千克价 3
    graph.register_snapshot(&snapshot, "C", Some(1.0), Some("t".to_string()));

    let mut parent = make_bom("B-P", "P", 1.0, "unit");
    parent.lines.push(BomLine::new("C", 500.0, "kg"));
    graph.add_bom(parent.clone());

    let totals = compute(&graph, &parent, "P", true);
    // 500 kg × 3 元/kg = 1500
    assert!((totals.material - 1500.0).abs() < 1e-9);
}

#[test]
fn test_scenario_12_skip_rules_per_target_product() {
    let mut graph = create_test_graph();
    add_product(&mut graph, "P-A", "unit", 0.0);
    add_product(&mut graph, "P-B", "unit", 0.0);
    add_product(&mut graph, "R", "kg", 10.0);

    let mut bom = make_bom("B-SHARED", "P-A", 1.0, "unit");
    let mut line = BomLine::new("R", 2.0, "kg");
    line.skip_for_products.push("P-A".to_string());
    bom.lines.push(line);
    let mut op = Operation::new("打磨", "WC-03", 15.0, 60.0);
    op.skip_for_products.push("P-B".to_string());
    bom.operations.push(op);
    graph.add_bom(bom.clone());

    // 对 P-A: 材料行被跳过，只剩工序
    let for_a = compute(&graph, &bom, "P-A", true);
    assert_eq!(for_a.material, 0.0);
    assert!((for_a.operation - 15.0).abs() < 1e-9);

    // 对 P-B: 工序被跳过，只剩材料
    let for_b = compute(&graph, &bom, "P-B", true);
    assert!((for_b.material - 20.0).abs() < 1e-9);
    assert_eq!(for_b.operation, 0.0);
}

#[test]
fn test_scenario_13_line_uom_conversion_to_component_uom() {
    // 行按打领用，组件按件计价: 2 打 = 24 件
    let mut graph = create_test_graph();
    add_product(&mut graph, "P", "unit", 0.0);
    add_product(&mut graph, "R", "unit", 1.5);

    let mut bom = make_bom("B-P", "P", 1.0, "unit");
    bom.lines.push(BomLine::new("R", 2.0, "dozen"));
    graph.add_bom(bom.clone());

    let totals = compute(&graph, &bom, "P", true);
    assert!((totals.material - 36.0).abs() < 1e-9);
}

#[test]
fn test_scenario_14_incompatible_uom_fails_loudly() {
    // 行单位(kg)与组件单位(件)不兼容: 必须报错而不是带错数继续
    let mut graph = create_test_graph();
    add_product(&mut graph, "P", "unit", 0.0);
    add_product(&mut graph, "R", "unit", 1.0);

    let mut bom = make_bom("B-P", "P", 1.0, "unit");
    bom.lines.push(BomLine::new("R", 2.0, "kg"));
    graph.add_bom(bom.clone());

    let aggregator = CostAggregator::new(true);
    let mut run = CalcRun::new();
    let target = graph.product("P").unwrap().clone();
    let result =
        aggregator.compute_cost(&graph, Some(&bom), &mut run, &HashSet::new(), false, 0, &target);
    assert!(result.is_err());
}

#[test]
fn test_scenario_15_zero_output_qty_divides_as_one() {
    let mut graph = create_test_graph();
    add_product(&mut graph, "P", "unit", 0.0);
    add_product(&mut graph, "C", "unit", 0.0);
    add_product(&mut graph, "R", "kg", 10.0);

    let mut parent = make_bom("B-P", "P", 1.0, "unit");
    parent.lines.push(BomLine::new("C", 3.0, "unit"));
    graph.add_bom(parent.clone());

    // 子 BOM 产出数量为 0: 按 1.0 作分母
    let mut child = make_bom("B-C", "C", 0.0, "unit");
    child.lines.push(BomLine::new("R", 2.0, "kg"));
    graph.add_bom(child);

    let totals = compute(&graph, &parent, "P", true);
    // 子批成本 20，比例 3/1 → 60
    assert!((totals.material - 60.0).abs() < 1e-9);
}

#[test]
fn test_scenario_16_detail_lines_emitted() {
    let mut graph = create_test_graph();
    add_product(&mut graph, "P", "unit", 0.0);
    add_product(&mut graph, "R", "kg", 10.0);

    let mut bom = make_bom("B-P", "P", 2.0, "unit");
    bom.lines.push(BomLine::new("R", 4.0, "kg"));
    bom.operations.push(Operation::new("喷涂", "WC-04", 20.0, 90.0));
    graph.add_bom(bom.clone());

    let aggregator = CostAggregator::new(true);
    let mut run = CalcRun::new();
    let target = graph.product("P").unwrap().clone();
    aggregator
        .compute_cost(&graph, Some(&bom), &mut run, &HashSet::new(), true, 0, &target)
        .unwrap();

    let lines = run.take_detail_lines();
    assert_eq!(lines.len(), 2);

    let op_line = lines.iter().find(|l| l.cost_type == CostType::Operation).unwrap();
    assert_eq!(op_line.bom_level, 0);
    assert!((op_line.duration - 20.0).abs() < 1e-9);
    assert!((op_line.cost - 30.0).abs() < 1e-9); // 20 × 90/60

    let mat_line = lines.iter().find(|l| l.cost_type == CostType::Material).unwrap();
    assert_eq!(mat_line.product_id.as_deref(), Some("R"));
    assert!((mat_line.cost - 40.0).abs() < 1e-9);
    assert!((mat_line.bom_qty - 2.0).abs() < 1e-9);
}

#[test]
fn test_scenario_17_ratio_conversion_orders_agree() {
    // 同一结构分别用 “换算比例分母” 与 “换算单价” 两种口径应数值一致:
    // 子 BOM 产出 1 t，行领用 500 kg，子批材料成本 3000
    let mut graph = create_test_graph();
    add_product(&mut graph, "P", "unit", 0.0);
    add_product(&mut graph, "C", "kg", 0.0);
    add_product(&mut graph, "R", "kg", 3.0);

    let mut parent = make_bom("B-P", "P", 1.0, "unit");
    parent.lines.push(BomLine::new("C", 500.0, "kg"));
    graph.add_bom(parent.clone());

    let mut child = make_bom("B-C", "C", 1.0, "t");
    child.lines.push(BomLine::new("R", 1000.0, "kg"));
    graph.add_bom(child);

    // 口径一: 递归 + 比例分母换算 (500 / 1000kg = 0.5 → 3000 × 0.5)
    let recursive = compute(&graph, &parent, "P", true);
    assert!((recursive.material - 1500.0).abs() < 1e-9);

    // 口径二: 快照替换 + 单价换算 (3000/1 t → 3 元/kg × 500)
    let mut snapshot = CostSnapshot::new("S-C", "CALC/003");
    snapshot.total_cost = 3000.0;
    graph.register_snapshot(&snapshot, "C", Some(1.0), Some("t".to_string()));
    let substituted = compute(&graph, &parent, "P", true);

    assert!((recursive.material - substituted.material).abs() < 1e-6);
}
