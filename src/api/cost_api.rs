// ==========================================
// BOM 成本核算系统 - 成本核算 API
// ==========================================
// 职责: 组装数据视图 -> 调引擎 -> 持久化结果
// 红线: 引擎只读数据视图; 写回只经仓储层
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::ConfigManager;
use crate::domain::calculator::{CostLine, CostSnapshot, ProductCostLine};
use crate::engine::graph::CostGraph;
use crate::engine::orchestrator::{BatchCalculator, BatchResult};
use crate::engine::price_override::PriceOverrideSession;
use crate::i18n::t_with_args;
use crate::repository::{BomRepository, ProductRepository, SnapshotRepository, UomRepository};
use rusqlite::Connection;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{info, instrument};
use uuid::Uuid;

// ==========================================
// CostApi - 成本核算 API
// ==========================================

/// 成本核算 API
///
/// 职责:
/// 1. 从仓储层组装只读数据视图（含已核算快照注册）
/// 2. 批量核算 / 明细重算 / 价格覆写会话
/// 3. 核算结果持久化
pub struct CostApi {
    uom_repo: UomRepository,
    product_repo: ProductRepository,
    bom_repo: BomRepository,
    snapshot_repo: SnapshotRepository,
    config: ConfigManager,
    calculator: BatchCalculator,
}

impl CostApi {
    /// 创建新的 CostApi 实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> ApiResult<Self> {
        let config = ConfigManager::from_connection(conn.clone())
            .map_err(|e| ApiError::InternalError(e.to_string()))?;

        Ok(Self {
            uom_repo: UomRepository::from_connection(conn.clone()),
            product_repo: ProductRepository::from_connection(conn.clone()),
            bom_repo: BomRepository::from_connection(conn.clone()),
            snapshot_repo: SnapshotRepository::from_connection(conn),
            config,
            calculator: BatchCalculator::new(),
        })
    }

    /// 组装成本核算数据视图
    ///
    /// 含全部单位/产品/BOM，并为每个已核算过的产品注册替换成本。
    pub fn load_graph(&self) -> ApiResult<CostGraph> {
        let mut graph = CostGraph::new();

        for uom in self.uom_repo.find_all()? {
            graph.add_uom(uom);
        }

        let products = self.product_repo.find_all()?;
        for bom in self.bom_repo.find_all()? {
            graph.add_bom(bom);
        }

        // 已核算产品的替换成本: 取最近一次已核算产品行。
        // 只有制造件参与替换——外购/原材料行必须始终按当前标准价计价，
        // 否则一次批量核算就会把它们的价格冻结在快照上。
        for product in &products {
            if let Some((snapshot, line)) = self
                .snapshot_repo
                .find_latest_calculated_for_product(&product.product_id)?
            {
                if !line.is_manufacture {
                    continue;
                }
                let (bom_qty, bom_uom_id) = match line.bom_id.as_deref() {
                    Some(bom_id) => match graph.bom_by_id(bom_id) {
                        Ok(bom) => (Some(bom.product_qty), Some(bom.uom_id.clone())),
                        // 快照引用的 BOM 已删除: 替换仍生效，按总成本口径
                        Err(_) => (None, None),
                    },
                    None => (None, None),
                };
                graph.register_calculated_cost(
                    &snapshot.snapshot_id,
                    &product.product_id,
                    line.unit_cost(bom_qty),
                    bom_uom_id,
                );
            }
        }

        for product in products {
            graph.add_product(product);
        }

        Ok(graph)
    }

    /// 批量核算并持久化
    #[instrument(skip(self, product_ids), fields(product_count = product_ids.len()))]
    pub fn run_batch(
        &self,
        name: &str,
        product_ids: &[String],
    ) -> ApiResult<(CostSnapshot, BatchResult)> {
        self.run_batch_with_overrides(name, product_ids, HashMap::new())
    }

    /// 批量核算（带本轮价格覆写）并持久化
    ///
    /// 覆写只对本轮核算生效，不回写产品主档。
    pub fn run_batch_with_overrides(
        &self,
        name: &str,
        product_ids: &[String],
        price_overrides: HashMap<String, f64>,
    ) -> ApiResult<(CostSnapshot, BatchResult)> {
        let mut graph = self.load_graph()?;
        graph.set_price_overrides(price_overrides);

        let mut snapshot = CostSnapshot::new(&Uuid::new_v4().to_string(), name);
        snapshot.include_operations = self
            .config
            .get_include_operations()
            .map_err(|e| ApiError::InternalError(e.to_string()))?;

        for product_id in product_ids {
            // 产品必须存在
            graph.product(product_id)?;

            let mut line = ProductCostLine::new(product_id);
            if let Some(bom) = graph.find_bom(product_id, None) {
                line.is_manufacture = true;
                line.bom_id = Some(bom.bom_id.clone());
            }
            snapshot.product_lines.push(line);
        }

        let result = self.calculator.calculate_all(&graph, &mut snapshot)?;
        self.snapshot_repo.save(&snapshot)?;

        info!(
            snapshot_id = %snapshot.snapshot_id,
            total_cost = result.total_cost,
            "{}",
            t_with_args("calc.batch_done", &[("count", &result.product_count.to_string())])
        );
        Ok((snapshot, result))
    }

    /// 重算某产品的成本明细行并写回快照
    pub fn compute_details(
        &self,
        snapshot_id: &str,
        product_id: &str,
    ) -> ApiResult<Vec<CostLine>> {
        let graph = self.load_graph()?;
        let mut snapshot = self
            .snapshot_repo
            .find_by_id(snapshot_id)?
            .ok_or_else(|| ApiError::NotFound(format!("cost_snapshot (id={})", snapshot_id)))?;

        let bom_id = snapshot
            .product_lines
            .iter()
            .find(|l| l.product_id == product_id)
            .and_then(|l| l.bom_id.clone())
            .or_else(|| graph.find_bom(product_id, None).map(|b| b.bom_id.clone()))
            .ok_or_else(|| {
                ApiError::InvalidInput(format!("产品无可用 BOM，无法生成明细: {}", product_id))
            })?;

        let lines =
            self.calculator
                .compute_details(&graph, &mut snapshot, product_id, &bom_id)?;
        self.snapshot_repo.save(&snapshot)?;
        Ok(lines)
    }

    /// 查询快照（含明细）
    pub fn get_snapshot(&self, snapshot_id: &str) -> ApiResult<CostSnapshot> {
        self.snapshot_repo
            .find_by_id(snapshot_id)?
            .ok_or_else(|| ApiError::NotFound(format!("cost_snapshot (id={})", snapshot_id)))
    }

    // ===== 价格覆写 =====

    /// 为产品的 BOM 构建价格覆写会话（整树展平后的原材料清单）
    pub fn build_price_override_session(
        &self,
        product_id: &str,
    ) -> ApiResult<PriceOverrideSession> {
        let graph = self.load_graph()?;
        let bom = graph
            .find_bom(product_id, None)
            .ok_or_else(|| ApiError::NotFound(format!("bom for product {}", product_id)))?;

        let depth = self
            .config
            .get_flatten_depth_limit()
            .map_err(|e| ApiError::InternalError(e.to_string()))?;

        let session = PriceOverrideSession::build(&graph, bom, depth)?;
        Ok(session)
    }

    /// 将会话中修改过的价格落库到产品主档
    pub fn apply_price_overrides(&self, session: &PriceOverrideSession) -> ApiResult<usize> {
        let changed = session.changed_prices();
        for (product_id, new_price) in &changed {
            self.product_repo.update_standard_price(product_id, *new_price)?;
        }

        info!(
            "{}",
            t_with_args("price_override.applied", &[("count", &changed.len().to_string())])
        );
        Ok(changed.len())
    }
}
