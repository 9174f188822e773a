// ==========================================
// BOM 成本核算系统 - 仓储层
// ==========================================
// 红线: Repository 不含业务逻辑，只负责数据访问
// ==========================================

pub mod bom_repo;
pub mod error;
pub mod partner_repo;
pub mod product_repo;
pub mod snapshot_repo;

pub use bom_repo::BomRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use partner_repo::{BalanceResetRepository, PartnerRepository};
pub use product_repo::{ProductRepository, UomRepository};
pub use snapshot_repo::SnapshotRepository;
