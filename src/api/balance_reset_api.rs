// ==========================================
// BOM 成本核算系统 - 余额调整 API
// ==========================================
// 职责: 文件读取 -> 预览 -> 提交 -> 持久化
// 红线: 余额来源与凭证过账经由外部接口注入
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::ConfigManager;
use crate::domain::partner::BalanceReset;
use crate::i18n::t_with_args;
use crate::importer::error::ImportError;
use crate::importer::{
    BalanceProvider, BalanceResetService, LedgerPoster, ResetOptions, ResetPreview,
};
use crate::repository::{BalanceResetRepository, PartnerRepository};
use chrono::NaiveDate;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{info, instrument};

// ==========================================
// BalanceResetApi - 余额调整 API
// ==========================================
pub struct BalanceResetApi {
    partner_repo: PartnerRepository,
    reset_repo: BalanceResetRepository,
    config: ConfigManager,
}

impl BalanceResetApi {
    /// 创建新的 BalanceResetApi 实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> ApiResult<Self> {
        let config = ConfigManager::from_connection(conn.clone())
            .map_err(|e| ApiError::InternalError(e.to_string()))?;

        Ok(Self {
            partner_repo: PartnerRepository::from_connection(conn.clone()),
            reset_repo: BalanceResetRepository::from_connection(conn),
            config,
        })
    }

    /// 按配置组装导入选项（分隔符与伙伴匹配方式来自 config_kv）
    fn reset_options(&self, reset_date: NaiveDate) -> ApiResult<ResetOptions> {
        let delimiter = self
            .config
            .get_csv_delimiter()
            .map_err(|e| ApiError::InternalError(e.to_string()))?;
        let lookup = self
            .config
            .get_partner_lookup()
            .map_err(|e| ApiError::InternalError(e.to_string()))?;

        Ok(ResetOptions {
            delimiter,
            lookup,
            reset_date,
        })
    }

    /// 从 CSV 文件生成预览
    #[instrument(skip(self, balances), fields(path = %path))]
    pub fn preview_file(
        &self,
        path: &str,
        reset_date: NaiveDate,
        balances: &dyn BalanceProvider,
    ) -> ApiResult<ResetPreview> {
        if !Path::new(path).exists() {
            return Err(ImportError::FileNotFound(path.to_string()).into());
        }
        let bytes = std::fs::read(path).map_err(ImportError::from)?;
        self.preview_bytes(&bytes, reset_date, balances)
    }

    /// 从内存字节流生成预览
    pub fn preview_bytes(
        &self,
        csv_bytes: &[u8],
        reset_date: NaiveDate,
        balances: &dyn BalanceProvider,
    ) -> ApiResult<ResetPreview> {
        let options = self.reset_options(reset_date)?;
        let service = BalanceResetService::new(&self.partner_repo);
        let preview = service.preview(csv_bytes, &options, balances)?;

        info!(
            skipped_rows = preview.skipped_rows,
            "{}",
            t_with_args(
                "import.preview_done",
                &[("count", &preview.lines.len().to_string())]
            )
        );
        Ok(preview)
    }

    /// 提交预览: 过账非零调整并持久化调整记录
    pub fn commit(
        &self,
        preview: &ResetPreview,
        poster: &dyn LedgerPoster,
    ) -> ApiResult<BalanceReset> {
        let service = BalanceResetService::new(&self.partner_repo);
        let reset = service.commit(preview, poster)?;
        self.reset_repo.save(&reset)?;

        info!(
            reset_id = %reset.reset_id,
            "{}",
            t_with_args("import.commit_done", &[("count", &reset.lines.len().to_string())])
        );
        Ok(reset)
    }

    /// 查询调整记录（含行）
    pub fn get_reset(&self, reset_id: &str) -> ApiResult<BalanceReset> {
        self.reset_repo
            .find_by_id(reset_id)?
            .ok_or_else(|| ApiError::NotFound(format!("balance_reset (id={})", reset_id)))
    }
}
