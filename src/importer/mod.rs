// ==========================================
// BOM 成本核算系统 - 导入模块
// ==========================================
// 职责: 伙伴余额 CSV 导入（解析 -> 预览 -> 提交）
// ==========================================

pub mod balance_reset;
pub mod csv_parser;
pub mod error;

pub use balance_reset::{
    BalanceProvider, BalanceResetService, LedgerPoster, PartnerDirectory, ResetOptions,
    ResetPreview, ResetPreviewLine,
};
pub use csv_parser::{parse_balance_csv, CsvBalanceRow, CsvParseOutcome};
pub use error::{ImportError, ImportResult};
