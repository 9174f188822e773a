// ==========================================
// BOM 成本核算系统 - 余额 CSV 解析
// ==========================================
// 职责: 字节流 -> 结构化导入行
// 约定: 列名不区分大小写; 行长度允许不一致
// ==========================================

use crate::domain::types::AccountType;
use crate::importer::error::{ImportError, ImportResult};
use csv::ReaderBuilder;
use tracing::warn;

/// 解析后的一行余额导入数据
#[derive(Debug, Clone)]
pub struct CsvBalanceRow {
    pub row_no: usize,       // 数据行号（从 1 开始，不含表头）
    pub partner_key: String, // 伙伴匹配键（id/编码/名称，按配置解释）
    pub new_balance: f64,    // 目标余额
    pub account_type: AccountType,
}

/// 解析结果: 有效行 + 被跳过的行数
#[derive(Debug, Default)]
pub struct CsvParseOutcome {
    pub rows: Vec<CsvBalanceRow>,
    pub skipped_rows: usize,
}

/// 解析余额导入 CSV
///
/// 必需列: partner, new_balance; 可选列: account_type（缺省应收）。
/// 无法解析的行跳过并计数，不中断整体解析。
pub fn parse_balance_csv(csv_bytes: &[u8], delimiter: u8) -> ImportResult<CsvParseOutcome> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true) // 允许行长度不一致
        .delimiter(delimiter)
        .from_reader(csv_bytes);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();

    let partner_idx = headers
        .iter()
        .position(|h| h == "partner")
        .ok_or_else(|| ImportError::MissingColumn("partner".to_string()))?;
    let balance_idx = headers
        .iter()
        .position(|h| h == "new_balance")
        .ok_or_else(|| ImportError::MissingColumn("new_balance".to_string()))?;
    let account_idx = headers.iter().position(|h| h == "account_type");

    let mut outcome = CsvParseOutcome::default();

    for (i, record) in reader.records().enumerate() {
        let row_no = i + 1;
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                warn!(row = row_no, error = %e, "CSV 行解析失败，跳过");
                outcome.skipped_rows += 1;
                continue;
            }
        };

        let partner_key = record
            .get(partner_idx)
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
        if partner_key.is_empty() {
            warn!(row = row_no, "伙伴列为空，跳过");
            outcome.skipped_rows += 1;
            continue;
        }

        let raw_balance = record.get(balance_idx).map(|s| s.trim()).unwrap_or("");
        let new_balance = match raw_balance.parse::<f64>() {
            Ok(v) if v.is_finite() => v,
            _ => {
                warn!(row = row_no, value = raw_balance, "余额列无法解析，跳过");
                outcome.skipped_rows += 1;
                continue;
            }
        };

        let account_type = account_idx
            .and_then(|idx| record.get(idx))
            .map(AccountType::parse_csv_value)
            .unwrap_or(AccountType::Receivable);

        outcome.rows.push(CsvBalanceRow {
            row_no,
            partner_key,
            new_balance,
            account_type,
        });
    }

    Ok(outcome)
}
