// ==========================================
// BOM 成本核算系统 - 伙伴余额调整服务
// ==========================================
// 流程: CSV 解析 -> 伙伴匹配 -> 预览 -> 提交过账
// 红线: 凭证过账能力在外部系统，本服务只经由 LedgerPoster 调用并记录凭证号
// ==========================================

use crate::domain::partner::{BalanceReset, BalanceResetLine, Partner};
use crate::domain::types::{AccountType, PartnerLookup, ResetState};
use crate::importer::csv_parser::parse_balance_csv;
use crate::importer::error::{ImportError, ImportResult};
use crate::repository::RepositoryResult;
use chrono::NaiveDate;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// 调整金额低于此阈值视为零，不生成调整行
const ZERO_ADJUSTMENT_EPSILON: f64 = 1e-6;

// ==========================================
// 外部协作接口
// ==========================================

/// 伙伴目录: 按 id / 业务编码 / 名称查找
pub trait PartnerDirectory {
    fn find_by_id(&self, partner_id: &str) -> RepositoryResult<Option<Partner>>;
    fn find_by_ref(&self, partner_ref: &str) -> RepositoryResult<Option<Partner>>;
    fn find_by_name(&self, name: &str) -> RepositoryResult<Option<Partner>>;
}

/// 余额来源: 截至基准日的应收/应付余额
pub trait BalanceProvider {
    fn balance_as_of(
        &self,
        partner_id: &str,
        account_type: AccountType,
        as_of: NaiveDate,
    ) -> ImportResult<f64>;
}

/// 凭证过账: 外部系统创建并过账一笔调整，返回凭证标识
pub trait LedgerPoster {
    fn post_adjustment(
        &self,
        partner: &Partner,
        account_type: AccountType,
        amount: f64,
        as_of: NaiveDate,
        memo: &str,
    ) -> ImportResult<String>;
}

// ==========================================
// 预览模型
// ==========================================

/// 调整选项
#[derive(Debug, Clone)]
pub struct ResetOptions {
    pub delimiter: u8,
    pub lookup: PartnerLookup,
    pub reset_date: NaiveDate,
}

/// 预览行: 已匹配伙伴 + 当前余额 + 目标余额
#[derive(Debug, Clone)]
pub struct ResetPreviewLine {
    pub partner: Partner,
    pub account_type: AccountType,
    pub current_balance: f64,
    pub new_balance: f64,
}

impl ResetPreviewLine {
    /// 调整金额 = 目标余额 - 当前余额
    pub fn adjustment(&self) -> f64 {
        self.new_balance - self.current_balance
    }
}

/// CSV 导入预览
#[derive(Debug, Clone)]
pub struct ResetPreview {
    pub reset_date: NaiveDate,
    pub lines: Vec<ResetPreviewLine>,
    pub skipped_rows: usize, // 无法解析或未匹配到伙伴的行数
}

impl ResetPreview {
    /// 调整总额
    pub fn total_adjustment(&self) -> f64 {
        self.lines.iter().map(|l| l.adjustment()).sum()
    }
}

// ==========================================
// BalanceResetService - 余额调整服务
// ==========================================
pub struct BalanceResetService<'a> {
    directory: &'a dyn PartnerDirectory,
}

impl<'a> BalanceResetService<'a> {
    pub fn new(directory: &'a dyn PartnerDirectory) -> Self {
        Self { directory }
    }

    /// 解析 CSV 并生成预览
    ///
    /// 无法匹配伙伴的行跳过并计数，整体解析不中断。
    #[instrument(skip(self, csv_bytes, balances))]
    pub fn preview(
        &self,
        csv_bytes: &[u8],
        options: &ResetOptions,
        balances: &dyn BalanceProvider,
    ) -> ImportResult<ResetPreview> {
        let outcome = parse_balance_csv(csv_bytes, options.delimiter)?;

        let mut lines = Vec::new();
        let mut skipped_rows = outcome.skipped_rows;

        for row in outcome.rows {
            let partner = match self.lookup_partner(&row.partner_key, options.lookup)? {
                Some(p) => p,
                None => {
                    warn!(
                        row = row.row_no,
                        key = %row.partner_key,
                        lookup = %options.lookup,
                        "未匹配到伙伴，跳过"
                    );
                    skipped_rows += 1;
                    continue;
                }
            };

            let current_balance = balances.balance_as_of(
                &partner.partner_id,
                row.account_type,
                options.reset_date,
            )?;

            lines.push(ResetPreviewLine {
                partner,
                account_type: row.account_type,
                current_balance,
                new_balance: row.new_balance,
            });
        }

        info!(
            line_count = lines.len(),
            skipped_rows, "余额导入预览完成"
        );

        Ok(ResetPreview {
            reset_date: options.reset_date,
            lines,
            skipped_rows,
        })
    }

    /// 提交预览: 逐行过账非零调整并生成调整记录
    ///
    /// 零调整行跳过; 空预览拒绝提交。
    #[instrument(skip(self, preview, poster), fields(reset_date = %preview.reset_date))]
    pub fn commit(
        &self,
        preview: &ResetPreview,
        poster: &dyn LedgerPoster,
    ) -> ImportResult<BalanceReset> {
        if preview.lines.is_empty() {
            return Err(ImportError::EmptyPreview);
        }

        let reset_id = Uuid::new_v4().to_string();
        let name = format!("RESET/{}", preview.reset_date);
        let memo = format!("余额调整 {}", preview.reset_date);

        let mut reset_lines = Vec::new();
        for line in preview.lines.iter() {
            if line.adjustment().abs() < ZERO_ADJUSTMENT_EPSILON {
                continue;
            }

            let mut reset_line = BalanceResetLine {
                partner_id: line.partner.partner_id.clone(),
                account_type: line.account_type,
                current_balance: line.current_balance,
                new_balance: line.new_balance,
                state: ResetState::Draft,
                ledger_entry_id: None,
            };

            // 应付科目按记账惯例反号后过账
            let entry_id = poster.post_adjustment(
                &line.partner,
                line.account_type,
                reset_line.posting_amount(),
                preview.reset_date,
                &memo,
            )?;

            reset_line.ledger_entry_id = Some(entry_id);
            reset_line.state = ResetState::Done;
            reset_lines.push(reset_line);
        }

        if reset_lines.is_empty() {
            // 所有行均为零调整
            return Err(ImportError::EmptyPreview);
        }

        let reset = BalanceReset {
            reset_id,
            name,
            reset_date: preview.reset_date,
            state: ResetState::Done,
            lines: reset_lines,
        };

        info!(
            reset_id = %reset.reset_id,
            line_count = reset.lines.len(),
            total_adjustment = reset.total_adjustment(),
            "余额调整提交完成"
        );

        Ok(reset)
    }

    fn lookup_partner(
        &self,
        key: &str,
        lookup: PartnerLookup,
    ) -> ImportResult<Option<Partner>> {
        let found = match lookup {
            PartnerLookup::Id => self.directory.find_by_id(key)?,
            PartnerLookup::Ref => self.directory.find_by_ref(key)?,
            PartnerLookup::Name => self.directory.find_by_name(key)?,
        };
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    struct FakeDirectory {
        partners: Vec<Partner>,
    }

    impl PartnerDirectory for FakeDirectory {
        fn find_by_id(&self, partner_id: &str) -> RepositoryResult<Option<Partner>> {
            Ok(self.partners.iter().find(|p| p.partner_id == partner_id).cloned())
        }
        fn find_by_ref(&self, partner_ref: &str) -> RepositoryResult<Option<Partner>> {
            Ok(self
                .partners
                .iter()
                .find(|p| p.partner_ref.as_deref() == Some(partner_ref))
                .cloned())
        }
        fn find_by_name(&self, name: &str) -> RepositoryResult<Option<Partner>> {
            Ok(self
                .partners
                .iter()
                .find(|p| p.name.eq_ignore_ascii_case(name))
                .cloned())
        }
    }

    struct FakeBalances {
        balances: HashMap<(String, AccountType), f64>,
    }

    impl BalanceProvider for FakeBalances {
        fn balance_as_of(
            &self,
            partner_id: &str,
            account_type: AccountType,
            _as_of: NaiveDate,
        ) -> ImportResult<f64> {
            Ok(*self
                .balances
                .get(&(partner_id.to_string(), account_type))
                .unwrap_or(&0.0))
        }
    }

    #[derive(Default)]
    struct FakePoster {
        posted: RefCell<Vec<(String, AccountType, f64)>>,
    }

    impl LedgerPoster for FakePoster {
        fn post_adjustment(
            &self,
            partner: &Partner,
            account_type: AccountType,
            amount: f64,
            _as_of: NaiveDate,
            _memo: &str,
        ) -> ImportResult<String> {
            let mut posted = self.posted.borrow_mut();
            posted.push((partner.partner_id.clone(), account_type, amount));
            Ok(format!("ENTRY/{}", posted.len()))
        }
    }

    fn partner(id: &str, partner_ref: Option<&str>, name: &str) -> Partner {
        Partner {
            partner_id: id.to_string(),
            partner_ref: partner_ref.map(|s| s.to_string()),
            name: name.to_string(),
        }
    }

    fn setup() -> (FakeDirectory, FakeBalances) {
        let directory = FakeDirectory {
            partners: vec![
                partner("PT1", Some("A001"), "甲方贸易"),
                partner("PT2", Some("A002"), "乙方实业"),
            ],
        };
        let mut balances = HashMap::new();
        balances.insert(("PT1".to_string(), AccountType::Receivable), 100.0);
        balances.insert(("PT2".to_string(), AccountType::Payable), 80.0);
        (directory, FakeBalances { balances })
    }

    fn options(lookup: PartnerLookup) -> ResetOptions {
        ResetOptions {
            delimiter: b',',
            lookup,
            reset_date: NaiveDate::from_ymd_opt(2026, 6, 30).unwrap(),
        }
    }

    #[test]
    fn test_preview_matches_by_id() {
        let (directory, balances) = setup();
        let service = BalanceResetService::new(&directory);

        let csv = b"partner,new_balance\nPT1,40\nPT9,10\n";
        let preview = service.preview(csv, &options(PartnerLookup::Id), &balances).unwrap();

        assert_eq!(preview.lines.len(), 1);
        assert_eq!(preview.skipped_rows, 1);
        assert_eq!(preview.lines[0].partner.partner_id, "PT1");
        assert!((preview.lines[0].current_balance - 100.0).abs() < 1e-9);
        assert!((preview.lines[0].adjustment() + 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_preview_matches_by_ref_and_name() {
        let (directory, balances) = setup();
        let service = BalanceResetService::new(&directory);

        let csv = b"partner,new_balance\nA002,15\n";
        let preview = service.preview(csv, &options(PartnerLookup::Ref), &balances).unwrap();
        assert_eq!(preview.lines[0].partner.partner_id, "PT2");

        let csv = "partner,new_balance\n甲方贸易,55\n".as_bytes();
        let preview = service.preview(csv, &options(PartnerLookup::Name), &balances).unwrap();
        assert_eq!(preview.lines[0].partner.partner_id, "PT1");
    }

    #[test]
    fn test_commit_posts_non_zero_lines_with_sign() {
        let (directory, balances) = setup();
        let service = BalanceResetService::new(&directory);

        let csv = b"partner,new_balance,account_type\nPT1,40,receivable\nPT2,30,payable\n";
        let preview = service.preview(csv, &options(PartnerLookup::Id), &balances).unwrap();

        let poster = FakePoster::default();
        let reset = service.commit(&preview, &poster).unwrap();

        assert_eq!(reset.state, ResetState::Done);
        assert_eq!(reset.lines.len(), 2);
        assert!(reset.lines.iter().all(|l| l.ledger_entry_id.is_some()));
        assert!(reset.lines.iter().all(|l| l.state == ResetState::Done));

        let posted = poster.posted.borrow();
        // 应收: 40 - 100 = -60; 应付: (30 - 80) 反号 = +50
        assert!((posted[0].2 + 60.0).abs() < 1e-9);
        assert!((posted[1].2 - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_commit_skips_zero_adjustments() {
        let (directory, balances) = setup();
        let service = BalanceResetService::new(&directory);

        // PT1 应收当前 100，目标也是 100: 零调整
        let csv = b"partner,new_balance\nPT1,100\nPT2,5\n";
        let preview = service.preview(csv, &options(PartnerLookup::Id), &balances).unwrap();

        let poster = FakePoster::default();
        let reset = service.commit(&preview, &poster).unwrap();
        assert_eq!(reset.lines.len(), 1);
        assert_eq!(reset.lines[0].partner_id, "PT2");
    }

    #[test]
    fn test_commit_refuses_empty_preview() {
        let (directory, _balances) = setup();
        let service = BalanceResetService::new(&directory);

        let preview = ResetPreview {
            reset_date: NaiveDate::from_ymd_opt(2026, 6, 30).unwrap(),
            lines: Vec::new(),
            skipped_rows: 3,
        };
        let poster = FakePoster::default();
        let err = service.commit(&preview, &poster).unwrap_err();
        assert!(matches!(err, ImportError::EmptyPreview));
        assert!(poster.posted.borrow().is_empty());
    }

    #[test]
    fn test_commit_all_zero_refused() {
        let (directory, balances) = setup();
        let service = BalanceResetService::new(&directory);

        let csv = b"partner,new_balance\nPT1,100\n";
        let preview = service.preview(csv, &options(PartnerLookup::Id), &balances).unwrap();

        let poster = FakePoster::default();
        let err = service.commit(&preview, &poster).unwrap_err();
        assert!(matches!(err, ImportError::EmptyPreview));
    }
}
