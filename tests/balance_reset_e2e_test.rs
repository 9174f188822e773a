// ==========================================
// BalanceResetApi 端到端测试
// ==========================================
// 流程: 建库 -> 伙伴入库 -> CSV 预览 -> 提交过账 -> 调整记录落库
// ==========================================


use bom_costing::api::{ApiError, BalanceResetApi};
use bom_costing::config::{config_keys, ConfigManager};
use bom_costing::domain::partner::Partner;
use bom_costing::domain::types::{AccountType, ResetState};
use bom_costing::importer::{BalanceProvider, ImportResult, LedgerPoster};
use bom_costing::repository::PartnerRepository;
use chrono::NaiveDate;
use rusqlite::Connection;
use std::cell::RefCell;
use std::io::Write;
use std::sync::{Arc, Mutex};
use test_helpers::{create_test_db, open_test_connection};

// ==========================================
// 外部系统替身
// ==========================================

/// 固定余额表: (伙伴, 科目) -> 余额, 未配置视为 0
struct FixedBalances {
    entries: Vec<(String, AccountType, f64)>,
}

impl BalanceProvider for FixedBalances {
    fn balance_as_of(
        &self,
        partner_id: &str,
        account_type: AccountType,
        _as_of: NaiveDate,
    ) -> ImportResult<f64> {
        Ok(self
            .entries
            .iter()
            .find(|(p, a, _)| p == partner_id && *a == account_type)
            .map(|(_, _, b)| *b)
            .unwrap_or(0.0))
    }
}

/// 记录每笔过账的替身, 凭证号递增
struct RecordingPoster {
    posted: RefCell<Vec<(String, AccountType, f64)>>,
}

impl RecordingPoster {
    fn new() -> Self {
        Self {
            posted: RefCell::new(Vec::new()),
        }
    }
}

impl LedgerPoster for RecordingPoster {
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
        Ok(format!("ENTRY/{:04}", posted.len()))
    }
}

// ==========================================
// 数据准备
// ==========================================

fn seed_partners(conn: &Arc<Mutex<Connection>>) {
    let repo = PartnerRepository::from_connection(conn.clone());
    let mut a = Partner::new("PT1", "甲方贸易");
    a.partner_ref = Some("A001".to_string());
    repo.upsert(&a).unwrap();

    let mut b = Partner::new("PT2", "乙方实业");
    b.partner_ref = Some("A002".to_string());
    repo.upsert(&b).unwrap();
}

fn reset_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 8, 31).unwrap()
}

#[test]
fn test_scenario_preview_and_commit_roundtrip() {
    let (_temp, db_path) = create_test_db().unwrap();
    let conn = open_test_connection(&db_path).unwrap();
    seed_partners(&conn);

    let api = BalanceResetApi::new(conn).unwrap();
    let balances = FixedBalances {
        entries: vec![
            ("PT1".to_string(), AccountType::Receivable, 100.0),
            ("PT2".to_string(), AccountType::Payable, 80.0),
        ],
    };

    let csv = "partner,new_balance,account_type\n\
               PT1,40,receivable\n\
               PT2,130,payable\n";
    let preview = api
        .preview_bytes(csv.as_bytes(), reset_date(), &balances)
        .unwrap();

    assert_eq!(preview.lines.len(), 2);
    assert_eq!(preview.skipped_rows, 0);
    // PT1: 40 - 100 = -60, PT2: 130 - 80 = +50
    assert!((preview.lines[0].adjustment() + 60.0).abs() < 1e-9);
    assert!((preview.lines[1].adjustment() - 50.0).abs() < 1e-9);
    assert!((preview.total_adjustment() + 10.0).abs() < 1e-9);

    let poster = RecordingPoster::new();
    let reset = api.commit(&preview, &poster).unwrap();

    assert_eq!(reset.state, ResetState::Done);
    assert_eq!(reset.name, "RESET/2026-08-31");
    assert_eq!(reset.lines.len(), 2);
    for line in &reset.lines {
        assert_eq!(line.state, ResetState::Done);
        assert!(line.ledger_entry_id.is_some());
    }

    // 过账金额: 应收照调整额, 应付反号
    let posted = poster.posted.borrow();
    assert_eq!(posted.len(), 2);
    assert!((posted[0].2 + 60.0).abs() < 1e-9);
    assert!((posted[1].2 + 50.0).abs() < 1e-9);

    // 调整记录落库回查
    let loaded = api.get_reset(&reset.reset_id).unwrap();
    assert_eq!(loaded.lines.len(), 2);
    assert!((loaded.total_adjustment() + 10.0).abs() < 1e-9);
    assert_eq!(
        loaded.lines[0].ledger_entry_id.as_deref(),
        Some("ENTRY/0001")
    );
}

#[test]
fn test_scenario_preview_skips_unmatched_partner() {
    let (_temp, db_path) = create_test_db().unwrap();
    let conn = open_test_connection(&db_path).unwrap();
    seed_partners(&conn);

    let api = BalanceResetApi::new(conn).unwrap();
    let balances = FixedBalances { entries: vec![] };

    let csv = "partner,new_balance\n\
               PT1,25\n\
               没有这家,10\n\
               ,30\n";
    let preview = api
        .preview_bytes(csv.as_bytes(), reset_date(), &balances)
        .unwrap();

    assert_eq!(preview.lines.len(), 1);
    assert_eq!(preview.lines[0].partner.partner_id, "PT1");
    // 科目列缺省按应收处理
    assert_eq!(preview.lines[0].account_type, AccountType::Receivable);
    assert_eq!(preview.skipped_rows, 2);
}

#[test]
fn test_scenario_config_driven_delimiter_and_lookup() {
    let (_temp, db_path) = create_test_db().unwrap();
    let conn = open_test_connection(&db_path).unwrap();
    seed_partners(&conn);

    // 分号分隔 + 按业务编码匹配
    let config = ConfigManager::from_connection(conn.clone()).unwrap();
    config
        .set_config_value(config_keys::CSV_DELIMITER, ";")
        .unwrap();
    config
        .set_config_value(config_keys::PARTNER_LOOKUP, "ref")
        .unwrap();

    let api = BalanceResetApi::new(conn).unwrap();
    let balances = FixedBalances {
        entries: vec![("PT1".to_string(), AccountType::Receivable, 10.0)],
    };

    let csv = "partner;new_balance\nA001;55\n";
    let preview = api
        .preview_bytes(csv.as_bytes(), reset_date(), &balances)
        .unwrap();

    assert_eq!(preview.lines.len(), 1);
    assert_eq!(preview.lines[0].partner.partner_id, "PT1");
    assert!((preview.lines[0].adjustment() - 45.0).abs() < 1e-9);
}

#[test]
fn test_scenario_commit_refuses_all_zero_adjustments() {
    let (_temp, db_path) = create_test_db().unwrap();
    let conn = open_test_connection(&db_path).unwrap();
    seed_partners(&conn);

    let api = BalanceResetApi::new(conn).unwrap();
    let balances = FixedBalances {
        entries: vec![("PT1".to_string(), AccountType::Receivable, 100.0)],
    };

    // 目标余额等于当前余额: 零调整, 提交被拒
    let csv = "partner,new_balance\nPT1,100\n";
    let preview = api
        .preview_bytes(csv.as_bytes(), reset_date(), &balances)
        .unwrap();
    assert_eq!(preview.lines.len(), 1);

    let poster = RecordingPoster::new();
    let err = api.commit(&preview, &poster).unwrap_err();
    assert!(matches!(err, ApiError::ImportFailed(_)), "实际: {err:?}");
    assert!(poster.posted.borrow().is_empty());
}

#[test]
fn test_scenario_preview_file_missing_path() {
    let (_temp, db_path) = create_test_db().unwrap();
    let conn = open_test_connection(&db_path).unwrap();

    let api = BalanceResetApi::new(conn).unwrap();
    let balances = FixedBalances { entries: vec![] };

    let err = api
        .preview_file("/不存在/的/路径.csv", reset_date(), &balances)
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)), "实际: {err:?}");
}

#[test]
fn test_scenario_preview_file_reads_from_disk() {
    let (_temp, db_path) = create_test_db().unwrap();
    let conn = open_test_connection(&db_path).unwrap();
    seed_partners(&conn);

    let mut csv_file = tempfile::NamedTempFile::new().unwrap();
    write!(csv_file, "partner,new_balance,account_type\nPT2,60,vendor\n").unwrap();

    let api = BalanceResetApi::new(conn).unwrap();
    let balances = FixedBalances {
        entries: vec![("PT2".to_string(), AccountType::Payable, 80.0)],
    };

    let preview = api
        .preview_file(
            csv_file.path().to_str().unwrap(),
            reset_date(),
            &balances,
        )
        .unwrap();

    assert_eq!(preview.lines.len(), 1);
    // vendor 别名归入应付
    assert_eq!(preview.lines[0].account_type, AccountType::Payable);
    assert!((preview.lines[0].adjustment() + 20.0).abs() < 1e-9);
}
