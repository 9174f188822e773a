// ==========================================
// BOM 成本核算系统 - 伙伴与余额调整模型
// ==========================================
// 用途: CSV 导入 -> 预览 -> 提交调整
// 红线: 凭证过账语义在外部系统，本域只记录过账结果标识
// ==========================================

use crate::domain::types::{AccountType, ResetState};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==========================================
// Partner - 往来伙伴
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Partner {
    pub partner_id: String,
    pub partner_ref: Option<String>, // 业务编码
    pub name: String,
}

impl Partner {
    pub fn new(partner_id: &str, name: &str) -> Self {
        Self {
            partner_id: partner_id.to_string(),
            partner_ref: None,
            name: name.to_string(),
        }
    }
}

// ==========================================
// BalanceResetLine - 余额调整行
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceResetLine {
    pub partner_id: String,
    pub account_type: AccountType,
    pub current_balance: f64, // 截至调整日的当前余额
    pub new_balance: f64,     // 目标余额
    pub state: ResetState,
    pub ledger_entry_id: Option<String>, // 外部过账返回的凭证标识
}

impl BalanceResetLine {
    /// 调整金额 = 目标余额 - 当前余额
    pub fn adjustment_amount(&self) -> f64 {
        self.new_balance - self.current_balance
    }

    /// 过账金额: 应付科目按记账惯例反号
    pub fn posting_amount(&self) -> f64 {
        match self.account_type {
            AccountType::Receivable => self.adjustment_amount(),
            AccountType::Payable => -self.adjustment_amount(),
        }
    }
}

// ==========================================
// BalanceReset - 余额调整记录
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceReset {
    pub reset_id: String,
    pub name: String,          // 单据号
    pub reset_date: NaiveDate, // 调整基准日
    pub state: ResetState,
    pub lines: Vec<BalanceResetLine>,
}

impl BalanceReset {
    /// 调整总额
    pub fn total_adjustment(&self) -> f64 {
        self.lines.iter().map(|l| l.adjustment_amount()).sum()
    }
}
