// ==========================================
// BOM 成本核算系统 - 领域类型定义
// ==========================================
// 序列化格式: 小写字符串 (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// 核算状态 (Calculation State)
// ==========================================
// 状态机: draft -> calculated (核算后行级输入冻结，修改需先重置为草稿)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalcState {
    Draft,      // 草稿
    Calculated, // 已核算
}

impl fmt::Display for CalcState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalcState::Draft => write!(f, "draft"),
            CalcState::Calculated => write!(f, "calculated"),
        }
    }
}

impl FromStr for CalcState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(CalcState::Draft),
            "calculated" => Ok(CalcState::Calculated),
            other => Err(format!("未知核算状态: {}", other)),
        }
    }
}

// ==========================================
// 成本类型 (Cost Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostType {
    Material,  // 材料成本
    Operation, // 工序成本
}

impl fmt::Display for CostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CostType::Material => write!(f, "material"),
            CostType::Operation => write!(f, "operation"),
        }
    }
}

impl FromStr for CostType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "material" => Ok(CostType::Material),
            "operation" => Ok(CostType::Operation),
            other => Err(format!("未知成本类型: {}", other)),
        }
    }
}

// ==========================================
// 往来科目类型 (Account Type)
// ==========================================
// 用途: 伙伴余额调整
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Receivable, // 应收
    Payable,    // 应付
}

impl AccountType {
    /// 从 CSV 单元格解析科目类型
    ///
    /// 默认应收; "payable" 及其常见别名解析为应付
    pub fn parse_csv_value(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "payable" | "vendor" | "supplier" | "purchase" => AccountType::Payable,
            _ => AccountType::Receivable,
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountType::Receivable => write!(f, "receivable"),
            AccountType::Payable => write!(f, "payable"),
        }
    }
}

impl FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "receivable" => Ok(AccountType::Receivable),
            "payable" => Ok(AccountType::Payable),
            other => Err(format!("未知科目类型: {}", other)),
        }
    }
}

// ==========================================
// 余额调整状态 (Reset State)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResetState {
    Draft, // 草稿
    Done,  // 已完成
}

impl fmt::Display for ResetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResetState::Draft => write!(f, "draft"),
            ResetState::Done => write!(f, "done"),
        }
    }
}

impl FromStr for ResetState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(ResetState::Draft),
            "done" => Ok(ResetState::Done),
            other => Err(format!("未知调整状态: {}", other)),
        }
    }
}

// ==========================================
// 伙伴匹配策略 (Partner Lookup)
// ==========================================
// CSV 导入时按此策略定位伙伴
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartnerLookup {
    Id,   // 数据库主键
    Ref,  // 业务编码
    Name, // 名称精确匹配
}

impl fmt::Display for PartnerLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartnerLookup::Id => write!(f, "id"),
            PartnerLookup::Ref => write!(f, "ref"),
            PartnerLookup::Name => write!(f, "name"),
        }
    }
}

impl FromStr for PartnerLookup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "id" => Ok(PartnerLookup::Id),
            "ref" => Ok(PartnerLookup::Ref),
            "name" => Ok(PartnerLookup::Name),
            other => Err(format!("未知伙伴匹配策略: {}", other)),
        }
    }
}
