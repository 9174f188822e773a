// ==========================================
// BOM 成本核算系统 - 引擎层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 红线: 校验问题必须全量上报，不允许只报第一条
// ==========================================

use crate::domain::uom::ConversionError;
use thiserror::Error;

/// 引擎层错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    // ===== 批量前置校验 =====
    // 所有违规一次性聚合，用户可一轮修完
    #[error("成本核算前置校验未通过（{}项）:\n{}", violations.len(), violations.join("\n"))]
    Validation { violations: Vec<String> },

    // ===== 计量单位 =====
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    // ===== 引用缺失 =====
    #[error("记录未找到: {entity} id={id}")]
    NotFound { entity: String, id: String },

    // ===== 通用错误 =====
    #[error("引擎内部错误: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    pub fn not_found(entity: &str, id: &str) -> Self {
        EngineError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    /// 校验错误中包含的违规列表（其他错误返回空切片）
    pub fn violations(&self) -> &[String] {
        match self {
            EngineError::Validation { violations } => violations,
            _ => &[],
        }
    }
}
