// ==========================================
// BOM 成本核算系统 - 计量单位模型
// ==========================================
// 职责: 同类别单位间的数量/价格换算
// 红线: 类别不兼容必须报错，禁止静默放行未换算数字
// ==========================================

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 计量单位换算错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    #[error("计量单位类别不兼容: {from}({from_category}) 与 {to}({to_category})")]
    IncompatibleCategory {
        from: String,
        from_category: String,
        to: String,
        to_category: String,
    },

    #[error("计量单位换算系数非法: {uom} factor={factor}")]
    InvalidFactor { uom: String, factor: f64 },
}

// ==========================================
// Uom - 计量单位
// ==========================================
// factor: 相对于类别基准单位的倍数 (1 个本单位 = factor 个基准单位)
// 例: 类别 weight, 基准 kg(factor=1.0), t(factor=1000.0)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Uom {
    pub uom_id: String,   // 单位标识
    pub name: String,     // 单位名称
    pub category: String, // 单位类别 (weight/length/unit/...)
    pub factor: f64,      // 相对基准单位的换算系数
}

impl Uom {
    pub fn new(uom_id: &str, name: &str, category: &str, factor: f64) -> Self {
        Self {
            uom_id: uom_id.to_string(),
            name: name.to_string(),
            category: category.to_string(),
            factor,
        }
    }

    fn check_factor(&self) -> Result<(), ConversionError> {
        if self.factor <= 0.0 || !self.factor.is_finite() {
            return Err(ConversionError::InvalidFactor {
                uom: self.uom_id.clone(),
                factor: self.factor,
            });
        }
        Ok(())
    }

    /// 数量换算: 本单位数量 -> 目标单位数量
    pub fn convert_qty(&self, qty: f64, to: &Uom) -> Result<f64, ConversionError> {
        if self.category != to.category {
            return Err(ConversionError::IncompatibleCategory {
                from: self.uom_id.clone(),
                from_category: self.category.clone(),
                to: to.uom_id.clone(),
                to_category: to.category.clone(),
            });
        }
        self.check_factor()?;
        to.check_factor()?;

        if self.uom_id == to.uom_id {
            return Ok(qty);
        }
        Ok(qty * self.factor / to.factor)
    }

    /// 价格换算: 按本单位计价 -> 按目标单位计价
    ///
    /// 价格与数量互为倒数方向: 1 t = 1000 kg, 则吨价 = 千克价 * 1000。
    pub fn convert_price(&self, price: f64, to: &Uom) -> Result<f64, ConversionError> {
        if self.category != to.category {
            return Err(ConversionError::IncompatibleCategory {
                from: self.uom_id.clone(),
                from_category: self.category.clone(),
                to: to.uom_id.clone(),
                to_category: to.category.clone(),
            });
        }
        self.check_factor()?;
        to.check_factor()?;

        if self.uom_id == to.uom_id {
            return Ok(price);
        }
        Ok(price * to.factor / self.factor)
    }

    /// 兼容性探测: 用 1.0 做一次试换算，不信任任何兼容标志位
    pub fn probe_compatible(&self, to: &Uom) -> Result<(), ConversionError> {
        self.convert_qty(1.0, to).map(|_| ())
    }
}
