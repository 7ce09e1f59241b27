// ==========================================
// 手术排程表导入系统 - 患者领域模型
// ==========================================
// 对齐: patient 表
// 生命周期: 首次出现其手术时创建/合并，不显式删除
// ==========================================

use chrono::NaiveDate;
use serde::Serialize;

// ==========================================
// Patient - 患者
// ==========================================
// 字段为 None 表示"本次解析未提供"，合并时不覆盖已有值
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Patient {
    pub idmrn: Option<String>,               // 病历号（主键）
    pub patient_given_name: Option<String>,  // 名
    pub patient_family_name: Option<String>, // 姓
    pub date_of_birth: Option<NaiveDate>,    // 出生日期
    pub nhs_number: Option<String>,          // 国民身份号
    pub sex: Option<i64>,                    // 性别代码
}

impl Patient {
    /// 用另一条记录中的非空字段覆盖本记录
    pub fn merge_from(&mut self, other: &Patient) {
        merge(&mut self.idmrn, &other.idmrn);
        merge(&mut self.patient_given_name, &other.patient_given_name);
        merge(&mut self.patient_family_name, &other.patient_family_name);
        merge(&mut self.date_of_birth, &other.date_of_birth);
        merge(&mut self.nhs_number, &other.nhs_number);
        merge(&mut self.sex, &other.sex);
    }
}

pub(crate) fn merge<T: Clone>(slot: &mut Option<T>, new_value: &Option<T>) {
    if let Some(value) = new_value {
        *slot = Some(value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_keeps_existing_when_new_is_none() {
        let mut existing = Patient {
            idmrn: Some("001".to_string()),
            patient_given_name: Some("Alice".to_string()),
            nhs_number: Some("1234567890".to_string()),
            ..Patient::default()
        };
        let update = Patient {
            idmrn: Some("001".to_string()),
            patient_given_name: Some("Alicia".to_string()),
            ..Patient::default()
        };

        existing.merge_from(&update);

        assert_eq!(existing.patient_given_name.as_deref(), Some("Alicia"));
        assert_eq!(existing.nhs_number.as_deref(), Some("1234567890"));
    }
}
