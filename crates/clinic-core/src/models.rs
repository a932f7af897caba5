//! 核心数据模型定义

use crate::error::{ClinicError, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 患者标识符
///
/// 在所有持久化存储和排队引擎之间唯一标识一位患者，生成后不再复用、不再修改。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatientId(Uuid);

impl PatientId {
    /// 生成新的患者标识符
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PatientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PatientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PatientId {
    type Err = ClinicError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| ClinicError::Validation(format!("无效的患者标识符: {}", s.trim())))
    }
}

/// 就诊状态
///
/// 允许的流转: 等候 -> 已叫号 -> 已检查 -> {可取药 | 药品缺货} -> 完成
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PatientStatus {
    Waiting,               // 等候中
    Called,                // 已叫号
    Examined,              // 已检查
    ReadyForMedication,    // 可取药
    MedicationUnavailable, // 药品缺货
    Done,                  // 完成
}

impl PatientStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Called => "called",
            Self::Examined => "examined",
            Self::ReadyForMedication => "ready_for_medication",
            Self::MedicationUnavailable => "medication_unavailable",
            Self::Done => "done",
        }
    }

    /// 当天流程是否仍在进行
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Done)
    }
}

impl fmt::Display for PatientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PatientStatus {
    type Err = ClinicError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "waiting" => Ok(Self::Waiting),
            "called" => Ok(Self::Called),
            "examined" => Ok(Self::Examined),
            "ready_for_medication" => Ok(Self::ReadyForMedication),
            "medication_unavailable" => Ok(Self::MedicationUnavailable),
            "done" => Ok(Self::Done),
            other => Err(ClinicError::Validation(format!("未知的就诊状态: {}", other))),
        }
    }
}

/// 患者主档案
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    pub id: PatientId,
    pub name: String,
    pub medical_record_number: String, // 病历号
    pub national_id: Option<String>,   // 身份证号
    pub date_of_birth: Option<NaiveDate>,
    pub phone: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Patient {
    pub fn new(name: String, medical_record_number: String, now: NaiveDateTime) -> Self {
        Self {
            id: PatientId::new(),
            name,
            medical_record_number,
            national_id: None,
            date_of_birth: None,
            phone: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 应用档案修改，返回是否有字段发生变化
    pub fn apply(&mut self, update: &PatientUpdate, now: NaiveDateTime) -> bool {
        let mut changed = false;

        if let Some(name) = &update.name {
            if *name != self.name {
                self.name = name.clone();
                changed = true;
            }
        }
        if let Some(mrn) = &update.medical_record_number {
            if *mrn != self.medical_record_number {
                self.medical_record_number = mrn.clone();
                changed = true;
            }
        }
        if let Some(national_id) = &update.national_id {
            if self.national_id.as_ref() != Some(national_id) {
                self.national_id = Some(national_id.clone());
                changed = true;
            }
        }
        if let Some(date_of_birth) = update.date_of_birth {
            if self.date_of_birth != Some(date_of_birth) {
                self.date_of_birth = Some(date_of_birth);
                changed = true;
            }
        }
        if let Some(phone) = &update.phone {
            if self.phone.as_ref() != Some(phone) {
                self.phone = Some(phone.clone());
                changed = true;
            }
        }

        if changed {
            self.updated_at = now;
        }
        changed
    }
}

/// 患者档案修改（未填写的字段保持不变）
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PatientUpdate {
    pub name: Option<String>,
    pub medical_record_number: Option<String>,
    pub national_id: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub phone: Option<String>,
}

impl PatientUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.medical_record_number.is_none()
            && self.national_id.is_none()
            && self.date_of_birth.is_none()
            && self.phone.is_none()
    }
}

/// 临床检查记录
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Examination {
    pub complaint: String,    // 主诉
    pub diagnosis: String,    // 诊断
    pub prescription: String, // 处方
    pub examiner: Option<String>,
    pub notes: Option<String>,
}

/// 当日就诊记录
///
/// 同一患者每天最多一条，按 (patient_id, visit_date) 唯一。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Visit {
    pub patient_id: PatientId,
    pub visit_date: NaiveDate,
    pub queue_number: u32,
    pub department: String, // 就诊科室
    pub status: PatientStatus,
    pub registered_at: NaiveDateTime,
    pub called_at: Option<NaiveDateTime>,
    pub examined_at: Option<NaiveDateTime>,
    pub dispensed_at: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,
    pub examination: Option<Examination>,
    pub pharmacy_note: Option<String>,
}

impl Visit {
    /// 创建处于等候状态的新就诊记录
    pub fn new(
        patient_id: PatientId,
        queue_number: u32,
        department: String,
        registered_at: NaiveDateTime,
    ) -> Self {
        Self {
            patient_id,
            visit_date: registered_at.date(),
            queue_number,
            department,
            status: PatientStatus::Waiting,
            registered_at,
            called_at: None,
            examined_at: None,
            dispensed_at: None,
            completed_at: None,
            examination: None,
            pharmacy_note: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_patient_id_parse() {
        let id = PatientId::new();
        let parsed: PatientId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);

        let padded: PatientId = format!("  {}\n", id).parse().unwrap();
        assert_eq!(id, padded);

        assert!("not-a-patient".parse::<PatientId>().is_err());
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(PatientStatus::ReadyForMedication.to_string(), "ready_for_medication");
        assert_eq!(
            "medication_unavailable".parse::<PatientStatus>().unwrap(),
            PatientStatus::MedicationUnavailable
        );
        assert!("terminated".parse::<PatientStatus>().is_err());
        assert!(PatientStatus::Examined.is_active());
        assert!(!PatientStatus::Done.is_active());
    }

    #[test]
    fn test_patient_apply_update() {
        let mut patient = Patient::new("Sari".to_string(), "RM-001".to_string(), at(8));

        assert!(!patient.apply(&PatientUpdate::default(), at(9)));
        assert_eq!(patient.updated_at, at(8));

        let update = PatientUpdate {
            name: Some("Sari Dewi".to_string()),
            phone: Some("0812".to_string()),
            ..Default::default()
        };
        assert!(patient.apply(&update, at(10)));
        assert_eq!(patient.name, "Sari Dewi");
        assert_eq!(patient.phone.as_deref(), Some("0812"));
        assert_eq!(patient.medical_record_number, "RM-001");
        assert_eq!(patient.updated_at, at(10));

        // 相同内容不算修改
        assert!(!patient.apply(&update, at(11)));
        assert_eq!(patient.updated_at, at(10));

        let update = PatientUpdate {
            date_of_birth: NaiveDate::from_ymd_opt(1990, 5, 17),
            ..Default::default()
        };
        assert!(!update.is_empty());
        assert!(patient.apply(&update, at(12)));
        assert_eq!(patient.date_of_birth, NaiveDate::from_ymd_opt(1990, 5, 17));
    }

    #[test]
    fn test_new_visit_waits() {
        let visit = Visit::new(PatientId::new(), 4, "General".to_string(), at(7));
        assert_eq!(visit.status, PatientStatus::Waiting);
        assert_eq!(visit.visit_date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert!(visit.called_at.is_none());
    }
}
