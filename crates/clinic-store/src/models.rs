//! 表格文件行模型
//!
//! 每一行都是扁平的字符串字段，与领域模型之间显式转换。

use chrono::{NaiveDate, NaiveDateTime};
use clinic_core::utils::{DATE_FORMAT, TIMESTAMP_FORMAT};
use clinic_core::{ClinicError, Examination, Patient, PatientStatus, Result, Visit};
use serde::{Deserialize, Serialize};

/// 患者主档案表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientRow {
    pub id: String,
    pub name: String,
    pub medical_record_number: String,
    pub national_id: Option<String>,
    pub date_of_birth: Option<String>,
    pub phone: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl PatientRow {
    pub const HEADERS: [&'static str; 8] = [
        "id",
        "name",
        "medical_record_number",
        "national_id",
        "date_of_birth",
        "phone",
        "created_at",
        "updated_at",
    ];
}

impl From<&Patient> for PatientRow {
    fn from(patient: &Patient) -> Self {
        PatientRow {
            id: patient.id.to_string(),
            name: patient.name.clone(),
            medical_record_number: patient.medical_record_number.clone(),
            national_id: patient.national_id.clone(),
            date_of_birth: patient.date_of_birth.map(|d| d.format(DATE_FORMAT).to_string()),
            phone: patient.phone.clone(),
            created_at: patient.created_at.format(TIMESTAMP_FORMAT).to_string(),
            updated_at: patient.updated_at.format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}

impl TryFrom<PatientRow> for Patient {
    type Error = ClinicError;

    fn try_from(row: PatientRow) -> Result<Self> {
        Ok(Patient {
            id: row.id.parse()?,
            name: row.name,
            medical_record_number: row.medical_record_number,
            national_id: row.national_id,
            date_of_birth: row.date_of_birth.as_deref().map(parse_date).transpose()?,
            phone: row.phone,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

/// 每日就诊记录表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitRow {
    pub patient_id: String,
    pub visit_date: String,
    pub queue_number: u32,
    pub department: String,
    pub status: String,
    pub registered_at: String,
    pub called_at: Option<String>,
    pub examined_at: Option<String>,
    pub dispensed_at: Option<String>,
    pub completed_at: Option<String>,
    pub complaint: Option<String>,
    pub diagnosis: Option<String>,
    pub prescription: Option<String>,
    pub examiner: Option<String>,
    pub examination_notes: Option<String>,
    pub pharmacy_note: Option<String>,
}

impl VisitRow {
    pub const HEADERS: [&'static str; 16] = [
        "patient_id",
        "visit_date",
        "queue_number",
        "department",
        "status",
        "registered_at",
        "called_at",
        "examined_at",
        "dispensed_at",
        "completed_at",
        "complaint",
        "diagnosis",
        "prescription",
        "examiner",
        "examination_notes",
        "pharmacy_note",
    ];
}

impl From<&Visit> for VisitRow {
    fn from(visit: &Visit) -> Self {
        let exam = visit.examination.as_ref();
        VisitRow {
            patient_id: visit.patient_id.to_string(),
            visit_date: visit.visit_date.format(DATE_FORMAT).to_string(),
            queue_number: visit.queue_number,
            department: visit.department.clone(),
            status: visit.status.as_str().to_string(),
            registered_at: visit.registered_at.format(TIMESTAMP_FORMAT).to_string(),
            called_at: format_optional(visit.called_at),
            examined_at: format_optional(visit.examined_at),
            dispensed_at: format_optional(visit.dispensed_at),
            completed_at: format_optional(visit.completed_at),
            complaint: exam.map(|e| e.complaint.clone()),
            diagnosis: exam.map(|e| e.diagnosis.clone()),
            prescription: exam.map(|e| e.prescription.clone()),
            examiner: exam.and_then(|e| e.examiner.clone()),
            examination_notes: exam.and_then(|e| e.notes.clone()),
            pharmacy_note: visit.pharmacy_note.clone(),
        }
    }
}

impl TryFrom<VisitRow> for Visit {
    type Error = ClinicError;

    fn try_from(row: VisitRow) -> Result<Self> {
        // 空字段读回为 None；主诉、诊断、处方任一存在即视为有检查记录
        let examination =
            if row.complaint.is_some() || row.diagnosis.is_some() || row.prescription.is_some() {
                Some(Examination {
                    complaint: row.complaint.unwrap_or_default(),
                    diagnosis: row.diagnosis.unwrap_or_default(),
                    prescription: row.prescription.unwrap_or_default(),
                    examiner: row.examiner,
                    notes: row.examination_notes,
                })
            } else {
                None
            };

        Ok(Visit {
            patient_id: row.patient_id.parse()?,
            visit_date: parse_date(&row.visit_date)?,
            queue_number: row.queue_number,
            department: row.department,
            status: row.status.parse::<PatientStatus>()?,
            registered_at: parse_timestamp(&row.registered_at)?,
            called_at: parse_optional(row.called_at)?,
            examined_at: parse_optional(row.examined_at)?,
            dispensed_at: parse_optional(row.dispensed_at)?,
            completed_at: parse_optional(row.completed_at)?,
            examination,
            pharmacy_note: row.pharmacy_note,
        })
    }
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|e| ClinicError::Storage(format!("无效日期 '{}': {}", value, e)))
}

fn parse_timestamp(value: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), TIMESTAMP_FORMAT)
        .map_err(|e| ClinicError::Storage(format!("无效时间戳 '{}': {}", value, e)))
}

fn parse_optional(value: Option<String>) -> Result<Option<NaiveDateTime>> {
    value.as_deref().map(parse_timestamp).transpose()
}

fn format_optional(value: Option<NaiveDateTime>) -> Option<String> {
    value.map(|ts| ts.format(TIMESTAMP_FORMAT).to_string())
}
