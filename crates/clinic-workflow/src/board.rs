//! 排队看板
//!
//! 把排队引擎中的标识符与当天就诊记录、患者档案关联成可展示的行。
//! 找不到记录的标识符直接跳过，不作为错误。

use chrono::{NaiveDate, NaiveDateTime};
use clinic_core::utils::{format_optional_timestamp, format_queue_number};
use clinic_core::{Patient, PatientId, PatientStatus, Visit};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 看板行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardRow {
    pub patient_id: PatientId,
    pub queue_number: u32,
    pub name: String,
    pub medical_record_number: String,
    pub department: String,
    pub status: PatientStatus,
    pub registered_at: NaiveDateTime,
    pub called_at: Option<NaiveDateTime>,
}

impl BoardRow {
    pub fn new(patient: &Patient, visit: &Visit) -> Self {
        Self {
            patient_id: patient.id,
            queue_number: visit.queue_number,
            name: patient.name.clone(),
            medical_record_number: patient.medical_record_number.clone(),
            department: visit.department.clone(),
            status: visit.status,
            registered_at: visit.registered_at,
            called_at: visit.called_at,
        }
    }

    pub fn display_number(&self) -> String {
        format_queue_number(self.queue_number)
    }

    pub fn display_called_at(&self) -> String {
        format_optional_timestamp(self.called_at.as_ref())
    }
}

/// 当天就诊记录与患者档案的快照
#[derive(Debug, Default)]
pub struct DaySnapshot {
    visits: HashMap<PatientId, Visit>,
    patients: HashMap<PatientId, Patient>,
}

impl DaySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, patient: Patient, visit: Visit) {
        self.visits.insert(visit.patient_id, visit);
        self.patients.insert(patient.id, patient);
    }

    pub fn row(&self, id: &PatientId) -> Option<BoardRow> {
        let visit = self.visits.get(id)?;
        let patient = self.patients.get(id)?;
        Some(BoardRow::new(patient, visit))
    }

    /// 按给定顺序关联，缺失的标识符跳过
    pub fn rows<'a, I>(&self, ids: I) -> Vec<BoardRow>
    where
        I: IntoIterator<Item = &'a PatientId>,
    {
        ids.into_iter().filter_map(|id| self.row(id)).collect()
    }

    /// 指定状态的全部行，按排队号排序
    pub fn rows_with_status(&self, status: PatientStatus) -> Vec<BoardRow> {
        let mut rows: Vec<BoardRow> = self
            .visits
            .values()
            .filter(|visit| visit.status == status)
            .filter_map(|visit| self.row(&visit.patient_id))
            .collect();
        rows.sort_by_key(|row| row.queue_number);
        rows
    }

    pub fn visits(&self) -> impl Iterator<Item = &Visit> {
        self.visits.values()
    }
}

/// 当天排队概况
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueOverview {
    pub date: NaiveDate,
    pub waiting_len: usize,
    pub called_len: usize,
    pub total_visits: usize,
    pub status_counts: HashMap<PatientStatus, usize>,
}

impl QueueOverview {
    pub fn new<'a, V>(date: NaiveDate, waiting_len: usize, called_len: usize, visits: V) -> Self
    where
        V: IntoIterator<Item = &'a Visit>,
    {
        let mut status_counts = HashMap::new();
        let mut total_visits = 0;
        for visit in visits {
            *status_counts.entry(visit.status).or_insert(0) += 1;
            total_visits += 1;
        }

        Self {
            date,
            waiting_len,
            called_len,
            total_visits,
            status_counts,
        }
    }

    pub fn count(&self, status: PatientStatus) -> usize {
        self.status_counts.get(&status).copied().unwrap_or(0)
    }
}
