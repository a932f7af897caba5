//! 内存存储
//!
//! 与CSV存储相同的契约，不落盘；用于测试和演示。

use crate::store::{matches_query, sort_by_queue_number, PatientStore};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use clinic_core::{ClinicError, Patient, PatientId, PatientUpdate, Result, Visit};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Tables {
    patients: Vec<Patient>,
    visits: Vec<Visit>,
}

/// 内存患者存储
#[derive(Debug, Default)]
pub struct InMemoryPatientStore {
    tables: RwLock<Tables>,
    fail_writes: AtomicBool,
    fail_visit_writes: AtomicBool,
}

impl InMemoryPatientStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 模拟存储不可写：之后的写操作都返回 `Storage` 错误
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// 只让就诊记录的写操作失败
    pub fn set_fail_visit_writes(&self, fail: bool) {
        self.fail_visit_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ClinicError::Storage("存储不可写".to_string()));
        }
        Ok(())
    }

    fn check_visits_writable(&self) -> Result<()> {
        self.check_writable()?;
        if self.fail_visit_writes.load(Ordering::SeqCst) {
            return Err(ClinicError::Storage("就诊记录不可写".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PatientStore for InMemoryPatientStore {
    async fn find_patient(&self, id: &PatientId) -> Result<Option<Patient>> {
        let tables = self.tables.read().await;
        Ok(tables.patients.iter().find(|p| p.id == *id).cloned())
    }

    async fn search_patients(&self, query: &str) -> Result<Vec<Patient>> {
        let tables = self.tables.read().await;
        Ok(tables
            .patients
            .iter()
            .filter(|p| matches_query(p, query))
            .cloned()
            .collect())
    }

    async fn insert_patient(&self, patient: &Patient) -> Result<()> {
        self.check_writable()?;
        let mut tables = self.tables.write().await;
        if tables.patients.iter().any(|p| p.id == patient.id) {
            return Err(ClinicError::Duplicate(format!("患者 {} 已存在", patient.id)));
        }
        tables.patients.push(patient.clone());
        Ok(())
    }

    async fn update_patient(
        &self,
        id: &PatientId,
        update: &PatientUpdate,
        now: NaiveDateTime,
    ) -> Result<bool> {
        self.check_writable()?;
        let mut tables = self.tables.write().await;
        match tables.patients.iter_mut().find(|p| p.id == *id) {
            Some(patient) => {
                patient.apply(update, now);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_patient(&self, id: &PatientId) -> Result<bool> {
        self.check_writable()?;
        let mut tables = self.tables.write().await;
        let before = tables.patients.len();
        tables.patients.retain(|p| p.id != *id);
        tables.visits.retain(|v| v.patient_id != *id);
        Ok(tables.patients.len() != before)
    }

    async fn find_visit(&self, id: &PatientId, date: NaiveDate) -> Result<Option<Visit>> {
        let tables = self.tables.read().await;
        Ok(tables
            .visits
            .iter()
            .find(|v| v.patient_id == *id && v.visit_date == date)
            .cloned())
    }

    async fn insert_visit(&self, visit: &Visit) -> Result<()> {
        self.check_visits_writable()?;
        let mut tables = self.tables.write().await;
        if tables
            .visits
            .iter()
            .any(|v| v.patient_id == visit.patient_id && v.visit_date == visit.visit_date)
        {
            return Err(ClinicError::Duplicate(format!(
                "患者 {} 在 {} 已经排队",
                visit.patient_id, visit.visit_date
            )));
        }
        tables.visits.push(visit.clone());
        Ok(())
    }

    async fn update_visit(&self, visit: &Visit) -> Result<()> {
        self.check_visits_writable()?;
        let mut tables = self.tables.write().await;
        match tables
            .visits
            .iter_mut()
            .find(|v| v.patient_id == visit.patient_id && v.visit_date == visit.visit_date)
        {
            Some(existing) => {
                *existing = visit.clone();
                Ok(())
            }
            None => Err(ClinicError::NotFound(format!(
                "患者 {} 在 {} 没有就诊记录",
                visit.patient_id, visit.visit_date
            ))),
        }
    }

    async fn visits_on(&self, date: NaiveDate) -> Result<Vec<Visit>> {
        let tables = self.tables.read().await;
        let mut visits: Vec<Visit> = tables
            .visits
            .iter()
            .filter(|v| v.visit_date == date)
            .cloned()
            .collect();
        sort_by_queue_number(&mut visits);
        Ok(visits)
    }

    async fn patient_history(&self, id: &PatientId) -> Result<Vec<Visit>> {
        let tables = self.tables.read().await;
        let mut visits: Vec<Visit> = tables
            .visits
            .iter()
            .filter(|v| v.patient_id == *id)
            .cloned()
            .collect();
        visits.sort_by_key(|v| v.visit_date);
        Ok(visits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fail_writes() {
        let store = InMemoryPatientStore::new();
        let now = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let visit = Visit::new(PatientId::new(), 1, "General".to_string(), now);

        store.set_fail_writes(true);
        assert!(matches!(
            store.insert_visit(&visit).await,
            Err(ClinicError::Storage(_))
        ));
        assert!(store.visits_on(now.date()).await.unwrap().is_empty());

        store.set_fail_writes(false);
        store.insert_visit(&visit).await.unwrap();
        assert_eq!(store.next_queue_number(now.date()).await.unwrap(), 2);
    }
}
