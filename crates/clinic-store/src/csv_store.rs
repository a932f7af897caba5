//! 平面表格文件存储
//!
//! 两个CSV文件：患者主档案和每日就诊记录。每次操作整表读取并整表写回，
//! 写入先落到临时文件再改名替换。

use crate::models::{PatientRow, VisitRow};
use crate::store::{matches_query, sort_by_queue_number, PatientStore};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use clinic_core::{ClinicError, Patient, PatientId, PatientUpdate, Result, Visit};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// 默认患者主档案文件名
pub const DEFAULT_PATIENTS_FILE: &str = "patients.csv";
/// 默认就诊记录文件名
pub const DEFAULT_VISITS_FILE: &str = "visits.csv";

/// CSV文件患者存储
#[derive(Debug, Clone)]
pub struct CsvPatientStore {
    patients_path: PathBuf,
    visits_path: PathBuf,
}

impl CsvPatientStore {
    pub fn new(patients_path: impl Into<PathBuf>, visits_path: impl Into<PathBuf>) -> Self {
        Self {
            patients_path: patients_path.into(),
            visits_path: visits_path.into(),
        }
    }

    /// 使用默认文件名在指定目录下存储
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self::new(dir.join(DEFAULT_PATIENTS_FILE), dir.join(DEFAULT_VISITS_FILE))
    }

    pub fn patients_path(&self) -> &Path {
        &self.patients_path
    }

    pub fn visits_path(&self) -> &Path {
        &self.visits_path
    }

    async fn load_patients(&self) -> Result<Vec<Patient>> {
        let rows: Vec<PatientRow> = read_rows(&self.patients_path).await?;
        rows.into_iter().map(Patient::try_from).collect()
    }

    async fn save_patients(&self, patients: &[Patient]) -> Result<()> {
        let rows: Vec<PatientRow> = patients.iter().map(PatientRow::from).collect();
        write_rows(&self.patients_path, &PatientRow::HEADERS, &rows).await
    }

    async fn load_visits(&self) -> Result<Vec<Visit>> {
        let rows: Vec<VisitRow> = read_rows(&self.visits_path).await?;
        rows.into_iter().map(Visit::try_from).collect()
    }

    async fn save_visits(&self, visits: &[Visit]) -> Result<()> {
        let rows: Vec<VisitRow> = visits.iter().map(VisitRow::from).collect();
        write_rows(&self.visits_path, &VisitRow::HEADERS, &rows).await
    }
}

#[async_trait]
impl PatientStore for CsvPatientStore {
    async fn find_patient(&self, id: &PatientId) -> Result<Option<Patient>> {
        let patients = self.load_patients().await?;
        Ok(patients.into_iter().find(|p| p.id == *id))
    }

    async fn search_patients(&self, query: &str) -> Result<Vec<Patient>> {
        let patients = self.load_patients().await?;
        Ok(patients
            .into_iter()
            .filter(|p| matches_query(p, query))
            .collect())
    }

    async fn insert_patient(&self, patient: &Patient) -> Result<()> {
        let mut patients = self.load_patients().await?;
        if patients.iter().any(|p| p.id == patient.id) {
            return Err(ClinicError::Duplicate(format!("患者 {} 已存在", patient.id)));
        }

        patients.push(patient.clone());
        self.save_patients(&patients).await?;
        info!("Inserted patient {}", patient.id);
        Ok(())
    }

    async fn update_patient(
        &self,
        id: &PatientId,
        update: &PatientUpdate,
        now: NaiveDateTime,
    ) -> Result<bool> {
        let mut patients = self.load_patients().await?;
        let Some(patient) = patients.iter_mut().find(|p| p.id == *id) else {
            return Ok(false);
        };

        if patient.apply(update, now) {
            self.save_patients(&patients).await?;
            info!("Updated patient {}", id);
        }
        Ok(true)
    }

    async fn delete_patient(&self, id: &PatientId) -> Result<bool> {
        let mut patients = self.load_patients().await?;
        let before = patients.len();
        patients.retain(|p| p.id != *id);
        let existed = patients.len() != before;

        let mut visits = self.load_visits().await?;
        let visits_before = visits.len();
        visits.retain(|v| v.patient_id != *id);

        if existed {
            self.save_patients(&patients).await?;
        }
        if visits.len() != visits_before {
            self.save_visits(&visits).await?;
        }

        info!(
            "Deleted patient {} ({} visit records removed)",
            id,
            visits_before - visits.len()
        );
        Ok(existed)
    }

    async fn find_visit(&self, id: &PatientId, date: NaiveDate) -> Result<Option<Visit>> {
        let visits = self.load_visits().await?;
        Ok(visits
            .into_iter()
            .find(|v| v.patient_id == *id && v.visit_date == date))
    }

    async fn insert_visit(&self, visit: &Visit) -> Result<()> {
        let mut visits = self.load_visits().await?;
        if visits
            .iter()
            .any(|v| v.patient_id == visit.patient_id && v.visit_date == visit.visit_date)
        {
            return Err(ClinicError::Duplicate(format!(
                "患者 {} 在 {} 已经排队",
                visit.patient_id, visit.visit_date
            )));
        }

        visits.push(visit.clone());
        self.save_visits(&visits).await?;
        info!(
            "Inserted visit for patient {} on {} with number {}",
            visit.patient_id, visit.visit_date, visit.queue_number
        );
        Ok(())
    }

    async fn update_visit(&self, visit: &Visit) -> Result<()> {
        let mut visits = self.load_visits().await?;
        let Some(existing) = visits
            .iter_mut()
            .find(|v| v.patient_id == visit.patient_id && v.visit_date == visit.visit_date)
        else {
            return Err(ClinicError::NotFound(format!(
                "患者 {} 在 {} 没有就诊记录",
                visit.patient_id, visit.visit_date
            )));
        };

        *existing = visit.clone();
        self.save_visits(&visits).await?;
        debug!(
            "Updated visit for patient {} on {} to {}",
            visit.patient_id, visit.visit_date, visit.status
        );
        Ok(())
    }

    async fn visits_on(&self, date: NaiveDate) -> Result<Vec<Visit>> {
        let mut visits: Vec<Visit> = self
            .load_visits()
            .await?
            .into_iter()
            .filter(|v| v.visit_date == date)
            .collect();
        sort_by_queue_number(&mut visits);
        Ok(visits)
    }

    async fn patient_history(&self, id: &PatientId) -> Result<Vec<Visit>> {
        let mut visits: Vec<Visit> = self
            .load_visits()
            .await?
            .into_iter()
            .filter(|v| v.patient_id == *id)
            .collect();
        visits.sort_by_key(|v| v.visit_date);
        Ok(visits)
    }
}

/// 读取整个表格；文件不存在视为空表
async fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("Table {} does not exist yet", path.display());
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    let mut reader = csv::Reader::from_reader(bytes.as_slice());
    let rows = reader
        .deserialize()
        .collect::<std::result::Result<Vec<T>, csv::Error>>()?;
    Ok(rows)
}

/// 整表写回：先写临时文件再改名
async fn write_rows<T: Serialize>(path: &Path, headers: &[&str], rows: &[T]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(!rows.is_empty())
        .from_writer(Vec::new());
    if rows.is_empty() {
        writer.write_record(headers)?;
    }
    for row in rows {
        writer.serialize(row)?;
    }
    let data = writer
        .into_inner()
        .map_err(|e| ClinicError::Storage(format!("写入表格失败: {}", e)))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let tmp_path = path.with_extension("csv.tmp");
    tokio::fs::write(&tmp_path, &data).await?;
    tokio::fs::rename(&tmp_path, path).await?;
    Ok(())
}
