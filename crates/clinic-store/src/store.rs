//! 存储接口定义

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use clinic_core::{Patient, PatientId, PatientUpdate, Result, Visit};

/// 患者存储接口
///
/// 持久化的唯一事实来源。排队引擎只是可以在重启后由 `visits_on` 重建的派生索引。
#[async_trait]
pub trait PatientStore: Send + Sync {
    /// 根据ID查找患者主档案
    async fn find_patient(&self, id: &PatientId) -> Result<Option<Patient>>;

    /// 按姓名（模糊、忽略大小写）、病历号或ID搜索患者
    async fn search_patients(&self, query: &str) -> Result<Vec<Patient>>;

    /// 新增患者主档案，ID已存在时返回 `Duplicate`
    async fn insert_patient(&self, patient: &Patient) -> Result<()>;

    /// 修改患者主档案，返回患者是否存在；有字段变化时 `updated_at` 记为 `now`
    async fn update_patient(
        &self,
        id: &PatientId,
        update: &PatientUpdate,
        now: NaiveDateTime,
    ) -> Result<bool>;

    /// 删除患者主档案及其全部就诊记录，返回患者是否存在
    async fn delete_patient(&self, id: &PatientId) -> Result<bool>;

    /// 查找患者某天的就诊记录
    async fn find_visit(&self, id: &PatientId, date: NaiveDate) -> Result<Option<Visit>>;

    /// 新增就诊记录，同一患者同一天已有记录时返回 `Duplicate`
    async fn insert_visit(&self, visit: &Visit) -> Result<()>;

    /// 覆盖写入就诊记录，记录不存在时返回 `NotFound`
    async fn update_visit(&self, visit: &Visit) -> Result<()>;

    /// 某天的全部就诊记录，按排队号排序
    async fn visits_on(&self, date: NaiveDate) -> Result<Vec<Visit>>;

    /// 某天的下一个排队号
    async fn next_queue_number(&self, date: NaiveDate) -> Result<u32> {
        let visits = self.visits_on(date).await?;
        Ok(next_number(&visits))
    }

    /// 患者的全部就诊记录，按日期排序
    async fn patient_history(&self, id: &PatientId) -> Result<Vec<Visit>>;
}

/// 日期标记存储接口
///
/// 只保存一个日期值：进程最后一次确认的日历日。
#[async_trait]
pub trait MarkerStore: Send + Sync {
    /// 读取标记；不存在时返回 `Ok(None)`，内容损坏时返回错误
    async fn load(&self) -> Result<Option<NaiveDate>>;

    /// 写入标记
    async fn store(&self, date: NaiveDate) -> Result<()>;
}

/// 当天没有记录时从1开始，否则为最大号加一
pub(crate) fn next_number(visits: &[Visit]) -> u32 {
    visits
        .iter()
        .map(|visit| visit.queue_number)
        .max()
        .map_or(1, |max| max + 1)
}

pub(crate) fn matches_query(patient: &Patient, query: &str) -> bool {
    let query = query.trim();
    if query.is_empty() {
        return false;
    }

    let needle = query.to_lowercase();
    patient.name.to_lowercase().contains(&needle)
        || patient.medical_record_number.eq_ignore_ascii_case(query)
        || patient.id.to_string() == needle
}

pub(crate) fn sort_by_queue_number(visits: &mut [Visit]) {
    visits.sort_by_key(|visit| visit.queue_number);
}
