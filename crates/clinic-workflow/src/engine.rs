//! 诊所工作流引擎
//!
//! 协调排队引擎、就诊状态机、日期切换管理、患者存储和叫号播报。
//! 状态与队列的联动只能经由这里完成：先校验状态转换，再写存储，最后改队列。

use crate::{
    announcement::{Announcement, Announcer, TracingAnnouncer},
    board::{BoardRow, DaySnapshot, QueueOverview},
    command::{CommandOutcome, QueueCommand},
    daily_cycle::{CycleOutcome, DailyCycleManager},
    queue::QueueEngine,
    state_machine::{VisitEvent, VisitStateMachine},
};
use chrono::NaiveDate;
use clinic_core::utils::non_empty;
use clinic_core::{
    ClinicError, Clock, Examination, Patient, PatientId, PatientStatus, PatientUpdate, Result,
    Visit,
};
use clinic_store::{MarkerStore, PatientStore};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 工作流设置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowSettings {
    pub default_department: String,
    pub service_point: String, // 叫号播报中的就诊地点
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            default_department: "General".to_string(),
            service_point: "the examination room".to_string(),
        }
    }
}

/// 诊所工作流引擎
pub struct ClinicWorkflow<S, M, C> {
    store: S,
    queue: QueueEngine<PatientId>,
    state_machine: VisitStateMachine,
    cycle: DailyCycleManager<M, Arc<C>>,
    clock: Arc<C>,
    announcer: Box<dyn Announcer>,
    settings: WorkflowSettings,
}

impl<S, M, C> ClinicWorkflow<S, M, C>
where
    S: PatientStore,
    M: MarkerStore,
    C: Clock,
{
    /// 创建新的工作流引擎，队列为空，需要调用 `bootstrap` 恢复当天队列
    pub fn new(store: S, marker: M, clock: Arc<C>) -> Self {
        Self {
            store,
            queue: QueueEngine::new(),
            state_machine: VisitStateMachine::new(),
            cycle: DailyCycleManager::new(marker, clock.clone()),
            clock,
            announcer: Box::new(TracingAnnouncer),
            settings: WorkflowSettings::default(),
        }
    }

    pub fn with_announcer(mut self, announcer: impl Announcer + 'static) -> Self {
        self.announcer = Box::new(announcer);
        self
    }

    pub fn with_settings(mut self, settings: WorkflowSettings) -> Self {
        self.settings = settings;
        self
    }

    /// 启动恢复
    ///
    /// 先做日期切换检查，再按当天记录的状态重建两个序列：
    /// 等候中的进入 `waiting`，已叫号的进入 `called`，顺序为排队号顺序。
    pub async fn bootstrap(&mut self) -> Result<CycleOutcome> {
        let outcome = self.cycle.check(&mut self.queue).await?;
        let today = outcome.today();

        let visits = self.store.visits_on(today).await?;
        let waiting: Vec<PatientId> = visits
            .iter()
            .filter(|visit| visit.status == PatientStatus::Waiting)
            .map(|visit| visit.patient_id)
            .collect();
        let called: Vec<PatientId> = visits
            .iter()
            .filter(|visit| visit.status == PatientStatus::Called)
            .map(|visit| visit.patient_id)
            .collect();

        info!(
            "Restored queue for {}: {} waiting, {} called",
            today,
            waiting.len(),
            called.len()
        );
        self.queue.initialize_from(waiting, called);
        Ok(outcome)
    }

    /// 主循环中的日期切换检查
    pub async fn check_rollover(&mut self) -> Result<CycleOutcome> {
        self.cycle.check(&mut self.queue).await
    }

    /// 执行操作台命令
    pub async fn execute(&mut self, command: QueueCommand) -> Result<CommandOutcome> {
        debug!("Executing command {:?}", command);

        match command {
            QueueCommand::RegisterPatient {
                name,
                medical_record_number,
                national_id,
                date_of_birth,
                phone,
                department,
            } => {
                self.register_patient(
                    name,
                    medical_record_number,
                    national_id,
                    date_of_birth,
                    phone,
                    department,
                )
                .await
            }
            QueueCommand::JoinQueue {
                patient_id,
                department,
            } => self.join_queue(patient_id, department).await,
            QueueCommand::CallNext => self.call_next().await,
            QueueCommand::RepeatCall { patient_id } => self.repeat_call(patient_id).await,
            QueueCommand::RecordExamination {
                patient_id,
                examination,
            } => self.record_examination(patient_id, examination).await,
            QueueCommand::Dispense {
                patient_id,
                available,
                note,
            } => self.dispense(patient_id, available, note).await,
            QueueCommand::CompleteService { patient_id } => self.complete_service(patient_id).await,
            QueueCommand::UpdatePatient { patient_id, update } => {
                self.update_patient(patient_id, update).await
            }
            QueueCommand::RemovePatient { patient_id } => self.remove_patient(patient_id).await,
            QueueCommand::ResetQueue => Ok(self.reset_queue()),
        }
    }

    async fn register_patient(
        &mut self,
        name: String,
        medical_record_number: String,
        national_id: Option<String>,
        date_of_birth: Option<NaiveDate>,
        phone: Option<String>,
        department: Option<String>,
    ) -> Result<CommandOutcome> {
        let name = non_empty(&name)
            .ok_or_else(|| ClinicError::Validation("患者姓名不能为空".to_string()))?;
        let medical_record_number = non_empty(&medical_record_number)
            .ok_or_else(|| ClinicError::Validation("病历号不能为空".to_string()))?;
        self.check_date_of_birth(date_of_birth)?;

        let now = self.clock.now();
        let mut patient = Patient::new(name, medical_record_number, now);
        patient.national_id = national_id.as_deref().and_then(non_empty);
        patient.date_of_birth = date_of_birth;
        patient.phone = phone.as_deref().and_then(non_empty);
        self.store.insert_patient(&patient).await?;

        let visit = match self.open_visit(&patient, department).await {
            Ok(visit) => visit,
            Err(e) => {
                // 撤销主档案
                if let Err(rollback) = self.store.delete_patient(&patient.id).await {
                    warn!(
                        "Failed to roll back patient {} after visit error: {}",
                        patient.id, rollback
                    );
                }
                return Err(e);
            }
        };
        info!(
            "Registered patient {} ({}) with queue number {}",
            patient.id, patient.name, visit.queue_number
        );
        Ok(CommandOutcome::Registered { patient, visit })
    }

    async fn join_queue(
        &mut self,
        patient_id: PatientId,
        department: Option<String>,
    ) -> Result<CommandOutcome> {
        let patient = self
            .store
            .find_patient(&patient_id)
            .await?
            .ok_or_else(|| ClinicError::NotFound(format!("患者 {} 不存在", patient_id)))?;

        let today = self.clock.today();
        if self.store.find_visit(&patient_id, today).await?.is_some() {
            return Err(ClinicError::Duplicate(format!(
                "患者 {} 今天已经排队",
                patient_id
            )));
        }

        let visit = self.open_visit(&patient, department).await?;
        info!(
            "Patient {} joined today's queue with number {}",
            patient_id, visit.queue_number
        );
        Ok(CommandOutcome::Joined { patient, visit })
    }

    /// 写入当天的等候记录并入队
    async fn open_visit(&mut self, patient: &Patient, department: Option<String>) -> Result<Visit> {
        let now = self.clock.now();
        let department = department
            .as_deref()
            .and_then(non_empty)
            .unwrap_or_else(|| self.settings.default_department.clone());
        let queue_number = self.store.next_queue_number(now.date()).await?;

        let visit = Visit::new(patient.id, queue_number, department, now);
        self.store.insert_visit(&visit).await?;
        self.queue.enqueue(patient.id);
        Ok(visit)
    }

    async fn call_next(&mut self) -> Result<CommandOutcome> {
        let today = self.clock.today();

        loop {
            let Some(patient_id) = self.queue.call_next() else {
                return Ok(CommandOutcome::QueueEmpty);
            };

            let mut visit = match self.store.find_visit(&patient_id, today).await {
                Ok(Some(visit)) => visit,
                Ok(None) => {
                    warn!("Queued patient {} has no visit today, dropping", patient_id);
                    self.queue.remove_from_called(&patient_id);
                    continue;
                }
                Err(e) => {
                    self.queue.revert_call(&patient_id);
                    return Err(e);
                }
            };

            if !self
                .state_machine
                .can_transition(visit.status, VisitEvent::Call)
            {
                warn!(
                    "Queued patient {} is already {}, dropping from queue",
                    patient_id, visit.status
                );
                self.queue.remove_from_called(&patient_id);
                continue;
            }

            visit.status = self.state_machine.transition(visit.status, VisitEvent::Call)?;
            visit.called_at = Some(self.clock.now());
            if let Err(e) = self.store.update_visit(&visit).await {
                self.queue.revert_call(&patient_id);
                return Err(e);
            }

            let announcement = self.announcement_for(&visit, false).await;
            self.announcer.announce(&announcement);
            info!(
                "Called patient {} with queue number {}",
                patient_id, visit.queue_number
            );
            return Ok(CommandOutcome::Called {
                visit,
                announcement,
            });
        }
    }

    async fn repeat_call(&mut self, patient_id: Option<PatientId>) -> Result<CommandOutcome> {
        let Some(last) = self.queue.last_called().copied() else {
            return Ok(CommandOutcome::NothingCalled);
        };

        let patient_id = match patient_id {
            Some(id) if self.queue.is_called(&id) => id,
            Some(id) => {
                return Err(ClinicError::NotFound(format!(
                    "患者 {} 不在已叫号列表中",
                    id
                )))
            }
            None => last,
        };

        let visit = self.require_visit(&patient_id).await?;
        let announcement = self.announcement_for(&visit, true).await;
        self.announcer.announce(&announcement);
        info!("Repeated call for patient {}", patient_id);
        Ok(CommandOutcome::Repeated { announcement })
    }

    async fn record_examination(
        &mut self,
        patient_id: PatientId,
        examination: Examination,
    ) -> Result<CommandOutcome> {
        if examination.diagnosis.trim().is_empty() {
            return Err(ClinicError::Validation("诊断不能为空".to_string()));
        }

        let mut visit = self.require_visit(&patient_id).await?;
        visit.status = self
            .state_machine
            .transition(visit.status, VisitEvent::Examine)?;
        visit.examined_at = Some(self.clock.now());
        visit.examination = Some(examination);
        self.store.update_visit(&visit).await?;

        self.queue.remove_from_called(&patient_id);
        info!("Recorded examination for patient {}", patient_id);
        Ok(CommandOutcome::Examined { visit })
    }

    async fn dispense(
        &mut self,
        patient_id: PatientId,
        available: bool,
        note: Option<String>,
    ) -> Result<CommandOutcome> {
        let event = if available {
            VisitEvent::MedicationReady
        } else {
            VisitEvent::MedicationUnavailable
        };

        let mut visit = self.require_visit(&patient_id).await?;
        visit.status = self.state_machine.transition(visit.status, event)?;
        visit.dispensed_at = Some(self.clock.now());
        visit.pharmacy_note = note.as_deref().and_then(non_empty);
        self.store.update_visit(&visit).await?;

        info!("Patient {} medication status is {}", patient_id, visit.status);
        Ok(CommandOutcome::Dispensed { visit })
    }

    async fn complete_service(&mut self, patient_id: PatientId) -> Result<CommandOutcome> {
        let mut visit = self.require_visit(&patient_id).await?;
        visit.status = self
            .state_machine
            .transition(visit.status, VisitEvent::Complete)?;
        visit.completed_at = Some(self.clock.now());
        self.store.update_visit(&visit).await?;

        self.queue.remove(&patient_id);
        info!("Completed service for patient {}", patient_id);
        Ok(CommandOutcome::Completed { visit })
    }

    async fn update_patient(
        &mut self,
        patient_id: PatientId,
        update: PatientUpdate,
    ) -> Result<CommandOutcome> {
        if matches!(update.name.as_deref(), Some(name) if name.trim().is_empty()) {
            return Err(ClinicError::Validation("患者姓名不能为空".to_string()));
        }
        if matches!(update.medical_record_number.as_deref(), Some(mrn) if mrn.trim().is_empty()) {
            return Err(ClinicError::Validation("病历号不能为空".to_string()));
        }
        self.check_date_of_birth(update.date_of_birth)?;

        let before = self
            .store
            .find_patient(&patient_id)
            .await?
            .ok_or_else(|| ClinicError::NotFound(format!("患者 {} 不存在", patient_id)))?;
        if update.is_empty() {
            return Ok(CommandOutcome::PatientUpdated {
                patient: before,
                changed: false,
            });
        }

        if !self
            .store
            .update_patient(&patient_id, &update, self.clock.now())
            .await?
        {
            return Err(ClinicError::NotFound(format!("患者 {} 不存在", patient_id)));
        }
        let patient = self
            .store
            .find_patient(&patient_id)
            .await?
            .ok_or_else(|| ClinicError::NotFound(format!("患者 {} 不存在", patient_id)))?;

        let changed = patient != before;
        info!("Updated patient {} (changed: {})", patient_id, changed);
        Ok(CommandOutcome::PatientUpdated { patient, changed })
    }

    async fn remove_patient(&mut self, patient_id: PatientId) -> Result<CommandOutcome> {
        let record_existed = self.store.delete_patient(&patient_id).await?;
        let removed_from_queue = self.queue.remove(&patient_id);

        info!(
            "Removed patient {} (record: {}, queue: {})",
            patient_id, record_existed, removed_from_queue
        );
        Ok(CommandOutcome::PatientRemoved {
            patient_id,
            record_existed,
            removed_from_queue,
        })
    }

    /// 手动清空：只影响运行时队列，存储记录不变，重启后会重新恢复
    fn reset_queue(&mut self) -> CommandOutcome {
        let cleared_waiting = self.queue.waiting_len();
        let cleared_called = self.queue.called_len();
        self.queue.reset();

        warn!(
            "Queue reset by operator: cleared {} waiting and {} called",
            cleared_waiting, cleared_called
        );
        CommandOutcome::QueueReset {
            cleared_waiting,
            cleared_called,
        }
    }

    fn check_date_of_birth(&self, date_of_birth: Option<NaiveDate>) -> Result<()> {
        match date_of_birth {
            Some(date) if date > self.clock.today() => Err(ClinicError::Validation(format!(
                "出生日期 {} 晚于今天",
                date
            ))),
            _ => Ok(()),
        }
    }

    async fn require_visit(&self, patient_id: &PatientId) -> Result<Visit> {
        let today = self.clock.today();
        self.store
            .find_visit(patient_id, today)
            .await?
            .ok_or_else(|| {
                ClinicError::NotFound(format!("患者 {} 在 {} 没有就诊记录", patient_id, today))
            })
    }

    async fn announcement_for(&self, visit: &Visit, repeat: bool) -> Announcement {
        let name = match self.store.find_patient(&visit.patient_id).await {
            Ok(Some(patient)) => patient.name,
            Ok(None) => visit.patient_id.to_string(),
            Err(e) => {
                warn!("Could not load patient {} for announcement: {}", visit.patient_id, e);
                visit.patient_id.to_string()
            }
        };

        Announcement {
            queue_number: visit.queue_number,
            name,
            service_point: self.settings.service_point.clone(),
            repeat,
        }
    }

    /// 当天记录与档案的快照，缺失档案的记录跳过
    async fn snapshot(&self) -> Result<DaySnapshot> {
        let mut snapshot = DaySnapshot::new();
        for visit in self.store.visits_on(self.clock.today()).await? {
            match self.store.find_patient(&visit.patient_id).await? {
                Some(patient) => snapshot.insert(patient, visit),
                None => debug!("Visit for unknown patient {} skipped", visit.patient_id),
            }
        }
        Ok(snapshot)
    }

    /// 等候看板，按排队顺序
    pub async fn waiting_board(&self) -> Result<Vec<BoardRow>> {
        let snapshot = self.snapshot().await?;
        Ok(snapshot.rows(self.queue.waiting()))
    }

    /// 已叫号看板，最近叫号的在前
    pub async fn called_board(&self) -> Result<Vec<BoardRow>> {
        let snapshot = self.snapshot().await?;
        Ok(snapshot.rows(self.queue.called().rev()))
    }

    /// 当天指定状态的记录，按排队号排序
    pub async fn visits_with_status(&self, status: PatientStatus) -> Result<Vec<BoardRow>> {
        let snapshot = self.snapshot().await?;
        Ok(snapshot.rows_with_status(status))
    }

    /// 当天概况
    pub async fn overview(&self) -> Result<QueueOverview> {
        let today = self.clock.today();
        let visits = self.store.visits_on(today).await?;
        Ok(QueueOverview::new(
            today,
            self.queue.waiting_len(),
            self.queue.called_len(),
            &visits,
        ))
    }

    pub async fn find_patient(&self, patient_id: &PatientId) -> Result<Option<Patient>> {
        self.store.find_patient(patient_id).await
    }

    pub async fn search_patients(&self, query: &str) -> Result<Vec<Patient>> {
        self.store.search_patients(query).await
    }

    pub async fn patient_history(&self, patient_id: &PatientId) -> Result<Vec<Visit>> {
        self.store.patient_history(patient_id).await
    }

    /// 患者当天的就诊记录
    pub async fn todays_visit(&self, patient_id: &PatientId) -> Result<Option<Visit>> {
        self.store.find_visit(patient_id, self.clock.today()).await
    }

    /// 按当天排队号查找就诊记录
    pub async fn find_by_queue_number(&self, queue_number: u32) -> Result<Option<Visit>> {
        let visits = self.store.visits_on(self.clock.today()).await?;
        Ok(visits
            .into_iter()
            .find(|visit| visit.queue_number == queue_number))
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// 获取排队引擎（只读）
    pub fn queue(&self) -> &QueueEngine<PatientId> {
        &self.queue
    }

    /// 获取状态机实例
    pub fn state_machine(&self) -> &VisitStateMachine {
        &self.state_machine
    }

    /// 获取存储实例
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn marker_store(&self) -> &M {
        self.cycle.marker_store()
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::announcement::RecordingAnnouncer;
    use clinic_core::FixedClock;
    use clinic_store::{
        CsvPatientStore, FileMarkerStore, InMemoryMarkerStore, InMemoryPatientStore,
    };
    use tempfile::TempDir;

    type TestWorkflow = ClinicWorkflow<InMemoryPatientStore, InMemoryMarkerStore, FixedClock>;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    struct Harness {
        workflow: TestWorkflow,
        clock: Arc<FixedClock>,
        announcer: Arc<RecordingAnnouncer>,
    }

    async fn harness(today: NaiveDate) -> Harness {
        let clock = Arc::new(FixedClock::on(today));
        let announcer = Arc::new(RecordingAnnouncer::new());
        let mut workflow = ClinicWorkflow::new(
            InMemoryPatientStore::new(),
            InMemoryMarkerStore::new(),
            clock.clone(),
        )
        .with_announcer(announcer.clone());
        workflow.bootstrap().await.unwrap();

        Harness {
            workflow,
            clock,
            announcer,
        }
    }

    fn register(name: &str, mrn: &str) -> QueueCommand {
        QueueCommand::RegisterPatient {
            name: name.to_string(),
            medical_record_number: mrn.to_string(),
            national_id: None,
            date_of_birth: None,
            phone: None,
            department: None,
        }
    }

    async fn register_id(workflow: &mut TestWorkflow, name: &str) -> PatientId {
        match workflow
            .execute(register(name, &format!("RM-{}", name)))
            .await
            .unwrap()
        {
            CommandOutcome::Registered { patient, .. } => patient.id,
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    fn examination(diagnosis: &str) -> Examination {
        Examination {
            complaint: "Fever".to_string(),
            diagnosis: diagnosis.to_string(),
            prescription: "Paracetamol 500mg".to_string(),
            examiner: Some("dr. Rina".to_string()),
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_register_assigns_queue_numbers() {
        let mut h = harness(date(2024, 1, 2)).await;

        let outcome = h.workflow.execute(register("Ani", "RM-1")).await.unwrap();
        let CommandOutcome::Registered { patient, visit } = outcome else {
            panic!("expected registration");
        };
        assert_eq!(visit.queue_number, 1);
        assert_eq!(visit.status, PatientStatus::Waiting);
        assert_eq!(visit.department, "General");
        assert_eq!(visit.visit_date, date(2024, 1, 2));

        register_id(&mut h.workflow, "Bayu").await;
        assert_eq!(h.workflow.queue().waiting_len(), 2);
        assert_eq!(h.workflow.queue().waiting_position(&patient.id), Some(1));

        let board = h.workflow.waiting_board().await.unwrap();
        assert_eq!(board[1].queue_number, 2);
        assert_eq!(board[1].name, "Bayu");

        let found = h.workflow.find_by_queue_number(1).await.unwrap().unwrap();
        assert_eq!(found.patient_id, patient.id);
        assert!(h.workflow.find_by_queue_number(9).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_register_validation() {
        let mut h = harness(date(2024, 1, 2)).await;
        let result = h.workflow.execute(register("  ", "RM-1")).await;
        assert!(matches!(result, Err(ClinicError::Validation(_))));
        let result = h.workflow.execute(register("Ani", "")).await;
        assert!(matches!(result, Err(ClinicError::Validation(_))));

        let result = h
            .workflow
            .execute(QueueCommand::RegisterPatient {
                name: "Ani".to_string(),
                medical_record_number: "RM-1".to_string(),
                national_id: None,
                date_of_birth: Some(date(2024, 1, 3)),
                phone: None,
                department: None,
            })
            .await;
        assert!(matches!(result, Err(ClinicError::Validation(_))));
        assert!(h.workflow.queue().is_empty());
        assert!(h.workflow.search_patients("RM-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_call_next_updates_status_and_announces() {
        let mut h = harness(date(2024, 1, 2)).await;
        let ani = register_id(&mut h.workflow, "Ani").await;
        register_id(&mut h.workflow, "Bayu").await;

        let outcome = h.workflow.execute(QueueCommand::CallNext).await.unwrap();
        let CommandOutcome::Called { visit, announcement } = outcome else {
            panic!("expected call");
        };
        assert_eq!(visit.patient_id, ani);
        assert_eq!(visit.status, PatientStatus::Called);
        assert!(visit.called_at.is_some());
        assert_eq!(announcement.name, "Ani");
        assert_eq!(announcement.queue_number, 1);

        let stored = h.workflow.todays_visit(&ani).await.unwrap().unwrap();
        assert_eq!(stored.status, PatientStatus::Called);
        assert_eq!(h.workflow.queue().last_called(), Some(&ani));
        assert_eq!(h.announcer.announcements().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_visit_write_rolls_back_registration() {
        let mut h = harness(date(2024, 1, 2)).await;

        h.workflow.store().set_fail_visit_writes(true);
        let result = h.workflow.execute(register("Ani", "RM-1")).await;
        assert!(matches!(result, Err(ClinicError::Storage(_))));
        assert!(h.workflow.search_patients("RM-1").await.unwrap().is_empty());
        assert!(h.workflow.queue().is_empty());

        h.workflow.store().set_fail_visit_writes(false);
        h.workflow.execute(register("Ani", "RM-1")).await.unwrap();
        assert_eq!(h.workflow.search_patients("RM-1").await.unwrap().len(), 1);
        assert_eq!(h.workflow.queue().waiting_len(), 1);
    }

    #[tokio::test]
    async fn test_update_patient_uses_workflow_clock() {
        let mut h = harness(date(2024, 1, 2)).await;
        let ani = register_id(&mut h.workflow, "Ani").await;

        h.clock.set_date(date(2024, 1, 5));
        let update = PatientUpdate {
            phone: Some("0812".to_string()),
            ..Default::default()
        };
        h.workflow
            .execute(QueueCommand::UpdatePatient {
                patient_id: ani,
                update,
            })
            .await
            .unwrap();

        let patient = h.workflow.find_patient(&ani).await.unwrap().unwrap();
        assert_eq!(patient.updated_at, h.clock.now());
        assert_eq!(patient.updated_at.date(), date(2024, 1, 5));
    }

    #[tokio::test]
    async fn test_call_next_on_empty_queue() {
        let mut h = harness(date(2024, 1, 2)).await;
        let outcome = h.workflow.execute(QueueCommand::CallNext).await.unwrap();
        assert_eq!(outcome, CommandOutcome::QueueEmpty);

        let outcome = h
            .workflow
            .execute(QueueCommand::RepeatCall { patient_id: None })
            .await
            .unwrap();
        assert_eq!(outcome, CommandOutcome::NothingCalled);
        assert!(h.announcer.announcements().is_empty());
    }

    #[tokio::test]
    async fn test_failed_call_write_leaves_queue_unchanged() {
        let mut h = harness(date(2024, 1, 2)).await;
        let ani = register_id(&mut h.workflow, "Ani").await;
        let bayu = register_id(&mut h.workflow, "Bayu").await;

        h.workflow.store().set_fail_writes(true);
        let result = h.workflow.execute(QueueCommand::CallNext).await;
        assert!(matches!(result, Err(ClinicError::Storage(_))));

        let waiting: Vec<_> = h.workflow.queue().waiting().copied().collect();
        assert_eq!(waiting, vec![ani, bayu]);
        assert_eq!(h.workflow.queue().called_len(), 0);
        assert!(h.announcer.announcements().is_empty());

        h.workflow.store().set_fail_writes(false);
        let outcome = h.workflow.execute(QueueCommand::CallNext).await.unwrap();
        assert!(matches!(outcome, CommandOutcome::Called { visit, .. } if visit.patient_id == ani));
    }

    #[tokio::test]
    async fn test_call_next_skips_ids_without_visit() {
        let mut h = harness(date(2024, 1, 2)).await;
        let ani = register_id(&mut h.workflow, "Ani").await;
        let bayu = register_id(&mut h.workflow, "Bayu").await;

        // 绕过工作流直接删除存储记录
        h.workflow.store().delete_patient(&ani).await.unwrap();

        let outcome = h.workflow.execute(QueueCommand::CallNext).await.unwrap();
        assert!(matches!(outcome, CommandOutcome::Called { visit, .. } if visit.patient_id == bayu));
        assert!(!h.workflow.queue().is_called(&ani));
        assert!(!h.workflow.queue().is_waiting(&ani));
    }

    #[tokio::test]
    async fn test_full_visit_lifecycle() {
        let mut h = harness(date(2024, 1, 2)).await;
        let ani = register_id(&mut h.workflow, "Ani").await;
        h.workflow.execute(QueueCommand::CallNext).await.unwrap();

        let outcome = h
            .workflow
            .execute(QueueCommand::RecordExamination {
                patient_id: ani,
                examination: examination("Influenza"),
            })
            .await
            .unwrap();
        let CommandOutcome::Examined { visit } = outcome else {
            panic!("expected examination");
        };
        assert_eq!(visit.status, PatientStatus::Examined);
        assert!(!h.workflow.queue().is_called(&ani));

        h.workflow
            .execute(QueueCommand::Dispense {
                patient_id: ani,
                available: false,
                note: Some("Out of stock until Friday".to_string()),
            })
            .await
            .unwrap();
        let stored = h.workflow.todays_visit(&ani).await.unwrap().unwrap();
        assert_eq!(stored.status, PatientStatus::MedicationUnavailable);
        assert_eq!(stored.pharmacy_note.as_deref(), Some("Out of stock until Friday"));

        h.workflow
            .execute(QueueCommand::CompleteService { patient_id: ani })
            .await
            .unwrap();
        let done = h.workflow.visits_with_status(PatientStatus::Done).await.unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].patient_id, ani);
        assert!(h.workflow.queue().is_empty());

        let history = h.workflow.patient_history(&ani).await.unwrap();
        assert_eq!(history.len(), 1);
        assert!(history[0].examination.is_some());
    }

    #[tokio::test]
    async fn test_out_of_order_transitions_rejected() {
        let mut h = harness(date(2024, 1, 2)).await;
        let ani = register_id(&mut h.workflow, "Ani").await;

        let result = h
            .workflow
            .execute(QueueCommand::RecordExamination {
                patient_id: ani,
                examination: examination("Influenza"),
            })
            .await;
        assert!(matches!(result, Err(ClinicError::InvalidStateTransition { .. })));

        h.workflow.execute(QueueCommand::CallNext).await.unwrap();
        let result = h
            .workflow
            .execute(QueueCommand::CompleteService { patient_id: ani })
            .await;
        assert!(matches!(result, Err(ClinicError::InvalidStateTransition { .. })));

        let result = h
            .workflow
            .execute(QueueCommand::RecordExamination {
                patient_id: ani,
                examination: examination("  "),
            })
            .await;
        assert!(matches!(result, Err(ClinicError::Validation(_))));

        let stored = h.workflow.todays_visit(&ani).await.unwrap().unwrap();
        assert_eq!(stored.status, PatientStatus::Called);
        assert!(h.workflow.queue().is_called(&ani));
    }

    #[tokio::test]
    async fn test_repeat_call() {
        let mut h = harness(date(2024, 1, 2)).await;
        let ani = register_id(&mut h.workflow, "Ani").await;
        let bayu = register_id(&mut h.workflow, "Bayu").await;
        h.workflow.execute(QueueCommand::CallNext).await.unwrap();
        h.workflow.execute(QueueCommand::CallNext).await.unwrap();

        let outcome = h
            .workflow
            .execute(QueueCommand::RepeatCall { patient_id: None })
            .await
            .unwrap();
        let CommandOutcome::Repeated { announcement } = outcome else {
            panic!("expected repeat");
        };
        assert_eq!(announcement.name, "Bayu");
        assert!(announcement.repeat);

        let outcome = h
            .workflow
            .execute(QueueCommand::RepeatCall { patient_id: Some(ani) })
            .await
            .unwrap();
        assert!(matches!(outcome, CommandOutcome::Repeated { announcement } if announcement.name == "Ani"));

        let stranger = PatientId::new();
        let result = h
            .workflow
            .execute(QueueCommand::RepeatCall { patient_id: Some(stranger) })
            .await;
        assert!(matches!(result, Err(ClinicError::NotFound(_))));

        let called = h.workflow.called_board().await.unwrap();
        assert_eq!(called[0].patient_id, bayu);
        assert_eq!(called[1].patient_id, ani);
        assert_eq!(h.announcer.announcements().len(), 4);
    }

    #[tokio::test]
    async fn test_join_queue_once_per_day() {
        let mut h = harness(date(2024, 1, 2)).await;
        let ani = register_id(&mut h.workflow, "Ani").await;

        let result = h
            .workflow
            .execute(QueueCommand::JoinQueue {
                patient_id: ani,
                department: None,
            })
            .await;
        assert!(matches!(result, Err(ClinicError::Duplicate(_))));

        let result = h
            .workflow
            .execute(QueueCommand::JoinQueue {
                patient_id: PatientId::new(),
                department: None,
            })
            .await;
        assert!(matches!(result, Err(ClinicError::NotFound(_))));

        // 第二天重新排队，排队号从1开始
        h.clock.set_date(date(2024, 1, 3));
        assert!(h.workflow.check_rollover().await.unwrap().is_rollover());
        let outcome = h
            .workflow
            .execute(QueueCommand::JoinQueue {
                patient_id: ani,
                department: Some("Dental".to_string()),
            })
            .await
            .unwrap();
        let CommandOutcome::Joined { visit, .. } = outcome else {
            panic!("expected join");
        };
        assert_eq!(visit.queue_number, 1);
        assert_eq!(visit.department, "Dental");
        assert_eq!(h.workflow.patient_history(&ani).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_and_remove_patient() {
        let mut h = harness(date(2024, 1, 2)).await;
        let ani = register_id(&mut h.workflow, "Ani").await;
        let bayu = register_id(&mut h.workflow, "Bayu").await;
        h.workflow.execute(QueueCommand::CallNext).await.unwrap();

        let outcome = h
            .workflow
            .execute(QueueCommand::UpdatePatient {
                patient_id: bayu,
                update: PatientUpdate {
                    phone: Some("08123".to_string()),
                    ..Default::default()
                },
            })
            .await
            .unwrap();
        assert!(matches!(outcome, CommandOutcome::PatientUpdated { changed: true, .. }));

        let outcome = h
            .workflow
            .execute(QueueCommand::RemovePatient { patient_id: ani })
            .await
            .unwrap();
        assert_eq!(
            outcome,
            CommandOutcome::PatientRemoved {
                patient_id: ani,
                record_existed: true,
                removed_from_queue: true,
            }
        );
        assert!(h.workflow.find_patient(&ani).await.unwrap().is_none());
        assert_eq!(h.workflow.queue().called_len(), 0);
        assert_eq!(h.workflow.search_patients("bayu").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_manual_reset_keeps_store() {
        let mut h = harness(date(2024, 1, 2)).await;
        register_id(&mut h.workflow, "Ani").await;
        register_id(&mut h.workflow, "Bayu").await;

        let outcome = h.workflow.execute(QueueCommand::ResetQueue).await.unwrap();
        assert_eq!(
            outcome,
            CommandOutcome::QueueReset {
                cleared_waiting: 2,
                cleared_called: 0
            }
        );
        assert!(h.workflow.queue().is_empty());

        let overview = h.workflow.overview().await.unwrap();
        assert_eq!(overview.total_visits, 2);
        assert_eq!(overview.count(PatientStatus::Waiting), 2);
        assert_eq!(overview.waiting_len, 0);

        // 重启后从存储恢复
        h.workflow.bootstrap().await.unwrap();
        assert_eq!(h.workflow.queue().waiting_len(), 2);
    }

    #[tokio::test]
    async fn test_rollover_clears_queue_but_not_records() {
        let mut h = harness(date(2024, 1, 1)).await;
        register_id(&mut h.workflow, "Ani").await;
        register_id(&mut h.workflow, "Bayu").await;
        h.workflow.execute(QueueCommand::CallNext).await.unwrap();

        h.clock.set_date(date(2024, 1, 2));
        let outcome = h.workflow.check_rollover().await.unwrap();
        assert!(outcome.is_rollover());
        assert!(h.workflow.queue().is_empty());
        assert!(!h.workflow.check_rollover().await.unwrap().is_rollover());

        assert_eq!(
            h.workflow.store().visits_on(date(2024, 1, 1)).await.unwrap().len(),
            2
        );
        assert!(h.workflow.waiting_board().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_restart_rebuilds_queue_from_csv() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(FixedClock::on(date(2024, 1, 2)));

        let (ani, bayu, citra) = {
            let mut workflow = ClinicWorkflow::new(
                CsvPatientStore::in_dir(dir.path()),
                FileMarkerStore::in_dir(dir.path()),
                clock.clone(),
            );
            workflow.bootstrap().await.unwrap();

            let mut ids = Vec::new();
            for name in ["Ani", "Bayu", "Citra"] {
                match workflow.execute(register(name, name)).await.unwrap() {
                    CommandOutcome::Registered { patient, .. } => ids.push(patient.id),
                    other => panic!("unexpected outcome {:?}", other),
                }
            }
            workflow.execute(QueueCommand::CallNext).await.unwrap();
            (ids[0], ids[1], ids[2])
        };

        let mut restarted = ClinicWorkflow::new(
            CsvPatientStore::in_dir(dir.path()),
            FileMarkerStore::in_dir(dir.path()),
            clock.clone(),
        );
        let outcome = restarted.bootstrap().await.unwrap();
        assert_eq!(outcome, CycleOutcome::Unchanged { today: date(2024, 1, 2) });

        let waiting: Vec<_> = restarted.queue().waiting().copied().collect();
        assert_eq!(waiting, vec![bayu, citra]);
        assert_eq!(restarted.queue().last_called(), Some(&ani));

        // 第二天重启：队列清空，记录保留
        clock.set_date(date(2024, 1, 3));
        let mut next_day = ClinicWorkflow::new(
            CsvPatientStore::in_dir(dir.path()),
            FileMarkerStore::in_dir(dir.path()),
            clock.clone(),
        );
        assert!(next_day.bootstrap().await.unwrap().is_rollover());
        assert!(next_day.queue().is_empty());
        assert_eq!(next_day.search_patients("citra").await.unwrap().len(), 1);
    }
}
