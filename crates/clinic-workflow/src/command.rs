//! 工作流命令
//!
//! 操作台上的每个动作对应一个命令，由 `ClinicWorkflow::execute` 统一执行。

use crate::announcement::Announcement;
use chrono::NaiveDate;
use clinic_core::{Examination, Patient, PatientId, PatientUpdate, Visit};
use serde::{Deserialize, Serialize};

/// 操作台命令
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueueCommand {
    /// 新患者挂号并进入当天队列
    RegisterPatient {
        name: String,
        medical_record_number: String,
        national_id: Option<String>,
        date_of_birth: Option<NaiveDate>,
        phone: Option<String>,
        department: Option<String>,
    },
    /// 老患者当天再次排队
    JoinQueue {
        patient_id: PatientId,
        department: Option<String>,
    },
    /// 叫下一位
    CallNext,
    /// 重复叫号；未指定时重复最近一次
    RepeatCall { patient_id: Option<PatientId> },
    /// 记录检查结果
    RecordExamination {
        patient_id: PatientId,
        examination: Examination,
    },
    /// 药房发药
    Dispense {
        patient_id: PatientId,
        available: bool,
        note: Option<String>,
    },
    /// 完成就诊
    CompleteService { patient_id: PatientId },
    /// 修改患者档案
    UpdatePatient {
        patient_id: PatientId,
        update: PatientUpdate,
    },
    /// 删除患者及其就诊记录
    RemovePatient { patient_id: PatientId },
    /// 手动清空当天队列（仅运行时）
    ResetQueue,
}

impl QueueCommand {
    /// 是否需要操作员二次确认
    pub fn is_destructive(&self) -> bool {
        matches!(
            self,
            Self::RemovePatient { .. } | Self::ResetQueue | Self::CompleteService { .. }
        )
    }
}

/// 命令执行结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CommandOutcome {
    Registered { patient: Patient, visit: Visit },
    Joined { patient: Patient, visit: Visit },
    Called {
        visit: Visit,
        announcement: Announcement,
    },
    /// 等候队列为空
    QueueEmpty,
    Repeated { announcement: Announcement },
    /// 还没有叫过号
    NothingCalled,
    Examined { visit: Visit },
    Dispensed { visit: Visit },
    Completed { visit: Visit },
    PatientUpdated { patient: Patient, changed: bool },
    PatientRemoved {
        patient_id: PatientId,
        record_existed: bool,
        removed_from_queue: bool,
    },
    QueueReset {
        cleared_waiting: usize,
        cleared_called: usize,
    },
}
