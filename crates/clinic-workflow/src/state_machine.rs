//! 就诊状态机
//!
//! 管理当日就诊记录的状态流转，拒绝表外的任何转换

use clinic_core::{ClinicError, PatientStatus, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 就诊状态转换事件
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum VisitEvent {
    Call,
    Examine,
    MedicationReady,
    MedicationUnavailable,
    Complete,
}

/// 就诊状态机
#[derive(Debug)]
pub struct VisitStateMachine {
    transitions: HashMap<(PatientStatus, VisitEvent), PatientStatus>,
}

impl VisitStateMachine {
    /// 创建新的状态机实例
    pub fn new() -> Self {
        let mut transitions = HashMap::new();

        // 定义状态转换规则
        transitions.insert((PatientStatus::Waiting, VisitEvent::Call), PatientStatus::Called);
        transitions.insert((PatientStatus::Called, VisitEvent::Examine), PatientStatus::Examined);
        transitions.insert(
            (PatientStatus::Examined, VisitEvent::MedicationReady),
            PatientStatus::ReadyForMedication,
        );
        transitions.insert(
            (PatientStatus::Examined, VisitEvent::MedicationUnavailable),
            PatientStatus::MedicationUnavailable,
        );
        transitions.insert(
            (PatientStatus::ReadyForMedication, VisitEvent::Complete),
            PatientStatus::Done,
        );
        transitions.insert(
            (PatientStatus::MedicationUnavailable, VisitEvent::Complete),
            PatientStatus::Done,
        );

        Self { transitions }
    }

    /// 检查状态转换是否有效
    pub fn can_transition(&self, from: PatientStatus, event: VisitEvent) -> bool {
        self.transitions.contains_key(&(from, event))
    }

    /// 执行状态转换
    pub fn transition(&self, from: PatientStatus, event: VisitEvent) -> Result<PatientStatus> {
        match self.transitions.get(&(from, event)) {
            Some(to) => Ok(*to),
            None => Err(ClinicError::InvalidStateTransition {
                from: from.to_string(),
                event: format!("{:?}", event),
            }),
        }
    }

    /// 获取所有可能的状态
    pub fn all_states() -> Vec<PatientStatus> {
        vec![
            PatientStatus::Waiting,
            PatientStatus::Called,
            PatientStatus::Examined,
            PatientStatus::ReadyForMedication,
            PatientStatus::MedicationUnavailable,
            PatientStatus::Done,
        ]
    }

    /// 获取状态的所有可能事件
    pub fn possible_events(&self, current_state: PatientStatus) -> Vec<VisitEvent> {
        self.transitions
            .keys()
            .filter(|(state, _)| *state == current_state)
            .map(|(_, event)| *event)
            .collect()
    }
}

impl Default for VisitStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        let sm = VisitStateMachine::new();

        assert!(sm.can_transition(PatientStatus::Waiting, VisitEvent::Call));
        assert!(sm.can_transition(PatientStatus::Called, VisitEvent::Examine));
        assert!(sm.can_transition(PatientStatus::Examined, VisitEvent::MedicationReady));
        assert!(sm.can_transition(PatientStatus::Examined, VisitEvent::MedicationUnavailable));
        assert!(sm.can_transition(PatientStatus::MedicationUnavailable, VisitEvent::Complete));
    }

    #[test]
    fn test_invalid_transitions() {
        let sm = VisitStateMachine::new();

        // 跳过检查直接完成
        assert!(!sm.can_transition(PatientStatus::Called, VisitEvent::Complete));
        assert!(!sm.can_transition(PatientStatus::Waiting, VisitEvent::Examine));
        assert!(!sm.can_transition(PatientStatus::Done, VisitEvent::Call));
        assert!(!sm.can_transition(PatientStatus::Called, VisitEvent::Call));
    }

    #[test]
    fn test_state_execution() {
        let sm = VisitStateMachine::new();

        let mut status = PatientStatus::Waiting;
        for event in [
            VisitEvent::Call,
            VisitEvent::Examine,
            VisitEvent::MedicationReady,
            VisitEvent::Complete,
        ] {
            status = sm.transition(status, event).unwrap();
        }
        assert_eq!(status, PatientStatus::Done);

        let result = sm.transition(PatientStatus::Waiting, VisitEvent::Complete);
        assert!(matches!(
            result,
            Err(ClinicError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn test_possible_events() {
        let sm = VisitStateMachine::new();

        let mut events = sm.possible_events(PatientStatus::Examined);
        events.sort_by_key(|e| format!("{:?}", e));
        assert_eq!(
            events,
            vec![VisitEvent::MedicationReady, VisitEvent::MedicationUnavailable]
        );
        assert!(sm.possible_events(PatientStatus::Done).is_empty());
        assert_eq!(VisitStateMachine::all_states().len(), 6);
    }
}
