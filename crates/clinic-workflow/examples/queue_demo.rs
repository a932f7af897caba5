//! 排队工作流演示程序
//!
//! 用内存存储走一遍完整流程：挂号、叫号、检查、发药、完成，以及跨日重置

use chrono::NaiveDate;
use clinic_core::{Examination, FixedClock, PatientStatus};
use clinic_store::{InMemoryMarkerStore, InMemoryPatientStore};
use clinic_workflow::{ClinicWorkflow, CommandOutcome, QueueCommand};
use std::sync::Arc;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_writer(std::io::stderr)
        .init();

    let day_one = NaiveDate::from_ymd_opt(2024, 1, 1).ok_or("invalid date")?;
    let clock = Arc::new(FixedClock::on(day_one));
    let mut workflow = ClinicWorkflow::new(
        InMemoryPatientStore::new(),
        InMemoryMarkerStore::new(),
        clock.clone(),
    );

    println!("Clinic queue demo ({})\n", day_one);
    workflow.bootstrap().await?;

    // 1. 挂号
    let mut ids = Vec::new();
    for (name, mrn) in [("Ani", "RM-001"), ("Bayu", "RM-002"), ("Citra", "RM-003")] {
        if let CommandOutcome::Registered { patient, visit } = workflow
            .execute(QueueCommand::RegisterPatient {
                name: name.to_string(),
                medical_record_number: mrn.to_string(),
                national_id: None,
                date_of_birth: None,
                phone: None,
                department: None,
            })
            .await?
        {
            println!("Registered {} as {:03}", patient.name, visit.queue_number);
            ids.push(patient.id);
        }
    }

    // 2. 叫号
    for _ in 0..2 {
        if let CommandOutcome::Called { announcement, .. } =
            workflow.execute(QueueCommand::CallNext).await?
        {
            println!("Announce: {}", announcement.message());
        }
    }

    // 3. 第一位患者完成检查、发药和结束
    let first = ids[0];
    workflow
        .execute(QueueCommand::RecordExamination {
            patient_id: first,
            examination: Examination {
                complaint: "Cough".to_string(),
                diagnosis: "Common cold".to_string(),
                prescription: "Vitamin C".to_string(),
                examiner: None,
                notes: None,
            },
        })
        .await?;
    workflow
        .execute(QueueCommand::Dispense {
            patient_id: first,
            available: true,
            note: None,
        })
        .await?;
    workflow
        .execute(QueueCommand::CompleteService { patient_id: first })
        .await?;

    // 4. 当天概况
    let overview = workflow.overview().await?;
    println!("\nOverview:");
    println!("   waiting queue: {}", overview.waiting_len);
    println!("   called list:   {}", overview.called_len);
    println!("   done:          {}", overview.count(PatientStatus::Done));

    for row in workflow.called_board().await? {
        println!("   called {} {}", row.display_number(), row.name);
    }

    // 5. 跨日
    clock.set_date(day_one.succ_opt().ok_or("invalid date")?);
    let outcome = workflow.check_rollover().await?;
    if let Some(notice) = outcome.notice() {
        println!("\n{}", notice);
    }
    println!(
        "Queue after rollover: {} waiting, {} called",
        workflow.queue().waiting_len(),
        workflow.queue().called_len()
    );

    Ok(())
}
