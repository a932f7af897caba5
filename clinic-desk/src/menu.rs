//! 操作台菜单
//!
//! 只负责展示和输入，所有业务动作都转成 `QueueCommand` 交给工作流引擎。

use crate::console::Console;
use anyhow::Result;
use chrono::NaiveDate;
use clinic_core::utils::{
    format_optional_timestamp, format_queue_number, format_timestamp, parse_date,
};
use clinic_core::{Clock, Examination, Patient, PatientId, PatientStatus, PatientUpdate};
use clinic_store::{MarkerStore, PatientStore};
use clinic_workflow::{BoardRow, ClinicWorkflow, CommandOutcome, QueueCommand};
use tokio::io::AsyncRead;
use tracing::warn;

const RULE: &str = "======================================================================";
const THIN_RULE: &str = "----------------------------------------------------------------------";

/// 菜单选项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Register,
    JoinQueue,
    ShowWaiting,
    ShowCalled,
    ShowCompleted,
    Search,
    Edit,
    Remove,
    CallNext,
    RepeatCall,
    Examine,
    Dispense,
    Complete,
    Reset,
    Overview,
    Exit,
}

impl MenuChoice {
    const ENTRIES: [(&'static str, MenuChoice, &'static str); 16] = [
        ("1", MenuChoice::Register, "Register new patient"),
        ("2", MenuChoice::JoinQueue, "Queue existing patient for today"),
        ("3", MenuChoice::ShowWaiting, "Show waiting queue"),
        ("4", MenuChoice::ShowCalled, "Show called patients"),
        ("5", MenuChoice::ShowCompleted, "Show completed patients"),
        ("6", MenuChoice::Search, "Search patient records"),
        ("7", MenuChoice::Edit, "Edit patient record"),
        ("8", MenuChoice::Remove, "Remove patient record"),
        ("9", MenuChoice::CallNext, "Call next patient"),
        ("10", MenuChoice::RepeatCall, "Repeat a call"),
        ("11", MenuChoice::Examine, "Record examination"),
        ("12", MenuChoice::Dispense, "Dispense medication"),
        ("13", MenuChoice::Complete, "Mark service complete"),
        ("14", MenuChoice::Reset, "Reset daily queue"),
        ("15", MenuChoice::Overview, "Today's overview"),
        ("0", MenuChoice::Exit, "Exit"),
    ];

    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        Self::ENTRIES
            .iter()
            .find(|(key, _, _)| *key == input)
            .map(|(_, choice, _)| *choice)
    }

    pub fn print_menu() {
        println!("\nMENU:");
        for (key, _, label) in Self::ENTRIES.iter() {
            println!("{:>3}. {}", key, label);
        }
    }
}

/// 操作台
pub struct Desk<S, M, C, R> {
    workflow: ClinicWorkflow<S, M, C>,
    console: Console<R>,
    check_rollover_each_loop: bool,
}

impl<S, M, C, R> Desk<S, M, C, R>
where
    S: PatientStore,
    M: MarkerStore,
    C: Clock,
    R: AsyncRead + Unpin,
{
    pub fn new(
        workflow: ClinicWorkflow<S, M, C>,
        console: Console<R>,
        check_rollover_each_loop: bool,
    ) -> Self {
        Self {
            workflow,
            console,
            check_rollover_each_loop,
        }
    }

    pub fn workflow(&self) -> &ClinicWorkflow<S, M, C> {
        &self.workflow
    }

    /// 主循环，输入结束或选择退出时返回
    pub async fn run(&mut self) -> Result<()> {
        loop {
            if self.check_rollover_each_loop {
                match self.workflow.check_rollover().await {
                    Ok(outcome) => {
                        if let Some(notice) = outcome.notice() {
                            println!("\n{}", notice);
                        }
                    }
                    Err(e) => {
                        warn!("Daily rollover check failed: {}", e);
                        println!("\nWarning: could not check the date marker: {}", e);
                    }
                }
            }

            self.print_banner();
            MenuChoice::print_menu();

            let Some(input) = self.console.prompt("\nChoose an option: ").await? else {
                println!();
                break;
            };
            let Some(choice) = MenuChoice::parse(&input) else {
                println!("\nUnknown option: {}", input);
                continue;
            };
            if choice == MenuChoice::Exit {
                break;
            }

            if let Err(e) = self.handle(choice).await {
                println!("\nError: {:#}", e);
            }
        }

        println!("Goodbye.");
        Ok(())
    }

    fn print_banner(&self) {
        let queue = self.workflow.queue();
        println!("\n{}", RULE);
        println!("                 CLINIC QUEUE  {}", self.workflow.today());
        println!("{}", RULE);
        println!("Patients waiting : {}", queue.waiting_len());
        println!("Patients called  : {}", queue.called_len());
        println!("{}", RULE);
    }

    async fn handle(&mut self, choice: MenuChoice) -> Result<()> {
        match choice {
            MenuChoice::Register => self.register().await,
            MenuChoice::JoinQueue => self.join_queue().await,
            MenuChoice::ShowWaiting => {
                let rows = self.workflow.waiting_board().await?;
                print_board("WAITING QUEUE", &rows, "No patients waiting.");
                Ok(())
            }
            MenuChoice::ShowCalled => {
                let rows = self.workflow.called_board().await?;
                print_board("CALLED PATIENTS (most recent first)", &rows, "No patients called yet.");
                Ok(())
            }
            MenuChoice::ShowCompleted => {
                let rows = self.workflow.visits_with_status(PatientStatus::Done).await?;
                print_board("COMPLETED TODAY", &rows, "No completed patients today.");
                Ok(())
            }
            MenuChoice::Search => self.search().await,
            MenuChoice::Edit => self.edit().await,
            MenuChoice::Remove => {
                let Some(patient_id) = self.read_patient("Patient to remove").await? else {
                    return Ok(());
                };
                self.submit(QueueCommand::RemovePatient { patient_id }).await
            }
            MenuChoice::CallNext => self.submit(QueueCommand::CallNext).await,
            MenuChoice::RepeatCall => {
                let Some(input) = self
                    .console
                    .prompt_optional("Patient id or queue number (blank = last called): ")
                    .await?
                else {
                    return Ok(());
                };
                let patient_id = match input {
                    Some(input) => match self.resolve_patient(&input).await? {
                        Some(id) => Some(id),
                        None => return Ok(()),
                    },
                    None => None,
                };
                self.submit(QueueCommand::RepeatCall { patient_id }).await
            }
            MenuChoice::Examine => self.examine().await,
            MenuChoice::Dispense => self.dispense().await,
            MenuChoice::Complete => {
                let Some(patient_id) = self.read_patient("Patient to complete").await? else {
                    return Ok(());
                };
                self.submit(QueueCommand::CompleteService { patient_id }).await
            }
            MenuChoice::Reset => self.submit(QueueCommand::ResetQueue).await,
            MenuChoice::Overview => self.overview().await,
            MenuChoice::Exit => Ok(()),
        }
    }

    /// 执行命令；破坏性命令需要确认，放弃时什么都不做
    async fn submit(&mut self, command: QueueCommand) -> Result<()> {
        if command.is_destructive() {
            let question = match &command {
                QueueCommand::RemovePatient { patient_id } => {
                    format!("Remove patient {} and all their visits?", patient_id)
                }
                QueueCommand::CompleteService { patient_id } => {
                    format!("Mark patient {} as done?", patient_id)
                }
                _ => "Reset today's queue?".to_string(),
            };
            if self.console.confirm(&question).await? != Some(true) {
                println!("\nCancelled.");
                return Ok(());
            }
        }

        let outcome = self.workflow.execute(command).await?;
        print_outcome(&outcome);
        Ok(())
    }

    async fn register(&mut self) -> Result<()> {
        println!("\n=== REGISTER NEW PATIENT ===\n");
        let Some(name) = self.console.prompt("Name: ").await? else {
            return Ok(());
        };
        let Some(medical_record_number) = self.console.prompt("Medical record number: ").await?
        else {
            return Ok(());
        };
        let Some(national_id) = self.console.prompt_optional("National id (optional): ").await?
        else {
            return Ok(());
        };
        let Some(date_of_birth) = self
            .prompt_date("Date of birth, YYYY-MM-DD (optional): ")
            .await?
        else {
            return Ok(());
        };
        let Some(phone) = self.console.prompt_optional("Phone (optional): ").await? else {
            return Ok(());
        };
        let Some(department) = self.prompt_department().await? else {
            return Ok(());
        };

        self.submit(QueueCommand::RegisterPatient {
            name,
            medical_record_number,
            national_id,
            date_of_birth,
            phone,
            department,
        })
        .await
    }

    async fn join_queue(&mut self) -> Result<()> {
        let Some(patient_id) = self.read_patient("Patient to queue").await? else {
            return Ok(());
        };
        let Some(department) = self.prompt_department().await? else {
            return Ok(());
        };
        self.submit(QueueCommand::JoinQueue {
            patient_id,
            department,
        })
        .await
    }

    async fn search(&mut self) -> Result<()> {
        let Some(Some(query)) = self
            .console
            .prompt_optional("Name, medical record number or id: ")
            .await?
        else {
            return Ok(());
        };

        let patients = self.workflow.search_patients(&query).await?;
        if patients.is_empty() {
            println!("\nNo matching patients.");
            return Ok(());
        }

        println!("\nFound {} patient(s):", patients.len());
        for patient in &patients {
            print_patient(patient);
        }
        if let [patient] = patients.as_slice() {
            let history = self.workflow.patient_history(&patient.id).await?;
            println!("\nVisit history:");
            if history.is_empty() {
                println!("  (none)");
            }
            for visit in history {
                let diagnosis = visit
                    .examination
                    .as_ref()
                    .map(|exam| exam.diagnosis.as_str())
                    .unwrap_or("-");
                println!(
                    "  {}  #{}  {:<12} {:<24} {}",
                    visit.visit_date,
                    format_queue_number(visit.queue_number),
                    visit.department,
                    visit.status,
                    diagnosis
                );
            }
        }
        Ok(())
    }

    async fn edit(&mut self) -> Result<()> {
        let Some(patient_id) = self.read_patient("Patient to edit").await? else {
            return Ok(());
        };
        let Some(patient) = self.workflow.find_patient(&patient_id).await? else {
            println!("\nPatient not found.");
            return Ok(());
        };

        print_patient(&patient);
        println!("\nLeave a field blank to keep its current value.");
        let Some(name) = self
            .console
            .prompt_optional(&format!("Name ({}): ", patient.name))
            .await?
        else {
            return Ok(());
        };
        let Some(medical_record_number) = self
            .console
            .prompt_optional(&format!(
                "Medical record number ({}): ",
                patient.medical_record_number
            ))
            .await?
        else {
            return Ok(());
        };
        let Some(national_id) = self
            .console
            .prompt_optional(&format!(
                "National id ({}): ",
                patient.national_id.as_deref().unwrap_or("-")
            ))
            .await?
        else {
            return Ok(());
        };
        let Some(date_of_birth) = self
            .prompt_date(&format!(
                "Date of birth ({}): ",
                display_date(patient.date_of_birth)
            ))
            .await?
        else {
            return Ok(());
        };
        let Some(phone) = self
            .console
            .prompt_optional(&format!(
                "Phone ({}): ",
                patient.phone.as_deref().unwrap_or("-")
            ))
            .await?
        else {
            return Ok(());
        };
        let update = PatientUpdate {
            name,
            medical_record_number,
            national_id,
            date_of_birth,
            phone,
        };

        if update.is_empty() {
            println!("\nNothing to change.");
            return Ok(());
        }
        if self.console.confirm("Save changes?").await? != Some(true) {
            println!("\nCancelled.");
            return Ok(());
        }
        self.submit(QueueCommand::UpdatePatient { patient_id, update })
            .await
    }

    async fn examine(&mut self) -> Result<()> {
        let Some(patient_id) = self.read_patient("Patient examined").await? else {
            return Ok(());
        };
        let Some(complaint) = self.console.prompt("Complaint: ").await? else {
            return Ok(());
        };
        let Some(diagnosis) = self.console.prompt("Diagnosis: ").await? else {
            return Ok(());
        };
        let Some(prescription) = self.console.prompt("Prescription: ").await? else {
            return Ok(());
        };
        let Some(examiner) = self.console.prompt_optional("Examiner (optional): ").await? else {
            return Ok(());
        };
        let Some(notes) = self.console.prompt_optional("Notes (optional): ").await? else {
            return Ok(());
        };

        self.submit(QueueCommand::RecordExamination {
            patient_id,
            examination: Examination {
                complaint,
                diagnosis,
                prescription,
                examiner,
                notes,
            },
        })
        .await
    }

    async fn dispense(&mut self) -> Result<()> {
        let Some(patient_id) = self.read_patient("Patient at pharmacy").await? else {
            return Ok(());
        };
        let Some(available) = self.console.confirm("Is the medication available?").await? else {
            return Ok(());
        };
        let Some(note) = self.console.prompt_optional("Pharmacy note (optional): ").await? else {
            return Ok(());
        };
        self.submit(QueueCommand::Dispense {
            patient_id,
            available,
            note,
        })
        .await
    }

    async fn overview(&mut self) -> Result<()> {
        let overview = self.workflow.overview().await?;
        println!("\n=== OVERVIEW {} ===\n", overview.date);
        println!("Visits today        : {}", overview.total_visits);
        println!("In waiting queue    : {}", overview.waiting_len);
        println!("In called list      : {}", overview.called_len);
        println!("{}", THIN_RULE);
        for status in clinic_workflow::VisitStateMachine::all_states() {
            println!("{:<24}: {}", status.as_str(), overview.count(status));
        }
        Ok(())
    }

    /// 读取患者：可以粘贴患者ID，也可以输入当天排队号或病历号
    async fn read_patient(&mut self, label: &str) -> Result<Option<PatientId>> {
        let Some(Some(input)) = self
            .console
            .prompt_optional(&format!("{} (id, queue number or record number): ", label))
            .await?
        else {
            println!("\nCancelled.");
            return Ok(None);
        };
        self.resolve_patient(&input).await
    }

    /// 可选日期；格式错误时返回错误，当前操作放弃
    async fn prompt_date(&mut self, label: &str) -> Result<Option<Option<NaiveDate>>> {
        let Some(input) = self.console.prompt_optional(label).await? else {
            return Ok(None);
        };
        Ok(Some(input.as_deref().map(parse_date).transpose()?))
    }

    async fn prompt_department(&mut self) -> Result<Option<Option<String>>> {
        let label = format!(
            "Department (blank = {}): ",
            self.workflow.settings().default_department
        );
        self.console.prompt_optional(&label).await
    }

    async fn resolve_patient(&self, input: &str) -> Result<Option<PatientId>> {
        if let Ok(id) = input.parse::<PatientId>() {
            return Ok(Some(id));
        }

        if let Ok(number) = input.trim_start_matches('#').parse::<u32>() {
            return match self.workflow.find_by_queue_number(number).await? {
                Some(visit) => Ok(Some(visit.patient_id)),
                None => {
                    println!("\nNo visit with queue number {} today.", number);
                    Ok(None)
                }
            };
        }

        let matches: Vec<Patient> = self
            .workflow
            .search_patients(input)
            .await?
            .into_iter()
            .filter(|patient| patient.medical_record_number.eq_ignore_ascii_case(input))
            .collect();
        match matches.as_slice() {
            [patient] => Ok(Some(patient.id)),
            [] => {
                println!("\nNo patient matches '{}'.", input);
                Ok(None)
            }
            _ => {
                println!("\nSeveral patients share '{}', use the patient id.", input);
                Ok(None)
            }
        }
    }
}

fn print_board(title: &str, rows: &[BoardRow], empty: &str) {
    println!("\n=== {} ===\n", title);
    if rows.is_empty() {
        println!("{}", empty);
        return;
    }

    println!(
        "{:<5}{:<8}{:<26}{:<16}{:<22}{}",
        "No.", "Queue", "Name", "Record no.", "Called at", "Status"
    );
    println!("{}", THIN_RULE);
    for (i, row) in rows.iter().enumerate() {
        println!(
            "{:<5}{:<8}{:<26}{:<16}{:<22}{}",
            i + 1,
            row.display_number(),
            row.name,
            row.medical_record_number,
            row.display_called_at(),
            row.status
        );
    }
}

fn print_patient(patient: &Patient) {
    println!("{}", THIN_RULE);
    println!("Id             : {}", patient.id);
    println!("Name           : {}", patient.name);
    println!("Record number  : {}", patient.medical_record_number);
    println!(
        "National id    : {}",
        patient.national_id.as_deref().unwrap_or("-")
    );
    println!("Date of birth  : {}", display_date(patient.date_of_birth));
    println!("Phone          : {}", patient.phone.as_deref().unwrap_or("-"));
    println!("Registered     : {}", format_timestamp(&patient.created_at));
}

fn display_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string())
}

fn print_outcome(outcome: &CommandOutcome) {
    match outcome {
        CommandOutcome::Registered { patient, visit } | CommandOutcome::Joined { patient, visit } => {
            println!("\nPatient queued.");
            println!("Queue number : {}", format_queue_number(visit.queue_number));
            println!("Name         : {}", patient.name);
            println!("Department   : {}", visit.department);
            println!("Patient id   : {}", patient.id);
        }
        CommandOutcome::Called {
            visit,
            announcement,
        } => {
            println!("\n{}", RULE);
            println!("  QUEUE NUMBER {}", format_queue_number(visit.queue_number));
            println!("  NAME: {}", announcement.name);
            println!("  PLEASE PROCEED TO {}", announcement.service_point.to_uppercase());
            println!(
                "  Called at {}",
                format_optional_timestamp(visit.called_at.as_ref())
            );
            println!("{}", RULE);
        }
        CommandOutcome::QueueEmpty => println!("\nNo patients in the queue."),
        CommandOutcome::Repeated { announcement } => {
            println!("\n{}", RULE);
            println!("  REPEAT CALL");
            println!("  {}", announcement.message());
            println!("{}", RULE);
        }
        CommandOutcome::NothingCalled => println!("\nNo patient has been called yet."),
        CommandOutcome::Examined { visit } => {
            println!(
                "\nExamination recorded for queue number {}.",
                format_queue_number(visit.queue_number)
            );
        }
        CommandOutcome::Dispensed { visit } => {
            let text = match visit.status {
                PatientStatus::ReadyForMedication => "medication ready",
                _ => "medication unavailable",
            };
            println!(
                "\nQueue number {}: {}.",
                format_queue_number(visit.queue_number),
                text
            );
        }
        CommandOutcome::Completed { visit } => {
            println!(
                "\nQueue number {} marked as done.",
                format_queue_number(visit.queue_number)
            );
        }
        CommandOutcome::PatientUpdated { patient, changed } => {
            if *changed {
                println!("\nPatient {} updated.", patient.name);
            } else {
                println!("\nNo changes for patient {}.", patient.name);
            }
        }
        CommandOutcome::PatientRemoved {
            patient_id,
            record_existed,
            removed_from_queue,
        } => {
            if *record_existed || *removed_from_queue {
                println!("\nPatient {} removed.", patient_id);
            } else {
                println!("\nPatient {} was not found.", patient_id);
            }
        }
        CommandOutcome::QueueReset {
            cleared_waiting,
            cleared_called,
        } => {
            println!(
                "\nDaily queue reset ({} waiting, {} called cleared). Stored records are kept.",
                cleared_waiting, cleared_called
            );
        }
    }
}
