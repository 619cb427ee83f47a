use anyhow::{Context, Result};
use chrono::Local;

use office_hours::{
    config, format_status, submit, Appointment, AppointmentId, AppointmentRequest, AppointmentStatus,
    InstructorId, InstructorStore, ReplyDraft, WorkflowError,
};

use super::{start_engine, with_store};

fn parse_id(id: &str) -> Result<AppointmentId> {
    id.parse()
        .with_context(|| format!("Invalid appointment id: {id}"))
}

fn print_appointment(appointment: &Appointment) {
    println!("📋 {}", appointment.summary());
    println!("   🆔 {}", appointment.id);
    println!("   🏷️  Status: {}", format_status(Some(appointment.status.as_str())));
    println!("   🎓 {}", appointment.student.student_program);
    if let Some(email) = appointment.student.recipient() {
        println!("   📧 {}", email);
    }
    println!("   📝 {}", appointment.reason);
}

pub struct SubmitCommand {
    pub instructor: String,
    pub request: AppointmentRequest,
}

impl SubmitCommand {
    pub async fn execute(&self) -> Result<()> {
        let window = config()?.booking.window()?;
        let instructor_id = InstructorId::from(self.instructor.as_str());

        with_store(|store| async move {
            let Some(instructor) = store.get_instructor(&instructor_id).await? else {
                println!("❌ No instructor with id {}", instructor_id);
                anyhow::bail!("Unknown instructor: {instructor_id}");
            };

            let today = Local::now().date_naive();
            match submit(store.as_ref(), &instructor, &self.request, &window, today).await {
                Ok(appointment) => {
                    println!("✅ Appointment request sent to {}", instructor.name);
                    print_appointment(&appointment);
                    Ok(())
                }
                Err(e) => {
                    println!("❌ {}", e);
                    Err(e.into())
                }
            }
        })
        .await
    }
}

pub struct ListCommand {
    pub status: Option<String>,
}

impl ListCommand {
    pub async fn execute(&self) -> Result<()> {
        let filter = self
            .status
            .as_deref()
            .map(str::parse::<AppointmentStatus>)
            .transpose()?;

        with_store(|store| async move {
            let engine = start_engine(store).await?;
            let appointments: Vec<_> = engine
                .appointments()
                .await
                .into_iter()
                .filter(|a| filter.map_or(true, |status| a.status == status))
                .collect();

            if appointments.is_empty() {
                println!("📭 No appointments");
                return Ok(());
            }
            for appointment in &appointments {
                print_appointment(appointment);
                println!();
            }
            println!("📈 {} appointment(s)", appointments.len());
            Ok(())
        })
        .await
    }
}

pub struct OpenCommand {
    pub id: String,
}

impl OpenCommand {
    pub async fn execute(&self) -> Result<()> {
        let id = parse_id(&self.id)?;

        with_store(|store| async move {
            let engine = start_engine(store).await?;
            let review = engine.open(id).await?;
            print_appointment(&review.appointment);
            println!();
            println!("✉️  Subject: {}", review.draft.subject);
            println!("{}", review.draft.message);
            Ok(())
        })
        .await
    }
}

pub struct DecideCommand {
    pub id: String,
    pub target: AppointmentStatus,
    pub message: String,
}

impl DecideCommand {
    pub async fn execute(&self) -> Result<()> {
        let id = parse_id(&self.id)?;

        with_store(|store| async move {
            let engine = start_engine(store).await?;
            let draft = ReplyDraft::new(String::new(), self.message.clone());

            match engine.decide(id, self.target, &draft).await {
                Ok(decision) => {
                    if decision.notified {
                        println!("📧 Email sent to student");
                    } else {
                        println!("📝 Student was already emailed; recording the decision only");
                    }
                    println!(
                        "✅ Appointment marked as {}",
                        decision.appointment.status.label()
                    );
                    Ok(())
                }
                Err(e @ WorkflowError::NotifiedButNotRecorded { .. }) => {
                    println!("⚠️  {}", e);
                    println!("   💡 The student already has the email; rerun with the same --outcome to record it without emailing again");
                    Err(e.into())
                }
                Err(e) => {
                    println!("❌ {}", e);
                    Err(e.into())
                }
            }
        })
        .await
    }
}

pub struct FollowUpCommand {
    pub id: String,
    pub subject: Option<String>,
    pub message: String,
}

impl FollowUpCommand {
    pub async fn execute(&self) -> Result<()> {
        let id = parse_id(&self.id)?;

        with_store(|store| async move {
            let engine = start_engine(store).await?;
            let review = engine.open(id).await?;
            let subject = self.subject.clone().unwrap_or(review.draft.subject);
            let draft = ReplyDraft::new(subject, self.message.clone());

            engine.follow_up(id, &draft).await?;
            engine.close().await;
            println!("📧 Follow-up sent");
            Ok(())
        })
        .await
    }
}
