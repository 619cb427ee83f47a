use anyhow::Result;
use clap::Parser;

use office_hours::{config, init_config, init_telemetry, AppointmentRequest};

mod cli;

use cli::commands::admin::{MigrateCommand, RegisterCommand};
use cli::commands::appointments::{DecideCommand, FollowUpCommand, ListCommand, OpenCommand, SubmitCommand};
use cli::commands::directory::DirectoryCommand;
use cli::commands::presence::{AvailabilityCommand, RemarksCommand};
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_config()?;
    init_telemetry(&config()?.observability)?;

    match cli.command {
        Commands::Submit {
            instructor,
            name,
            email,
            program,
            reason,
            date,
            time,
            student_id,
            year_level,
            mobile,
        } => {
            let request = AppointmentRequest {
                student_name: name,
                student_id,
                student_email: email,
                student_program: program,
                student_year_level: year_level,
                mobile_number: mobile,
                reason,
                appointment_date: date,
                appointment_time: time,
            };
            SubmitCommand { instructor, request }.execute().await
        }
        Commands::List { status } => ListCommand { status }.execute().await,
        Commands::Open { id } => OpenCommand { id }.execute().await,
        Commands::Decide { id, outcome, message } => {
            DecideCommand {
                id,
                target: outcome.into(),
                message,
            }
            .execute()
            .await
        }
        Commands::FollowUp { id, subject, message } => {
            FollowUpCommand { id, subject, message }.execute().await
        }
        Commands::Availability { value } => AvailabilityCommand { value }.execute().await,
        Commands::Remarks { text } => RemarksCommand { text }.execute().await,
        Commands::Directory { json } => DirectoryCommand { json }.execute().await,
        Commands::Register { id, name, verified } => {
            RegisterCommand { id, name, verified }.execute().await
        }
        Commands::Migrate => MigrateCommand.execute().await,
    }
}
