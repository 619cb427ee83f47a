use clap::{Parser, Subcommand, ValueEnum};

use office_hours::AppointmentStatus;

pub mod commands;

#[derive(Parser)]
#[command(name = "office-hours")]
#[command(version)]
#[command(about = "Appointment requests between students and instructors")]
#[command(long_about = "Office Hours lets students book time with verified instructors and lets \
                       instructors review, approve or reject requests with an email to the student. \
                       The signed-in instructor is taken from OFFICE_HOURS__SESSION__USER_ID and \
                       OFFICE_HOURS__SESSION__ACCESS_TOKEN.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Outcome {
    Approve,
    Reject,
}

impl From<Outcome> for AppointmentStatus {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Approve => AppointmentStatus::Approved,
            Outcome::Reject => AppointmentStatus::NotApproved,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Submit an appointment request to an instructor (student command)
    Submit {
        /// Instructor to book with
        #[arg(long)]
        instructor: String,
        /// Student full name
        #[arg(long)]
        name: String,
        /// Email address the decision is sent to
        #[arg(long)]
        email: String,
        /// Degree program
        #[arg(long)]
        program: String,
        /// Reason for the appointment
        #[arg(long)]
        reason: String,
        /// Date as YYYY-MM-DD
        #[arg(long)]
        date: String,
        /// Time as HH:MM
        #[arg(long)]
        time: String,
        /// Numeric student ID
        #[arg(long)]
        student_id: Option<String>,
        #[arg(long)]
        year_level: Option<String>,
        #[arg(long)]
        mobile: Option<String>,
    },
    /// List your appointments, newest first
    List {
        /// Only show appointments in this status (pending, read, approved, not_approved)
        #[arg(long)]
        status: Option<String>,
    },
    /// Open an appointment for review and print the default reply draft
    Open {
        /// Appointment id
        id: String,
    },
    /// Approve or reject an appointment, emailing the student first
    Decide {
        /// Appointment id
        id: String,
        #[arg(long, value_enum)]
        outcome: Outcome,
        /// Reply message sent to the student
        #[arg(long)]
        message: String,
    },
    /// Send another email about an appointment that was already decided
    FollowUp {
        /// Appointment id
        id: String,
        /// Subject line (defaults to the review draft subject)
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        message: String,
    },
    /// Set your availability: in_office, in_class or absent
    Availability {
        value: String,
    },
    /// Replace your remarks (at most 100 characters)
    Remarks {
        text: String,
    },
    /// Show verified instructors with their availability and remarks
    Directory {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Add or update an instructor record (admin command)
    Register {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        /// Mark the instructor as verified
        #[arg(long)]
        verified: bool,
    },
    /// Run database migrations
    Migrate,
}
