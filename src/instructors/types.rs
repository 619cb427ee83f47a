// Instructor records and the self-reported presence values

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Maximum length of an instructor's free-text remark, in characters.
pub const MAX_REMARKS_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstructorId(pub String);

impl From<&str> for InstructorId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for InstructorId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for InstructorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for InstructorId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    #[default]
    InOffice,
    InClass,
    Absent,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Unknown availability: {0} (expected in_office, in_class or absent)")]
pub struct ParseAvailabilityError(pub String);

impl Availability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Availability::InOffice => "in_office",
            Availability::InClass => "in_class",
            Availability::Absent => "absent",
        }
    }

    /// Label shown to students browsing the directory.
    pub fn label(&self) -> &'static str {
        match self {
            Availability::InOffice => "Inside Office",
            Availability::InClass => "In Class",
            Availability::Absent => "Not Available",
        }
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Availability {
    type Err = ParseAvailabilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "in_office" => Ok(Availability::InOffice),
            "in_class" => Ok(Availability::InClass),
            "absent" => Ok(Availability::Absent),
            other => Err(ParseAvailabilityError(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instructor {
    pub id: InstructorId,
    pub name: String,
    #[serde(default)]
    pub availability: Availability,
    #[serde(default)]
    pub remarks: String,
    /// Set by an external admin process; unverified instructors are hidden from students.
    #[serde(default)]
    pub verified: bool,
    pub profile_image_url: Option<String>,
}

impl Instructor {
    pub fn new(id: impl Into<InstructorId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            availability: Availability::default(),
            remarks: String::new(),
            verified: false,
            profile_image_url: None,
        }
    }

    pub fn verified(mut self) -> Self {
        self.verified = true;
        self
    }
}
