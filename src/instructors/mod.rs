// Instructor records, self-reported presence, and the student-facing directory

pub mod directory;
pub mod presence;
pub mod types;

pub use directory::{remark_lines, Directory, DirectoryEntry};
pub use presence::{PresenceError, PresenceManager, PresenceSnapshot};
pub use types::{Availability, Instructor, InstructorId, ParseAvailabilityError, MAX_REMARKS_CHARS};
