use anyhow::Result;

use office_hours::{Instructor, InstructorStore};

use super::with_store;

pub struct RegisterCommand {
    pub id: String,
    pub name: String,
    pub verified: bool,
}

impl RegisterCommand {
    pub async fn execute(&self) -> Result<()> {
        with_store(|store| async move {
            let existing = store.get_instructor(&self.id.as_str().into()).await?;
            let mut instructor = existing.unwrap_or_else(|| Instructor::new(self.id.as_str(), self.name.as_str()));
            instructor.name = self.name.clone();
            instructor.verified = self.verified;
            store.upsert_instructor(instructor).await?;

            let state = if self.verified { "verified" } else { "awaiting approval" };
            println!("✅ Instructor {} ({}) saved, {}", self.name, self.id, state);
            Ok(())
        })
        .await
    }
}

pub struct MigrateCommand;

impl MigrateCommand {
    pub async fn execute(&self) -> Result<()> {
        with_store(|store| async move {
            store.migrate().await?;
            println!("✅ Database schema is up to date");
            Ok(())
        })
        .await
    }
}
