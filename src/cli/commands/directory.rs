use anyhow::Result;

use office_hours::Directory;

use super::with_store;

pub struct DirectoryCommand {
    pub json: bool,
}

impl DirectoryCommand {
    pub async fn execute(&self) -> Result<()> {
        with_store(|store| async move {
            let directory = Directory::new(store);
            directory.refresh().await?;
            let entries = directory.entries().await;

            if self.json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
                return Ok(());
            }

            if entries.is_empty() {
                println!("📭 No verified instructors yet");
                return Ok(());
            }
            for entry in &entries {
                println!("👤 {} ({})", entry.name, entry.id);
                println!("   📍 {}", entry.availability_label);
                for line in &entry.remarks {
                    println!("   💬 {}", line);
                }
            }
            Ok(())
        })
        .await
    }
}
