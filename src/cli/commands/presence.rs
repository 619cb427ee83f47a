use anyhow::Result;

use office_hours::{config, Availability, PresenceManager};

use super::{cli_session, with_store};

pub struct AvailabilityCommand {
    pub value: String,
}

impl AvailabilityCommand {
    pub async fn execute(&self) -> Result<()> {
        let availability: Availability = self.value.parse()?;
        let session = cli_session(config()?)?;

        with_store(|store| async move {
            let presence = PresenceManager::load(&session, store).await?;
            match presence.set_availability(availability).await {
                Ok(()) => {
                    println!("✅ Availability set to {}", availability.label());
                    Ok(())
                }
                Err(e) => {
                    let current = presence.snapshot().await.availability;
                    println!("❌ {} (still {})", e, current.label());
                    Err(e.into())
                }
            }
        })
        .await
    }
}

pub struct RemarksCommand {
    pub text: String,
}

impl RemarksCommand {
    pub async fn execute(&self) -> Result<()> {
        let session = cli_session(config()?)?;

        with_store(|store| async move {
            let presence = PresenceManager::load(&session, store).await?;
            presence.begin_edit_remarks().await?;
            presence.edit_remarks(&self.text).await?;
            let saved = presence.save_remarks().await?;
            if saved.is_empty() {
                println!("✅ Remarks cleared");
            } else {
                println!("✅ Remarks saved: {}", saved);
            }
            Ok(())
        })
        .await
    }
}
