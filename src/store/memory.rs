// In-process store with change publication and fault injection for tests and demos

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::RwLock;
use tracing::debug;

use super::{status_write_allowed, AppointmentStore, InstructorStore, StoreError};
use crate::appointments::{Appointment, AppointmentId, AppointmentStatus, NewAppointment};
use crate::instructors::{Availability, Instructor, InstructorId};
use crate::sync::{ChangeEvent, ChangeKind, SyncHub, Table};

#[derive(Debug, Default)]
struct Faults {
    status_updates: usize,
    availability_updates: usize,
    remarks_updates: usize,
    lists: usize,
}

fn take_fault(counter: &mut usize, operation: &str) -> Result<(), StoreError> {
    if *counter > 0 {
        *counter -= 1;
        return Err(StoreError::Unavailable {
            message: format!("injected failure in {operation}"),
        });
    }
    Ok(())
}

/// Call counters, incremented on every attempt including failed ones.
#[derive(Debug, Default)]
pub struct StoreCalls {
    pub creates: AtomicUsize,
    pub lists: AtomicUsize,
    pub status_updates: AtomicUsize,
    pub availability_updates: AtomicUsize,
    pub remarks_updates: AtomicUsize,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    appointments: RwLock<HashMap<AppointmentId, Appointment>>,
    instructors: RwLock<HashMap<InstructorId, Instructor>>,
    notified: RwLock<HashMap<AppointmentId, AppointmentStatus>>,
    hub: Option<SyncHub>,
    faults: Mutex<Faults>,
    calls: StoreCalls,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes a change event to `hub` after every successful write.
    pub fn with_sync(hub: SyncHub) -> Self {
        Self {
            hub: Some(hub),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> &StoreCalls {
        &self.calls
    }

    pub fn status_update_calls(&self) -> usize {
        self.calls.status_updates.load(Ordering::SeqCst)
    }

    pub fn fail_next_status_updates(&self, count: usize) {
        self.faults().status_updates = count;
    }

    pub fn fail_next_availability_updates(&self, count: usize) {
        self.faults().availability_updates = count;
    }

    pub fn fail_next_remarks_updates(&self, count: usize) {
        self.faults().remarks_updates = count;
    }

    pub fn fail_next_lists(&self, count: usize) {
        self.faults().lists = count;
    }

    /// Snapshot of every stored appointment regardless of owner.
    pub async fn all_appointments(&self) -> Vec<Appointment> {
        self.appointments.read().await.values().cloned().collect()
    }

    fn faults(&self) -> std::sync::MutexGuard<'_, Faults> {
        // A panic while holding the guard only ever happens in a failing test.
        self.faults.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, table: Table, kind: ChangeKind) {
        if let Some(hub) = &self.hub {
            hub.publish(ChangeEvent::new(table, kind));
        }
    }
}

#[async_trait]
impl AppointmentStore for MemoryStore {
    async fn create(&self, payload: NewAppointment) -> Result<Appointment, StoreError> {
        self.calls.creates.fetch_add(1, Ordering::SeqCst);
        let appointment = payload.into_appointment(AppointmentId::new(), Utc::now());
        self.appointments
            .write()
            .await
            .insert(appointment.id, appointment.clone());
        debug!(appointment.id = %appointment.id, "Stored appointment");
        self.publish(Table::Appointments, ChangeKind::Insert);
        Ok(appointment)
    }

    async fn list_by_instructor(&self, instructor: &InstructorId) -> Result<Vec<Appointment>, StoreError> {
        self.calls.lists.fetch_add(1, Ordering::SeqCst);
        take_fault(&mut self.faults().lists, "list_by_instructor")?;

        let mut rows: Vec<Appointment> = self
            .appointments
            .read()
            .await
            .values()
            .filter(|a| &a.instructor_id == instructor)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn get(&self, id: AppointmentId) -> Result<Appointment, StoreError> {
        self.appointments
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::AppointmentNotFound(id))
    }

    async fn update_status(&self, id: AppointmentId, status: AppointmentStatus) -> Result<(), StoreError> {
        self.calls.status_updates.fetch_add(1, Ordering::SeqCst);
        take_fault(&mut self.faults().status_updates, "update_status")?;

        {
            let mut rows = self.appointments.write().await;
            let row = rows.get_mut(&id).ok_or(StoreError::AppointmentNotFound(id))?;
            if !status_write_allowed(row.status, status) {
                return Err(StoreError::StatusConflict {
                    id,
                    current: row.status,
                    requested: status,
                });
            }
            row.status = status;
        }
        if status.is_terminal() {
            self.notified.write().await.remove(&id);
        }
        self.publish(Table::Appointments, ChangeKind::Update);
        Ok(())
    }

    async fn record_notified(&self, id: AppointmentId, status: AppointmentStatus) -> Result<(), StoreError> {
        if !self.appointments.read().await.contains_key(&id) {
            return Err(StoreError::AppointmentNotFound(id));
        }
        self.notified.write().await.insert(id, status);
        Ok(())
    }

    async fn notified_unrecorded(&self, id: AppointmentId) -> Result<Option<AppointmentStatus>, StoreError> {
        Ok(self.notified.read().await.get(&id).copied())
    }
}

#[async_trait]
impl InstructorStore for MemoryStore {
    async fn get_instructor(&self, id: &InstructorId) -> Result<Option<Instructor>, StoreError> {
        Ok(self.instructors.read().await.get(id).cloned())
    }

    async fn list_verified(&self) -> Result<Vec<Instructor>, StoreError> {
        take_fault(&mut self.faults().lists, "list_verified")?;
        let mut rows: Vec<Instructor> = self
            .instructors
            .read()
            .await
            .values()
            .filter(|i| i.verified)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn update_availability(&self, id: &InstructorId, availability: Availability) -> Result<(), StoreError> {
        self.calls.availability_updates.fetch_add(1, Ordering::SeqCst);
        take_fault(&mut self.faults().availability_updates, "update_availability")?;
        {
            let mut rows = self.instructors.write().await;
            let row = rows
                .get_mut(id)
                .ok_or_else(|| StoreError::InstructorNotFound(id.clone()))?;
            row.availability = availability;
        }
        self.publish(Table::Instructors, ChangeKind::Update);
        Ok(())
    }

    async fn update_remarks(&self, id: &InstructorId, remarks: &str) -> Result<(), StoreError> {
        self.calls.remarks_updates.fetch_add(1, Ordering::SeqCst);
        take_fault(&mut self.faults().remarks_updates, "update_remarks")?;
        {
            let mut rows = self.instructors.write().await;
            let row = rows
                .get_mut(id)
                .ok_or_else(|| StoreError::InstructorNotFound(id.clone()))?;
            row.remarks = remarks.to_string();
        }
        self.publish(Table::Instructors, ChangeKind::Update);
        Ok(())
    }

    async fn upsert_instructor(&self, instructor: Instructor) -> Result<(), StoreError> {
        let kind = {
            let mut rows = self.instructors.write().await;
            match rows.insert(instructor.id.clone(), instructor) {
                Some(_) => ChangeKind::Update,
                None => ChangeKind::Insert,
            }
        };
        self.publish(Table::Instructors, kind);
        Ok(())
    }
}
