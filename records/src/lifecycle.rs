use std::sync::Arc;

use chrono::Utc;

use crate::audit::AuditLog;
use crate::config::TransitionPolicy;
use crate::error::{ClinicError, Result};
use crate::models::{Account, Appointment, AppointmentEdit, AppointmentStatus, Principal, Role};
use crate::repository::{next_id, Repository};
use crate::store::FileStore;

/// Request to book a new appointment.
#[derive(Debug, Clone, Default)]
pub struct NewAppointment {
    pub datetime: String,
    pub doctor: Option<String>,
    pub notes: String,
}

/// Whether `from -> to` is allowed. Re-applying the current status is always
/// allowed and changes nothing.
pub fn check_transition(
    policy: TransitionPolicy,
    from: AppointmentStatus,
    to: AppointmentStatus,
) -> Result<()> {
    if from == to {
        return Ok(());
    }
    match policy {
        TransitionPolicy::Strict if from.is_terminal() => Err(ClinicError::invalid(format!(
            "appointment is {from}; it can no longer become {to}"
        ))),
        TransitionPolicy::Strict | TransitionPolicy::Permissive => Ok(()),
    }
}

fn require_patient(principal: &Principal, action: &str) -> Result<()> {
    match principal.role() {
        Role::Patient => Ok(()),
        Role::Doctor | Role::Management => Err(ClinicError::unauthorized(format!(
            "only the owning patient may {action}"
        ))),
    }
}

fn check_roster(roster: &[Account], doctor: &str) -> Result<()> {
    let listed = roster
        .iter()
        .any(|a| a.username == doctor && a.role == Role::Doctor);
    if listed {
        Ok(())
    } else {
        Err(ClinicError::not_found("doctor", doctor))
    }
}

/// Patient-owned lookup. Another patient's appointment reads as missing.
fn owned_mut<'a>(
    appointments: &'a mut [Appointment],
    id: u64,
    username: &str,
) -> Result<&'a mut Appointment> {
    appointments
        .iter_mut()
        .find(|a| a.id == id && a.is_owned_by(username))
        .ok_or_else(|| ClinicError::not_found("appointment", id))
}

/// Appointment state machine and the rules on who may drive it.
#[derive(Debug)]
pub struct AppointmentBook {
    repo: Repository<Appointment>,
    policy: TransitionPolicy,
}

impl AppointmentBook {
    pub fn new(store: Arc<FileStore>, audit: Arc<AuditLog>, policy: TransitionPolicy) -> Self {
        Self {
            repo: Repository::new(store, audit),
            policy,
        }
    }

    pub fn policy(&self) -> TransitionPolicy {
        self.policy
    }

    /// Book an appointment for the calling patient. A named doctor must be on
    /// `roster`.
    pub fn schedule(
        &mut self,
        principal: &Principal,
        request: NewAppointment,
        roster: &[Account],
    ) -> Result<Appointment> {
        require_patient(principal, "schedule appointments")?;
        let datetime = request.datetime.trim().to_string();
        if datetime.is_empty() {
            return Err(ClinicError::invalid("appointment date/time must not be empty"));
        }
        let doctor = request
            .doctor
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        if let Some(doctor) = doctor.as_deref() {
            check_roster(roster, doctor)?;
        }

        let username = principal.username();
        let appointment = self.repo.transact(|appointments| {
            let now = Utc::now();
            let appointment = Appointment {
                id: next_id(appointments),
                patient_username: username.to_string(),
                patient_name: principal.name().to_string(),
                doctor_username: doctor,
                datetime,
                status: AppointmentStatus::Scheduled,
                notes: request.notes.trim().to_string(),
                created_at: now,
                created_by: username.to_string(),
                modified_at: now,
                modified_by: username.to_string(),
            };
            appointments.push(appointment.clone());
            Ok(appointment)
        })?;

        self.repo.audit().record(format!(
            "appointment {} scheduled by patient {username}",
            appointment.id
        ));
        Ok(appointment)
    }

    /// Appointments visible to the principal: own, assigned, or all.
    pub fn list_for(&mut self, principal: &Principal) -> Vec<Appointment> {
        let username = principal.username();
        self.repo.read(|appointments| {
            appointments
                .iter()
                .filter(|a| match principal.role() {
                    Role::Patient => a.is_owned_by(username),
                    Role::Doctor => a.is_assigned_to(username),
                    Role::Management => true,
                })
                .cloned()
                .collect()
        })
    }

    /// Change date/time or doctor on the patient's own appointment. Status is
    /// left alone.
    pub fn edit(
        &mut self,
        principal: &Principal,
        id: u64,
        edit: AppointmentEdit,
        roster: &[Account],
    ) -> Result<Appointment> {
        require_patient(principal, "edit appointments")?;
        if let Some(datetime) = edit.datetime.as_deref() {
            if datetime.trim().is_empty() {
                return Err(ClinicError::invalid("appointment date/time must not be empty"));
            }
        }
        // A blank doctor name unassigns.
        let doctor = edit.doctor.map(|doctor| {
            doctor
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty())
        });
        if let Some(Some(doctor)) = doctor.as_ref() {
            check_roster(roster, doctor)?;
        }

        let username = principal.username();
        let policy = self.policy;
        let updated = self.repo.transact(|appointments| {
            let appointment = owned_mut(appointments, id, username)?;
            if policy == TransitionPolicy::Strict && appointment.status.is_terminal() {
                return Err(ClinicError::invalid(format!(
                    "appointment {id} is {} and can no longer be edited",
                    appointment.status
                )));
            }

            if let Some(datetime) = edit.datetime {
                appointment.datetime = datetime.trim().to_string();
            }
            if let Some(doctor) = doctor {
                appointment.doctor_username = doctor;
            }
            appointment.touch(username);
            Ok(appointment.clone())
        })?;

        self.repo
            .audit()
            .record(format!("patient {username} edited appointment {id}"));
        Ok(updated)
    }

    /// Soft cancel: the record stays, its status becomes `cancelled`.
    pub fn cancel(&mut self, principal: &Principal, id: u64) -> Result<Appointment> {
        require_patient(principal, "cancel appointments")?;

        let username = principal.username();
        let policy = self.policy;
        let cancelled = self.repo.transact(|appointments| {
            let appointment = owned_mut(appointments, id, username)?;
            check_transition(policy, appointment.status, AppointmentStatus::Cancelled)?;
            appointment.status = AppointmentStatus::Cancelled;
            appointment.touch(username);
            Ok(appointment.clone())
        })?;

        self.repo
            .audit()
            .record(format!("patient {username} cancelled appointment {id}"));
        Ok(cancelled)
    }

    /// Destructive removal of the patient's own appointment.
    pub fn remove(&mut self, principal: &Principal, id: u64) -> Result<Appointment> {
        require_patient(principal, "remove appointments")?;

        let username = principal.username();
        let removed = self.repo.transact(|appointments| {
            let index = appointments
                .iter()
                .position(|a| a.id == id && a.is_owned_by(username))
                .ok_or_else(|| ClinicError::not_found("appointment", id))?;
            Ok(appointments.remove(index))
        })?;

        self.repo
            .audit()
            .record(format!("patient {username} removed appointment {id}"));
        Ok(removed)
    }

    /// Doctor-driven status change, limited to appointments assigned to them.
    pub fn set_status(
        &mut self,
        principal: &Principal,
        id: u64,
        status: AppointmentStatus,
    ) -> Result<Appointment> {
        match principal.role() {
            Role::Doctor => {}
            Role::Patient | Role::Management => {
                return Err(ClinicError::unauthorized(
                    "only the assigned doctor may change appointment status",
                ))
            }
        }

        let username = principal.username();
        let policy = self.policy;
        let updated = self.repo.transact(|appointments| {
            let appointment = appointments
                .iter_mut()
                .find(|a| a.id == id)
                .ok_or_else(|| ClinicError::not_found("appointment", id))?;
            if !appointment.is_assigned_to(username) {
                return Err(ClinicError::unauthorized(format!(
                    "appointment {id} is not assigned to {username}"
                )));
            }
            check_transition(policy, appointment.status, status)?;
            appointment.status = status;
            appointment.touch(username);
            Ok(appointment.clone())
        })?;

        self.repo.audit().record(format!(
            "doctor {username} set appointment {id} to {status}"
        ));
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{AccessControl, Signup};
    use tempfile::TempDir;

    struct Fixture {
        _temp_dir: TempDir,
        access: AccessControl,
        book: AppointmentBook,
    }

    fn setup(policy: TransitionPolicy) -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(FileStore::open(temp_dir.path()).unwrap());
        let audit = Arc::new(AuditLog::new(temp_dir.path()));
        let mut access = AccessControl::new(Arc::clone(&store), Arc::clone(&audit), "CODE");
        access.ensure_default_manager().unwrap();
        for (user, name) in [("ana", "Ana Souza"), ("caio", "Caio Reis")] {
            access.register_patient(Signup::new(user, "pw", name)).unwrap();
        }
        for (user, name) in [("drbob", "Bob Lima"), ("drlia", "Lia Melo")] {
            access
                .onboard_doctor(Signup::new(user, "pw", name), Some("CODE"))
                .unwrap();
        }

        Fixture {
            _temp_dir: temp_dir,
            access,
            book: AppointmentBook::new(store, audit, policy),
        }
    }

    impl Fixture {
        fn login(&mut self, username: &str, role: Role) -> Principal {
            let password = if role == Role::Management { "admin" } else { "pw" };
            self.access.authenticate(username, password, role).unwrap()
        }

        fn book_for(&mut self, patient: &Principal, doctor: Option<&str>) -> Appointment {
            let roster = self.access.doctors();
            self.book
                .schedule(
                    patient,
                    NewAppointment {
                        datetime: "2025-08-10 14:30".to_string(),
                        doctor: doctor.map(str::to_string),
                        notes: "first visit".to_string(),
                    },
                    &roster,
                )
                .unwrap()
        }
    }

    #[test]
    fn test_check_transition_strict() {
        use AppointmentStatus::*;
        let strict = TransitionPolicy::Strict;
        for to in AppointmentStatus::ALL {
            assert!(check_transition(strict, Scheduled, to).is_ok());
            assert!(check_transition(strict, Confirmed, to).is_ok());
        }
        assert!(check_transition(strict, Completed, Scheduled).is_err());
        assert!(check_transition(strict, Cancelled, Confirmed).is_err());
        assert!(check_transition(strict, Cancelled, Cancelled).is_ok());
    }

    #[test]
    fn test_check_transition_permissive() {
        for from in AppointmentStatus::ALL {
            for to in AppointmentStatus::ALL {
                assert!(check_transition(TransitionPolicy::Permissive, from, to).is_ok());
            }
        }
    }

    #[test]
    fn test_schedule_assigns_increasing_ids() {
        let mut fx = setup(TransitionPolicy::Strict);
        let ana = fx.login("ana", Role::Patient);

        let first = fx.book_for(&ana, Some("drbob"));
        let second = fx.book_for(&ana, None);

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(first.status, AppointmentStatus::Scheduled);
        assert_eq!(first.patient_name, "Ana Souza");
        assert_eq!(first.doctor_username.as_deref(), Some("drbob"));
        assert!(second.doctor_username.is_none());
        assert_eq!(first.created_by, "ana");
    }

    #[test]
    fn test_schedule_rejects_unknown_doctor_and_blank_date() {
        let mut fx = setup(TransitionPolicy::Strict);
        let ana = fx.login("ana", Role::Patient);
        let roster = fx.access.doctors();

        let unknown = fx.book.schedule(
            &ana,
            NewAppointment {
                datetime: "tomorrow".to_string(),
                doctor: Some("caio".to_string()),
                ..Default::default()
            },
            &roster,
        );
        assert!(matches!(unknown, Err(ClinicError::NotFound { .. })));

        let blank = fx.book.schedule(&ana, NewAppointment::default(), &roster);
        assert!(matches!(blank, Err(ClinicError::InvalidInput(_))));
        assert!(fx.book.list_for(&ana).is_empty());
    }

    #[test]
    fn test_only_patients_schedule() {
        let mut fx = setup(TransitionPolicy::Strict);
        let bob = fx.login("drbob", Role::Doctor);
        let result = fx.book.schedule(
            &bob,
            NewAppointment {
                datetime: "today".to_string(),
                ..Default::default()
            },
            &[],
        );
        assert!(matches!(result, Err(ClinicError::Unauthorized(_))));
    }

    #[test]
    fn test_list_scoped_by_role() {
        let mut fx = setup(TransitionPolicy::Strict);
        let ana = fx.login("ana", Role::Patient);
        let caio = fx.login("caio", Role::Patient);
        let bob = fx.login("drbob", Role::Doctor);
        let admin = fx.login("admin", Role::Management);

        fx.book_for(&ana, Some("drbob"));
        fx.book_for(&caio, Some("drlia"));
        fx.book_for(&caio, None);

        assert_eq!(fx.book.list_for(&ana).len(), 1);
        assert_eq!(fx.book.list_for(&caio).len(), 2);
        assert_eq!(fx.book.list_for(&bob).len(), 1);
        assert_eq!(fx.book.list_for(&admin).len(), 3);
    }

    #[test]
    fn test_patient_cannot_touch_others_appointments() {
        let mut fx = setup(TransitionPolicy::Strict);
        let ana = fx.login("ana", Role::Patient);
        let caio = fx.login("caio", Role::Patient);
        let appointment = fx.book_for(&ana, None);
        let roster = fx.access.doctors();

        let edit = AppointmentEdit {
            datetime: Some("never".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            fx.book.edit(&caio, appointment.id, edit, &roster),
            Err(ClinicError::NotFound { .. })
        ));
        assert!(fx.book.cancel(&caio, appointment.id).is_err());
        assert!(fx.book.remove(&caio, appointment.id).is_err());

        let unchanged = fx.book.list_for(&ana);
        assert_eq!(unchanged, vec![appointment]);
    }

    #[test]
    fn test_edit_changes_date_and_doctor_not_status() {
        let mut fx = setup(TransitionPolicy::Strict);
        let ana = fx.login("ana", Role::Patient);
        let appointment = fx.book_for(&ana, Some("drbob"));
        let roster = fx.access.doctors();

        let moved = fx
            .book
            .edit(
                &ana,
                appointment.id,
                AppointmentEdit {
                    datetime: Some("2025-09-01 09:00".to_string()),
                    doctor: Some(Some("drlia".to_string())),
                },
                &roster,
            )
            .unwrap();
        assert_eq!(moved.datetime, "2025-09-01 09:00");
        assert_eq!(moved.doctor_username.as_deref(), Some("drlia"));
        assert_eq!(moved.status, AppointmentStatus::Scheduled);
        assert!(moved.modified_at >= appointment.modified_at);

        let unassigned = fx
            .book
            .edit(
                &ana,
                appointment.id,
                AppointmentEdit {
                    doctor: Some(None),
                    ..Default::default()
                },
                &roster,
            )
            .unwrap();
        assert!(unassigned.doctor_username.is_none());
        assert_eq!(unassigned.datetime, "2025-09-01 09:00");
    }

    #[test]
    fn test_edit_normalizes_doctor_name() {
        let mut fx = setup(TransitionPolicy::Strict);
        let ana = fx.login("ana", Role::Patient);
        let appointment = fx.book_for(&ana, Some("drbob"));
        let roster = fx.access.doctors();

        let padded = fx
            .book
            .edit(
                &ana,
                appointment.id,
                AppointmentEdit {
                    doctor: Some(Some("  drlia ".to_string())),
                    ..Default::default()
                },
                &roster,
            )
            .unwrap();
        assert_eq!(padded.doctor_username.as_deref(), Some("drlia"));

        let blank = fx
            .book
            .edit(
                &ana,
                appointment.id,
                AppointmentEdit {
                    doctor: Some(Some("   ".to_string())),
                    ..Default::default()
                },
                &roster,
            )
            .unwrap();
        assert!(blank.doctor_username.is_none());
    }

    #[test]
    fn test_cancel_then_remove() {
        let mut fx = setup(TransitionPolicy::Strict);
        let ana = fx.login("ana", Role::Patient);
        let appointment = fx.book_for(&ana, None);

        let cancelled = fx.book.cancel(&ana, appointment.id).unwrap();
        assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
        assert_eq!(fx.book.list_for(&ana).len(), 1);

        fx.book.remove(&ana, appointment.id).unwrap();
        assert!(fx.book.list_for(&ana).is_empty());
    }

    #[test]
    fn test_doctor_sets_status_on_assigned_only() {
        let mut fx = setup(TransitionPolicy::Strict);
        let ana = fx.login("ana", Role::Patient);
        let bob = fx.login("drbob", Role::Doctor);
        let lia = fx.login("drlia", Role::Doctor);
        let assigned = fx.book_for(&ana, Some("drbob"));
        let unassigned = fx.book_for(&ana, None);

        let confirmed = fx
            .book
            .set_status(&bob, assigned.id, AppointmentStatus::Confirmed)
            .unwrap();
        assert_eq!(confirmed.status, AppointmentStatus::Confirmed);
        assert_eq!(confirmed.modified_by, "drbob");

        assert!(matches!(
            fx.book.set_status(&lia, assigned.id, AppointmentStatus::Completed),
            Err(ClinicError::Unauthorized(_))
        ));
        assert!(matches!(
            fx.book.set_status(&bob, unassigned.id, AppointmentStatus::Confirmed),
            Err(ClinicError::Unauthorized(_))
        ));
        assert!(matches!(
            fx.book.set_status(&bob, 99, AppointmentStatus::Confirmed),
            Err(ClinicError::NotFound { .. })
        ));
        assert!(matches!(
            fx.book.set_status(&ana, assigned.id, AppointmentStatus::Completed),
            Err(ClinicError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_strict_policy_keeps_terminal_states() {
        let mut fx = setup(TransitionPolicy::Strict);
        let ana = fx.login("ana", Role::Patient);
        let bob = fx.login("drbob", Role::Doctor);
        let appointment = fx.book_for(&ana, Some("drbob"));
        let roster = fx.access.doctors();

        fx.book
            .set_status(&bob, appointment.id, AppointmentStatus::Completed)
            .unwrap();

        assert!(matches!(
            fx.book.set_status(&bob, appointment.id, AppointmentStatus::Scheduled),
            Err(ClinicError::InvalidInput(_))
        ));
        assert!(fx.book.cancel(&ana, appointment.id).is_err());
        let edit = AppointmentEdit {
            datetime: Some("later".to_string()),
            ..Default::default()
        };
        assert!(fx.book.edit(&ana, appointment.id, edit, &roster).is_err());
    }

    #[test]
    fn test_permissive_policy_reopens() {
        let mut fx = setup(TransitionPolicy::Permissive);
        let ana = fx.login("ana", Role::Patient);
        let bob = fx.login("drbob", Role::Doctor);
        let appointment = fx.book_for(&ana, Some("drbob"));

        fx.book.cancel(&ana, appointment.id).unwrap();
        let reopened = fx
            .book
            .set_status(&bob, appointment.id, AppointmentStatus::Scheduled)
            .unwrap();
        assert_eq!(reopened.status, AppointmentStatus::Scheduled);
    }
}
