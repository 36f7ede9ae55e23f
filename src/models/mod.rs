//! Domain models for the cohort engine
//!
//! Patients own their events, prescriptions and measurements. Every date is a
//! [`Day`](crate::utils::date::Day).

pub mod event;
pub mod measurement;
pub mod patient;
pub mod prescription;
pub mod types;

pub use event::Event;
pub use measurement::Measurement;
pub use patient::{Patient, PatientState};
pub use prescription::{CombinationInfo, Prescription};
pub use types::{Gender, Window};
