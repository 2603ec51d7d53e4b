//! Training Enrollment - session registration and payment orchestration
//!
//! This crate reserves seats on capacity-limited training sessions, drives
//! each registration through card or bank-transfer payment, and queues the
//! learner-facing documents and notifications for every transition.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
