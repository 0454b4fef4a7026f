//! Booking back end for university outreach training sessions.
//!
//! Schools reserve subjects by date and half-day slot; staff review
//! reservations and manage the catalog from a dashboard.

pub mod api;
pub mod auth;
pub mod booking;
pub mod config;
pub mod controller;
pub mod domain;
pub mod notify;
pub mod repo;
pub mod telemetry;
