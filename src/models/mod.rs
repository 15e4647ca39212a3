//! Core data models for the event upload service.
//!
//! `media` holds the records exchanged with the hosting service and returned
//! to callers; `upload` holds the client-side task and batch types tracked by
//! the orchestrator.

pub mod media;
pub mod upload;
