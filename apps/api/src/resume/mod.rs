//! Résumé upload, lookup and AI-profile persistence (`/api/resume/*`).

pub mod handlers;
pub mod repo;
pub mod service;
