//! Guestbook - GitHub sign-in and a session-gated guestbook
//!
//! This library provides the OAuth login flow, server-side sessions and the
//! message store behind the guestbook HTTP API.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
