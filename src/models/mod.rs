//! Core data models for the WebDAV gateway.
//!
//! These types describe resources as WebDAV sees them and objects as the
//! backing store sees them, plus the property set derived from the latter.

pub mod object;
pub mod properties;
pub mod resource;
