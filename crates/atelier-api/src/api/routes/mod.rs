//! Route handlers

pub mod access_check;
pub mod health;
pub mod me;
