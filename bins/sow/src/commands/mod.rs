//! Command implementations

pub mod account;
pub mod admin;
pub mod checkin;
pub mod compress;
pub mod distance;
pub mod feed;
pub mod history;
pub mod report;
pub mod stats;
