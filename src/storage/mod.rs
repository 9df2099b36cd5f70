mod accounts;
pub mod db;
pub mod models;
mod subscriptions;
mod tables;

pub use db::{Database, DatabaseError};
pub use tables::*;
