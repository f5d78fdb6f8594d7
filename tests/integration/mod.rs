//! Integration tests for askql.

pub mod common;
pub mod generate_test;
pub mod monitoring_test;
pub mod schema_test;
pub mod upload_test;
