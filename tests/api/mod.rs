//! API endpoint tests

mod auth_tests;
mod health_tests;
mod message_tests;
