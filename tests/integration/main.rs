//! Integration tests

mod api_tests;
mod booking_scenarios;
mod http_api;
