//! Request / response types for the HTTP API.

pub mod relay;
