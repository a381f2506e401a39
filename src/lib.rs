//! Nolivos Law portal: role navigation, case dashboards, and the
//! immigration-document assistant, served over HTTP from one binary.

pub mod assistant;
pub mod channels;
pub mod config;
pub mod db;
pub mod error;
pub mod news;
pub mod portal;
pub mod settings;
pub mod upstream;
