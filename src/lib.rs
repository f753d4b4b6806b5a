pub mod api;
pub mod app;
pub mod capture;
pub mod cli;
pub mod config;
pub mod db;
pub mod extraction;
pub mod global;
pub mod pipeline;
pub mod transcription;
