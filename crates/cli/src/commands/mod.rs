pub mod chat;
pub mod config_cmd;
pub mod doctor;
pub mod ingest;
pub mod search;
