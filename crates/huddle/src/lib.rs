//! Huddle - Meeting Transcript Q&A
//!
//! Retrieval-augmented question answering and smart replies over meeting
//! transcripts, served as a small REST API.

pub mod config;
pub mod server;
