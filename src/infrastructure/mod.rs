//! Host-side plumbing: transport link, polling reader, logging.

pub mod link;
pub mod logging;
pub mod reader;
