pub mod cancel;
pub mod compare;
pub mod config;
pub mod context;
pub mod dashboard;
pub mod error;
pub mod logging;
pub mod manifest;
pub mod menu;
pub mod object;
pub mod path;
pub mod pipeline;
pub mod render;
pub mod scheduler;
pub mod source;
