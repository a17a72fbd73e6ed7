pub mod animation;
pub mod chord;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod geometry;
pub mod interaction;
pub mod notes;
pub mod output;
pub mod page;
pub mod render;
pub mod synth;
pub mod types;
pub mod wav_export;
pub mod ws_server;

#[cfg(feature = "gui")]
pub mod webview_app;
