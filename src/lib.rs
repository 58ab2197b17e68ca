pub mod app;
pub mod config;
pub mod credentials;
pub mod device;
pub mod error;
pub mod events;
pub mod gpsd;
pub mod ip;
pub mod logging;
pub mod map;
pub mod models;
pub mod provider;
pub mod remote;
pub mod session;
pub mod ui;
pub mod wifi;
