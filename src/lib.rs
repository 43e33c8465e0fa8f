//! Client-side session state for Vectora: conversation log, dataset cache and
//! restoration, chart handoff, the sign-in gate, and the gateway to the
//! analysis API. Everything survives reloads through a profile-scoped
//! [`store::PersistentStore`].

pub mod app;
pub mod charts;
pub mod chat;
pub mod config;
pub mod conversation;
pub mod dataset;
pub mod gateway;
pub mod landing;
pub mod session;
pub mod store;
pub mod types;

#[cfg(feature = "ui")]
pub mod ui;
#[cfg(feature = "ui")]
pub mod views;

pub use app::AppServices;
pub use config::AppConfig;
