#![allow(clippy::too_many_arguments)]

#[macro_use]
pub mod i18n;
pub mod logger;

pub mod app;
pub mod cli;
pub mod components;
pub mod ipc;
pub mod ops;
pub mod session;
pub mod settings;
