pub mod adapter;
pub mod audit;
pub mod cli;
pub mod config;
pub mod error;
pub mod service;

pub use error::{AccessError, ErrorKind};
pub use service::AccessService;
