//! deal-scout
//!
//! ディール一覧の閲覧とインタラクション分類のCLI

pub mod cli;
pub mod config;
pub mod error;
pub mod listing;
pub mod replay;
pub mod session;
