//! CLI 명령어 구현 모듈.

pub mod catalog;
pub mod fetch;
pub mod invalidate;
pub mod output;

pub use output::OutputFormat;
