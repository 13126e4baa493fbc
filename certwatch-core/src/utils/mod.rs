//! 工具模块

pub mod cancel;
pub mod domain_name;

pub use cancel::CancelToken;
