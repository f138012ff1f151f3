#![forbid(unsafe_code)]

mod args;
mod bin_detect;
mod error;
mod jsonrpc;
mod logging;
mod runtime;
mod session_log;
mod time;

pub(crate) use args::*;
pub(crate) use bin_detect::*;
pub(crate) use error::*;
pub(crate) use jsonrpc::*;
pub(crate) use logging::*;
pub(crate) use runtime::*;
pub(crate) use session_log::*;
pub(crate) use time::*;
