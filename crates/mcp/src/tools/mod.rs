#![forbid(unsafe_code)]

mod decode;
mod definitions;
mod dispatch;
mod runs;
mod units;

pub(crate) use definitions::tool_definitions;
pub(crate) use dispatch::dispatch_tool;
