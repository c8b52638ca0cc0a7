//! Serving
//!
//! Front end that gates every request before handing it to the file engine.

mod dispatcher;
mod engine;
mod http;

pub use dispatcher::{Dispatcher, Verdict, FORBIDDEN_MESSAGE, NOT_IMPLEMENTED_MESSAGE};
pub use engine::{DavEngine, FileEngine};
pub use http::HttpServer;
