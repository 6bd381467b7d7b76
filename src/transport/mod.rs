pub mod http;
pub mod traits;

#[cfg(test)]
pub mod mock;

pub use http::HttpTransport;
pub use traits::{request_url, HttpResponse, Transport, TransportError};
