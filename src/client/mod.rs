//! Client side of the upload flow: the batch orchestrator, its progress
//! tracker and the transport that carries each file to the endpoint.

pub mod http_transport;
pub mod orchestrator;
pub mod progress_stream;
pub mod tracker;
pub mod transport;
