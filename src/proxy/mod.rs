//! HTTP relay module.
//!
//! Accepts forwarding requests on `/api/relay`, calls the configured
//! upstream and relays its buffered or streaming response.

mod cors;
mod handlers;
pub mod relay;
mod server;
pub mod stream;
pub mod types;
pub mod upstream;

pub use handlers::{AVAILABLE_ROUTES, RELAY_PATH};
pub use relay::{Relay, RelayOutcome};
pub use server::{create_router, run_server, AppState, RequestId, REQUEST_ID_HEADER};
pub use stream::{RelayStream, StreamEnd};
pub use types::{Credential, ForwardRequest};
pub use upstream::{build_url, normalize_credential, UpstreamCall};
