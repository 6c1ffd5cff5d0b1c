//! # Easel Bridge
//!
//! The boundary between the untrusted editor UI and the privileged host.
//! The UI sends plain JSON-RPC 2.0 requests; the bridge resolves
//! credentials from the request or the stored settings, calls the remote
//! services and returns plain result objects.
//!
//! ## Methods
//!
//! | method | params | result |
//! |--------|--------|--------|
//! | `config/read` | none | settings with secrets blanked, plus `configured` flags |
//! | `config/save` | settings document | `{saved}` |
//! | `icons/search` | `{query, key?, secret?}` | provider document or `{error}` |
//! | `photos/search` | `{query, accessKey?}` | `{results}` or `{error}` |
//! | `image/generate` | `{prompt, apiKey?, width?, height?}` | `{imageUrl, shape}` |
//! | `project/save` | `{shapes, name?}` | `{saved, name}` |
//! | `project/load` | `{name}` | `{shapes}` |
//! | `project/list` | none | `{projects}` |

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod bridge;
pub mod projects;
pub mod rpc;

pub use bridge::{Bridge, BridgeError, Services, METHODS};
pub use projects::{ProjectDir, ProjectDirError};
pub use rpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
