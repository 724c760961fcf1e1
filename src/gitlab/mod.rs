//! GitLab REST v4 access: transport capability, client, response models.

pub mod client;
pub mod models;
pub mod transport;

pub use client::{decode_id, query_pairs, with_query, GitLabApi};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
