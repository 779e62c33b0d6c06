//! Repository content access: the content API client and the concurrent
//! transfer engine.

pub mod api;
pub mod transfer;

pub use api::{Application, RepoClient, ServiceMeta};
pub use transfer::{FileFetch, FileMeta, MetaFetch, TransferEngine};
