//! Concurrent file transfer engine.
//!
//! Fans a batch of repository requests out over spawned tasks while a
//! semaphore keeps at most `max_concurrent` of them in flight. Results come
//! back in submission order, each tagged with its index, and a failed task
//! never cancels its siblings.

use std::sync::Arc;

use futures::future::join_all;
use reqwest::header::{CONTENT_LENGTH, ETAG};
use reqwest::{Client, Method, StatusCode};
use tokio::sync::Semaphore;
use tracing::debug;

use crate::constants::services::APP_HOST_HEADER;
use crate::constants::MAX_CONCURRENT_CONNECTIONS;
use crate::errors::{TransferError, TransferResult};

/// Downloaded file content, tagged with its submission index.
#[derive(Debug)]
pub struct FileFetch {
    pub index: usize,
    pub path: String,
    pub result: TransferResult<Vec<u8>>,
}

/// Size and entity tag of one file, tagged with its submission index.
#[derive(Debug)]
pub struct MetaFetch {
    pub index: usize,
    pub path: String,
    pub result: TransferResult<FileMeta>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    pub etag: String,
    pub length: u64,
}

#[derive(Debug, Clone)]
pub struct TransferEngine {
    http: Client,
    max_concurrent: usize,
}

impl TransferEngine {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            max_concurrent: MAX_CONCURRENT_CONNECTIONS,
        }
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// Download the content of every path, at most `max_concurrent` at a
    /// time. The output has one entry per input path, in input order.
    pub async fn fetch_contents(
        &self,
        base: &str,
        token: &str,
        app_host_id: Option<&str>,
        paths: &[String],
    ) -> Vec<FileFetch> {
        let futures = paths
            .iter()
            .map(|path| {
                let request = self.build_request(Method::GET, base, token, app_host_id, path);
                let path = path.clone();
                async move {
                    let response = request.send().await?;
                    let status = response.status();
                    if status != StatusCode::OK {
                        return Err(TransferError::Status {
                            status: status.as_u16(),
                            path,
                        });
                    }
                    Ok(response.bytes().await?.to_vec())
                }
            })
            .collect();
        let results = self.run_all(futures).await;
        paths
            .iter()
            .zip(results)
            .enumerate()
            .map(|(index, (path, result))| FileFetch {
                index,
                path: path.clone(),
                result,
            })
            .collect()
    }

    /// Fetch size and entity tag for every path via HEAD requests, with the
    /// same ordering and concurrency behavior as [`fetch_contents`].
    ///
    /// [`fetch_contents`]: TransferEngine::fetch_contents
    pub async fn fetch_metadata(
        &self,
        base: &str,
        token: &str,
        app_host_id: Option<&str>,
        paths: &[String],
    ) -> Vec<MetaFetch> {
        let futures = paths
            .iter()
            .map(|path| {
                let request = self.build_request(Method::HEAD, base, token, app_host_id, path);
                let path = path.clone();
                async move {
                    let response = request.send().await?;
                    let status = response.status();
                    if status != StatusCode::OK {
                        return Err(TransferError::Status {
                            status: status.as_u16(),
                            path,
                        });
                    }
                    let etag = response
                        .headers()
                        .get(ETAG)
                        .and_then(|value| value.to_str().ok())
                        .map(|value| value.trim_matches('"').to_string())
                        .ok_or_else(|| TransferError::MissingEtag { path: path.clone() })?;
                    let length = response
                        .headers()
                        .get(CONTENT_LENGTH)
                        .and_then(|value| value.to_str().ok())
                        .ok_or_else(|| TransferError::MissingLength { path: path.clone() })?
                        .parse::<u64>()
                        .map_err(|_| TransferError::InvalidLength { path: path.clone() })?;
                    Ok(FileMeta { etag, length })
                }
            })
            .collect();
        let results = self.run_all(futures).await;
        paths
            .iter()
            .zip(results)
            .enumerate()
            .map(|(index, (path, result))| MetaFetch {
                index,
                path: path.clone(),
                result,
            })
            .collect()
    }

    fn build_request(
        &self,
        method: Method,
        base: &str,
        token: &str,
        app_host_id: Option<&str>,
        path: &str,
    ) -> reqwest::RequestBuilder {
        let url = format!(
            "{}/{}",
            base.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        debug!("{method} {url}");
        let mut request = self.http.request(method, url).bearer_auth(token);
        if let Some(id) = app_host_id {
            request = request.header(APP_HOST_HEADER, id);
        }
        request
    }

    /// Spawn one task per future, gated by a shared semaphore, and collect
    /// their results in submission order. A panicked or aborted task turns
    /// into a per-entry error instead of poisoning the batch.
    async fn run_all<T, F>(&self, futures: Vec<F>) -> Vec<TransferResult<T>>
    where
        T: Send + 'static,
        F: std::future::Future<Output = TransferResult<T>> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut handles = Vec::with_capacity(futures.len());
        for future in futures {
            let semaphore = Arc::clone(&semaphore);
            handles.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|err| TransferError::TaskFailed(err.to_string()))?;
                future.await
            }));
        }
        join_all(handles)
            .await
            .into_iter()
            .map(|joined| match joined {
                Ok(result) => result,
                Err(err) => Err(TransferError::TaskFailed(err.to_string())),
            })
            .collect()
    }
}
