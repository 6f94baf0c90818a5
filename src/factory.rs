//! Client factory
//!
//! The configuration surface of the library: one `ClientFactory` holds
//! the defaults shared by every call it mints (headers, base URL, cache
//! TTL, timeout), one pooled transport, and one cache store. Descriptor
//! builders seeded here can still override any of it per request.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::FileStore;
use crate::error::Error;
use crate::executor::RestCall;
use crate::request::{DescriptorBuilder, Method, RequestDescriptor, DEFAULT_CACHE_TTL, DEFAULT_TIMEOUT};
use crate::transport::{HttpTransport, ReqwestTransport};

/// Default namespace directory for the cache store
const DEFAULT_CACHE_NAMESPACE: &str = "misago";

/// Shared configuration and collaborators for minting executors
pub struct ClientFactory {
    base_url: String,
    default_headers: Vec<(String, String)>,
    global_cache_ttl: Duration,
    timeout: Duration,
    transport: Arc<dyn HttpTransport>,
    store: Arc<FileStore>,
}

impl ClientFactory {
    pub fn builder() -> ClientFactoryBuilder {
        ClientFactoryBuilder::new()
    }

    /// Start a descriptor for `path`, seeded with this factory's
    /// defaults.
    ///
    /// A relative `path` is appended to the base URL; an absolute URL is
    /// taken as-is.
    pub fn request<T>(&self, method: Method, path: &str) -> DescriptorBuilder<T> {
        let url = if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        };

        let mut builder = DescriptorBuilder::new(method, url)
            .cache_ttl(self.global_cache_ttl)
            .timeout(self.timeout);
        if !self.default_headers.is_empty() {
            builder = builder.headers(self.default_headers.clone());
        }
        builder
    }

    /// Mint an executor for `descriptor`, wired to the shared transport
    /// and cache store
    pub fn call<T, X, M>(&self, descriptor: RequestDescriptor<T>) -> RestCall<T, X, M>
    where
        T: Serialize + Clone + Send + Sync + 'static,
        X: DeserializeOwned + Serialize + Send + Sync + 'static,
        M: DeserializeOwned + Default + Send + Sync + 'static,
    {
        RestCall::new(
            descriptor,
            Arc::clone(&self.transport),
            Arc::clone(&self.store),
        )
    }

    /// The cache store shared by every call this factory mints
    pub fn store(&self) -> &Arc<FileStore> {
        &self.store
    }
}

/// Builder for `ClientFactory`
pub struct ClientFactoryBuilder {
    base_url: String,
    default_headers: Vec<(String, String)>,
    global_cache_ttl: Duration,
    timeout: Duration,
    connect_timeout: Duration,
    cache_dir: Option<PathBuf>,
    cache_namespace: String,
    transport: Option<Arc<dyn HttpTransport>>,
}

impl ClientFactoryBuilder {
    pub fn new() -> Self {
        Self {
            base_url: String::new(),
            default_headers: Vec::new(),
            global_cache_ttl: DEFAULT_CACHE_TTL,
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_TIMEOUT,
            cache_dir: None,
            cache_namespace: DEFAULT_CACHE_NAMESPACE.to_string(),
            transport: None,
        }
    }

    /// Prefix applied to relative request paths
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Headers applied to every minted descriptor (replacing the builder
    /// defaults)
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    pub fn global_cache_ttl(mut self, ttl: Duration) -> Self {
        self.global_cache_ttl = ttl;
        self
    }

    /// Read timeout applied to every minted descriptor
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Directory holding the cache namespace; defaults to the process
    /// working directory
    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    pub fn cache_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.cache_namespace = namespace.into();
        self
    }

    /// Replace the production transport (used by tests and embedders)
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> Result<ClientFactory, Error> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(self.connect_timeout)?),
        };

        let base_dir = match self.cache_dir {
            Some(dir) => dir,
            None => std::env::current_dir()
                .map_err(|e| Error::Config(format!("working directory unavailable: {}", e)))?,
        };

        Ok(ClientFactory {
            base_url: self.base_url,
            default_headers: self.default_headers,
            global_cache_ttl: self.global_cache_ttl,
            timeout: self.timeout,
            transport,
            store: Arc::new(FileStore::open(base_dir, &self.cache_namespace)),
        })
    }
}

impl Default for ClientFactoryBuilder {
    fn default() -> Self {
        Self::new()
    }
}
