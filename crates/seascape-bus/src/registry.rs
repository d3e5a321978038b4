//! # Endpoint Registry
//!
//! Maps service names to network endpoints. Built once at startup from
//! configuration and handed to every client that needs to dial a service.

use crate::error::RegistryError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Network location of one service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Service name used for lookup and in log lines
    pub name: String,
    pub host: String,
    /// Request-reply port
    pub port: u16,
    /// Publish port, if the service broadcasts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broadcast_port: Option<u16>,
    /// Public key identifying the service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
}

impl Endpoint {
    #[must_use]
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
            broadcast_port: None,
            public_key: None,
        }
    }

    #[must_use]
    pub fn with_broadcast_port(mut self, port: u16) -> Self {
        self.broadcast_port = Some(port);
        self
    }

    #[must_use]
    pub fn with_public_key(mut self, key: impl Into<String>) -> Self {
        self.public_key = Some(key.into());
        self
    }

    /// `tcp://host:port`
    #[must_use]
    pub fn url(&self) -> String {
        format!("tcp://{}:{}", self.host, self.port)
    }

    /// The same service addressed on its publish port.
    pub fn broadcast(&self) -> Result<Endpoint, RegistryError> {
        let port = self
            .broadcast_port
            .ok_or_else(|| RegistryError::NoBroadcastPort(self.name.clone()))?;
        Ok(Endpoint {
            name: self.name.clone(),
            host: self.host.clone(),
            port,
            broadcast_port: None,
            public_key: self.public_key.clone(),
        })
    }
}

/// Endpoint lookup.
pub trait EndpointResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Result<Endpoint, RegistryError>;

    fn resolve_by_public_key(&self, key: &str) -> Result<Endpoint, RegistryError>;
}

/// In-memory endpoint table.
#[derive(Debug, Clone, Default)]
pub struct EndpointRegistry {
    endpoints: HashMap<String, Endpoint>,
}

impl EndpointRegistry {
    /// Build a registry, rejecting duplicate names.
    pub fn new(endpoints: impl IntoIterator<Item = Endpoint>) -> Result<Self, RegistryError> {
        let mut registry = Self::default();
        for endpoint in endpoints {
            registry.insert(endpoint)?;
        }
        Ok(registry)
    }

    pub fn insert(&mut self, endpoint: Endpoint) -> Result<(), RegistryError> {
        if self.endpoints.contains_key(&endpoint.name) {
            return Err(RegistryError::Duplicate(endpoint.name));
        }
        self.endpoints.insert(endpoint.name.clone(), endpoint);
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Registered service names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.endpoints.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl EndpointResolver for EndpointRegistry {
    fn resolve(&self, name: &str) -> Result<Endpoint, RegistryError> {
        self.endpoints
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownService(name.to_string()))
    }

    fn resolve_by_public_key(&self, key: &str) -> Result<Endpoint, RegistryError> {
        self.endpoints
            .values()
            .find(|e| e.public_key.as_deref() == Some(key))
            .cloned()
            .ok_or_else(|| RegistryError::UnknownPublicKey(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indexer() -> Endpoint {
        Endpoint::new("indexer", "127.0.0.1", 4000)
            .with_broadcast_port(4001)
            .with_public_key("idx-key")
    }

    #[test]
    fn test_endpoint_urls() {
        let endpoint = indexer();
        assert_eq!(endpoint.url(), "tcp://127.0.0.1:4000");
        assert_eq!(endpoint.broadcast().unwrap().url(), "tcp://127.0.0.1:4001");
    }

    #[test]
    fn test_broadcast_requires_port() {
        let endpoint = Endpoint::new("static", "localhost", 5000);
        assert_eq!(
            endpoint.broadcast(),
            Err(RegistryError::NoBroadcastPort("static".into()))
        );
    }

    #[test]
    fn test_resolve() {
        let registry = EndpointRegistry::new([indexer()]).unwrap();
        assert_eq!(registry.resolve("indexer").unwrap().port, 4000);
        assert_eq!(
            registry.resolve("ghost"),
            Err(RegistryError::UnknownService("ghost".into()))
        );
    }

    #[test]
    fn test_resolve_by_public_key() {
        let registry = EndpointRegistry::new([
            indexer(),
            Endpoint::new("reader", "127.0.0.1", 4100),
        ])
        .unwrap();
        assert_eq!(registry.resolve_by_public_key("idx-key").unwrap().name, "indexer");
        assert!(matches!(
            registry.resolve_by_public_key("nope"),
            Err(RegistryError::UnknownPublicKey(_))
        ));
    }

    #[test]
    fn test_duplicate_rejected() {
        let result = EndpointRegistry::new([indexer(), indexer()]);
        assert_eq!(result.unwrap_err(), RegistryError::Duplicate("indexer".into()));
    }

    #[test]
    fn test_names_sorted() {
        let registry = EndpointRegistry::new([
            Endpoint::new("reader", "h", 1),
            Endpoint::new("categorizer", "h", 2),
        ])
        .unwrap();
        assert_eq!(registry.names(), vec!["categorizer", "reader"]);
        assert_eq!(registry.len(), 2);
    }
}
