//! Bucket identity
//!
//! Identifies a rate-limit domain. Two ids compare equal when they name
//! the same domain; in particular two [`BucketId::Hash`] ids with the same
//! hash are equal regardless of which route first produced them.

/// Identity of a rate-limit domain
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BucketId {
    /// Ungrouped calls share one global domain
    Unbucketed,
    /// Static client-side domain with limits known ahead of any response
    /// (e.g. `"send-edit"`)
    Client(&'static str),
    /// Gateway frame domain
    Gateway,
    /// Route-keyed domain, awaiting server-taught limits
    Endpoint {
        method: &'static str,
        route: String,
    },
    /// Server-issued opaque hash domain shared by every route the server
    /// maps into it
    Hash(String),
}

impl BucketId {
    /// Build a route-keyed id from a method and route template
    #[must_use]
    pub fn endpoint(method: &'static str, route: impl Into<String>) -> Self {
        Self::Endpoint {
            method,
            route: route.into(),
        }
    }

    /// Build a hash-keyed id from a server-issued bucket hash
    #[must_use]
    pub fn hash(hash: impl Into<String>) -> Self {
        Self::Hash(hash.into())
    }

    /// Check if this id can be promoted into a hash domain
    ///
    /// Only route-keyed ids are remapped when the server reveals a shared
    /// hash; static client and gateway domains keep their identity.
    #[must_use]
    pub fn is_promotable(&self) -> bool {
        matches!(self, Self::Endpoint { .. })
    }
}

impl std::fmt::Display for BucketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unbucketed => write!(f, "unbucketed"),
            Self::Client(name) => write!(f, "client:{name}"),
            Self::Gateway => write!(f, "gateway"),
            Self::Endpoint { method, route } => write!(f, "{method} {route}"),
            Self::Hash(hash) => write!(f, "hash:{hash}"),
        }
    }
}
