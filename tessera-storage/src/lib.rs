//! Tessera Storage - Instances, Registry and Transports
//!
//! A logical database is a [`SqliteInstance`] bound under its name in the
//! [`InstanceRegistry`]. Callers reach it through a [`SqlClient`], either
//! in-process ([`DirectClient`]) or through the gateway ([`HttpClient`]).

pub mod instance;
pub mod registry;
pub mod transport;
pub mod value;

pub use instance::{QueryOutput, SqliteInstance};
pub use registry::{InstanceRegistry, INSTANCE_EXTENSION};
pub use transport::{
    connect, DirectClient, HttpClient, SqlClient, TransportConfig, TransportKind,
    TransportStrategy, DEFAULT_HTTP_TIMEOUT,
};
