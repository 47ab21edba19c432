// Concrete implementations of the domain ports for external systems.

pub mod proxy_client;
