pub mod aggregate;
pub mod distance;
pub mod domain;
pub mod fingerprint;
pub mod request;
pub mod store;
