//! Built-in resources and data sources

pub mod datastore;
pub mod instance;
pub mod ssl_server_profile;

pub use datastore::DatastoreDataSource;
pub use instance::InstanceResource;
pub use ssl_server_profile::SslServerProfileDataSource;
