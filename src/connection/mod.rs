pub mod agency;
pub mod config;
pub mod server;

pub use agency::AgencyClient;
pub use config::{AgencyConfig, Credentials};
pub use server::{HttpServerConnector, ServerConnector};
