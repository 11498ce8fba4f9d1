pub mod connectivity;
pub mod request;
pub mod service;

pub use connectivity::{ConnectivityFlag, ConnectivityMonitor, TcpReachability};
pub use request::{HttpMethod, NetworkRequest};
pub use service::{interpret_response, HttpNetworkService, NetworkService};
