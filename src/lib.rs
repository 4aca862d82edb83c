pub mod api_connection;
pub mod dataset;
pub mod cli;
pub mod retriever;
pub mod advisor;
pub mod session;
