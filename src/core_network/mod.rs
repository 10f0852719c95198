pub mod help;
pub mod network;
pub mod pasv;
pub mod registry;

pub use registry::ConnectionRegistry;

#[cfg(test)]
mod test_server;
