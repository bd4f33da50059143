// in-memory implementation of the Broadcaster port, dashmap + tokio::broadcast

mod registry;

pub use registry::CrSingleInstance;

#[cfg(test)]
mod tests;
