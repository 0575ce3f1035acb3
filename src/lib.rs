pub mod cli;
pub mod config;
pub mod handlers;
pub mod router;
pub mod state;
pub mod storage;
pub mod stream;

pub use config::ServerConfig;
pub use router::create_router;
pub use state::ServerState;
pub use stream::{StreamRegistry, StreamService};
