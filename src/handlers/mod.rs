mod health;
mod streams;

pub use health::*;
pub use streams::*;
