pub mod logger;
pub mod runtime;

pub use runtime::Runtime;
