pub mod config;
pub mod context;
pub mod discovery;
pub mod encode;
pub mod error;
pub mod extract;
pub mod metrics_consts;
pub mod normalize;
pub mod processor;
pub mod publish;
pub mod schema;
