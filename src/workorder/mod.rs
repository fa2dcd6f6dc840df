pub mod audit;
pub mod config;
pub mod dedup;
pub mod export;
pub mod filename;
pub mod locate;
pub mod miner;
pub mod model;
pub mod paths;
pub mod persist;
pub mod reconcile;
pub mod scanner;
pub mod util;
