pub mod auth;
pub mod clock;
pub mod config;
pub mod credentials;
pub mod geohash;
pub mod hasher;
pub mod salt;
pub mod types;
