pub mod maintenance;
pub mod push_subscriptions;
pub mod rate_limit_hashes;
pub mod reports;
