pub mod jobs;
pub mod push;
pub mod telegram;
