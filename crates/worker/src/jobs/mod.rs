pub mod alert;
pub mod notify;
pub mod purge;
