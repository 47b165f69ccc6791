pub mod command;
pub mod input_poll;
pub mod notify;
