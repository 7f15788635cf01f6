pub mod events;
pub mod prompt;
pub mod request;
pub mod response;
