pub mod form;
pub mod response;

pub use response::{Created, MessageResponse};
