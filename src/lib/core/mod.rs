pub mod error;
pub mod form;
pub mod service;
pub mod todo;

pub use error::*;
pub use form::*;
pub use service::*;
pub use todo::*;
