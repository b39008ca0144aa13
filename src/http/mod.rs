//! Request, response and cookie wrappers used by controllers.

pub mod cookie;
pub mod request;
pub mod response;

pub use cookie::{CookieOptions, Cookies};
pub use request::Request;
pub use response::Response;
