//! Routing: URL segmentation and controller dispatch.

pub mod dispatcher;
pub mod router;

pub use dispatcher::{dispatch, format_action_name, format_controller_name};
pub use router::{ParamValue, Route, RouteSpec, Router};
