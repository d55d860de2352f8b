mod service_call;
mod tenant;
mod user;

pub use service_call::*;
pub use tenant::*;
pub use user::*;
