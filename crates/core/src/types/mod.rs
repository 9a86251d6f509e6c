pub mod method;
pub mod params;
pub mod request;

pub use method::{HttpMethod, MutationMethod, UnsupportedMethod};
pub use params::QueryParams;
pub use request::RequestDescriptor;
