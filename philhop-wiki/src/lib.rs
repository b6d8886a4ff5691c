pub mod client;
pub mod error;
pub mod extract;
pub mod page;
pub mod source;

pub use client::{WikiClient, WikiConfig};
pub use error::WikiError;
pub use page::{Candidate, PageRef};
pub use source::LinkSource;
