pub mod invoice;
pub mod triage;

pub use self::{invoice::Scanner, triage::Gate};
