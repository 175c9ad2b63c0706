pub mod inventory;
pub mod ticket;
pub mod user;

pub use self::{inventory::InventoryItem, ticket::Ticket, user::User};
