pub mod deals;

pub use deals::Entity as Deals;
