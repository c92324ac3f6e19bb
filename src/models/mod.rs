pub mod cart;
pub mod driver;
pub mod notification;
pub mod order;
pub mod product;
pub mod trip;
