pub mod cart;
pub mod cart_mirror;
pub mod checkout;
pub mod lifecycle;
pub mod notify;
pub mod push;
pub mod trips;
