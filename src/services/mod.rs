pub mod accounts;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod mailer;
pub mod media;
pub mod purchases;
