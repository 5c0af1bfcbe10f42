// storefront_app/src/services/mod.rs

pub mod mailer;
pub mod paypal;

pub use mailer::MailNotifier;
pub use paypal::SimulatedPayPalGateway;
