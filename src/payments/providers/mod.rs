pub mod card;
pub mod mobile_money;
pub mod paypal;

pub use card::CardGatewayProvider;
pub use mobile_money::MobileMoneyProvider;
pub use paypal::PaypalProvider;
