// Menu and promotion reference data
pub mod menu;
pub mod promotions;

// Cart validation and pricing
pub mod customization;
pub mod pricing;

// Order records and the checkout flow
pub mod checkout;
pub mod orders;

// External payment providers
pub mod payment_gateway;
