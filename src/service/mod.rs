pub mod background_jobs;
pub mod chat_bootstrap;
pub mod contact_service;
pub mod error;
pub mod lead_classifier;
pub mod payment_gateway;
pub mod stripe_gateway;
pub mod visibility;
