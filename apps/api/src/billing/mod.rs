// Token metering, payment settlement and the billing endpoints.

pub mod handlers;
pub mod invoice;
pub mod meter;
pub mod settlement;
pub mod webhook;
