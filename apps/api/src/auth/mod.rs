// Credentials, the request gate and the role filter.

pub mod gate;
pub mod handlers;
pub mod password;
pub mod roles;
pub mod token;
