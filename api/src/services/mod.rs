pub mod callback;
pub mod cookies;
pub mod publish;
