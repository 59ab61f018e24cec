mod rut;
pub use self::rut::Rut;

mod credentials;
pub use self::credentials::Credentials;
