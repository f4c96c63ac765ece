pub mod account;
pub mod appointment;
pub mod invoice;
pub mod notification;
pub mod patient;

pub use account::*;
pub use appointment::*;
pub use invoice::*;
pub use notification::*;
pub use patient::*;
