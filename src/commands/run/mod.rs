mod bootstrap;
mod protocol;
mod run;

pub use protocol::{ERROR_SENTINEL, NO_RESPONSE};
pub use run::run;
