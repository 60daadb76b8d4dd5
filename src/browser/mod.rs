pub mod cdp;
pub mod chrome;
pub mod error;
pub mod page;
pub mod session;

pub use chrome::{ChromeProcess, LaunchOptions};
pub use error::BrowserError;
pub use page::Page;
pub use session::Session;
