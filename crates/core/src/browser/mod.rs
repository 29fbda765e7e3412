mod types;
mod webdriver;

pub use types::{BrowserEngine, BrowserError, BrowserSession, ElementHandle, ElementQuery};
pub use webdriver::WebDriverEngine;
