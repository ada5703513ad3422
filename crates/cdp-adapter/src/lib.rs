//! Page controller over the Chromium DevTools Protocol.
//!
//! Higher layers only see the [`PageController`] trait: navigation, element
//! queries expressed as [`Selector`]s, clicks, script evaluation and
//! screenshots. [`BrowserSession`] launches Chromium through `chromiumoxide`
//! and hands out [`ChromiumPage`]s; the `fixture` feature adds an in-memory
//! [`fixture::ScriptedPage`] for tests.

pub mod chromium;
pub mod element;
pub mod error;
pub mod page;
pub mod scripts;
pub mod selector;

#[cfg(any(test, feature = "fixture"))]
pub mod fixture;

pub use chromium::{detect_chrome_executable, BrowserSession, ChromiumPage, CookieParam, SessionConfig};
pub use element::{ElementHandle, ElementSnapshot};
pub use error::PageError;
pub use page::{click_with_fallback, settle, wait_for_match, LoadState, PageController};
pub use selector::Selector;
