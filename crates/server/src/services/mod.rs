//! Business services.
//!
//! Services own transactions: they load and lock rows through the
//! repositories, apply the rules from `counterline_core`, and write the
//! outcome back before committing.

pub mod cash_sessions;
pub mod catalog_cache;
pub mod checkout;
pub mod demo_data;
pub mod image_store;
pub mod images;
pub mod orders;
pub mod pin;
pub mod tickets;

pub use cash_sessions::CashSessionService;
pub use catalog_cache::CatalogCache;
pub use checkout::CheckoutService;
pub use demo_data::{DemoDataService, DemoDataSet};
pub use image_store::ImageStoreClient;
pub use images::ImageService;
pub use orders::OrderService;
pub use pin::{PinAttempts, PinService};
pub use tickets::render_ticket;
