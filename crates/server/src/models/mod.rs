//! Domain models for the server.
//!
//! Row types live next to their repositories; these are the shapes handlers
//! and services exchange, and what the JSON API serializes.

pub mod cash_session;
pub mod customer;
pub mod order;
pub mod product;
pub mod sale;
pub mod settings;

pub use cash_session::{
    CashSession, CloseSessionRequest, OpenSessionRequest, ReportQuery, SeriesQuery,
    SessionReportView, normalize_series,
};
pub use customer::{Customer, CustomerFilter, CustomerInput};
pub use order::{
    NewOrder, NewOrderItem, NewQuote, Order, OrderFilter, OrderIntake, OrderItem, OrderSource,
    OrderStatusUpdate,
};
pub use product::{
    CatalogProduct, ImageOrderUpdate, Product, ProductFilter, ProductImage, ProductImageSet,
    ProductInput, StockAdjustment,
};
pub use sale::{NewSale, NewSaleLine, Sale, SaleFilter, SaleItem, SalePayment};
pub use settings::{
    Ad, CurrencyRate, LatestRateQuery, NewCurrencyRate, StoreProfile, StoreProfileUpdate,
    TaxonomyEntry, TaxonomyInput, TaxonomyKind,
};
