//! Delivery Platform Engine
//!
//! The delivery engine is the transactional core of a multi-merchant food delivery marketplace: customers place
//! orders spanning several shops, couriers race to claim deliveries, and every handover moves money between
//! merchant ledgers, courier wallets and the platform. This library contains the core logic; it is transport- and
//! UI-agnostic.
//!
//! The library is divided into two main sections:
//! 1. Database management and control ([`mod@sqlite`]). SQLite is the supported backend. You should never need to
//!    access the database directly. Instead, use the public API provided by the engine. The exception is the data
//!    types used in the database. These are defined in the `db_types` module and are public.
//! 2. The engine public API ([`mod@dpe_api`]). This provides the public-facing functionality: order flows, the
//!    courier matcher, settlements and wallets. Backends implement the traits in [`mod@traits`] in order to drive
//!    these APIs.
//!
//! The engine also provides a set of events that can be subscribed to. These events are emitted when certain
//! actions occur, for example when an order is placed or a claim is won. A simple actor framework lets hosts hook
//! into these events and perform custom actions (push notifications, analytics and so on).
mod dpe_api;

pub mod db_types;
pub mod events;
pub mod helpers;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use dpe_api::{
    matcher_api::MatcherApi,
    order_flow_api::OrderFlowApi,
    order_objects,
    settlement_api::SettlementApi,
    wallet_api::WalletApi,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{
    DeliveryGatewayDatabase,
    DeliveryGatewayError,
    OrderManagement,
    SettingsManagement,
    WalletManagement,
};
