//! # Database management and control.
//!
//! This module provides the interfaces that define the contracts of the delivery engine database *backends*.
//!
//! * [`DeliveryGatewayDatabase`] defines the mutating flows: order persistence, the shop order state machine, the
//!   courier claim, the two settlement transactions and gateway event ingestion.
//! * [`OrderManagement`] provides methods for querying orders, shops and settings.
//! * [`WalletManagement`] covers the wallet ledgers, derived balances and the payout request lifecycle.
//! * [`SettingsManagement`] is the admin surface for the settings singleton and the shop registry.
//!
//! [`RefundProcessor`] is the seam to the payment gateway for cancellation refunds; the engine only ever consumes
//! gateway *events* and never calls out except through this trait.
mod data_objects;
mod delivery_gateway_database;
mod order_management;
mod settings_management;
mod wallet_management;

pub use data_objects::{
    DeliverySettlement,
    FullOrder,
    GatewayEvent,
    GatewayEventOutcome,
    PayoutResolution,
    PickupSettlement,
    SettingsUpdate,
    ShopOrderDetail,
    WalletBalance,
};
pub use delivery_gateway_database::{
    DeliveryGatewayDatabase,
    DeliveryGatewayError,
    NoRefunds,
    RefundError,
    RefundProcessor,
};
pub use order_management::{OrderApiError, OrderManagement};
pub use settings_management::SettingsManagement;
pub use wallet_management::{WalletApiError, WalletManagement};
