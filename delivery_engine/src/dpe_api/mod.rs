//! # Delivery engine public API
//!
//! The `dpe_api` module exposes the programmatic API for the delivery engine. The API is modular, so hosts can
//! pick and choose the functionality they need, or run different parts on different machines.
//!
//! * [`order_flow_api`] handles order placement, the shop order state machine, cancellations and line-item edits.
//! * [`matcher_api`] builds the courier assignment feed and arbitrates claims.
//! * [`settlement_api`] drives the pickup and delivery settlements, the delivery OTP flow and gateway webhooks.
//! * [`wallet_api`] exposes derived balances, ledger histories and payout requests.
//!
//! # API usage
//!
//! The pattern for using all the APIs is the same. An API instance is created by supplying a database backend that
//! implements the specific backend traits required by the API.
//!
//! ```rust,ignore
//! use delivery_engine::{MatcherApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! // SqliteDatabase implements DeliveryGatewayDatabase
//! let api = MatcherApi::new(db, producers);
//! let offers = api.assignment_feed(None).await?;
//! ```

pub mod matcher_api;
pub mod order_flow_api;
pub mod order_objects;
pub mod settlement_api;
pub mod wallet_api;
