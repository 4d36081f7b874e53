// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The switch administrative database (swdb).
//!
//! This holds the operator-managed state the controller consults while
//! forwarding: registered switches, layer-3 networks, host and gateway
//! bindings, VIPs and the firewall allowlist. Everything is persisted in a
//! sled key-value store, one tree per entity; the controller core issues
//! only short single-key queries against it.

pub mod db;
pub mod error;
pub mod types;

pub use db::Db;
pub use error::Error;
pub use types::*;
