// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("datastore error: {0}")]
    Db(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("switch with dpid {0:#018x} already registered")]
    DuplicateDpid(u64),

    #[error("not found: {0}")]
    NotFound(String),
}
