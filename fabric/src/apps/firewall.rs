// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::apps::Processor;
use crate::error::Error;
use crate::inf;
use slog::Logger;

const NAME: &str = "firewall";

/// Placeholder in the chain for allowlist enforcement. Every callback
/// passes through. Rule evaluation belongs in `on_packet_in`, matching
/// frames against the `acl` records in [`swdb::Db`] and consuming what the
/// allowlist rejects.
pub struct Firewall {
    db: swdb::Db,
    log: Logger,
}

impl Firewall {
    pub fn new(db: swdb::Db, log: Logger) -> Self {
        Self { db, log }
    }
}

impl Processor for Firewall {
    fn name(&self) -> &'static str {
        NAME
    }

    fn init(&self) -> Result<(), Error> {
        let acls = self.db.acls()?;
        inf!(self.log, NAME, "{} allowlist entries loaded", acls.len());
        Ok(())
    }
}
