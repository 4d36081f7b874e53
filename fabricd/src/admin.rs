// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The switch-registration API. Every response carries the status/msg
//! envelope; transport-level HTTP errors only occur for unroutable
//! requests.

use crate::config::Config;
use dropshot::{
    endpoint, ApiDescription, ConfigDropshot, ConfigTls, HttpError,
    HttpResponseOk, HttpServerStarter, Path, RequestContext, TypedBody,
};
use fabric::controller::Controller;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use slog::{error, info, o, warn, Logger};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use swdb::{SwitchInfo, SwitchRecord};
use tokio::task::JoinHandle;

pub struct HandlerContext {
    pub db: swdb::Db,
    pub controller: Arc<Controller>,
    pub log: Logger,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Status {
    Okay = 0,
    QueryFailed = 1,
    DecodeFailed = 2,
    InvalidParam = 3,
    DuplicatedDpid = 4,
    InvalidSwitchId = 5,
    UnknownSwitchId = 6,
    InternalServerErr = 7,
}

impl Status {
    fn msg(&self, detail: &str) -> String {
        match self {
            Status::Okay => "no error".into(),
            Status::QueryFailed => {
                format!("failed to query from database: {detail}")
            }
            Status::DecodeFailed => {
                format!("failed to decode input parameters: {detail}")
            }
            Status::InvalidParam => {
                format!("invalid input parameter: {detail}")
            }
            Status::DuplicatedDpid => "duplicated switch DPID".into(),
            Status::InvalidSwitchId => {
                format!("invalid switch ID: {detail}")
            }
            Status::UnknownSwitchId => "unknown switch ID".into(),
            Status::InternalServerErr => "internal server error".into(),
        }
    }
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct StatusResponse {
    pub status: u32,
    pub msg: String,
}

impl StatusResponse {
    fn new(status: Status, detail: &str) -> Self {
        Self {
            status: status as u32,
            msg: status.msg(detail),
        }
    }
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct SwitchListResponse {
    pub status: u32,
    pub msg: String,
    pub switches: Vec<SwitchRecord>,
}

#[derive(Deserialize, JsonSchema)]
pub struct SwitchPath {
    id: String,
}

pub fn start_server(
    log: Logger,
    config: &Config,
    context: Arc<HandlerContext>,
) -> Result<JoinHandle<()>, String> {
    let sa = SocketAddr::new(
        Ipv4Addr::UNSPECIFIED.into(),
        config.rest.port,
    );
    let ds_config = ConfigDropshot {
        bind_address: sa,
        ..Default::default()
    };
    let tls = config.rest.tls.then(|| ConfigTls::AsFile {
        cert_file: config
            .rest
            .cert_file
            .clone()
            .unwrap_or_default()
            .into(),
        key_file: config.rest.key_file.clone().unwrap_or_default().into(),
    });

    let ds_log = log.new(o!("unit" => "api-server"));
    let api = api_description();

    let server =
        HttpServerStarter::new_with_tls(&ds_config, api, context, &ds_log, tls)
            .map_err(|e| format!("new admin dropshot: {e}"))?;

    info!(log, "admin: listening on {}", sa);

    Ok(tokio::spawn(async move {
        match server.start().await {
            Ok(_) => warn!(log, "admin: unexpected server exit"),
            Err(e) => error!(log, "admin: server start error {:?}", e),
        }
    }))
}

macro_rules! register {
    ($api:expr, $endpoint:expr) => {
        $api.register($endpoint).expect(stringify!($endpoint))
    };
}

pub fn api_description() -> ApiDescription<Arc<HandlerContext>> {
    let mut api = ApiDescription::new();
    register!(api, list_switch);
    register!(api, add_switch);
    register!(api, remove_switch);
    api
}

#[endpoint { method = GET, path = "/api/v1/switch" }]
async fn list_switch(
    ctx: RequestContext<Arc<HandlerContext>>,
) -> Result<HttpResponseOk<SwitchListResponse>, HttpError> {
    Ok(HttpResponseOk(do_list_switch(&ctx.context().db)))
}

#[endpoint { method = POST, path = "/api/v1/switch" }]
async fn add_switch(
    ctx: RequestContext<Arc<HandlerContext>>,
    body: TypedBody<SwitchInfo>,
) -> Result<HttpResponseOk<StatusResponse>, HttpError> {
    Ok(HttpResponseOk(do_add_switch(
        &ctx.context().db,
        body.into_inner(),
    )))
}

#[endpoint { method = DELETE, path = "/api/v1/switch/{id}" }]
async fn remove_switch(
    ctx: RequestContext<Arc<HandlerContext>>,
    path: Path<SwitchPath>,
) -> Result<HttpResponseOk<StatusResponse>, HttpError> {
    Ok(HttpResponseOk(do_remove_switch(
        ctx.context(),
        &path.into_inner().id,
    )))
}

fn do_list_switch(db: &swdb::Db) -> SwitchListResponse {
    match db.switches() {
        Ok(switches) => SwitchListResponse {
            status: Status::Okay as u32,
            msg: Status::Okay.msg(""),
            switches,
        },
        Err(e) => SwitchListResponse {
            status: Status::QueryFailed as u32,
            msg: Status::QueryFailed.msg(&e.to_string()),
            switches: Vec::new(),
        },
    }
}

fn validate_switch(info: &SwitchInfo) -> Result<(), String> {
    if info.n_ports > 512 {
        return Err("too many ports".into());
    }
    if u32::from(info.first_port) + u32::from(info.n_ports) > 0xffff {
        return Err("too high first port number".into());
    }
    Ok(())
}

fn do_add_switch(db: &swdb::Db, info: SwitchInfo) -> StatusResponse {
    if let Err(detail) = validate_switch(&info) {
        return StatusResponse::new(Status::InvalidParam, &detail);
    }
    match db.add_switch(info) {
        Ok(_) => StatusResponse::new(Status::Okay, ""),
        Err(swdb::Error::DuplicateDpid(_)) => {
            StatusResponse::new(Status::DuplicatedDpid, "")
        }
        Err(e) => {
            StatusResponse::new(Status::QueryFailed, &e.to_string())
        }
    }
}

/// Deregistration also clears the flow tables of every connected device,
/// so stale rules for the departed switch cannot linger.
fn do_remove_switch(ctx: &HandlerContext, id: &str) -> StatusResponse {
    let Ok(id) = id.parse::<u64>() else {
        return StatusResponse::new(Status::InvalidSwitchId, id);
    };
    match ctx.db.remove_switch(id) {
        Ok(Some(_)) => {
            ctx.controller.clear_all_flows();
            StatusResponse::new(Status::Okay, "")
        }
        Ok(None) => StatusResponse::new(Status::UnknownSwitchId, ""),
        Err(e) => StatusResponse::new(Status::QueryFailed, &e.to_string()),
    }
}
