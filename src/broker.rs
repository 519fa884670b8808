//! The top-level `Broker`: wires the Service Registry, the unified schema
//! tree, the Operation Adapter, and the three collaborator seams together
//! behind the single-threaded cooperative entry points §5 describes.
//!
//! Every public method here borrows `&mut self` (or `&self` where no
//! registry/schema mutation is needed) and runs to completion before
//! returning — there is no internal locking, matching §5's "single logical
//! thread of control" model. An embedder drives the Broker from its own
//! event loop, handing it one inbound message at a time.

use crate::config::BrokerConfig;
use crate::error::BrokerError;
use crate::ids::{EndpointId, GroupId, IdGenerator};
use crate::message::{
    DeregisterRequest, DeregisterResponse, RegisterRequest, RegisterResponse, UspMessage,
    UspMessageBody, UspRequest, UspResponse,
};
use crate::monitoring::{Monitor, OperationEvent, PassthroughEvent, PassthroughEventKind, RegistrationEvent, ServiceEvent};
use crate::operation::collaborators::{PermissionStore, RequestTable, SubscriptionTable};
use crate::operation::{self, passthrough};
use crate::operation::adapter::OperationAdapter;
use crate::registry::{DisconnectOutcome, ServiceRegistry, TransportRole, UspServiceRow};
use crate::schema::SchemaTree;
use crate::transport::Mtp;

/// Outcome of routing one inbound Controller-originated request (§4.7).
pub enum RoutingOutcome {
    /// Forwarded unchanged to the owning Service; no reply yet — it will
    /// arrive later and be matched by [`Broker::match_passthrough_response`].
    Forwarded(UspMessage),

    /// Handled locally by the Operation Adapter and/or the Lifecycle
    /// Manager; the reply is ready now.
    Answered(UspMessage),
}

/// The USP Broker core (§3 OVERVIEW).
///
/// Generic over the transport (`T`) and over one monitor type per event
/// family, matching [`crate::monitoring::Monitor`]'s non-dyn-compatible
/// `Clone` bound — a Broker that doesn't care about a given event family
/// can be instantiated with [`crate::monitoring::NoopMonitor`].
pub struct Broker<T, OpMon, RegMon, SvcMon, PtMon>
where
    T: Mtp,
    OpMon: Monitor<OperationEvent>,
    RegMon: Monitor<RegistrationEvent>,
    SvcMon: Monitor<ServiceEvent>,
    PtMon: Monitor<PassthroughEvent>,
{
    registry: ServiceRegistry<T::Handle>,
    schema: SchemaTree,
    adapter: OperationAdapter<T, OpMon>,
    id_gen: IdGenerator,
    config: BrokerConfig,

    /// Monotonic source for `broker_request_instance` values minted on
    /// async Operate, mirroring the Service Registry's own `next_instance`
    /// counter (§4.4 "Async Operate success path").
    next_request_instance: u32,

    subscription_table: Box<dyn SubscriptionTable>,
    request_table: Box<dyn RequestTable>,
    permission_store: Box<dyn PermissionStore>,

    registration_monitor: RegMon,
    service_monitor: SvcMon,
    passthrough_monitor: PtMon,
}

impl<T, OpMon, RegMon, SvcMon, PtMon> Broker<T, OpMon, RegMon, SvcMon, PtMon>
where
    T: Mtp,
    OpMon: Monitor<OperationEvent>,
    RegMon: Monitor<RegistrationEvent>,
    SvcMon: Monitor<ServiceEvent>,
    PtMon: Monitor<PassthroughEvent>,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        transport: T,
        config: BrokerConfig,
        operation_monitor: OpMon,
        registration_monitor: RegMon,
        service_monitor: SvcMon,
        passthrough_monitor: PtMon,
        subscription_table: Box<dyn SubscriptionTable>,
        request_table: Box<dyn RequestTable>,
        permission_store: Box<dyn PermissionStore>,
    ) -> Self {
        let registry = ServiceRegistry::new(config.max_services);
        let adapter = OperationAdapter::new(transport, operation_monitor, config.clone());
        Self {
            registry,
            schema: SchemaTree::new(),
            adapter,
            id_gen: IdGenerator::new(),
            config,
            next_request_instance: 1,
            subscription_table,
            request_table,
            permission_store,
            registration_monitor,
            service_monitor,
            passthrough_monitor,
        }
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// `Device.USPServices.` read model (§6).
    pub fn usp_services(&self) -> Vec<UspServiceRow> {
        crate::registry::usp_services_view::rows(&self.registry)
    }

    /// Brings a transport handle up for `endpoint` (§4.1).
    pub async fn connect(
        &mut self,
        endpoint: EndpointId,
        handle: T::Handle,
        role: TransportRole,
    ) -> Result<GroupId, BrokerError> {
        crate::lifecycle::connect(&mut self.registry, &self.service_monitor, endpoint, handle, role).await
    }

    /// Tears a transport handle down, running Failure Propagation first if
    /// it costs the Service its Broker-as-Controller side (§4.1, §4.8).
    pub async fn disconnect(
        &mut self,
        endpoint: &EndpointId,
        role: TransportRole,
    ) -> Option<DisconnectOutcome> {
        crate::lifecycle::disconnect(
            &mut self.registry,
            &mut self.schema,
            self.request_table.as_ref(),
            self.subscription_table.as_ref(),
            &self.service_monitor,
            endpoint,
            role,
        )
        .await
    }

    /// Processes a Register request (§4.2).
    pub async fn register(
        &mut self,
        endpoint: &EndpointId,
        request: RegisterRequest,
    ) -> Result<RegisterResponse, BrokerError> {
        crate::lifecycle::register(
            &self.adapter,
            &mut self.registry,
            &mut self.schema,
            self.subscription_table.as_ref(),
            &self.registration_monitor,
            &self.id_gen,
            endpoint,
            request,
        )
        .await
    }

    /// Processes a Deregister request (§4.2).
    pub async fn deregister(
        &mut self,
        endpoint: &EndpointId,
        request: DeregisterRequest,
    ) -> Result<DeregisterResponse, BrokerError> {
        crate::lifecycle::deregister(
            &mut self.registry,
            &mut self.schema,
            self.request_table.as_ref(),
            &self.registration_monitor,
            endpoint,
            request,
        )
        .await
    }

    /// Routes one inbound Controller-originated request: the Passthrough
    /// Router gets first refusal (§4.7), and only on decline do Register,
    /// Deregister, or a direct Operation Adapter round-trip take over.
    pub async fn route_request(
        &mut self,
        originator_endpoint: EndpointId,
        originator_handle: T::Handle,
        message: UspMessage,
    ) -> Result<RoutingOutcome, BrokerError> {
        let Some(request) = message.as_request().cloned() else {
            return Err(BrokerError::message_not_understood(
                "expected a request body",
            ));
        };

        match passthrough::check_eligibility(
            &request,
            &self.schema,
            originator_endpoint.as_str(),
            self.permission_store.as_ref(),
            self.config.passthrough_recursive_depth,
        ) {
            Ok(group) => {
                if let Some(forwarded) = passthrough::forward(
                    &mut self.registry,
                    group,
                    &self.id_gen,
                    &message,
                    originator_endpoint.clone(),
                    originator_handle,
                ) {
                    let _ = self
                        .passthrough_monitor
                        .record(PassthroughEvent {
                            timestamp: chrono::Utc::now(),
                            endpoint: originator_endpoint,
                            event_kind: PassthroughEventKind::Accepted {
                                broker_msg_id: forwarded.msg_id.as_str().to_string(),
                            },
                            metadata: std::collections::HashMap::new(),
                        })
                        .await;
                    return Ok(RoutingOutcome::Forwarded(forwarded));
                }
                // Resolved to a group with no live record (race with
                // teardown); fall through to the normal handler below,
                // which will fail the request on its own terms.
            }
            Err(decline) => {
                let _ = self
                    .passthrough_monitor
                    .record(PassthroughEvent {
                        timestamp: chrono::Utc::now(),
                        endpoint: originator_endpoint.clone(),
                        event_kind: PassthroughEventKind::Declined {
                            reason: format!("{decline:?}"),
                        },
                        metadata: std::collections::HashMap::new(),
                    })
                    .await;
            }
        }

        self.handle_locally(&originator_endpoint, request)
            .await
            .map(|response| {
                RoutingOutcome::Answered(UspMessage::response(message.msg_id, response))
            })
    }

    /// Services every request kind that isn't handled by passthrough:
    /// Register/Deregister go through the Lifecycle Manager; everything
    /// else resolves its owning group and round-trips through the
    /// Operation Adapter directly (§4.4).
    async fn handle_locally(
        &mut self,
        originator: &EndpointId,
        request: UspRequest,
    ) -> Result<UspResponse, BrokerError> {
        match request {
            UspRequest::Register(req) => {
                let resp = self.register(originator, req).await?;
                Ok(UspResponse::RegisterResp(resp))
            }
            UspRequest::Deregister(req) => {
                let resp = self.deregister(originator, req).await?;
                Ok(UspResponse::DeregisterResp(resp))
            }
            other => {
                let path = first_touched_path(&other)
                    .ok_or_else(|| BrokerError::message_not_understood("request names no path"))?;
                let group = self
                    .schema
                    .resolve_owning_object(&path)
                    .map(|node| node.group)
                    .ok_or_else(|| BrokerError::message_not_understood(format!("{path} does not resolve")))?;
                self.dispatch_to_adapter(group, other).await
            }
        }
    }

    async fn dispatch_to_adapter(
        &mut self,
        group: GroupId,
        request: UspRequest,
    ) -> Result<UspResponse, BrokerError> {
        let msg_id = self.id_gen.next_message_id();
        match request {
            UspRequest::Get(req) => {
                let results = self.adapter.get(&self.registry, group, msg_id, req.paths).await?;
                Ok(UspResponse::GetResp(crate::message::GetResponse { results }))
            }
            UspRequest::Set(req) => {
                let first_failure_index = self.adapter.set(&self.registry, group, msg_id, req.params).await?;
                Ok(UspResponse::SetResp(crate::message::SetResponse { first_failure_index }))
            }
            UspRequest::Add(req) => {
                let resp = self
                    .adapter
                    .add(&self.registry, group, msg_id, req.object_path, req.params)
                    .await?;
                Ok(UspResponse::AddResp(resp))
            }
            UspRequest::Delete(req) => {
                let resp = self
                    .adapter
                    .delete(&self.registry, group, msg_id, req.object_paths, req.allow_partial)
                    .await?;
                Ok(UspResponse::DeleteResp(resp))
            }
            UspRequest::Operate(req) => {
                if req.send_resp {
                    let resp = self
                        .adapter
                        .operate_sync(&self.registry, group, msg_id, req.command_path, req.command_key, req.input_args)
                        .await?;
                    Ok(UspResponse::OperateResp(resp))
                } else {
                    self.start_async_operate(group, msg_id, req).await
                }
            }
            UspRequest::GetInstances(req) => {
                let instantiated_paths = self
                    .adapter
                    .get_instances(&self.registry, group, msg_id, req.object_paths)
                    .await?;
                Ok(UspResponse::GetInstancesResp(crate::message::GetInstancesResponse {
                    instantiated_paths,
                }))
            }
            UspRequest::GetSupportedDm(req) => {
                let resp = self
                    .adapter
                    .get_supported_dm(&self.registry, group, msg_id, req.prefixes)
                    .await?;
                Ok(UspResponse::GetSupportedDmResp(resp))
            }
            UspRequest::Register(_) | UspRequest::Deregister(_) => unreachable!(
                "Register/Deregister are routed through the Lifecycle Manager, not here"
            ),
        }
    }

    /// Async Operate's ReqMap entry must exist before the request is sent,
    /// so a Service racing its OperationComplete ahead of the OperateResponse
    /// still correlates (§4.4 "Async Operate success path").
    async fn start_async_operate(
        &mut self,
        group: GroupId,
        msg_id: crate::ids::MessageId,
        req: crate::message::OperateRequest,
    ) -> Result<UspResponse, BrokerError> {
        if !self
            .subscription_table
            .has_operation_complete_subscription(&req.command_path)
        {
            return Err(BrokerError::request_denied(
                "async Operate requires an enabled OperationComplete subscription covering this command (§4.4)",
            ));
        }

        let broker_request_instance = self.next_request_instance;
        self.next_request_instance += 1;
        let record = self
            .registry
            .find_by_group_mut(group)
            .ok_or_else(|| BrokerError::internal(format!("no Service owns group {group}")))?;
        record.req_map.try_insert(crate::operation::adapter::pending_req_entry(
            broker_request_instance,
            req.command_path.clone(),
            req.command_key.clone(),
        ));
        self.request_table.mark_active(broker_request_instance);

        let resp = self
            .adapter
            .operate_async(&self.registry, group, msg_id, req.command_path, req.command_key, req.input_args)
            .await?;
        Ok(UspResponse::OperateResp(resp))
    }

    /// Matches a Service's wire response against its MsgMap (§4.7 response
    /// matching).
    pub async fn match_passthrough_response(
        &mut self,
        group: GroupId,
        response: UspMessage,
    ) -> Option<passthrough::MatchedResponse<T::Handle>> {
        let matched = passthrough::match_response(&mut self.registry, group, response.clone());
        let endpoint = self
            .registry
            .find_by_group(group)
            .map(|r| r.endpoint.clone())
            .unwrap_or_else(|| EndpointId::new("unknown"));
        match &matched {
            Some(_) => {
                let _ = self
                    .passthrough_monitor
                    .record(PassthroughEvent {
                        timestamp: chrono::Utc::now(),
                        endpoint,
                        event_kind: PassthroughEventKind::ResponseMatched {
                            broker_msg_id: response.msg_id.as_str().to_string(),
                        },
                        metadata: std::collections::HashMap::new(),
                    })
                    .await;
            }
            None => {
                let _ = self
                    .passthrough_monitor
                    .record(PassthroughEvent {
                        timestamp: chrono::Utc::now(),
                        endpoint,
                        event_kind: PassthroughEventKind::ResponseUnmatched {
                            msg_id: response.msg_id.as_str().to_string(),
                        },
                        metadata: std::collections::HashMap::new(),
                    })
                    .await;
            }
        }
        matched
    }

    /// Whether an incoming NOTIFY from `group` qualifies for notification
    /// passthrough rather than the Notification Router (§4.6, §4.7).
    pub fn notify_eligible_for_passthrough(&self, group: GroupId, body: &UspMessageBody) -> bool {
        passthrough::notify_eligible_for_passthrough(&self.registry, group, body)
    }

    /// Validates and routes one incoming NOTIFY through the Notification
    /// Router (§4.6).
    pub fn route_notification(
        &mut self,
        originator: &EndpointId,
        subscription_id: &str,
        send_resp: bool,
        notify: &crate::message::Notify,
    ) -> Result<operation::NotificationOutcome, BrokerError> {
        operation::route_notification(
            &mut self.registry,
            self.request_table.as_ref(),
            originator,
            subscription_id,
            send_resp,
            notify,
        )
    }
}

/// The first path a request touches, used to resolve the owning group for
/// non-passthrough-eligible kinds that still target exactly one Service
/// (Operate, GetInstances, GetSupportedDM).
fn first_touched_path(request: &UspRequest) -> Option<String> {
    match request {
        UspRequest::Get(r) => r.paths.first().cloned(),
        UspRequest::Set(r) => r.params.first().map(|p| p.path.clone()),
        UspRequest::Add(r) => Some(r.object_path.clone()),
        UspRequest::Delete(r) => r.object_paths.first().cloned(),
        UspRequest::Operate(r) => Some(r.command_path.clone()),
        UspRequest::GetInstances(r) => r.object_paths.first().cloned(),
        UspRequest::GetSupportedDm(r) => r.prefixes.first().cloned(),
        UspRequest::Register(_) | UspRequest::Deregister(_) => None,
    }
}
