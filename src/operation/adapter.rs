//! The Operation Adapter: implements the unified data-model operations by
//! issuing synchronous request/response round-trips to the owning Service
//! (§4.4).

use std::collections::HashMap;
use std::time::Instant;

use chrono::Utc;

use crate::config::BrokerConfig;
use crate::error::{BrokerError, ParamError};
use crate::ids::GroupId;
use crate::message::{
    AddRequest, AddResponse, CreateParam, DeleteRequest, DeleteResponse, GetInstancesRequest,
    GetInstancesResponse, GetRequest, GetResponse, GetResult, GetSupportedDmRequest,
    GetSupportedDmResponse, OperateOutcome, OperateRequest, OperateResponse, SetParam, SetRequest,
    SetResponse, UspMessage, UspRequest, UspResponse,
};
use crate::monitoring::{Monitor, OperationEvent, OperationEventKind};
use crate::registry::{ReqEntry, ServiceRegistry};
use crate::transport::{ExpectedResponseKind, Mtp};

/// Implements Get/Set/Add/Delete/Operate/GetInstances/Subscribe/Unsubscribe
/// by issuing round-trips through an [`Mtp`] to the Service that owns a
/// given group id.
pub struct OperationAdapter<T, Mon> {
    transport: T,
    monitor: Mon,
    config: BrokerConfig,
}

impl<T, Mon> OperationAdapter<T, Mon>
where
    T: Mtp,
    Mon: Monitor<OperationEvent>,
{
    pub fn new(transport: T, monitor: Mon, config: BrokerConfig) -> Self {
        Self {
            transport,
            monitor,
            config,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn round_trip(
        &self,
        registry: &ServiceRegistry<T::Handle>,
        group: GroupId,
        request: UspRequest,
        expected: ExpectedResponseKind,
        msg_id: crate::ids::MessageId,
    ) -> Result<UspResponse, BrokerError> {
        let record = registry
            .find_by_group(group)
            .ok_or_else(|| BrokerError::internal(format!("no Service owns group {group}")))?;
        let handle = record
            .controller_handle
            .clone()
            .ok_or_else(|| BrokerError::internal("Service's controller-side transport is absent"))?;

        let operation = request.kind_name().to_string();
        let _ = self
            .monitor
            .record(OperationEvent {
                timestamp: Utc::now(),
                endpoint: record.endpoint.clone(),
                event_kind: OperationEventKind::RoundTripStarted {
                    operation: operation.clone(),
                },
                metadata: HashMap::new(),
            })
            .await;

        let message = UspMessage::request(msg_id, request);
        let started = Instant::now();
        let result = self
            .transport
            .send_request_and_await_typed_response(
                &record.endpoint,
                message,
                &handle,
                expected,
                self.config.response_timeout,
            )
            .await;

        match result {
            Ok(response_message) => {
                let _ = self
                    .monitor
                    .record(OperationEvent {
                        timestamp: Utc::now(),
                        endpoint: record.endpoint.clone(),
                        event_kind: OperationEventKind::RoundTripCompleted {
                            operation,
                            duration_micros: started.elapsed().as_micros() as u64,
                        },
                        metadata: HashMap::new(),
                    })
                    .await;
                response_message
                    .as_response()
                    .cloned()
                    .ok_or_else(|| BrokerError::internal("expected a response body"))
            }
            Err(_timeout_or_transport_error) => {
                let _ = self
                    .monitor
                    .record(OperationEvent {
                        timestamp: Utc::now(),
                        endpoint: record.endpoint.clone(),
                        event_kind: OperationEventKind::RoundTripTimedOut { operation },
                        metadata: HashMap::new(),
                    })
                    .await;
                Err(BrokerError::internal(
                    "round-trip timed out with no retry (§4.4, §5)",
                ))
            }
        }
    }

    /// Get: `max_depth=0`, missing/error entries are reported inline rather
    /// than failing the batch (§4.4 Get row).
    pub async fn get(
        &self,
        registry: &ServiceRegistry<T::Handle>,
        group: GroupId,
        msg_id: crate::ids::MessageId,
        paths: Vec<String>,
    ) -> Result<Vec<GetResult>, BrokerError> {
        let request = UspRequest::Get(GetRequest {
            paths,
            max_depth: 0,
        });
        let response = self
            .round_trip(registry, group, request, ExpectedResponseKind::GetResp, msg_id)
            .await?;
        match response {
            UspResponse::GetResp(GetResponse { results }) => Ok(results),
            UspResponse::Error(e) => Err(BrokerError::command_failure(e.code, e.message)),
            _ => Err(BrokerError::internal("Service returned the wrong response kind for Get")),
        }
    }

    /// Set: `allow_partial=false`; on param error the first failing index
    /// is reported, nothing else (§4.4 Set row).
    pub async fn set(
        &self,
        registry: &ServiceRegistry<T::Handle>,
        group: GroupId,
        msg_id: crate::ids::MessageId,
        params: Vec<SetParam>,
    ) -> Result<Option<usize>, BrokerError> {
        let request = UspRequest::Set(SetRequest {
            params,
            allow_partial: false,
        });
        let response = self
            .round_trip(registry, group, request, ExpectedResponseKind::SetResp, msg_id)
            .await?;
        match response {
            UspResponse::SetResp(SetResponse { first_failure_index }) => Ok(first_failure_index),
            UspResponse::Error(e) => Err(BrokerError::command_failure(e.code, e.message)),
            _ => Err(BrokerError::internal("Service returned the wrong response kind for Set")),
        }
    }

    /// Add (no child params) or CreateObject (child params with `required`
    /// flags); the decoding rule is identical except for per-parameter error
    /// propagation, which the caller handles from `AddResponse::created`
    /// (§4.4 Add/CreateObject rows).
    pub async fn add(
        &self,
        registry: &ServiceRegistry<T::Handle>,
        group: GroupId,
        msg_id: crate::ids::MessageId,
        object_path: String,
        params: Vec<CreateParam>,
    ) -> Result<AddResponse, BrokerError> {
        let request = UspRequest::Add(AddRequest { object_path: object_path.clone(), params });
        let response = self
            .round_trip(registry, group, request, ExpectedResponseKind::AddResp, msg_id)
            .await?;
        match response {
            UspResponse::AddResp(resp) => {
                if !resp.created.instantiated_path.starts_with(&object_path) {
                    return Err(BrokerError::internal(format!(
                        "Service created {} but was asked to create under {object_path}",
                        resp.created.instantiated_path
                    )));
                }
                Ok(resp)
            }
            UspResponse::Error(e) => Err(BrokerError::command_failure(e.code, e.message)),
            _ => Err(BrokerError::internal("Service returned the wrong response kind for Add")),
        }
    }

    /// Delete/MultiDelete: exactly N deleted-object results expected, one
    /// per requested path (§4.4 Delete row).
    pub async fn delete(
        &self,
        registry: &ServiceRegistry<T::Handle>,
        group: GroupId,
        msg_id: crate::ids::MessageId,
        object_paths: Vec<String>,
        allow_partial: bool,
    ) -> Result<DeleteResponse, BrokerError> {
        let requested = object_paths.len();
        let request = UspRequest::Delete(DeleteRequest { object_paths, allow_partial });
        let response = self
            .round_trip(registry, group, request, ExpectedResponseKind::DeleteResp, msg_id)
            .await?;
        match response {
            UspResponse::DeleteResp(resp) => {
                if resp.results.len() != requested {
                    return Err(BrokerError::internal(
                        "Service returned a different number of delete results than requested (§7(iv))",
                    ));
                }
                Ok(resp)
            }
            UspResponse::Error(e) => Err(BrokerError::command_failure(e.code, e.message)),
            _ => Err(BrokerError::internal("Service returned the wrong response kind for Delete")),
        }
    }

    /// Synchronous Operate (`send_resp=true`): a request-object-path
    /// response is a protocol violation in this mode (§4.4 Operate sync row).
    pub async fn operate_sync(
        &self,
        registry: &ServiceRegistry<T::Handle>,
        group: GroupId,
        msg_id: crate::ids::MessageId,
        command_path: String,
        command_key: String,
        input_args: Vec<SetParam>,
    ) -> Result<OperateResponse, BrokerError> {
        let request = UspRequest::Operate(OperateRequest {
            command_path: command_path.clone(),
            command_key,
            input_args,
            send_resp: true,
        });
        let response = self
            .round_trip(registry, group, request, ExpectedResponseKind::OperateResp, msg_id)
            .await?;
        match response {
            UspResponse::OperateResp(resp) => {
                if resp.executed_command != command_path {
                    return Err(BrokerError::internal(
                        "Operate response names a different command than requested",
                    ));
                }
                if matches!(resp.outcome, OperateOutcome::RequestObjectPath { .. }) {
                    return Err(BrokerError::internal(
                        "synchronous Operate received a request-object-path response (protocol violation)",
                    ));
                }
                Ok(resp)
            }
            UspResponse::Error(e) => Err(BrokerError::command_failure(e.code, e.message)),
            _ => Err(BrokerError::internal("Service returned the wrong response kind for Operate")),
        }
    }

    /// Asynchronous Operate (`send_resp=false`). The ReqMap entry must
    /// already have been inserted by the caller *before* this call, so a
    /// malformed Service racing its OperationComplete ahead of the
    /// OperateResponse still correlates (§4.4 "Async Operate success path").
    /// Returns `true` if the response indicated immediate completion
    /// (output args arrived in the reply itself) rather than the ordinary
    /// request-object-path acknowledgment.
    pub async fn operate_async(
        &self,
        registry: &ServiceRegistry<T::Handle>,
        group: GroupId,
        msg_id: crate::ids::MessageId,
        command_path: String,
        command_key: String,
        input_args: Vec<SetParam>,
    ) -> Result<OperateResponse, BrokerError> {
        let request = UspRequest::Operate(OperateRequest {
            command_path: command_path.clone(),
            command_key,
            input_args,
            send_resp: false,
        });
        let response = self
            .round_trip(registry, group, request, ExpectedResponseKind::OperateResp, msg_id)
            .await?;
        match response {
            UspResponse::OperateResp(resp) => Ok(resp),
            UspResponse::Error(e) => Err(BrokerError::command_failure(e.code, e.message)),
            _ => Err(BrokerError::internal("Service returned the wrong response kind for Operate")),
        }
    }

    /// GetInstances: seeds the instance cache with an expiry of "current
    /// message only" (§4.4 GetInstances row, §6).
    pub async fn get_instances(
        &self,
        registry: &ServiceRegistry<T::Handle>,
        group: GroupId,
        msg_id: crate::ids::MessageId,
        object_paths: Vec<String>,
    ) -> Result<Vec<String>, BrokerError> {
        let request = UspRequest::GetInstances(GetInstancesRequest {
            object_paths,
            first_level_only: false,
        });
        let response = self
            .round_trip(
                registry,
                group,
                request,
                ExpectedResponseKind::GetInstancesResp,
                msg_id,
            )
            .await?;
        match response {
            UspResponse::GetInstancesResp(GetInstancesResponse { instantiated_paths }) => {
                Ok(instantiated_paths)
            }
            UspResponse::Error(e) => Err(BrokerError::command_failure(e.code, e.message)),
            _ => Err(BrokerError::internal(
                "Service returned the wrong response kind for GetInstances",
            )),
        }
    }

    /// GetSupportedDM: requests commands, events, and params in full
    /// (§4.2, §4.4 GetSupportedDM row).
    pub async fn get_supported_dm(
        &self,
        registry: &ServiceRegistry<T::Handle>,
        group: GroupId,
        msg_id: crate::ids::MessageId,
        prefixes: Vec<String>,
    ) -> Result<GetSupportedDmResponse, BrokerError> {
        let request = UspRequest::GetSupportedDm(GetSupportedDmRequest {
            prefixes,
            return_commands: true,
            return_events: true,
            return_params: true,
        });
        let response = self
            .round_trip(
                registry,
                group,
                request,
                ExpectedResponseKind::GetSupportedDmResp,
                msg_id,
            )
            .await?;
        match response {
            UspResponse::GetSupportedDmResp(resp) => Ok(resp),
            UspResponse::Error(e) => Err(BrokerError::command_failure(e.code, e.message)),
            _ => Err(BrokerError::internal(
                "Service returned the wrong response kind for GetSupportedDM",
            )),
        }
    }

    /// Subscribe: an Add on `Device.LocalAgent.Subscription.` with the field
    /// set §4.4 specifies; success is reported to the caller, who records
    /// the SubsMap entry (§4.4 Subscribe row).
    pub async fn subscribe(
        &self,
        registry: &ServiceRegistry<T::Handle>,
        group: GroupId,
        msg_id: crate::ids::MessageId,
        notif_type: &str,
        reference_path: &str,
        broker_subscription_id: &str,
    ) -> Result<AddResponse, BrokerError> {
        let params = vec![
            CreateParam { name: "NotifType".to_string(), value: notif_type.to_string(), required: true },
            CreateParam { name: "ReferenceList".to_string(), value: reference_path.to_string(), required: true },
            CreateParam { name: "ID".to_string(), value: broker_subscription_id.to_string(), required: true },
            CreateParam { name: "Persistent".to_string(), value: "false".to_string(), required: true },
            CreateParam { name: "TimeToLive".to_string(), value: "0".to_string(), required: true },
            CreateParam { name: "NotifRetry".to_string(), value: "false".to_string(), required: true },
            CreateParam { name: "NotifExpiration".to_string(), value: "0".to_string(), required: true },
            CreateParam { name: "Enable".to_string(), value: "true".to_string(), required: true },
        ];
        self.add(
            registry,
            group,
            msg_id,
            "Device.LocalAgent.Subscription.".to_string(),
            params,
        )
        .await
    }

    /// Unsubscribe: a Delete of `Device.LocalAgent.Subscription.<instance>.`
    /// (§4.4 Unsubscribe row).
    pub async fn unsubscribe(
        &self,
        registry: &ServiceRegistry<T::Handle>,
        group: GroupId,
        msg_id: crate::ids::MessageId,
        service_subscription_instance: u32,
    ) -> Result<DeleteResponse, BrokerError> {
        let path = format!(
            "Device.LocalAgent.Subscription.{service_subscription_instance}."
        );
        self.delete(registry, group, msg_id, vec![path], false).await
    }
}

/// Builds the ReqMap entry an async Operate invocation must insert *before*
/// sending its request (§4.4 "Async Operate success path").
pub fn pending_req_entry(
    broker_request_instance: u32,
    command_path: impl Into<String>,
    command_key: impl Into<String>,
) -> ReqEntry {
    ReqEntry {
        broker_request_instance,
        command_path: command_path.into(),
        command_key: command_key.into(),
    }
}

/// Translates a per-path Get failure into the inline `ParamError` shape
/// responses carry instead of a top-level error (§7 "Per-parameter errors").
pub fn get_result_to_param_error(path: &str, result: &GetResult) -> Option<ParamError> {
    match result {
        GetResult::Error(e) => Some(e.clone()),
        GetResult::Value { .. } => {
            let _ = path;
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{EndpointId, MessageId, ServiceInstance};
    use crate::message::{GetResponse, SupportedObject};
    use crate::monitoring::NoopMonitor;
    use crate::registry::TransportRole;
    use crate::transport::FakeMtp;

    async fn registry_with_one_service() -> (ServiceRegistry<u64>, GroupId) {
        let mut registry = ServiceRegistry::new(4);
        let record = registry
            .add(EndpointId::new("svc-1"), 1u64, TransportRole::Both)
            .unwrap();
        let group = record.group;
        let _ = ServiceInstance::new(1);
        (registry, group)
    }

    #[tokio::test]
    async fn get_decodes_response_into_results() {
        let (registry, group) = registry_with_one_service().await;
        let mtp = FakeMtp::new();
        let adapter = OperationAdapter::new(mtp.clone(), NoopMonitor::<OperationEvent>::new(), BrokerConfig::default());

        let mtp_clone = mtp.clone();
        let handle = tokio::spawn(async move {
            adapter
                .get(&registry, group, MessageId::from_parts(1, 1), vec!["Device.X.Y".to_string()])
                .await
        });

        tokio::task::yield_now().await;
        let outbound = mtp_clone.drain_outbound();
        assert_eq!(outbound.len(), 1);
        let msg_id = outbound[0].1.msg_id.clone();

        let response = UspMessage::response(
            msg_id.clone(),
            UspResponse::GetResp(GetResponse {
                results: vec![GetResult::Value {
                    resolved_path: "Device.X.Y".to_string(),
                    value: "42".to_string(),
                }],
            }),
        );
        mtp_clone.deliver_response(msg_id.as_str(), response);

        let results = handle.await.unwrap().unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn round_trip_times_out_when_no_response_arrives() {
        let (registry, group) = registry_with_one_service().await;
        let mtp = FakeMtp::new();
        let mut config = BrokerConfig::default();
        config.response_timeout = std::time::Duration::from_millis(20);
        let adapter = OperationAdapter::new(mtp, NoopMonitor::<OperationEvent>::new(), config);

        let result = adapter
            .get(&registry, group, MessageId::from_parts(1, 1), vec!["Device.X.Y".to_string()])
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn get_fails_fast_when_controller_handle_absent() {
        let mut registry: ServiceRegistry<u64> = ServiceRegistry::new(4);
        let record = registry
            .add(EndpointId::new("svc-1"), 1u64, TransportRole::AgentSide)
            .unwrap();
        let group = record.group;
        let mtp = FakeMtp::new();
        let adapter = OperationAdapter::new(mtp, NoopMonitor::<OperationEvent>::new(), BrokerConfig::default());

        let result = adapter
            .get(&registry, group, MessageId::from_parts(1, 1), vec!["Device.X.Y".to_string()])
            .await;
        assert!(matches!(result, Err(BrokerError::Internal { .. })));
    }

    #[test]
    fn supported_object_import_helper_is_exercised_elsewhere() {
        let _ = SupportedObject {
            path: "Device.X.".to_string(),
            is_multi_instance: false,
            writable: false,
            params: vec![],
            events: vec![],
            commands: vec![],
        };
    }
}
