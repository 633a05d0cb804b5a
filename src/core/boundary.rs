//! Boundary enforcement at hand-off points.
//!
//! Every payload crossing a trust boundary goes through `validate_outbound`
//! on the sending side and `validate_inbound` on the receiving side. A
//! rejected payload yields a `BoundaryEnforcementError` that carries the full
//! violation list as a `BoundaryFailureEvent`; the same event is logged and,
//! when a sink is configured, appended to the events log.
//!
//! Validation is deterministic, so nothing here retries.

use crate::core::contracts::Contract;
use crate::core::error::ContractGateError;
use crate::core::output;
use crate::core::schemas::ContractKind;
use crate::core::time;
use crate::core::trace::{self, EventSink};
use crate::core::validate::{self, ROOT_POINTER, ValidationViolation, ViolationCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

pub const BOUNDARY_REJECTED_EVENT: &str = "boundary.rejected";
const PAYLOAD_EXCERPT_CHARS: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Outbound,
    Inbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Outbound => f.write_str("outbound"),
            Direction::Inbound => f.write_str("inbound"),
        }
    }
}

/// Structured record of one rejected hand-off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundaryFailureEvent {
    pub event: String,
    pub event_id: String,
    pub ts: String,
    pub direction: Direction,
    pub contract: String,
    pub violation_count: usize,
    pub violations: Vec<ValidationViolation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_excerpt: Option<String>,
}

#[derive(Debug, Clone, Error)]
pub struct BoundaryEnforcementError {
    pub event: BoundaryFailureEvent,
}

impl fmt::Display for BoundaryEnforcementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} payload rejected at boundary: {} violation(s)",
            self.event.direction, self.event.contract, self.event.violation_count
        )
    }
}

impl BoundaryEnforcementError {
    pub fn violations(&self) -> &[ValidationViolation] {
        &self.event.violations
    }

    pub fn direction(&self) -> Direction {
        self.event.direction
    }

    pub fn contract(&self) -> &str {
        &self.event.contract
    }
}

#[derive(Debug, Clone, Default)]
pub struct BoundaryEnforcer {
    sink: Option<EventSink>,
}

impl BoundaryEnforcer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(sink: EventSink) -> Self {
        Self { sink: Some(sink) }
    }

    pub fn sink(&self) -> Option<&EventSink> {
        self.sink.as_ref()
    }

    pub fn validate_outbound(
        &self,
        contract_name: &str,
        payload: &Value,
    ) -> Result<(), BoundaryEnforcementError> {
        self.enforce(Direction::Outbound, contract_name, payload)
    }

    pub fn validate_inbound(
        &self,
        contract_name: &str,
        payload: &Value,
    ) -> Result<(), BoundaryEnforcementError> {
        self.enforce(Direction::Inbound, contract_name, payload)
    }

    /// Serialize and guard a contract on its way out.
    pub fn send<C: Contract>(&self, contract: &C) -> Result<Value, ContractGateError> {
        let payload = contract.to_payload()?;
        self.validate_outbound(C::KIND.name(), &payload)?;
        Ok(payload)
    }

    /// Guard and deserialize a payload on its way in.
    pub fn receive<C: Contract>(&self, payload: Value) -> Result<C, ContractGateError> {
        self.validate_inbound(C::KIND.name(), &payload)?;
        Ok(serde_json::from_value(payload)?)
    }

    fn enforce(
        &self,
        direction: Direction,
        contract_name: &str,
        payload: &Value,
    ) -> Result<(), BoundaryEnforcementError> {
        let (contract, violations) = match ContractKind::from_name(contract_name) {
            Ok(kind) => (kind.name().to_string(), validate::validate(kind, payload)),
            Err(_) => (
                contract_name.to_string(),
                vec![ValidationViolation {
                    error_code: ViolationCode::UnknownContract,
                    json_pointer: ROOT_POINTER.to_string(),
                    message: format!("`{}` is not a registered contract", contract_name),
                    next_action: format!(
                        "send one of: {}",
                        ContractKind::ALL
                            .iter()
                            .map(|k| k.name())
                            .collect::<Vec<_>>()
                            .join(", ")
                    ),
                }],
            ),
        };

        if violations.is_empty() {
            tracing::debug!(%direction, contract = %contract, "payload admitted at boundary");
            return Ok(());
        }

        let excerpt = serde_json::to_string(&trace::redact_payload(payload))
            .ok()
            .map(|s| output::compact_line(&s, PAYLOAD_EXCERPT_CHARS));
        let event = BoundaryFailureEvent {
            event: BOUNDARY_REJECTED_EVENT.to_string(),
            event_id: time::new_event_id(),
            ts: time::now_epoch_z(),
            direction,
            contract,
            violation_count: violations.len(),
            violations,
            payload_excerpt: excerpt,
        };

        tracing::warn!(
            target: "contract_gate::boundary",
            event_id = %event.event_id,
            %direction,
            contract = %event.contract,
            violations = event.violation_count,
            first = %event.violations[0].headline(),
            "payload rejected at boundary"
        );

        if let Some(sink) = &self.sink {
            if let Err(e) = sink.append(&event) {
                tracing::error!(
                    path = %sink.path().display(),
                    error = %e,
                    "failed to append boundary event"
                );
            }
        }

        Err(BoundaryEnforcementError { event })
    }
}

pub fn validate_outbound(
    contract_name: &str,
    payload: &Value,
) -> Result<(), BoundaryEnforcementError> {
    BoundaryEnforcer::new().validate_outbound(contract_name, payload)
}

pub fn validate_inbound(
    contract_name: &str,
    payload: &Value,
) -> Result<(), BoundaryEnforcementError> {
    BoundaryEnforcer::new().validate_inbound(contract_name, payload)
}
