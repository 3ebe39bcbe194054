use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{
    Aggregate, AggregateRoot, DomainError, OrderId, SubjectId, TenantId, TokenId,
};
use storefront_storage::StorageReference;

use crate::status::{Fulfillment, ItemType, OrderStatus};
use crate::token::AccessToken;

/// Link between an order and its digital solution.
///
/// Either fully enabled (`reference` and `token_id` set) or fully cleared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolutionLink {
    pub is_enabled: bool,
    pub reference: Option<StorageReference>,
    pub token_id: Option<TokenId>,
}

/// Aggregate root: Order.
///
/// Persisted as a whole document; `version` is the compare-and-swap token, so
/// a status flip and the token grant/revoke that caused it land together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    id: OrderId,
    tenant_id: Option<TenantId>,
    purchaser_id: Option<SubjectId>,
    item_type: ItemType,
    item_ref: String,
    status: OrderStatus,
    /// Status to return to when the solution of a physical order is disabled.
    status_before_solution: Option<OrderStatus>,
    solution: SolutionLink,
    tokens: Vec<AccessToken>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    deleted_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Order {
    /// Create an empty, not-yet-placed aggregate instance.
    pub fn empty(id: OrderId) -> Self {
        Self {
            id,
            tenant_id: None,
            purchaser_id: None,
            item_type: ItemType::Product,
            item_ref: String::new(),
            status: OrderStatus::Pending,
            status_before_solution: None,
            solution: SolutionLink::default(),
            tokens: Vec::new(),
            created_at: None,
            updated_at: None,
            deleted_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn purchaser_id(&self) -> Option<SubjectId> {
        self.purchaser_id
    }

    pub fn is_purchaser(&self, subject: SubjectId) -> bool {
        self.purchaser_id == Some(subject)
    }

    pub fn item_type(&self) -> ItemType {
        self.item_type
    }

    pub fn item_ref(&self) -> &str {
        &self.item_ref
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn solution(&self) -> &SolutionLink {
        &self.solution
    }

    /// Every token ever issued for this order, oldest first.
    pub fn tokens(&self) -> &[AccessToken] {
        &self.tokens
    }

    pub fn token(&self, token_id: TokenId) -> Option<&AccessToken> {
        self.tokens.iter().find(|t| t.token_id == token_id)
    }

    pub fn live_token(&self) -> Option<&AccessToken> {
        self.tokens.iter().find(|t| t.is_live())
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn is_placed(&self) -> bool {
        self.created
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// While the solution is enabled, status belongs to the solution link.
    pub fn is_status_machine_owned(&self) -> bool {
        self.solution.is_enabled
    }

    /// Check the solution/status/token invariants on the current state.
    pub fn check_invariants(&self) -> Result<(), DomainError> {
        let live: Vec<_> = self.tokens.iter().filter(|t| t.is_live()).collect();
        if live.len() > 1 {
            return Err(DomainError::invariant("more than one live access token"));
        }
        if self.solution.is_enabled {
            if self.status != OrderStatus::Delivered {
                return Err(DomainError::invariant("enabled solution on undelivered order"));
            }
            if self.solution.reference.is_none() {
                return Err(DomainError::invariant("enabled solution without reference"));
            }
            match (self.solution.token_id, live.first()) {
                (Some(id), Some(t)) if t.token_id == id => {}
                _ => return Err(DomainError::invariant("enabled solution without its live token")),
            }
        } else {
            if !live.is_empty() || self.solution.token_id.is_some() {
                return Err(DomainError::invariant("live token on disabled solution"));
            }
            if self.item_type.fulfillment() == Fulfillment::Digital
                && self.status == OrderStatus::Delivered
            {
                return Err(DomainError::invariant("digital order delivered without solution"));
            }
        }
        Ok(())
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: PlaceOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub purchaser_id: SubjectId,
    pub item_type: ItemType,
    pub item_ref: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetStatus (operator edit).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetStatus {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Command: EnableSolution. Grants a fresh token; any live one is revoked first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnableSolution {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub reference: StorageReference,
    pub token_id: TokenId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DisableSolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisableSolution {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeleteOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOrder {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderCommand {
    PlaceOrder(PlaceOrder),
    SetStatus(SetStatus),
    EnableSolution(EnableSolution),
    DisableSolution(DisableSolution),
    DeleteOrder(DeleteOrder),
}

impl OrderCommand {
    pub fn tenant_id(&self) -> TenantId {
        match self {
            OrderCommand::PlaceOrder(c) => c.tenant_id,
            OrderCommand::SetStatus(c) => c.tenant_id,
            OrderCommand::EnableSolution(c) => c.tenant_id,
            OrderCommand::DisableSolution(c) => c.tenant_id,
            OrderCommand::DeleteOrder(c) => c.tenant_id,
        }
    }

    pub fn order_id(&self) -> OrderId {
        match self {
            OrderCommand::PlaceOrder(c) => c.order_id,
            OrderCommand::SetStatus(c) => c.order_id,
            OrderCommand::EnableSolution(c) => c.order_id,
            OrderCommand::DisableSolution(c) => c.order_id,
            OrderCommand::DeleteOrder(c) => c.order_id,
        }
    }
}

/// Event: OrderPlaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub purchaser_id: SubjectId,
    pub item_type: ItemType,
    pub item_ref: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StatusChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChanged {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AccessTokenRevoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenRevoked {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub token_id: TokenId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SolutionEnabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolutionEnabled {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub reference: StorageReference,
    pub token_id: TokenId,
    pub subject_id: SubjectId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SolutionDisabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolutionDisabled {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub restored_status: OrderStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderDeleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDeleted {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEvent {
    OrderPlaced(OrderPlaced),
    StatusChanged(StatusChanged),
    AccessTokenRevoked(AccessTokenRevoked),
    SolutionEnabled(SolutionEnabled),
    SolutionDisabled(SolutionDisabled),
    OrderDeleted(OrderDeleted),
}

impl OrderEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "orders.order.placed",
            OrderEvent::StatusChanged(_) => "orders.order.status_changed",
            OrderEvent::AccessTokenRevoked(_) => "orders.order.token_revoked",
            OrderEvent::SolutionEnabled(_) => "orders.order.solution_enabled",
            OrderEvent::SolutionDisabled(_) => "orders.order.solution_disabled",
            OrderEvent::OrderDeleted(_) => "orders.order.deleted",
        }
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::OrderPlaced(e) => e.occurred_at,
            OrderEvent::StatusChanged(e) => e.occurred_at,
            OrderEvent::AccessTokenRevoked(e) => e.occurred_at,
            OrderEvent::SolutionEnabled(e) => e.occurred_at,
            OrderEvent::SolutionDisabled(e) => e.occurred_at,
            OrderEvent::OrderDeleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Order {
    type Command = OrderCommand;
    type Event = OrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OrderEvent::OrderPlaced(e) => {
                self.id = e.order_id;
                self.tenant_id = Some(e.tenant_id);
                self.purchaser_id = Some(e.purchaser_id);
                self.item_type = e.item_type;
                self.item_ref = e.item_ref.clone();
                self.status = OrderStatus::Pending;
                self.created_at = Some(e.occurred_at);
                self.created = true;
            }
            OrderEvent::StatusChanged(e) => {
                self.status = e.to;
            }
            OrderEvent::AccessTokenRevoked(e) => {
                if let Some(t) = self.tokens.iter_mut().find(|t| t.token_id == e.token_id) {
                    t.revoke(e.occurred_at);
                }
            }
            OrderEvent::SolutionEnabled(e) => {
                if !self.solution.is_enabled {
                    self.status_before_solution = Some(self.status);
                }
                self.status = OrderStatus::Delivered;
                self.solution = SolutionLink {
                    is_enabled: true,
                    reference: Some(e.reference.clone()),
                    token_id: Some(e.token_id),
                };
                self.tokens.push(AccessToken::issue(
                    e.token_id,
                    e.order_id,
                    e.subject_id,
                    e.occurred_at,
                ));
            }
            OrderEvent::SolutionDisabled(e) => {
                self.solution = SolutionLink::default();
                self.status = e.restored_status;
                self.status_before_solution = None;
            }
            OrderEvent::OrderDeleted(e) => {
                self.deleted_at = Some(e.occurred_at);
            }
        }

        self.updated_at = Some(event.occurred_at());
        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::PlaceOrder(cmd) => self.handle_place(cmd),
            OrderCommand::SetStatus(cmd) => self.handle_set_status(cmd),
            OrderCommand::EnableSolution(cmd) => self.handle_enable(cmd),
            OrderCommand::DisableSolution(cmd) => self.handle_disable(cmd),
            OrderCommand::DeleteOrder(cmd) => self.handle_delete(cmd),
        }
    }
}

impl Order {
    fn ensure_live(&self, tenant_id: TenantId, order_id: OrderId) -> Result<(), DomainError> {
        if !self.created || self.is_deleted() {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != order_id {
            return Err(DomainError::invariant("order_id mismatch"));
        }
        Ok(())
    }

    fn revoke_live(&self, tenant_id: TenantId, at: DateTime<Utc>) -> Vec<OrderEvent> {
        self.tokens
            .iter()
            .filter(|t| t.is_live())
            .map(|t| {
                OrderEvent::AccessTokenRevoked(AccessTokenRevoked {
                    tenant_id,
                    order_id: self.id,
                    token_id: t.token_id,
                    occurred_at: at,
                })
            })
            .collect()
    }

    fn handle_place(&self, cmd: &PlaceOrder) -> Result<Vec<OrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("order already exists"));
        }
        if cmd.item_ref.trim().is_empty() {
            return Err(DomainError::validation("item_ref must not be empty"));
        }

        Ok(vec![OrderEvent::OrderPlaced(OrderPlaced {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            purchaser_id: cmd.purchaser_id,
            item_type: cmd.item_type,
            item_ref: cmd.item_ref.trim().to_string(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_status(&self, cmd: &SetStatus) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_live(cmd.tenant_id, cmd.order_id)?;

        if self.is_status_machine_owned() {
            return Err(DomainError::invalid_transition(
                "status is controlled by the enabled solution; disable it first",
            ));
        }

        let fulfillment = self.item_type.fulfillment();
        if !cmd.status.applies_to(fulfillment) {
            return Err(DomainError::validation(format!(
                "status '{}' does not apply to {} orders",
                cmd.status,
                self.item_type.as_str()
            )));
        }
        if fulfillment == Fulfillment::Digital && cmd.status == OrderStatus::Delivered {
            return Err(DomainError::invalid_transition(
                "digital orders are delivered by enabling their solution",
            ));
        }

        if cmd.status == self.status {
            return Ok(vec![]);
        }

        Ok(vec![OrderEvent::StatusChanged(StatusChanged {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            from: self.status,
            to: cmd.status,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_enable(&self, cmd: &EnableSolution) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_live(cmd.tenant_id, cmd.order_id)?;

        if self.token(cmd.token_id).is_some() {
            return Err(DomainError::conflict("token id already issued for this order"));
        }
        let subject_id = self
            .purchaser_id
            .ok_or_else(|| DomainError::invariant("order has no purchaser"))?;

        let mut events = self.revoke_live(cmd.tenant_id, cmd.occurred_at);
        events.push(OrderEvent::SolutionEnabled(SolutionEnabled {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            reference: cmd.reference.clone(),
            token_id: cmd.token_id,
            subject_id,
            occurred_at: cmd.occurred_at,
        }));
        Ok(events)
    }

    fn handle_disable(&self, cmd: &DisableSolution) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_live(cmd.tenant_id, cmd.order_id)?;
        Ok(self.disable_events(cmd.tenant_id, cmd.occurred_at))
    }

    fn disable_events(&self, tenant_id: TenantId, at: DateTime<Utc>) -> Vec<OrderEvent> {
        if !self.solution.is_enabled {
            return vec![];
        }
        let restored_status = match self.item_type.fulfillment() {
            Fulfillment::Digital => OrderStatus::Pending,
            Fulfillment::Physical => self.status_before_solution.unwrap_or(OrderStatus::Pending),
        };

        let mut events = self.revoke_live(tenant_id, at);
        events.push(OrderEvent::SolutionDisabled(SolutionDisabled {
            tenant_id,
            order_id: self.id,
            restored_status,
            occurred_at: at,
        }));
        events
    }

    fn handle_delete(&self, cmd: &DeleteOrder) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_live(cmd.tenant_id, cmd.order_id)?;

        let mut events = self.disable_events(cmd.tenant_id, cmd.occurred_at);
        events.push(OrderEvent::OrderDeleted(OrderDeleted {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        }));
        Ok(events)
    }
}
