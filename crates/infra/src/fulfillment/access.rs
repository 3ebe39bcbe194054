//! Access Token Service.
//!
//! Tokens are opaque ids. Resolving one never trusts the token alone: the
//! current order is loaded and the caller is checked against its purchaser on
//! every call. A caller who is not the purchaser learns nothing beyond
//! `Forbidden`, whether or not the token exists or is still live.

use std::sync::Arc;

use chrono::Utc;

use storefront_core::{DomainError, OrderId, SubjectId, TenantId, TokenId};
use storefront_orders::{AccessToken, DisableSolution, EnableSolution, Order, OrderCommand};
use storefront_storage::{StorageReference, ViewingUrl};

use super::dispatcher::OrderDispatcher;
use super::{AccessConfig, FulfillmentError};
use crate::store::OrderStore;

#[derive(Clone)]
pub struct AccessTokenService {
    orders: Arc<dyn OrderStore>,
    dispatcher: OrderDispatcher,
    config: AccessConfig,
}

impl AccessTokenService {
    pub fn new(orders: Arc<dyn OrderStore>, config: AccessConfig) -> Self {
        let dispatcher = OrderDispatcher::new(orders.clone(), config.max_retries);
        Self {
            orders,
            dispatcher,
            config,
        }
    }

    pub fn dispatcher(&self) -> &OrderDispatcher {
        &self.dispatcher
    }

    /// Enable the order's solution for `reference` and mint a fresh token.
    ///
    /// Any live token is revoked in the same write, so the order never holds
    /// two live tokens.
    pub async fn grant(
        &self,
        tenant_id: TenantId,
        order_id: OrderId,
        reference: StorageReference,
    ) -> Result<(Order, AccessToken), FulfillmentError> {
        let token_id = TokenId::new();
        let command = OrderCommand::EnableSolution(EnableSolution {
            tenant_id,
            order_id,
            reference,
            token_id,
            occurred_at: Utc::now(),
        });
        let out = self.dispatcher.dispatch(&command).await?;
        let token = out
            .order
            .token(token_id)
            .cloned()
            .ok_or_else(|| DomainError::invariant("granted token missing from order"))?;
        Ok((out.order, token))
    }

    /// Disable the solution and revoke its live token. Idempotent.
    pub async fn revoke(&self, tenant_id: TenantId, order_id: OrderId) -> Result<Order, FulfillmentError> {
        let command = OrderCommand::DisableSolution(DisableSolution {
            tenant_id,
            order_id,
            occurred_at: Utc::now(),
        });
        Ok(self.dispatcher.dispatch(&command).await?.order)
    }

    /// Exchange a token for a time-bounded viewing URL.
    pub async fn resolve(
        &self,
        tenant_id: TenantId,
        token_id: TokenId,
        subject_id: SubjectId,
    ) -> Result<ViewingUrl, FulfillmentError> {
        let forbidden = || FulfillmentError::Domain(DomainError::Forbidden);

        let owner = self.orders.token_owner(token_id).await?.ok_or_else(forbidden)?;
        if owner.tenant_id != tenant_id {
            return Err(forbidden());
        }
        let order = self
            .orders
            .get(tenant_id, owner.order_id)
            .await?
            .ok_or_else(forbidden)?;
        if !order.is_purchaser(subject_id) {
            tracing::info!(
                tenant_id = %tenant_id,
                order_id = %owner.order_id,
                "solution access denied"
            );
            return Err(forbidden());
        }

        let token = order.token(token_id).ok_or_else(forbidden)?;
        if !token.is_live() {
            return Err(DomainError::TokenRevoked.into());
        }
        let reference = order
            .solution()
            .reference
            .as_ref()
            .ok_or_else(|| DomainError::invariant("live token without a solution reference"))?;

        let ttl = chrono::Duration::from_std(self.config.viewer_ttl)
            .map_err(|_| DomainError::validation("viewer TTL out of range"))?;
        Ok(ViewingUrl::for_reference(reference, Utc::now(), ttl))
    }

    /// The live token of an order, for its purchaser only.
    pub async fn access_token_for(
        &self,
        tenant_id: TenantId,
        order_id: OrderId,
        subject_id: SubjectId,
    ) -> Result<TokenId, FulfillmentError> {
        let order = self
            .orders
            .get(tenant_id, order_id)
            .await?
            .filter(|o| o.is_placed() && !o.is_deleted())
            .ok_or(DomainError::NotFound)?;
        if !order.is_purchaser(subject_id) {
            return Err(DomainError::Forbidden.into());
        }
        order
            .live_token()
            .map(|t| t.token_id)
            .ok_or_else(|| DomainError::NotFound.into())
    }

    /// Disable every enabled solution pointing at `reference`.
    ///
    /// Returns how many orders were changed.
    pub async fn invalidate_reference(
        &self,
        tenant_id: TenantId,
        reference: &StorageReference,
    ) -> Result<usize, FulfillmentError> {
        let affected = self.orders.list_by_reference(tenant_id, reference).await?;
        let mut changed = 0;
        for order in affected {
            let order = self.revoke(tenant_id, order.id_typed()).await?;
            if !order.solution().is_enabled {
                changed += 1;
            }
        }
        if changed > 0 {
            tracing::info!(tenant_id = %tenant_id, reference = %reference, changed, "solutions invalidated");
        }
        Ok(changed)
    }
}
