use std::sync::Arc;

use chrono::Utc;

use storefront_core::{DomainError, OrderId, SubjectId, TenantId};
use storefront_orders::{DeleteOrder, ItemType, Order, OrderCommand, OrderStatus, PlaceOrder, SetStatus};
use storefront_storage::parse;

use super::access::AccessTokenService;
use super::FulfillmentError;
use crate::store::OrderStore;

/// Input for placing an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub purchaser_id: SubjectId,
    pub item_type: ItemType,
    pub item_ref: String,
}

/// Operator and purchaser operations on orders.
#[derive(Clone)]
pub struct OrderService {
    orders: Arc<dyn OrderStore>,
    access: Arc<AccessTokenService>,
}

impl OrderService {
    pub fn new(orders: Arc<dyn OrderStore>, access: Arc<AccessTokenService>) -> Self {
        Self { orders, access }
    }

    pub fn access(&self) -> &AccessTokenService {
        &self.access
    }

    pub async fn place_order(&self, tenant_id: TenantId, new: NewOrder) -> Result<Order, FulfillmentError> {
        let command = OrderCommand::PlaceOrder(PlaceOrder {
            tenant_id,
            order_id: OrderId::new(),
            purchaser_id: new.purchaser_id,
            item_type: new.item_type,
            item_ref: new.item_ref,
            occurred_at: Utc::now(),
        });
        Ok(self.access.dispatcher().dispatch(&command).await?.order)
    }

    /// A placed, not deleted order.
    pub async fn get_order(&self, tenant_id: TenantId, order_id: OrderId) -> Result<Order, FulfillmentError> {
        self.orders
            .get(tenant_id, order_id)
            .await?
            .filter(|o| o.is_placed() && !o.is_deleted())
            .ok_or_else(|| DomainError::NotFound.into())
    }

    /// Live orders of the tenant, optionally only those of one purchaser.
    pub async fn list_orders(
        &self,
        tenant_id: TenantId,
        purchaser: Option<SubjectId>,
    ) -> Result<Vec<Order>, FulfillmentError> {
        let orders = self.orders.list(tenant_id).await?;
        Ok(orders
            .into_iter()
            .filter(|o| o.is_placed() && !o.is_deleted())
            .filter(|o| purchaser.is_none_or(|p| o.is_purchaser(p)))
            .collect())
    }

    pub async fn set_status(
        &self,
        tenant_id: TenantId,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, FulfillmentError> {
        let command = OrderCommand::SetStatus(SetStatus {
            tenant_id,
            order_id,
            status,
            occurred_at: Utc::now(),
        });
        Ok(self.access.dispatcher().dispatch(&command).await?.order)
    }

    /// Parse `raw_url` and enable the solution with it.
    ///
    /// An unrecognized URL fails with `InvalidReference` before the order is
    /// touched.
    pub async fn enable_solution(
        &self,
        tenant_id: TenantId,
        order_id: OrderId,
        raw_url: &str,
    ) -> Result<Order, FulfillmentError> {
        let reference = parse(raw_url)?;
        let (order, _) = self.access.grant(tenant_id, order_id, reference).await?;
        Ok(order)
    }

    pub async fn disable_solution(&self, tenant_id: TenantId, order_id: OrderId) -> Result<Order, FulfillmentError> {
        self.access.revoke(tenant_id, order_id).await
    }

    /// Delete the order, revoking its live token in the same write.
    pub async fn delete_order(&self, tenant_id: TenantId, order_id: OrderId) -> Result<(), FulfillmentError> {
        let command = OrderCommand::DeleteOrder(DeleteOrder {
            tenant_id,
            order_id,
            occurred_at: Utc::now(),
        });
        self.access.dispatcher().dispatch(&command).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_core::TokenId;
    use storefront_storage::{StorageKind, StorageReference};

    use crate::fulfillment::AccessConfig;
    use crate::store::InMemoryOrderStore;

    fn service() -> OrderService {
        let store: Arc<dyn OrderStore> = Arc::new(InMemoryOrderStore::new());
        let access = Arc::new(AccessTokenService::new(store.clone(), AccessConfig::default()));
        OrderService::new(store, access)
    }

    async fn place(svc: &OrderService, tenant: TenantId, item_type: ItemType) -> (Order, SubjectId) {
        let purchaser = SubjectId::new();
        let order = svc
            .place_order(
                tenant,
                NewOrder {
                    purchaser_id: purchaser,
                    item_type,
                    item_ref: "item-1".into(),
                },
            )
            .await
            .unwrap();
        (order, purchaser)
    }

    fn live_token(order: &Order) -> TokenId {
        order.live_token().unwrap().token_id
    }

    #[tokio::test]
    async fn file_url_is_normalized_and_reenable_mints_a_new_token() {
        let svc = service();
        let tenant = TenantId::new();
        let (order, purchaser) = place(&svc, tenant, ItemType::Book).await;
        let id = order.id_typed();

        let enabled = svc
            .enable_solution(tenant, id, "https://drive.google.com/file/d/ABC123/view")
            .await
            .unwrap();
        let reference = enabled.solution().reference.clone().unwrap();
        assert_eq!(reference.kind(), StorageKind::File);
        assert_eq!(reference.id(), "ABC123");
        let old = live_token(&enabled);

        svc.disable_solution(tenant, id).await.unwrap();
        let again = svc
            .enable_solution(tenant, id, "https://drive.google.com/file/d/ABC123/view")
            .await
            .unwrap();
        let new = live_token(&again);

        assert_ne!(old, new);
        assert_eq!(
            svc.access().resolve(tenant, old, purchaser).await.unwrap_err(),
            FulfillmentError::Domain(DomainError::TokenRevoked)
        );
        assert!(svc.access().resolve(tenant, new, purchaser).await.is_ok());
    }

    #[tokio::test]
    async fn unrecognized_url_leaves_the_order_untouched() {
        let svc = service();
        let tenant = TenantId::new();
        let (order, _) = place(&svc, tenant, ItemType::Book).await;
        let id = order.id_typed();

        let err = svc
            .enable_solution(tenant, id, "https://example.com/some/page")
            .await
            .unwrap_err();
        assert!(matches!(err, FulfillmentError::Domain(DomainError::InvalidReference(_))));

        let after = svc.get_order(tenant, id).await.unwrap();
        assert_eq!(after, order);
        assert_eq!(after.status(), OrderStatus::Pending);
    }

    #[tokio::test]
    async fn operator_edits_are_rejected_while_the_solution_is_enabled() {
        let svc = service();
        let tenant = TenantId::new();
        let (order, _) = place(&svc, tenant, ItemType::Product).await;
        let id = order.id_typed();

        svc.set_status(tenant, id, OrderStatus::Shipped).await.unwrap();
        svc.enable_solution(tenant, id, "https://drive.google.com/drive/folders/F1")
            .await
            .unwrap();
        assert!(matches!(
            svc.set_status(tenant, id, OrderStatus::Packed).await.unwrap_err(),
            FulfillmentError::Domain(DomainError::InvalidTransition(_))
        ));

        let disabled = svc.disable_solution(tenant, id).await.unwrap();
        assert_eq!(disabled.status(), OrderStatus::Shipped);
        assert_eq!(
            disabled.solution().reference,
            None::<StorageReference>
        );
    }

    #[tokio::test]
    async fn deleted_orders_disappear_and_their_token_is_revoked() {
        let svc = service();
        let tenant = TenantId::new();
        let (order, purchaser) = place(&svc, tenant, ItemType::Book).await;
        let id = order.id_typed();
        let enabled = svc
            .enable_solution(tenant, id, "https://drive.google.com/open?id=XYZ")
            .await
            .unwrap();
        let token = live_token(&enabled);

        svc.delete_order(tenant, id).await.unwrap();
        assert_eq!(
            svc.get_order(tenant, id).await.unwrap_err(),
            FulfillmentError::Domain(DomainError::NotFound)
        );
        assert!(svc.list_orders(tenant, None).await.unwrap().is_empty());
        assert_eq!(
            svc.access().resolve(tenant, token, purchaser).await.unwrap_err(),
            FulfillmentError::Domain(DomainError::TokenRevoked)
        );
    }

    #[tokio::test]
    async fn listing_can_be_narrowed_to_one_purchaser() {
        let svc = service();
        let tenant = TenantId::new();
        let (_, alice) = place(&svc, tenant, ItemType::Book).await;
        place(&svc, tenant, ItemType::Product).await;
        place(&svc, TenantId::new(), ItemType::Book).await;

        assert_eq!(svc.list_orders(tenant, None).await.unwrap().len(), 2);
        let mine = svc.list_orders(tenant, Some(alice)).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert!(mine[0].is_purchaser(alice));
    }
}
