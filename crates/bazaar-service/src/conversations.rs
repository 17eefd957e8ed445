//! # Conversation Service
//!
//! Drives the per-actor flows: starts them, feeds raw input through the
//! core state machines, and performs the commit a finished flow asks
//! for (persist product, persist discount, adjust order item).
//!
//! ## Locking Discipline
//! The flow is TAKEN out of the session, advanced without the lock,
//! then written back unless it finished. The platform serializes
//! inbound events per actor, so nothing races the gap.
//!
//! ## Duplicate Codes
//! Code uniqueness lives in the store, not the flow: after the Code
//! step passes validation the service checks the database and, on a
//! hit, pushes the flow back to the Code step with a Duplicate error.
//! The UNIQUE index catches the (tiny) remaining race at insert time
//! the same way.

use std::sync::Arc;

use tracing::{debug, info};

use bazaar_core::conversation::{
    AddProductFlow, CreateDiscountFlow, CreateDiscountStep, DiscountDraft, EditItemQuantityFlow,
    Flow, FlowCommit, FlowEvent, ProductDraft,
};
use bazaar_core::{CoreError, DiscountCode, Order, OrderItem, Product, ValidationError};
use bazaar_db::{Database, DbError, NewDiscount, NewProduct};

use crate::catalog::CatalogPublisher;
use crate::error::{ServiceError, ServiceResult};
use crate::gate::Gate;
use crate::orders::OrderService;
use crate::session::SessionStore;

/// What one inbound message produced, for the shell to render.
#[derive(Debug)]
pub enum ConversationReply {
    /// Flow discarded, nothing committed.
    Cancelled,
    /// Same step again; the error says what to fix.
    Retry { error: ValidationError },
    /// Field accepted; prompt for the flow's current step.
    Next,
    /// Zeroing the last order item was refused; the flow is still
    /// waiting for a different quantity (or a full-order rejection).
    LastItemBlocked { order_id: i64 },
    /// Add-product flow committed.
    ProductCreated(Product),
    /// Create-discount flow committed.
    DiscountCreated(DiscountCode),
    /// Edit-quantity flow committed and the order recomputed.
    OrderAdjusted {
        order: Order,
        items: Vec<OrderItem>,
    },
}

/// Conversation operations for one storefront.
#[derive(Clone)]
pub struct ConversationService {
    db: Database,
    sessions: Arc<SessionStore>,
    gate: Gate,
    orders: OrderService,
    publisher: Arc<dyn CatalogPublisher>,
}

impl ConversationService {
    pub(crate) fn new(
        db: Database,
        sessions: Arc<SessionStore>,
        gate: Gate,
        orders: OrderService,
        publisher: Arc<dyn CatalogPublisher>,
    ) -> Self {
        ConversationService {
            db,
            sessions,
            gate,
            orders,
            publisher,
        }
    }

    /// Begins the add-product flow, replacing any incomplete flow.
    pub fn start_add_product(&self, actor_id: i64) -> ServiceResult<()> {
        self.gate.check(actor_id)?;
        self.start(actor_id, Flow::AddProduct(AddProductFlow::new()));
        Ok(())
    }

    /// Begins the create-discount flow, replacing any incomplete flow.
    pub fn start_create_discount(&self, actor_id: i64) -> ServiceResult<()> {
        self.gate.check(actor_id)?;
        self.start(actor_id, Flow::CreateDiscount(CreateDiscountFlow::new()));
        Ok(())
    }

    /// Begins the edit-item-quantity flow for one order item.
    pub async fn start_edit_item(
        &self,
        actor_id: i64,
        order_id: i64,
        item_index: usize,
    ) -> ServiceResult<()> {
        self.gate.check(actor_id)?;

        let order = self
            .db
            .orders()
            .get(order_id)
            .await?
            .ok_or(CoreError::OrderNotFound(order_id))?;
        if order.status.is_terminal() {
            return Err(ServiceError::OrderNotEditable {
                order_id,
                status: order.status,
            });
        }

        let items = self.db.orders().items(order_id).await?;
        if item_index >= items.len() {
            return Err(CoreError::ItemIndexOutOfRange {
                order_id,
                index: item_index,
            }
            .into());
        }

        self.start(
            actor_id,
            Flow::EditItemQuantity(EditItemQuantityFlow::new(order_id, item_index, items.len())),
        );
        Ok(())
    }

    /// Feeds one raw actor input into the active flow.
    pub async fn handle_input(&self, actor_id: i64, input: &str) -> ServiceResult<ConversationReply> {
        self.gate.check(actor_id)?;

        let Some(mut flow) = self.sessions.take_flow(actor_id) else {
            return Err(ServiceError::NoActiveFlow);
        };

        let event = flow.advance(input);

        // Code-step uniqueness check, once the step has passed
        if let (FlowEvent::Next, Flow::CreateDiscount(inner)) = (&event, &mut flow) {
            if inner.step() == CreateDiscountStep::Kind {
                if let Some(code) = inner.code() {
                    if self.db.discounts().get_by_code(code).await?.is_some() {
                        let retry = inner.reject_duplicate_code();
                        self.sessions.set_flow(actor_id, flow);
                        return Ok(reply_for_retry(retry));
                    }
                }
            }
        }

        match event {
            FlowEvent::Cancelled => {
                debug!(actor_id, "Flow cancelled");
                Ok(ConversationReply::Cancelled)
            }
            FlowEvent::Retry { error } => {
                self.sessions.set_flow(actor_id, flow);
                Ok(ConversationReply::Retry { error })
            }
            FlowEvent::Next => {
                self.sessions.set_flow(actor_id, flow);
                Ok(ConversationReply::Next)
            }
            FlowEvent::Blocked { order_id } => {
                self.sessions.set_flow(actor_id, flow);
                Ok(ConversationReply::LastItemBlocked { order_id })
            }
            FlowEvent::Commit(FlowCommit::Product(draft)) => self.commit_product(draft).await,
            FlowEvent::Commit(FlowCommit::Discount(draft)) => {
                self.commit_discount(actor_id, flow, draft).await
            }
            FlowEvent::Commit(FlowCommit::ItemQuantity(decision)) => {
                let (order, items) = self.orders.apply_quantity_decision(decision).await?;
                Ok(ConversationReply::OrderAdjusted { order, items })
            }
        }
    }

    /// True when the actor has a flow in progress.
    pub fn has_active_flow(&self, actor_id: i64) -> bool {
        self.sessions.with_session(actor_id, |s| s.flow.is_some())
    }

    fn start(&self, actor_id: i64, flow: Flow) {
        self.sessions.with_session(actor_id, |session| {
            if session.flow.is_some() {
                debug!(actor_id, "Replacing incomplete flow");
            }
            session.flow = Some(flow);
        });
    }

    async fn commit_product(&self, draft: ProductDraft) -> ServiceResult<ConversationReply> {
        let product = self
            .db
            .products()
            .insert(NewProduct {
                name: draft.name,
                description: draft.description,
                price: draft.price,
                stock: draft.stock,
                image_ref: draft.image_ref,
            })
            .await?;

        // Publish to the sales channel and capture the reference.
        // Publication failure is not a creation failure.
        let product = match self.publisher.publish(&product) {
            Some(channel_ref) => {
                self.db
                    .products()
                    .set_channel_ref(product.id, &channel_ref)
                    .await?;
                self.db.products().require(product.id).await?
            }
            None => product,
        };

        info!(product_id = product.id, name = %product.name, "Product created");
        Ok(ConversationReply::ProductCreated(product))
    }

    async fn commit_discount(
        &self,
        actor_id: i64,
        mut flow: Flow,
        draft: DiscountDraft,
    ) -> ServiceResult<ConversationReply> {
        let inserted = self
            .db
            .discounts()
            .insert(NewDiscount {
                code: draft.code,
                kind: draft.kind,
                value: draft.value,
                min_purchase: draft.min_purchase,
                max_discount: draft.max_discount,
                usage_limit: draft.usage_limit,
                starts_at: draft.starts_at,
                ends_at: draft.ends_at,
            })
            .await;

        match inserted {
            Ok(code) => {
                info!(code = %code.code, "Discount code created");
                Ok(ConversationReply::DiscountCreated(code))
            }
            // Lost the insert race: back to the Code step
            Err(DbError::UniqueViolation { .. }) => {
                if let Flow::CreateDiscount(inner) = &mut flow {
                    let retry = inner.reject_duplicate_code();
                    self.sessions.set_flow(actor_id, flow);
                    return Ok(reply_for_retry(retry));
                }
                Err(ServiceError::NoActiveFlow)
            }
            Err(err) => Err(err.into()),
        }
    }
}

fn reply_for_retry(event: FlowEvent) -> ConversationReply {
    match event {
        FlowEvent::Retry { error } => ConversationReply::Retry { error },
        _ => ConversationReply::Retry {
            error: ValidationError::required("code"),
        },
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::storefront;
    use bazaar_core::DiscountKind;
    use bazaar_db::NewProduct as DbNewProduct;

    async fn drive(front: &crate::Storefront, actor: i64, inputs: &[&str]) -> ConversationReply {
        let conv = front.conversations();
        let mut last = None;
        for input in inputs {
            last = Some(conv.handle_input(actor, input).await.unwrap());
        }
        last.expect("at least one input")
    }

    #[tokio::test]
    async fn test_add_product_flow_end_to_end() {
        let front = storefront().await;
        let conv = front.conversations();
        conv.start_add_product(1).unwrap();

        let reply = drive(&front, 1, &["Saffron Pack", "250,000", "40", "0", "file:img9"]).await;
        match reply {
            ConversationReply::ProductCreated(product) => {
                assert_eq!(product.name, "Saffron Pack");
                assert_eq!(product.price, 250_000);
                assert_eq!(product.stock, 40);
                assert_eq!(product.image_ref.as_deref(), Some("file:img9"));
                // FakePublisher hands back a reference
                assert_eq!(
                    product.channel_ref.as_deref(),
                    Some(format!("listing:{}", product.id).as_str())
                );
            }
            other => panic!("unexpected reply: {other:?}"),
        }
        assert!(!conv.has_active_flow(1));
    }

    #[tokio::test]
    async fn test_invalid_input_reprompts() {
        let front = storefront().await;
        let conv = front.conversations();
        conv.start_add_product(1).unwrap();

        let reply = conv.handle_input(1, "x").await.unwrap();
        assert!(matches!(reply, ConversationReply::Retry { .. }));
        // Flow survives the retry
        assert!(conv.has_active_flow(1));
    }

    #[tokio::test]
    async fn test_cancel_discards_flow() {
        let front = storefront().await;
        let conv = front.conversations();
        conv.start_add_product(1).unwrap();
        conv.handle_input(1, "Saffron Pack").await.unwrap();

        let reply = conv.handle_input(1, "/cancel").await.unwrap();
        assert!(matches!(reply, ConversationReply::Cancelled));
        assert!(!conv.has_active_flow(1));

        // Nothing persisted
        assert!(front.db().products().list_all(50).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_active_flow() {
        let front = storefront().await;
        let err = front.conversations().handle_input(1, "hi").await.unwrap_err();
        assert!(matches!(err, ServiceError::NoActiveFlow));
    }

    #[tokio::test]
    async fn test_create_discount_flow_end_to_end() {
        let front = storefront().await;
        let conv = front.conversations();
        conv.start_create_discount(1).unwrap();

        let reply = drive(
            &front,
            1,
            &["save10", "percentage", "10", "100000", "15000", "0", "0", "0"],
        )
        .await;
        match reply {
            ConversationReply::DiscountCreated(code) => {
                assert_eq!(code.code, "SAVE10");
                assert_eq!(code.kind, DiscountKind::Percentage);
                assert_eq!(code.max_discount, Some(15_000));
                assert!(code.is_active);
            }
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_duplicate_code_bounces_back_to_code_step() {
        let front = storefront().await;
        let conv = front.conversations();

        conv.start_create_discount(1).unwrap();
        drive(&front, 1, &["TAKEN", "fixed", "5000", "0", "0", "0", "0"]).await;

        conv.start_create_discount(2).unwrap();
        let reply = conv.handle_input(2, "taken").await.unwrap();
        assert!(matches!(
            reply,
            ConversationReply::Retry {
                error: ValidationError::Duplicate { .. }
            }
        ));

        // Still on the Code step: a fresh code advances to Kind
        let reply = conv.handle_input(2, "FRESH").await.unwrap();
        assert!(matches!(reply, ConversationReply::Next));
    }

    #[tokio::test]
    async fn test_edit_quantity_flow_adjusts_order() {
        let front = storefront().await;
        let a = front
            .db()
            .products()
            .insert(DbNewProduct {
                name: "Saffron 5g".to_string(),
                description: None,
                price: 50_000,
                stock: 100,
                image_ref: None,
            })
            .await
            .unwrap();
        let b = front
            .db()
            .products()
            .insert(DbNewProduct {
                name: "Tea Box".to_string(),
                description: None,
                price: 20_000,
                stock: 100,
                image_ref: None,
            })
            .await
            .unwrap();
        front.carts().add(7, a.id, 3).await.unwrap();
        front.carts().add(7, b.id, 2).await.unwrap();
        let order = front.orders().checkout(7, None).await.unwrap();

        let conv = front.conversations();
        conv.start_edit_item(1, order.id, 0).await.unwrap();
        let reply = conv.handle_input(1, "5").await.unwrap();

        match reply {
            ConversationReply::OrderAdjusted { order, items } => {
                assert_eq!(items[0].quantity, 5);
                assert_eq!(order.gross, 290_000);
            }
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_edit_quantity_zero_on_last_item_blocks() {
        let front = storefront().await;
        let p = front
            .db()
            .products()
            .insert(DbNewProduct {
                name: "Saffron 5g".to_string(),
                description: None,
                price: 50_000,
                stock: 100,
                image_ref: None,
            })
            .await
            .unwrap();
        front.carts().add(7, p.id, 3).await.unwrap();
        let order = front.orders().checkout(7, None).await.unwrap();

        let conv = front.conversations();
        conv.start_edit_item(1, order.id, 0).await.unwrap();

        let reply = conv.handle_input(1, "0").await.unwrap();
        assert!(matches!(
            reply,
            ConversationReply::LastItemBlocked { order_id } if order_id == order.id
        ));

        // Flow still alive: a positive quantity commits
        let reply = conv.handle_input(1, "1").await.unwrap();
        assert!(matches!(reply, ConversationReply::OrderAdjusted { .. }));
    }

    #[tokio::test]
    async fn test_start_edit_item_validates_target() {
        let front = storefront().await;
        let conv = front.conversations();

        let err = conv.start_edit_item(1, 999, 0).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Core(CoreError::OrderNotFound(999))
        ));
    }

    #[tokio::test]
    async fn test_new_flow_overwrites_incomplete_one() {
        let front = storefront().await;
        let conv = front.conversations();

        conv.start_add_product(1).unwrap();
        conv.handle_input(1, "Saffron Pack").await.unwrap();

        // Silent overwrite: the discount flow starts from scratch
        conv.start_create_discount(1).unwrap();
        let reply = conv.handle_input(1, "NEWCODE").await.unwrap();
        assert!(matches!(reply, ConversationReply::Next));
    }
}
