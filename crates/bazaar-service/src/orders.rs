//! # Order Service
//!
//! Checkout and post-creation order management.
//!
//! ## Checkout Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  checkout(actor, code?)                                                 │
//! │      │                                                                  │
//! │      ├─► Gate ("order" window, 3/hour by default)                       │
//! │      ├─► empty cart? ──► EmptyCart                                      │
//! │      ├─► re-fetch every line's product (second stock check:             │
//! │      │   time passed since add-to-cart, stock may have moved)           │
//! │      │      any line stale? ──► CheckoutBlocked, ALL failing lines      │
//! │      ├─► resolve + validate discount code                               │
//! │      ├─► pricing recompute ──► totals                                   │
//! │      ├─► create_with_items (atomic: stock decrement + redemption        │
//! │      │   + order rows, all-or-nothing)                                  │
//! │      └─► clear cart, return order                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use bazaar_core::cart::CartView;
use bazaar_core::conversation::QuantityDecision;
use bazaar_core::pricing::{self, OrderTotals};
use bazaar_core::{CoreError, DiscountCode, Money, Order, OrderItem, OrderStatus};
use bazaar_db::{Database, DbError, NewOrderItem};

use crate::config::ServiceConfig;
use crate::error::{CheckoutProblem, ServiceError, ServiceResult};
use crate::gate::Gate;
use crate::notifier::{Notifier, Severity};
use crate::session::SessionStore;

/// An operator adjustment to one order item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOp {
    /// Add one pack multiple to the quantity.
    IncreaseByPack,
    /// Subtract one pack multiple; reaching zero removes the item.
    DecreaseByPack,
    /// Set the quantity outright; zero removes the item.
    SetQuantity(i64),
    /// Remove the item.
    Remove,
}

/// Order operations for one storefront.
#[derive(Clone)]
pub struct OrderService {
    db: Database,
    sessions: Arc<SessionStore>,
    gate: Gate,
    config: ServiceConfig,
    notifier: Arc<dyn Notifier>,
}

impl OrderService {
    pub(crate) fn new(
        db: Database,
        sessions: Arc<SessionStore>,
        gate: Gate,
        config: ServiceConfig,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        OrderService {
            db,
            sessions,
            gate,
            config,
            notifier,
        }
    }

    /// Converts the actor's cart into a pending order.
    ///
    /// Re-validates every line at commit time; any stale line aborts
    /// the whole checkout with all failing lines reported and zero
    /// persisted side effects. On success the cart is cleared.
    pub async fn checkout(
        &self,
        actor_id: i64,
        discount_code: Option<&str>,
    ) -> ServiceResult<Order> {
        self.gate
            .check_action(actor_id, "order", self.config.order_limit)?;

        let cart = self.sessions.cart(actor_id);
        if cart.is_empty() {
            return Err(ServiceError::EmptyCart);
        }

        // Second stock check against the live catalog
        let mut fresh = Vec::with_capacity(cart.lines().len());
        for line in cart.lines() {
            if let Some(product) = self.db.products().get(line.product_id).await? {
                fresh.push(product);
            }
        }
        let view = cart.review(|id| fresh.iter().find(|p| p.id == id));
        reject_stale_lines(&view)?;

        let discount = match discount_code {
            Some(raw) => Some(self.resolve_discount(raw, Money::from_units(view.total)).await?),
            None => None,
        };

        // Snapshot cart lines as order items and recompute totals
        let mut items: Vec<OrderItem> = cart
            .lines()
            .iter()
            .map(|line| OrderItem {
                id: 0,
                order_id: 0,
                product_id: line.product_id,
                name_snapshot: line.name_snapshot.clone(),
                pack_label: None,
                unit_price: line.unit_price,
                pack_quantity: 1,
                pack_price: None,
                quantity: line.quantity,
                line_total: 0,
            })
            .collect();
        let totals = pricing::recompute(&mut items, discount.as_ref(), Utc::now());

        let new_items: Vec<NewOrderItem> = items
            .iter()
            .map(|item| NewOrderItem {
                product_id: item.product_id,
                name_snapshot: item.name_snapshot.clone(),
                pack_label: item.pack_label.clone(),
                unit_price: item.unit_price,
                pack_quantity: item.pack_quantity,
                pack_price: item.pack_price,
                quantity: item.quantity,
                line_total: item.line_total,
            })
            .collect();

        let discount_ref = discount.as_ref().map(|code| (code.id, code.code.as_str()));
        let order = match self
            .db
            .orders()
            .create_with_items(actor_id, &new_items, totals, discount_ref)
            .await
        {
            Ok(order) => order,
            Err(err) => return Err(self.checkout_failure(actor_id, err)),
        };

        self.sessions.with_session(actor_id, |session| {
            session.cart.clear();
        });

        info!(actor_id, order_id = order.id, net = order.net, "Checkout complete");
        Ok(order)
    }

    /// Computes what a discount code would do to the actor's current
    /// cart, without redeeming anything.
    pub async fn preview_discount(&self, actor_id: i64, raw_code: &str) -> ServiceResult<OrderTotals> {
        self.gate
            .check_action(actor_id, "discount", self.config.discount_limit)?;

        let view = {
            let cart = self.sessions.cart(actor_id);
            let mut fresh = Vec::with_capacity(cart.lines().len());
            for line in cart.lines() {
                if let Some(product) = self.db.products().get(line.product_id).await? {
                    fresh.push(product);
                }
            }
            cart.review(|id| fresh.iter().find(|p| p.id == id))
        };

        let gross = Money::from_units(view.total);
        let code = self.resolve_discount(raw_code, gross).await?;
        let amount = pricing::amount_for(&code, gross);

        Ok(OrderTotals {
            gross: gross.units(),
            discount: amount.units(),
            net: gross.saturating_sub_floor_zero(amount).units(),
        })
    }

    /// Applies one operator adjustment to an order item, recomputes
    /// totals, and persists the full item list atomically.
    pub async fn adjust_item(
        &self,
        order_id: i64,
        item_index: usize,
        op: ItemOp,
    ) -> ServiceResult<(Order, Vec<OrderItem>)> {
        let order = self.require_editable(order_id).await?;
        let mut items = self.db.orders().items(order_id).await?;

        if item_index >= items.len() {
            return Err(CoreError::ItemIndexOutOfRange {
                order_id,
                index: item_index,
            }
            .into());
        }

        let item = &items[item_index];
        let new_quantity = match op {
            ItemOp::IncreaseByPack => item.quantity + item.pack_quantity,
            ItemOp::DecreaseByPack => item.quantity - item.pack_quantity,
            ItemOp::SetQuantity(n) => n,
            ItemOp::Remove => 0,
        };

        if new_quantity <= 0 {
            // Zeroing the last item is refused: reject the whole order instead
            if items.len() == 1 {
                return Err(CoreError::LastItemRemoval { order_id }.into());
            }
            items.remove(item_index);
        } else {
            items[item_index].quantity = new_quantity;
        }

        let discount = match order.discount_code.as_deref() {
            Some(code) => self.db.discounts().get_by_code(code).await?,
            None => None,
        };

        // Gross from the mutated list; the already-redeemed code keeps
        // its formula without re-running the usability gate
        let base = pricing::recompute(&mut items, None, Utc::now());
        let gross = Money::from_units(base.gross);
        let amount = match discount.as_ref() {
            Some(code) => pricing::amount_for(code, gross),
            None => Money::zero(),
        };
        let totals = OrderTotals {
            gross: base.gross,
            discount: amount.units(),
            net: gross.saturating_sub_floor_zero(amount).units(),
        };

        self.db.orders().replace_items(order_id, &items, totals).await?;

        let order = self.db.orders().require(order_id).await?;
        info!(order_id, gross = totals.gross, net = totals.net, "Order adjusted");
        Ok((order, items))
    }

    /// Applies a completed edit-quantity conversation to its order.
    pub(crate) async fn apply_quantity_decision(
        &self,
        decision: QuantityDecision,
    ) -> ServiceResult<(Order, Vec<OrderItem>)> {
        let op = if decision.removes_item() {
            ItemOp::Remove
        } else {
            ItemOp::SetQuantity(decision.quantity)
        };
        self.adjust_item(decision.order_id, decision.item_index, op)
            .await
    }

    /// Moves an order along its one-way status path.
    ///
    /// `pending → confirmed`, `pending → cancelled`, `confirmed →
    /// completed`; everything else is rejected.
    pub async fn set_status(&self, order_id: i64, next: OrderStatus) -> ServiceResult<Order> {
        let order = self
            .db
            .orders()
            .get(order_id)
            .await?
            .ok_or(CoreError::OrderNotFound(order_id))?;

        if !order.status.can_transition_to(next) {
            return Err(CoreError::InvalidStatusTransition {
                order_id,
                current: order.status.to_string(),
                requested: next.to_string(),
            }
            .into());
        }

        self.db.orders().set_status(order_id, order.status, next).await?;
        Ok(self.db.orders().require(order_id).await?)
    }

    /// Fetches an order with its items.
    pub async fn get(&self, order_id: i64) -> ServiceResult<(Order, Vec<OrderItem>)> {
        let order = self
            .db
            .orders()
            .get(order_id)
            .await?
            .ok_or(CoreError::OrderNotFound(order_id))?;
        let items = self.db.orders().items(order_id).await?;
        Ok((order, items))
    }

    /// Lists one actor's orders, newest first.
    pub async fn list_by_actor(&self, actor_id: i64) -> ServiceResult<Vec<Order>> {
        Ok(self
            .db
            .orders()
            .list_by_actor(actor_id, self.config.list_limit)
            .await?)
    }

    /// Lists orders for operator review, optionally by status.
    pub async fn list(&self, status: Option<OrderStatus>) -> ServiceResult<Vec<Order>> {
        Ok(self.db.orders().list(status, self.config.list_limit).await?)
    }

    /// Looks a code up and checks it against the gross total.
    async fn resolve_discount(&self, raw_code: &str, gross: Money) -> ServiceResult<DiscountCode> {
        let normalized = bazaar_core::validate::discount_code(raw_code)
            .map_err(CoreError::Validation)?;

        let code = self
            .db
            .discounts()
            .get_by_code(&normalized)
            .await?
            .ok_or_else(|| CoreError::DiscountNotFound(normalized.clone()))?;

        code.usable(gross, Utc::now())
            .map_err(|rejection| CoreError::DiscountNotUsable {
                code: normalized,
                reason: rejection.to_string(),
            })?;

        Ok(code)
    }

    async fn require_editable(&self, order_id: i64) -> ServiceResult<Order> {
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
        Ok(order)
    }

    /// Translates transactional checkout failures and alerts the
    /// operator on persistence trouble.
    fn checkout_failure(&self, actor_id: i64, err: DbError) -> ServiceError {
        match err {
            DbError::StockConflict { product_id } => {
                warn!(actor_id, product_id, "Stock moved during checkout");
                ServiceError::CheckoutBlocked {
                    problems: vec![CheckoutProblem {
                        product_id,
                        name: String::new(),
                        problem: bazaar_core::cart::CartProblem::Understocked { available: 0 },
                    }],
                }
            }
            DbError::UsageExhausted { code } => CoreError::DiscountNotUsable {
                reason: "usage limit reached".to_string(),
                code,
            }
            .into(),
            other => {
                self.notifier.notify(
                    Severity::High,
                    "checkout",
                    &format!("checkout failed for actor {actor_id}: {other}"),
                );
                ServiceError::Db(other)
            }
        }
    }
}

/// Collects every flagged line into a single CheckoutBlocked error.
fn reject_stale_lines(view: &CartView) -> ServiceResult<()> {
    let problems: Vec<CheckoutProblem> = view
        .lines
        .iter()
        .filter_map(|line| {
            line.problem.map(|problem| CheckoutProblem {
                product_id: line.product_id,
                name: line.name.clone(),
                problem,
            })
        })
        .collect();

    if problems.is_empty() {
        Ok(())
    } else {
        Err(ServiceError::CheckoutBlocked { problems })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::storefront;
    use bazaar_core::cart::CartProblem;
    use bazaar_core::DiscountKind;
    use bazaar_db::{NewDiscount, NewProduct};

    fn product(name: &str, price: i64, stock: i64) -> NewProduct {
        NewProduct {
            name: name.to_string(),
            description: None,
            price,
            stock,
            image_ref: None,
        }
    }

    fn save10(usage_limit: Option<i64>) -> NewDiscount {
        NewDiscount {
            code: "SAVE10".to_string(),
            kind: DiscountKind::Percentage,
            value: 10,
            min_purchase: 100_000,
            max_discount: Some(15_000),
            usage_limit,
            starts_at: None,
            ends_at: None,
        }
    }

    #[tokio::test]
    async fn test_checkout_happy_path() {
        let front = storefront().await;
        let p = front
            .db()
            .products()
            .insert(product("Saffron 5g", 50_000, 10))
            .await
            .unwrap();

        front.carts().add(7, p.id, 3).await.unwrap();
        let order = front.orders().checkout(7, None).await.unwrap();

        assert_eq!(order.gross, 150_000);
        assert_eq!(order.net, 150_000);
        assert_eq!(order.status, OrderStatus::Pending);

        // Stock decremented, cart cleared
        assert_eq!(front.db().products().require(p.id).await.unwrap().stock, 7);
        assert!(front.carts().view(7).await.unwrap().lines.is_empty());
    }

    #[tokio::test]
    async fn test_checkout_empty_cart() {
        let front = storefront().await;
        assert!(matches!(
            front.orders().checkout(7, None).await,
            Err(ServiceError::EmptyCart)
        ));
    }

    #[tokio::test]
    async fn test_checkout_with_discount_scenario() {
        let front = storefront().await;
        let p = front
            .db()
            .products()
            .insert(product("Saffron 5g", 100_000, 10))
            .await
            .unwrap();
        front.db().discounts().insert(save10(None)).await.unwrap();

        front.carts().add(7, p.id, 2).await.unwrap();
        let order = front.orders().checkout(7, Some("save10")).await.unwrap();

        // gross 200,000 → 10% = 20,000, capped at 15,000
        assert_eq!(order.gross, 200_000);
        assert_eq!(order.discount, 15_000);
        assert_eq!(order.net, 185_000);
        assert_eq!(order.discount_code.as_deref(), Some("SAVE10"));
    }

    #[tokio::test]
    async fn test_checkout_exhausted_code_rejected() {
        let front = storefront().await;
        let p = front
            .db()
            .products()
            .insert(product("Saffron 5g", 100_000, 10))
            .await
            .unwrap();
        front.db().discounts().insert(save10(Some(1))).await.unwrap();

        front.carts().add(7, p.id, 2).await.unwrap();
        front.orders().checkout(7, Some("SAVE10")).await.unwrap();

        front.carts().add(8, p.id, 2).await.unwrap();
        let err = front.orders().checkout(8, Some("SAVE10")).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Core(CoreError::DiscountNotUsable { .. })
        ));
    }

    #[tokio::test]
    async fn test_stock_double_check_aborts_whole_checkout() {
        let front = storefront().await;
        let p = front
            .db()
            .products()
            .insert(product("Saffron 5g", 50_000, 5))
            .await
            .unwrap();

        front.carts().add(7, p.id, 4).await.unwrap();
        // Another actor buys 3 units before actor 7 checks out
        front.carts().add(8, p.id, 3).await.unwrap();
        front.orders().checkout(8, None).await.unwrap();

        let err = front.orders().checkout(7, None).await.unwrap_err();
        match err {
            ServiceError::CheckoutBlocked { problems } => {
                assert_eq!(problems.len(), 1);
                assert_eq!(
                    problems[0].problem,
                    CartProblem::Understocked { available: 2 }
                );
            }
            other => panic!("unexpected: {other:?}"),
        }

        // No side effects: stock unchanged, cart intact
        assert_eq!(front.db().products().require(p.id).await.unwrap().stock, 2);
        assert_eq!(front.carts().view(7).await.unwrap().lines.len(), 1);
        assert_eq!(front.orders().list(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_preview_discount_redeems_nothing() {
        let front = storefront().await;
        let p = front
            .db()
            .products()
            .insert(product("Saffron 5g", 100_000, 10))
            .await
            .unwrap();
        let code = front.db().discounts().insert(save10(Some(5))).await.unwrap();

        front.carts().add(7, p.id, 2).await.unwrap();
        let totals = front.orders().preview_discount(7, "SAVE10").await.unwrap();

        assert_eq!(totals.discount, 15_000);
        assert_eq!(totals.net, 185_000);
        assert_eq!(
            front.db().discounts().get(code.id).await.unwrap().unwrap().used_count,
            0
        );
    }

    #[tokio::test]
    async fn test_preview_below_min_purchase_rejected() {
        let front = storefront().await;
        let p = front
            .db()
            .products()
            .insert(product("Tea Box", 30_000, 10))
            .await
            .unwrap();
        front.db().discounts().insert(save10(None)).await.unwrap();

        front.carts().add(7, p.id, 1).await.unwrap();
        let err = front.orders().preview_discount(7, "SAVE10").await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Core(CoreError::DiscountNotUsable { .. })
        ));
    }

    async fn two_line_order(front: &crate::Storefront) -> (Order, i64, i64) {
        let a = front
            .db()
            .products()
            .insert(product("Saffron 5g", 50_000, 100))
            .await
            .unwrap();
        let b = front
            .db()
            .products()
            .insert(product("Tea Box", 20_000, 100))
            .await
            .unwrap();
        front.carts().add(7, a.id, 3).await.unwrap();
        front.carts().add(7, b.id, 2).await.unwrap();
        let order = front.orders().checkout(7, None).await.unwrap();
        (order, a.id, b.id)
    }

    #[tokio::test]
    async fn test_adjust_set_quantity_recomputes() {
        let front = storefront().await;
        let (order, _, _) = two_line_order(&front).await;
        assert_eq!(order.gross, 190_000);

        let (updated, items) = front
            .orders()
            .adjust_item(order.id, 0, ItemOp::SetQuantity(7))
            .await
            .unwrap();

        assert_eq!(items[0].quantity, 7);
        assert_eq!(items[0].line_total, 350_000);
        assert_eq!(updated.gross, 390_000);
        assert_eq!(updated.net, 390_000);
    }

    #[tokio::test]
    async fn test_adjust_decrease_to_zero_removes_item() {
        let front = storefront().await;
        let (order, _, _) = two_line_order(&front).await;

        // quantity 3, pack 1: three decreases reach zero
        front.orders().adjust_item(order.id, 0, ItemOp::DecreaseByPack).await.unwrap();
        front.orders().adjust_item(order.id, 0, ItemOp::DecreaseByPack).await.unwrap();
        let (updated, items) = front
            .orders()
            .adjust_item(order.id, 0, ItemOp::DecreaseByPack)
            .await
            .unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name_snapshot, "Tea Box");
        assert_eq!(updated.gross, 40_000);
    }

    #[tokio::test]
    async fn test_adjust_refuses_removing_last_item() {
        let front = storefront().await;
        let (order, _, _) = two_line_order(&front).await;

        front.orders().adjust_item(order.id, 0, ItemOp::Remove).await.unwrap();
        let err = front
            .orders()
            .adjust_item(order.id, 0, ItemOp::Remove)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Core(CoreError::LastItemRemoval { .. })
        ));
    }

    #[tokio::test]
    async fn test_adjust_out_of_range_index() {
        let front = storefront().await;
        let (order, _, _) = two_line_order(&front).await;

        let err = front
            .orders()
            .adjust_item(order.id, 9, ItemOp::IncreaseByPack)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Core(CoreError::ItemIndexOutOfRange { .. })
        ));
    }

    #[tokio::test]
    async fn test_adjust_keeps_discount_formula() {
        let front = storefront().await;
        let p = front
            .db()
            .products()
            .insert(product("Saffron 5g", 100_000, 10))
            .await
            .unwrap();
        front.db().discounts().insert(save10(Some(1))).await.unwrap();

        front.carts().add(7, p.id, 2).await.unwrap();
        let order = front.orders().checkout(7, Some("SAVE10")).await.unwrap();
        assert_eq!(order.net, 185_000);

        // Limit-1 code already redeemed by this very order; the
        // adjustment must keep applying it, not zero it out
        let (updated, _) = front
            .orders()
            .adjust_item(order.id, 0, ItemOp::SetQuantity(3))
            .await
            .unwrap();
        assert_eq!(updated.gross, 300_000);
        assert_eq!(updated.discount, 15_000);
        assert_eq!(updated.net, 285_000);
    }

    #[tokio::test]
    async fn test_status_transitions() {
        let front = storefront().await;
        let (order, _, _) = two_line_order(&front).await;

        let confirmed = front
            .orders()
            .set_status(order.id, OrderStatus::Confirmed)
            .await
            .unwrap();
        assert_eq!(confirmed.status, OrderStatus::Confirmed);

        // pending-only transition no longer available
        let err = front
            .orders()
            .set_status(order.id, OrderStatus::Cancelled)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Core(CoreError::InvalidStatusTransition { .. })
        ));

        let completed = front
            .orders()
            .set_status(order.id, OrderStatus::Completed)
            .await
            .unwrap();
        assert_eq!(completed.status, OrderStatus::Completed);

        // Terminal order can no longer be edited
        let err = front
            .orders()
            .adjust_item(order.id, 0, ItemOp::IncreaseByPack)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::OrderNotEditable { .. }));
    }

    #[tokio::test]
    async fn test_listings_by_actor_and_status() {
        let front = storefront().await;
        let (order, _, _) = two_line_order(&front).await;
        front
            .orders()
            .set_status(order.id, OrderStatus::Cancelled)
            .await
            .unwrap();

        assert_eq!(front.orders().list_by_actor(7).await.unwrap().len(), 1);
        assert!(front.orders().list_by_actor(8).await.unwrap().is_empty());
        assert_eq!(
            front
                .orders()
                .list(Some(OrderStatus::Cancelled))
                .await
                .unwrap()
                .len(),
            1
        );
    }
}
