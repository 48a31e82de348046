//! The purchase orchestrator.
//!
//! A purchase runs through the same steps whatever pays for it:
//! 1. Validate the product, the account and (for immediate purchases) the stock level.
//! 2. Secure the funds. For [`PaymentMode::Balance`] this is a ledger debit. For [`PaymentMode::External`] the provider
//!    has already collected the money, so there is nothing to do.
//! 3. Create the order in `Pending`.
//! 4. Either allocate stock and complete the order, or leave it waiting as a preorder.
//!
//! Once money has moved, failures are compensated rather than rolled back. A lost race for stock refunds the debit
//! and cancels the order. A refund that cannot be written after every retry is escalated as a `RefundFailed` alert,
//! and an externally paid order that cannot be fulfilled is escalated as a `FulfillmentPending` alert.
//!
//! Notifications and event hooks are best-effort. Their failures are logged and never undo a purchase.
use std::fmt::Debug;

use gamekey_common::Coins;
use log::*;

use crate::{
    db_types::{
        Account,
        LedgerEntryKind,
        NewLedgerEntry,
        NewOrder,
        Order,
        OrderKind,
        OrderStatusType,
        PaymentTransaction,
        Product,
        RelatedEntity,
    },
    events::{
        EventProducers,
        FulfillmentPendingEvent,
        OrderAnnulledEvent,
        OrderCompletedEvent,
        PreorderPlacedEvent,
        RefundFailedEvent,
    },
    store_api::{
        PaymentMode,
        PurchaseConfig,
        PurchaseError,
        PurchaseOutcome,
        PurchaseRequest,
        ReferralApi,
        ReplenishmentResult,
    },
    traits::{
        AccountManagement,
        InventoryError,
        InventoryManagement,
        LedgerManagement,
        Notification,
        Notifier,
        OrderManagement,
        OrderStoreError,
        PaymentManagement,
        StoreDatabase,
    },
};

pub const INVENTORY_EXHAUSTED: &str = "inventory exhausted";

pub struct PurchaseApi<B, N> {
    db: B,
    notifier: N,
    referrals: ReferralApi<B>,
    producers: EventProducers,
    config: PurchaseConfig,
}

impl<B: Debug, N> Debug for PurchaseApi<B, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PurchaseApi ({:?})", self.db)
    }
}

impl<B, N> PurchaseApi<B, N> {
    pub fn new(
        db: B,
        notifier: N,
        referrals: ReferralApi<B>,
        producers: EventProducers,
        config: PurchaseConfig,
    ) -> Self {
        Self { db, notifier, referrals, producers, config }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn producers(&self) -> &EventProducers {
        &self.producers
    }
}

impl<B, N> PurchaseApi<B, N>
where
    B: StoreDatabase,
    N: Notifier,
{
    /// Runs a purchase attempt to completion. See the module documentation for the flow.
    pub async fn purchase(&self, request: PurchaseRequest) -> Result<PurchaseOutcome, PurchaseError> {
        match request.mode.clone() {
            PaymentMode::Balance => self.purchase_with_balance(request).await,
            PaymentMode::External { payment_id, unit_price, currency, is_preorder } => {
                let new_order = NewOrder::for_external_payment(
                    request.account_id,
                    request.product_id,
                    request.quantity,
                    unit_price,
                    &currency,
                    if is_preorder { OrderKind::Preorder } else { OrderKind::Purchase },
                    payment_id,
                )
                .with_note(request.note);
                self.fulfil_external_payment(new_order, payment_id).await
            },
        }
    }

    /// Checks that the purchase can go ahead, without changing anything. Returns the account, the product and whether
    /// the purchase is immediate (`true`) or a preorder (`false`).
    pub async fn validate(
        &self,
        account_id: i64,
        product_id: i64,
        quantity: i64,
    ) -> Result<(Account, Product, bool), PurchaseError> {
        if quantity <= 0 {
            return Err(PurchaseError::Validation(format!("Quantity must be positive. Got {quantity}")));
        }
        let product = self.db.fetch_product(product_id).await?.ok_or(PurchaseError::ProductNotFound(product_id))?;
        let account = self.db.fetch_account(account_id).await?.ok_or(PurchaseError::AccountNotFound(account_id))?;
        let immediate = product.is_available;
        if !immediate && !(product.is_enabled && product.allow_preorder) {
            return Err(PurchaseError::ProductUnavailable(product_id));
        }
        if immediate {
            let available = self.db.available_count(product_id).await?;
            if available < quantity {
                return Err(PurchaseError::InsufficientStock { product_id, requested: quantity, available });
            }
        }
        Ok((account, product, immediate))
    }

    async fn purchase_with_balance(&self, request: PurchaseRequest) -> Result<PurchaseOutcome, PurchaseError> {
        let quantity = request.quantity;
        let (account, product, immediate) = self.validate(request.account_id, request.product_id, quantity).await?;
        let total = product
            .price_coins
            .checked_mul(quantity)
            .ok_or_else(|| PurchaseError::Validation(format!("{quantity} x {} overflows", product.price_coins)))?;
        if total.is_positive() {
            let description = format!("{quantity} x {}", product.name);
            let entry = NewLedgerEntry::new(account.id, total, LedgerEntryKind::ProductPurchase, description);
            self.db.debit(entry).await?;
        }
        let kind = if immediate { OrderKind::Purchase } else { OrderKind::Preorder };
        let new_order =
            NewOrder::for_coins(account.id, product.id, quantity, product.price_coins, kind).with_note(request.note);
        let order = match self.db.insert_order(new_order).await {
            Ok(order) => order,
            Err(e) => {
                error!("🛒️ Account #{} paid {total} but the order could not be created: {e}", account.id);
                if let Err(refund_err) = self.refund(account.id, total, None, "order could not be created").await {
                    warn!("🛒️ {refund_err}");
                }
                return Err(PurchaseError::Internal(e.to_string()));
            },
        };
        info!("🛒️ Order #{} ({kind}) created for account #{}. {total} debited.", order.id, account.id);
        if immediate {
            self.allocate_and_complete(order, &product, &account).await
        } else {
            self.place_preorder(order, &product, &account).await
        }
    }

    /// The second half of an external purchase: the provider has confirmed payment, so the order is created and
    /// fulfilled. No ledger movement takes place.
    async fn fulfil_external_payment(&self, order: NewOrder, payment_id: i64) -> Result<PurchaseOutcome, PurchaseError> {
        if order.quantity <= 0 {
            return Err(PurchaseError::Validation(format!("Quantity must be positive. Got {}", order.quantity)));
        }
        let product =
            self.db.fetch_product(order.product_id).await?.ok_or(PurchaseError::ProductNotFound(order.product_id))?;
        let account =
            self.db.fetch_account(order.account_id).await?.ok_or(PurchaseError::AccountNotFound(order.account_id))?;
        let order = self.db.insert_order(order).await?;
        if let Err(e) = self.db.link_order_to_payment(payment_id, order.id).await {
            warn!("🛒️ Could not link order #{} to payment #{payment_id}: {e}", order.id);
        }
        info!("🛒️ Order #{} ({}) created for external payment #{payment_id}", order.id, order.kind);
        if order.kind == OrderKind::Purchase {
            return self.allocate_and_complete(order, &product, &account).await;
        }
        let order_id = order.id;
        let outcome = self.place_preorder(order, &product, &account).await?;
        // Stock may have arrived while the customer was paying.
        if self.db.available_count(product.id).await? > 0 {
            match self.process_preorders(product.id).await {
                Ok(result) => {
                    if let Some(order) = result.fulfilled.into_iter().find(|o| o.id == order_id) {
                        let items = order.delivered_items.0.clone();
                        return Ok(PurchaseOutcome::Completed { order, items });
                    }
                },
                Err(e) => warn!("🛒️ Could not process preorders for product #{}: {e}", product.id),
            }
        }
        Ok(outcome)
    }

    async fn allocate_and_complete(
        &self,
        order: Order,
        product: &Product,
        account: &Account,
    ) -> Result<PurchaseOutcome, PurchaseError> {
        match self.db.allocate(product.id, order.quantity).await {
            Ok(items) => self.complete_with_items(order, product, account, items).await,
            Err(e) => self.annul_unfulfillable(order, product, account, e).await,
        }
    }

    async fn complete_with_items(
        &self,
        order: Order,
        product: &Product,
        account: &Account,
        items: Vec<String>,
    ) -> Result<PurchaseOutcome, PurchaseError> {
        let note = format!("Delivered {} item(s)", items.len());
        let result = self.db.update_order_status(order.id, OrderStatusType::Completed, Some(note), items.clone()).await;
        let order = match result {
            Ok(order) => order,
            Err(e @ (OrderStoreError::OrderModificationNoOp | OrderStoreError::OrderModificationForbidden { .. })) => {
                warn!("🛒️ Order #{} changed while its items were being allocated. Returning them to stock.", order.id);
                if let Err(release_err) = self.db.release(product.id, &items).await {
                    error!(
                        "🛒️🚨️ Items {items:?} were taken from product #{} for order #{} and could not be returned: \
                         {release_err}",
                        product.id, order.id
                    );
                }
                return Err(e.into());
            },
            Err(e) => {
                error!(
                    "🛒️🚨️ Order #{} was allocated {items:?} but could not be marked complete: {e}. Deliver by hand.",
                    order.id
                );
                return Err(PurchaseError::Internal(e.to_string()));
            },
        };
        info!("🛒️ Order #{} completed with {} item(s)", order.id, items.len());
        self.after_completion(&order, product, account, &items).await;
        Ok(PurchaseOutcome::Completed { order, items })
    }

    async fn after_completion(&self, order: &Order, product: &Product, account: &Account, items: &[String]) {
        let notification =
            Notification::OrderDelivered { order_id: order.id, product_name: product.name.clone(), items: items.to_vec() };
        self.notify(account, &notification).await;
        if let Err(e) = self.referrals.on_first_purchase_completed(order.account_id).await {
            warn!("🛒️ Referral bonus for account #{} could not be processed: {e}", order.account_id);
        }
        self.producers.publish_order_completed(OrderCompletedEvent::new(order.clone(), items.to_vec())).await;
    }

    /// The stock ran out between validation and allocation. Coin-paid orders are cancelled, then refunded, and the
    /// stock error is returned. Externally paid orders are cancelled and escalated, since there is nothing to refund
    /// through the ledger.
    ///
    /// The cancellation is the guarded `Pending -> Cancelled` transition and comes first. If the order has already
    /// left `Pending` (another replenishment run completed it, or an admin closed it), nothing is refunded or sent.
    async fn annul_unfulfillable(
        &self,
        order: Order,
        product: &Product,
        account: &Account,
        cause: InventoryError,
    ) -> Result<PurchaseOutcome, PurchaseError> {
        warn!("🛒️ Order #{} could not be allocated: {cause}", order.id);
        let Some(order) = self.cancel_if_pending(&order, INVENTORY_EXHAUSTED).await? else {
            return Err(PurchaseError::OrderModificationForbidden(format!(
                "Order #{} left Pending while its stock was being allocated",
                order.id
            )));
        };
        if order.is_coin_paid() {
            let refunded = self.refund_order(&order, INVENTORY_EXHAUSTED).await.unwrap_or_default();
            self.publish_annulled(&order, INVENTORY_EXHAUSTED, refunded).await;
            let notification = Notification::OrderCancelled { order_id: order.id, reason: INVENTORY_EXHAUSTED.into(), refunded };
            self.notify(account, &notification).await;
            return Err(cause.into());
        }
        self.publish_annulled(&order, INVENTORY_EXHAUSTED, None).await;
        self.raise_fulfillment_pending(&order, INVENTORY_EXHAUSTED).await;
        let notification = Notification::AwaitingFulfillment { order_id: order.id, product_name: product.name.clone() };
        self.notify(account, &notification).await;
        Ok(PurchaseOutcome::AwaitingFulfillment { order })
    }

    async fn place_preorder(
        &self,
        order: Order,
        product: &Product,
        account: &Account,
    ) -> Result<PurchaseOutcome, PurchaseError> {
        let notification = Notification::PreorderPlaced {
            order_id: order.id,
            product_name: product.name.clone(),
            note: product.preorder_note.clone(),
        };
        self.notify(account, &notification).await;
        self.producers.publish_preorder_placed(PreorderPlacedEvent { order: order.clone() }).await;
        Ok(PurchaseOutcome::Preordered { order })
    }

    /// Offers the current stock to the product's pending preorders, oldest first.
    ///
    /// Processing stops at the first preorder the remaining stock cannot cover. Later, smaller preorders do not jump
    /// the queue.
    pub async fn process_preorders(&self, product_id: i64) -> Result<ReplenishmentResult, PurchaseError> {
        let product = self.db.fetch_product(product_id).await?.ok_or(PurchaseError::ProductNotFound(product_id))?;
        let pending = self.db.fetch_pending_preorders(product_id).await?;
        let mut result = ReplenishmentResult::default();
        if !product.is_enabled {
            debug!("🛒️ Product #{product_id} is disabled. {} preorders stay pending.", pending.len());
            result.still_pending = pending.len();
            return Ok(result);
        }
        let mut queue = pending.into_iter();
        while let Some(order) = queue.next() {
            let available = self.db.available_count(product_id).await?;
            if available < order.quantity {
                debug!(
                    "🛒️ Preorder #{} needs {} items but only {available} are left. Stopping here.",
                    order.id, order.quantity
                );
                result.still_pending = 1 + queue.len();
                break;
            }
            let Some(account) = self.db.fetch_account(order.account_id).await? else {
                warn!("🛒️ Preorder #{} belongs to missing account #{}. Skipping.", order.id, order.account_id);
                continue;
            };
            let order_id = order.id;
            match self.allocate_and_complete(order, &product, &account).await {
                Ok(PurchaseOutcome::Completed { order, .. }) => result.fulfilled.push(order),
                Ok(PurchaseOutcome::AwaitingFulfillment { order }) => result.cancelled.push(order),
                Ok(PurchaseOutcome::Preordered { .. }) => {},
                Err(PurchaseError::InsufficientStock { .. }) => {
                    if let Some(order) = self.db.fetch_order(order_id).await? {
                        result.cancelled.push(order);
                    }
                },
                Err(PurchaseError::OrderModificationForbidden(reason)) => {
                    debug!("🛒️ Preorder #{order_id} was settled elsewhere: {reason}");
                },
                Err(e) => warn!("🛒️ Preorder #{order_id} could not be fulfilled: {e}"),
            }
        }
        info!(
            "🛒️ Replenishment of product #{product_id}: {} fulfilled, {} cancelled, {} still pending",
            result.fulfilled.len(),
            result.cancelled.len(),
            result.still_pending
        );
        Ok(result)
    }

    /// Appends new items to the product's stock, then hands them to waiting preorders.
    pub async fn restock(
        &self,
        product_id: i64,
        items: Vec<String>,
    ) -> Result<(Product, ReplenishmentResult), PurchaseError> {
        if items.is_empty() {
            return Err(PurchaseError::Validation("A restock needs at least one item".into()));
        }
        self.db.restock(product_id, &items).await?;
        let result = self.process_preorders(product_id).await?;
        let product = self.db.fetch_product(product_id).await?.ok_or(PurchaseError::ProductNotFound(product_id))?;
        Ok((product, result))
    }

    /// Completes a pending order by hand, for example after an administrator delivered the goods outside the bot.
    pub async fn fulfill_order(&self, order_id: i64, items: Vec<String>) -> Result<Order, PurchaseError> {
        let note = if items.is_empty() {
            "Fulfilled manually".to_string()
        } else {
            format!("Fulfilled manually with {} item(s)", items.len())
        };
        let order = self.db.update_order_status(order_id, OrderStatusType::Completed, Some(note), items.clone()).await?;
        let product =
            self.db.fetch_product(order.product_id).await?.ok_or(PurchaseError::ProductNotFound(order.product_id))?;
        let account =
            self.db.fetch_account(order.account_id).await?.ok_or(PurchaseError::AccountNotFound(order.account_id))?;
        info!("🛒️ Order #{order_id} fulfilled manually");
        self.after_completion(&order, &product, &account, &items).await;
        Ok(order)
    }

    /// Cancels a pending order. Coin-paid orders get their total back through the ledger.
    ///
    /// The order stays cancelled even if the refund cannot be written. That case has already been escalated as a
    /// `RefundFailed` alert by the time this returns, and the annulled event reports no refund.
    pub async fn cancel_order(&self, order_id: i64, reason: &str) -> Result<Order, PurchaseError> {
        let order =
            self.db.update_order_status(order_id, OrderStatusType::Cancelled, Some(reason.to_string()), Vec::new()).await?;
        let refunded = self.refund_order(&order, reason).await.unwrap_or_else(|e| {
            warn!("🛒️ Order #{order_id} was cancelled without a refund. {e}");
            None
        });
        self.publish_annulled(&order, reason, refunded).await;
        if let Some(account) = self.db.fetch_account(order.account_id).await? {
            let notification = Notification::OrderCancelled { order_id, reason: reason.to_string(), refunded };
            self.notify(&account, &notification).await;
        }
        info!("🛒️ Order #{order_id} cancelled: {reason}");
        Ok(order)
    }

    /// Moves the order from `Pending` to `Cancelled`. Returns `None` if it is no longer pending, in which case whoever
    /// moved it owns the outcome.
    async fn cancel_if_pending(&self, order: &Order, reason: &str) -> Result<Option<Order>, PurchaseError> {
        let result =
            self.db.update_order_status(order.id, OrderStatusType::Cancelled, Some(reason.to_string()), Vec::new()).await;
        match result {
            Ok(cancelled) => Ok(Some(cancelled)),
            Err(e @ (OrderStoreError::OrderModificationNoOp | OrderStoreError::OrderModificationForbidden { .. })) => {
                info!("🛒️ Order #{} was not cancelled ({reason}): {e}", order.id);
                Ok(None)
            },
            Err(e) => {
                error!("🛒️🚨️ Order #{} could not be cancelled ({reason}): {e}", order.id);
                Err(e.into())
            },
        }
    }

    async fn publish_annulled(&self, order: &Order, reason: &str, refunded: Option<Coins>) {
        self.producers.publish_order_annulled(OrderAnnulledEvent::new(order.clone(), reason, refunded)).await;
    }

    /// Refunds the total of a coin-paid order. Returns the amount refunded, if any.
    async fn refund_order(&self, order: &Order, reason: &str) -> Result<Option<Coins>, PurchaseError> {
        let total = order.total_coins();
        if !order.is_coin_paid() || !total.is_positive() {
            return Ok(None);
        }
        self.refund(order.account_id, total, Some(order.id), reason).await?;
        Ok(Some(total))
    }

    /// Credits `amount` back to the account with kind `Refund`, retrying with a growing delay. If every attempt fails,
    /// a `RefundFailed` alert is raised. A silently lost refund is never an option.
    async fn refund(
        &self,
        account_id: i64,
        amount: Coins,
        order_id: Option<i64>,
        reason: &str,
    ) -> Result<(), PurchaseError> {
        if !amount.is_positive() {
            return Ok(());
        }
        let attempts = self.config.refund_retry_attempts.max(1);
        let mut delay = self.config.refund_retry_delay;
        let mut last_error = String::new();
        for attempt in 1..=attempts {
            let mut entry = NewLedgerEntry::new(account_id, amount, LedgerEntryKind::Refund, format!("Refund: {reason}"));
            if let Some(id) = order_id {
                entry = entry.with_related(RelatedEntity::order(id));
            }
            match self.db.credit(entry).await {
                Ok((account, _)) => {
                    info!("🛒️ Refunded {amount} to account #{account_id}. Balance: {}", account.balance);
                    return Ok(());
                },
                Err(e) => {
                    warn!("🛒️ Refund attempt {attempt}/{attempts} of {amount} to account #{account_id} failed: {e}");
                    last_error = e.to_string();
                },
            }
            if attempt < attempts {
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }
        error!(
            "🛒️🚨️ REFUND FAILED. Account #{account_id} is owed {amount} (order {order_id:?}) after {attempts} attempts. \
             Last error: {last_error}"
        );
        let event = RefundFailedEvent { account_id, order_id, amount, attempts, last_error: last_error.clone() };
        self.producers.publish_refund_failed(event).await;
        Err(PurchaseError::Internal(format!("Refund of {amount} to account #{account_id} failed: {last_error}")))
    }

    /// Raises the alert for an externally paid order that could not be fulfilled. The payment is found through the
    /// order's own `payment_id`, so the alert goes out even if the payment was never linked back to the order.
    async fn raise_fulfillment_pending(&self, order: &Order, reason: &str) {
        let lookup = match order.payment_id {
            Some(payment_id) => self.db.fetch_payment(payment_id).await,
            None => self.db.fetch_payments_for_order(order.id).await.map(|mut payments| payments.pop()),
        };
        let payment = lookup.unwrap_or_else(|e| {
            warn!("🛒️ Could not fetch the payment for order #{}: {e}", order.id);
            None
        });
        match payment {
            Some(payment) => self.publish_fulfillment_pending(payment, Some(order.clone()), reason.to_string()).await,
            None => error!("🛒️🚨️ FULFILMENT PENDING for order #{}: {reason}. No payment record was found.", order.id),
        }
    }

    pub(crate) async fn publish_fulfillment_pending(
        &self,
        payment: PaymentTransaction,
        order: Option<Order>,
        reason: String,
    ) {
        error!(
            "🛒️🚨️ FULFILMENT PENDING. Payment {} ({} {}) from account #{} was collected, but the goods were not \
             delivered: {reason}",
            payment.provider_tx_id, payment.amount, payment.currency, payment.account_id
        );
        self.producers.publish_fulfillment_pending(FulfillmentPendingEvent { payment, order, reason }).await;
    }

    pub(crate) async fn notify(&self, account: &Account, notification: &Notification) {
        if let Err(e) = self.notifier.notify(&account.external_id, notification).await {
            warn!("🛒️ Could not notify account #{}: {e}", account.id);
        }
    }
}
