//! The checkout state machine.

use ququ_core::{
    CheckoutStep, DeliveryOption, OrderId, PaymentStatus, RemoteOrderId, normalize_uk_postcode,
    to_minor_units,
};
use serde::Serialize;
use tracing::{info, instrument, warn};

use super::error::{INTERNATIONAL_VALIDATION_MESSAGE, VALIDATION_MESSAGE};
use super::{
    CheckoutError, CheckoutRegion, CheckoutSettings, OrderSummary, ShippingForm, ValidatedShipping,
};
use crate::cart::CartStore;
use crate::error::add_breadcrumb;
use crate::orders::{NewOrder, OrderApi, OrderItem, PAYMENT_METHOD_PAYPAL, PaymentStatusUpdate};
use crate::payment::{
    CaptureResult, PAYMENT_CANCELLED_MESSAGE, PaymentCapture, PaymentError, RemoteOrderHandle,
    RemoteOrderRequest,
};

/// Approval named a remote order this checkout did not start.
pub const UNKNOWN_PAYMENT_MESSAGE: &str =
    "This payment does not match your checkout. Please start the payment again.";

/// The cart total moved away from the amount the payment was priced at.
pub const CART_CHANGED_MESSAGE: &str =
    "Your cart changed after payment started. Please start the payment again.";

/// Where the shopper lands after a successful order.
#[must_use]
pub fn confirmation_path(order_id: &OrderId) -> String {
    format!("/order-confirmation/{order_id}")
}

/// Render-ready view of a checkout.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutView {
    #[serde(flatten)]
    pub step: CheckoutStep,
    pub step_number: u8,
    pub step_title: &'static str,
    pub region: CheckoutRegion,
    pub form: ShippingForm,
    pub summary: OrderSummary,
    pub delivery_estimate: &'static str,
    pub remote_order_id: Option<RemoteOrderId>,
}

/// A remote order and the amount it was priced at.
#[derive(Debug, Clone)]
struct StartedPayment {
    handle: RemoteOrderHandle,
    amount_minor_units: i64,
}

/// An order created for a capture whose payment status is not yet recorded.
#[derive(Debug, Clone)]
struct PendingOrder {
    capture_id: String,
    order_id: OrderId,
}

/// Drives one shopper's checkout.
///
/// Holds the delivery form for the duration of the checkout and remembers
/// enough about an in-flight attempt to make retries safe: a capture is
/// never repeated for the same provider order, and an order created for a
/// capture is reused until its payment status has been recorded.
#[derive(Debug)]
pub struct CheckoutController {
    settings: CheckoutSettings,
    step: CheckoutStep,
    form: ShippingForm,
    validated: Option<ValidatedShipping>,
    remote_order: Option<StartedPayment>,
    capture: Option<(RemoteOrderId, CaptureResult)>,
    pending_order: Option<PendingOrder>,
}

impl CheckoutController {
    #[must_use]
    pub fn new(settings: CheckoutSettings) -> Self {
        let form = ShippingForm::for_region(settings.region);
        Self {
            settings,
            step: CheckoutStep::CollectingDetails,
            form,
            validated: None,
            remote_order: None,
            capture: None,
            pending_order: None,
        }
    }

    #[must_use]
    pub const fn step(&self) -> &CheckoutStep {
        &self.step
    }

    #[must_use]
    pub const fn form(&self) -> &ShippingForm {
        &self.form
    }

    #[must_use]
    pub fn remote_order(&self) -> Option<&RemoteOrderHandle> {
        self.remote_order.as_ref().map(|started| &started.handle)
    }

    /// Subtotal from the cart plus the delivery charge for the chosen option.
    #[must_use]
    pub fn summary(&self, cart: &CartStore) -> OrderSummary {
        OrderSummary::new(
            cart.subtotal(),
            self.delivery_option(),
            self.settings.express_surcharge,
            self.settings.currency,
        )
    }

    #[must_use]
    pub fn view(&self, cart: &CartStore) -> CheckoutView {
        CheckoutView {
            step: self.step.clone(),
            step_number: self.step.number(),
            step_title: self.step.title(),
            region: self.settings.region,
            form: self.form.clone(),
            summary: self.summary(cart),
            delivery_estimate: self.delivery_option().estimate(),
            remote_order_id: self.remote_order().map(|handle| handle.id.clone()),
        }
    }

    /// Validate the delivery form and move to payment.
    ///
    /// An invalid form or an empty cart leaves the controller collecting
    /// details.
    ///
    /// # Errors
    ///
    /// [`CheckoutError::Validation`] with every invalid field, or
    /// [`CheckoutError::EmptyCart`].
    #[instrument(skip_all, fields(region = %self.settings.region))]
    pub fn submit_details(
        &mut self,
        form: ShippingForm,
        cart: &CartStore,
    ) -> Result<&ValidatedShipping, CheckoutError> {
        self.form = form;
        self.validated = None;
        self.remote_order = None;
        self.step = CheckoutStep::CollectingDetails;

        let validated = self.form.validate(self.settings.region).map_err(|fields| {
            info!(invalid = fields.len(), "Delivery details rejected");
            CheckoutError::Validation {
                message: match self.settings.region {
                    CheckoutRegion::Uk => VALIDATION_MESSAGE,
                    CheckoutRegion::International => INTERNATIONAL_VALIDATION_MESSAGE,
                },
                fields,
            }
        })?;

        if cart.is_empty() {
            info!("Checkout blocked, cart is empty");
            return Err(CheckoutError::EmptyCart);
        }

        // Show the canonical postcode back to the shopper.
        self.form.postcode.clone_from(&validated.postcode);
        self.step = CheckoutStep::AwaitingPayment;
        info!("Delivery details accepted");
        Ok(self.validated.insert(validated))
    }

    /// Return from payment to the delivery form.
    ///
    /// # Errors
    ///
    /// [`CheckoutError::WrongStep`] once the order has been placed.
    pub fn back_to_details(&mut self) -> Result<(), CheckoutError> {
        if self.step.is_confirmed() {
            return Err(CheckoutError::WrongStep("Your order has already been placed."));
        }
        self.step = CheckoutStep::CollectingDetails;
        self.remote_order = None;
        Ok(())
    }

    /// Abandon checkout: clear the form and start over.
    ///
    /// Orders already created for an unrecorded payment stay `pending` on the
    /// order API.
    pub fn reset(&mut self) {
        if let Some(pending) = &self.pending_order {
            warn!(order_id = %pending.order_id, "Abandoning checkout with a pending order");
        }
        *self = Self::new(self.settings.clone());
    }

    /// Build the request for the payment provider from the cart and the
    /// accepted delivery details.
    ///
    /// # Errors
    ///
    /// [`CheckoutError::WrongStep`] before details are accepted,
    /// [`CheckoutError::EmptyCart`], or [`CheckoutError::Payment`] if the
    /// total cannot be expressed in minor units.
    pub fn remote_order_request(
        &self,
        cart: &CartStore,
    ) -> Result<RemoteOrderRequest, CheckoutError> {
        let validated = self.awaiting_payment()?;
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let total = self.summary(cart).total();
        let amount_minor_units = to_minor_units(total)
            .ok_or_else(|| PaymentError::Provider(format!("amount {total} out of range")))?;

        Ok(RemoteOrderRequest {
            amount_minor_units,
            currency: self.settings.currency,
            brand_name: self.settings.brand_name.clone(),
            shipping: validated.to_snapshot(),
        })
    }

    /// Register the payment with the provider.
    ///
    /// # Errors
    ///
    /// As [`remote_order_request`](Self::remote_order_request), plus provider
    /// failures.
    #[instrument(skip_all)]
    pub async fn start_payment(
        &mut self,
        cart: &CartStore,
        payments: &dyn PaymentCapture,
    ) -> Result<RemoteOrderHandle, CheckoutError> {
        let request = self.remote_order_request(cart)?;
        let handle = payments.create_remote_order(&request).await?;
        info!(remote_order_id = %handle.id, amount = %request.amount_value(), "Payment started");
        self.remote_order = Some(StartedPayment {
            handle: handle.clone(),
            amount_minor_units: request.amount_minor_units,
        });
        Ok(handle)
    }

    /// Capture the approved payment, then place the order.
    ///
    /// `handle` must be the remote order created by
    /// [`start_payment`](Self::start_payment), and the cart must still come to
    /// the amount it was priced at. A capture that already succeeded for
    /// `handle` is not repeated.
    ///
    /// # Errors
    ///
    /// [`CheckoutError::WrongStep`] for any other remote order, or when the
    /// cart changed after payment started (the remote order is then dropped).
    /// [`CheckoutError::Payment`] if the capture fails (no order calls are
    /// made), otherwise as [`approve_payment`](Self::approve_payment).
    #[instrument(skip_all, fields(remote_order_id = %handle.id))]
    pub async fn capture_and_place(
        &mut self,
        cart: &mut CartStore,
        orders: &dyn OrderApi,
        payments: &dyn PaymentCapture,
        handle: &RemoteOrderHandle,
    ) -> Result<String, CheckoutError> {
        self.awaiting_payment()?;

        let Some(started) = self
            .remote_order
            .as_ref()
            .filter(|started| started.handle.id == handle.id)
        else {
            warn!("Approval for a remote order this checkout did not start");
            return Err(CheckoutError::WrongStep(UNKNOWN_PAYMENT_MESSAGE));
        };
        let priced = started.amount_minor_units;
        let current = self.remote_order_request(cart)?.amount_minor_units;
        if current != priced {
            warn!(priced, current, "Cart changed after payment started");
            self.remote_order = None;
            return Err(CheckoutError::WrongStep(CART_CHANGED_MESSAGE));
        }

        let earlier = self
            .capture
            .as_ref()
            .filter(|(remote_id, _)| remote_id == &handle.id)
            .map(|(_, capture)| capture.clone());
        let capture = if let Some(capture) = earlier {
            info!(capture_id = %capture.id, "Reusing earlier capture");
            capture
        } else {
            let capture = payments.capture_approved(handle).await.inspect_err(|e| {
                warn!(error = %e, "Payment capture failed");
            })?;
            self.capture = Some((handle.id.clone(), capture.clone()));
            capture
        };

        self.approve_payment(cart, orders, &capture).await
    }

    /// Place the order for an approved payment.
    ///
    /// Creates the order as `pending`, records the capture against it, clears
    /// the cart and confirms. Returns the confirmation path. On failure the
    /// cart is untouched and the controller stays awaiting payment; retrying
    /// with the same capture reuses an order that was already created.
    ///
    /// # Errors
    ///
    /// [`CheckoutError::Submission`] with the most specific message the order
    /// API offered, [`CheckoutError::EmptyCart`] or
    /// [`CheckoutError::WrongStep`].
    #[instrument(skip_all, fields(capture_id = %capture.id))]
    pub async fn approve_payment(
        &mut self,
        cart: &mut CartStore,
        orders: &dyn OrderApi,
        capture: &CaptureResult,
    ) -> Result<String, CheckoutError> {
        let validated = self.awaiting_payment()?;
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let existing = self
            .pending_order
            .as_ref()
            .filter(|pending| pending.capture_id == capture.id)
            .map(|pending| pending.order_id.clone());
        let order_id = if let Some(order_id) = existing {
            info!(order_id = %order_id, "Reusing order created for this capture");
            order_id
        } else {
            let order = self.build_order(validated, cart, &capture.id);
            let created = orders
                .create_order(&order)
                .await
                .map_err(CheckoutError::submission)?;
            info!(order_id = %created.id, "Order created");
            self.pending_order = Some(PendingOrder {
                capture_id: capture.id.clone(),
                order_id: created.id.clone(),
            });
            created.id
        };

        if PaymentStatus::from_provider(&capture.status).is_none() {
            warn!(status = %capture.status, "Unrecognised capture status, recording as reported");
        }
        let update = PaymentStatusUpdate {
            payment_id: capture.id.clone(),
            status: PaymentStatus::normalize_provider(&capture.status),
        };
        orders
            .update_payment_status(&order_id, &update)
            .await
            .map_err(CheckoutError::submission)?;

        cart.clear();
        add_breadcrumb("checkout", "Order placed", Some(&[("order_id", order_id.as_str())]));
        info!(order_id = %order_id, status = %update.status, "Order placed");

        let path = confirmation_path(&order_id);
        *self = Self::new(self.settings.clone());
        self.step = CheckoutStep::Confirmed { order_id };
        Ok(path)
    }

    /// The provider reported an error. Stays awaiting payment.
    pub fn payment_failed(&mut self, error: &PaymentError) -> &'static str {
        warn!(error = %error, "Payment provider error");
        self.remote_order = None;
        error.user_message()
    }

    /// The shopper closed the provider window. Stays awaiting payment.
    pub fn payment_cancelled(&mut self) -> &'static str {
        info!("Payment cancelled by shopper");
        self.remote_order = None;
        PAYMENT_CANCELLED_MESSAGE
    }

    fn delivery_option(&self) -> DeliveryOption {
        self.form.delivery_option
    }

    fn awaiting_payment(&self) -> Result<&ValidatedShipping, CheckoutError> {
        match (&self.step, &self.validated) {
            (CheckoutStep::AwaitingPayment, Some(validated)) => Ok(validated),
            (CheckoutStep::Confirmed { .. }, _) => Err(CheckoutError::WrongStep(
                "Your order has already been placed.",
            )),
            _ => Err(CheckoutError::WrongStep(
                "Please complete your delivery details first.",
            )),
        }
    }

    fn build_order(
        &self,
        validated: &ValidatedShipping,
        cart: &CartStore,
        payment_id: &str,
    ) -> NewOrder {
        let mut shipping_address = validated.to_shipping_address();
        if self.settings.region == CheckoutRegion::Uk {
            shipping_address.postcode = normalize_uk_postcode(&shipping_address.postcode);
        }
        let summary = self.summary(cart);

        NewOrder {
            items: cart
                .items()
                .iter()
                .map(|line| OrderItem {
                    name: line.name.clone(),
                    price: line.price,
                    quantity: line.quantity,
                    image: line.image.clone(),
                })
                .collect(),
            shipping_cost: summary.shipping,
            total_amount: summary.total(),
            shipping_address,
            payment_method: PAYMENT_METHOD_PAYPAL.to_string(),
            payment_id: payment_id.to_owned(),
            payment_status: PaymentStatus::Pending,
            delivery_option: validated.delivery_option,
        }
    }
}
