use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        version = "0.1.0",
        description = r#"
Storefront backend centered on payment reconciliation: asynchronous gateway
notifications (Paystack, Flutterwave) are converted into exactly-once order
creation and inventory decrement, safe under duplicated and out-of-order
delivery.
"#
    ),
    paths(
        crate::handlers::payments::initialize_payment,
        crate::handlers::payments::verify_payment,
        crate::handlers::payment_webhooks::paystack_webhook,
        crate::handlers::payment_webhooks::flutterwave_webhook,
        crate::handlers::orders::get_order,
        crate::handlers::orders::get_order_by_reference,
        crate::handlers::products::get_product,
    ),
    components(schemas(
        crate::errors::ErrorResponse,
        crate::handlers::payments::InitializePaymentRequest,
        crate::handlers::payments::InitializePaymentResponse,
        crate::handlers::payments::VerifyPaymentResponse,
        crate::handlers::payments::VerifyStatus,
        crate::handlers::payments::OrderSummary,
        crate::handlers::orders::OrderResponse,
        crate::handlers::orders::OrderLineResponse,
        crate::handlers::products::ProductResponse,
        crate::payments::PaymentProvider,
        crate::services::pricing::CartLineInput,
        crate::services::pricing::NormalizedCart,
        crate::services::pricing::NormalizedCartLine,
    )),
    tags(
        (name = "Payments", description = "Payment initialization, webhooks and verification"),
        (name = "Orders", description = "Order lookup"),
        (name = "Products", description = "Catalog stock slice")
    )
)]
pub struct ApiDoc;

/// Swagger UI mounted at /docs, serving the generated document.
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}
