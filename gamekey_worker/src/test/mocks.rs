use gamekey_engine::{
    db_types::PaymentStatus,
    traits::{ExternalPayment, ExternalPaymentRequest, PaymentProvider, PaymentProviderError},
};
use mockall::mock;

mock! {
    pub Provider {}
    impl PaymentProvider for Provider {
        fn name(&self) -> &str;
        async fn create_external_payment(&self, request: &ExternalPaymentRequest) -> Result<ExternalPayment, PaymentProviderError>;
        async fn payment_status(&self, provider_tx_id: &str) -> Result<PaymentStatus, PaymentProviderError>;
    }
}
