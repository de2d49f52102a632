use storefront_api::routes::health::health_check;

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let body = health_check().await.0;

    assert_eq!(body.message, "Health check");
    // Success envelopes never carry an error code.
    assert!(body.code.is_none());

    let data = body.data.expect("health data");
    assert_eq!(data.status, "ok");
    assert!(body.meta.is_some());
}
