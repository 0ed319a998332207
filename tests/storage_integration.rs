use std::env;
use uuid::Uuid;

use site_audit_api::data::pg_store::PgCustomerStore;
use site_audit_api::db::Database;
use site_audit_api::events::EventBus;
use site_audit_api::models::{CustomerStatus, IntakeRequest};
use site_audit_api::store::CustomerStore;

/// Integration smoke test for the Postgres customer store.
/// Marked ignored to avoid running against production by accident; set TEST_DATABASE_URL to run.
#[tokio::test]
#[ignore]
async fn create_or_get_smoke_test() -> anyhow::Result<()> {
    let db_url = env::var("TEST_DATABASE_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .map_err(|_| anyhow::anyhow!("Set TEST_DATABASE_URL or DATABASE_URL to run this test"))?;

    let db = Database::new(&db_url).await?;
    let store = PgCustomerStore::new(db.pool.clone(), EventBus::default());
    store
        .migrate()
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    // Unique identity to avoid conflicts on repeated runs.
    let marker = Uuid::new_v4().simple().to_string();
    let request = IntakeRequest {
        company_name: format!("Smoke Test Co {}", marker),
        contact_name: None,
        email: format!("smoke-{}@test.invalid", marker),
        phone: None,
        website: "https://smoke.test".to_string(),
        industry: None,
        location: None,
        competitors: vec![],
        target_keywords: vec!["smoke".to_string()],
    };

    let first = store
        .create_or_get(request.clone())
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert!(first.created);
    assert_eq!(first.customer.status, CustomerStatus::Queued);

    let second = store
        .create_or_get(request)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert!(!second.created);
    assert_eq!(first.customer.id, second.customer.id);

    Ok(())
}
