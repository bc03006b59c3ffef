//! End-to-end API tests over the in-memory stores.

mod common;

use common::spawn_server;
use serde_json::{json, Value as JsonValue};
use sitelog::storage::{BlobStore, InMemoryRecordStore};
use sitelog::StoreError;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn health_reports_ok() -> Result<(), Box<dyn std::error::Error>> {
    let server = spawn_server(InMemoryRecordStore::baseline()).await;
    let resp = server.client.get(server.url("/health")).send().await?;
    assert_eq!(resp.status().as_u16(), 200);
    let body: JsonValue = resp.json().await?;
    assert_eq!(body["data"]["status"], "ok");
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn daily_report_submit_then_resubmit() -> Result<(), Box<dyn std::error::Error>> {
    let server = spawn_server(InMemoryRecordStore::baseline()).await;

    let resp = server
        .client
        .post(server.url("/api/daily-reports"))
        .json(&json!({ "site_id": "site-1", "work_date": "2024-07-01" }))
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 201);
    let body: JsonValue = resp.json().await?;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["report"]["status"], "draft");
    assert_eq!(body["data"]["report"]["author_name"], "Unassigned");
    let id = body["data"]["report"]["id"].clone();

    let resp = server
        .client
        .post(server.url("/api/daily-reports"))
        .json(&json!({
            "site_id": "site-1",
            "work_date": "2024-07-01",
            "status": "submitted",
            "notes": "crane inspection done"
        }))
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 200);
    let body: JsonValue = resp.json().await?;
    assert_eq!(body["message"], "Daily report updated");
    assert_eq!(body["data"]["report"]["id"], id);
    assert_eq!(body["data"]["report"]["status"], "submitted");
    assert_eq!(server.store.rows("daily_reports").await.len(), 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn drifted_table_still_accepts_reports() -> Result<(), Box<dyn std::error::Error>> {
    let store = InMemoryRecordStore::baseline()
        .without_column("daily_reports", "weather")
        .without_column("daily_reports", "location");
    let server = spawn_server(store).await;

    let resp = server
        .client
        .post(server.url("/api/daily-reports"))
        .json(&json!({
            "site_id": "site-2",
            "work_date": "2024-07-02",
            "status": "submitted",
            "author_name": "Park",
            "weather": "rain",
            "location": { "lat": 1.0, "lng": 2.0 }
        }))
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 201);
    let body: JsonValue = resp.json().await?;
    let dropped = body["data"]["dropped_columns"].as_array().cloned().unwrap_or_default();
    assert!(dropped.contains(&json!("weather")));
    assert!(dropped.contains(&json!("location")));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn attachment_failure_does_not_fail_the_report() -> Result<(), Box<dyn std::error::Error>> {
    let server = spawn_server(InMemoryRecordStore::baseline()).await;
    server
        .store
        .fail_next_write("daily_report_photos", StoreError::Other("bucket offline".to_string()))
        .await;

    let resp = server
        .client
        .post(server.url("/api/daily-reports"))
        .json(&json!({
            "site_id": "site-3",
            "work_date": "2024-07-03",
            "materials": [{ "material_name": "gravel", "quantity": 3.5, "unit": "t" }],
            "photos": [{ "url": "https://cdn.example/p1.jpg" }]
        }))
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 201);
    let body: JsonValue = resp.json().await?;
    assert_eq!(body["data"]["attachments"]["completed"], 1);
    assert_eq!(body["data"]["attachments"]["failed"], json!(["photo[0]"]));
    assert_eq!(server.store.rows("daily_report_materials").await.len(), 1);
    assert!(server.store.rows("daily_report_photos").await.is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn bad_requests_are_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let server = spawn_server(InMemoryRecordStore::baseline()).await;

    let resp = server
        .client
        .post(server.url("/api/daily-reports"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 422);

    let resp = server
        .client
        .post(server.url("/api/daily-reports"))
        .json(&json!({ "site_id": "site-1", "work_date": "July 4th" }))
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 400);
    let body: JsonValue = resp.json().await?;
    assert_eq!(body["success"], false);

    let resp = server
        .client
        .put(server.url("/api/daily-reports/999"))
        .json(&json!({ "notes": "nobody home" }))
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 404);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn permission_denied_maps_to_403() -> Result<(), Box<dyn std::error::Error>> {
    let server = spawn_server(InMemoryRecordStore::baseline()).await;
    server
        .store
        .fail_next_write("daily_reports", StoreError::PermissionDenied("daily_reports".to_string()))
        .await;

    let resp = server
        .client
        .post(server.url("/api/daily-reports"))
        .json(&json!({ "site_id": "site-1", "work_date": "2024-07-05" }))
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 403);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn mobile_list_serves_reports() -> Result<(), Box<dyn std::error::Error>> {
    let server = spawn_server(InMemoryRecordStore::baseline()).await;
    for date in ["2024-07-01", "2024-07-02"] {
        server
            .client
            .post(server.url("/api/daily-reports"))
            .json(&json!({ "site_id": "site-1", "work_date": date }))
            .send()
            .await?;
    }

    let resp = server
        .client
        .get(server.url("/api/mobile/daily-reports?site_id=site-1"))
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 200);
    let body: JsonValue = resp.json().await?;
    assert!(body.get("warning").is_none());
    let rows = body["data"].as_array().cloned().unwrap_or_default();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["work_date"], "2024-07-02");
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn mobile_list_falls_back_on_failure() -> Result<(), Box<dyn std::error::Error>> {
    let server = spawn_server(InMemoryRecordStore::baseline()).await;
    server
        .store
        .fail_reads(StoreError::Unavailable("connection refused".to_string()))
        .await;

    let resp = server.client.get(server.url("/api/mobile/daily-reports")).send().await?;
    assert_eq!(resp.status().as_u16(), 200);
    let body: JsonValue = resp.json().await?;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"], json!([]));
    assert_eq!(body["warning"], "fallback");

    let resp = server
        .client
        .get(server.url("/api/mobile/daily-reports?limit=lots"))
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 200);
    let body: JsonValue = resp.json().await?;
    assert_eq!(body["warning"], "fallback");

    server.store.clear_failures().await;
    let resp = server.client.get(server.url("/api/mobile/daily-reports")).send().await?;
    let body: JsonValue = resp.json().await?;
    assert!(body.get("warning").is_none());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shipment_lifecycle_on_a_drifted_table() -> Result<(), Box<dyn std::error::Error>> {
    let store = InMemoryRecordStore::baseline().without_column("material_shipments", "delivered_at");
    let server = spawn_server(store).await;

    let resp = server
        .client
        .post(server.url("/api/shipments"))
        .json(&json!({ "site_id": "site-1", "material_name": "H-beam", "quantity": 24.0, "unit": "pcs" }))
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 201);
    let body: JsonValue = resp.json().await?;
    assert_eq!(body["data"]["status"], "pending");
    let id = body["data"]["id"].as_i64().ok_or("shipment id")?;

    let resp = server
        .client
        .patch(server.url(&format!("/api/shipments/{id}")))
        .json(&json!({ "status": "delivered", "received_by": "foreman" }))
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 200);
    let body: JsonValue = resp.json().await?;
    assert_eq!(body["data"]["status"], "delivered");
    assert!(body["data"].get("delivered_at").is_none());
    assert!(server.store.write_calls("material_shipments").await >= 3);

    let resp = server
        .client
        .patch(server.url(&format!("/api/shipments/{id}")))
        .json(&json!({ "status": "lost" }))
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 400);

    let resp = server
        .client
        .get(server.url("/api/shipments?status=delivered"))
        .send()
        .await?;
    let body: JsonValue = resp.json().await?;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn salary_snapshot_reissue_and_tamper_detection() -> Result<(), Box<dyn std::error::Error>> {
    let server = spawn_server(InMemoryRecordStore::baseline()).await;
    let request = json!({
        "site_id": "site-1",
        "worker_id": "w-42",
        "period": "2024-06",
        "worker_name": "Choi",
        "earnings": [{ "label": "base", "amount": 3200.0 }, { "label": "overtime", "amount": 410.5 }],
        "deductions": [{ "label": "insurance", "amount": 120.0 }]
    });

    let resp = server.client.post(server.url("/api/salary-snapshots")).json(&request).send().await?;
    assert_eq!(resp.status().as_u16(), 201);
    let first: JsonValue = resp.json().await?;
    let id = first["data"]["record"]["id"].as_i64().ok_or("snapshot id")?;
    assert_eq!(first["data"]["record"]["gross_total"], json!(3610.5));

    let resp = server.client.post(server.url("/api/salary-snapshots")).json(&request).send().await?;
    assert_eq!(resp.status().as_u16(), 200);
    let second: JsonValue = resp.json().await?;
    assert_eq!(second["data"]["reissued"], true);
    assert_eq!(second["data"]["record"]["id"].as_i64(), Some(id));
    assert_eq!(server.store.rows("salary_snapshots").await.len(), 1);

    let resp = server
        .client
        .get(server.url(&format!("/api/salary-snapshots/{id}")))
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 200);
    let view: JsonValue = resp.json().await?;
    assert_eq!(view["data"]["digest"], second["data"]["digest"]);
    assert_eq!(view["data"]["snapshot"]["net_total"], json!(3490.5));

    let key = second["data"]["blob_key"].as_str().ok_or("blob key")?;
    assert!(key.starts_with("salary-snapshots/site-1/2024-06/w-42-"));
    let mut forged = view["data"]["snapshot"].clone();
    forged["net_total"] = json!(9999.0);
    server.blobs.put(key, serde_json::to_vec(&forged)?).await?;

    let resp = server
        .client
        .get(server.url(&format!("/api/salary-snapshots/{id}")))
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 500);
    let body: JsonValue = resp.json().await?;
    assert_eq!(body["success"], false);

    let resp = server
        .client
        .get(server.url("/api/salary-snapshots/404"))
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 404);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn snapshots_with_inexact_cent_totals_verify() -> Result<(), Box<dyn std::error::Error>> {
    let server = spawn_server(InMemoryRecordStore::baseline()).await;

    for i in 0..40 {
        let request = json!({
            "site_id": "site-1",
            "worker_id": format!("w-{i}"),
            "period": "2024-06",
            "earnings": [
                { "label": "base", "amount": 3000.0 + f64::from(i) * 7.31 },
                { "label": "overtime", "amount": 410.37 }
            ],
            "deductions": [{ "label": "insurance", "amount": 123.41 }]
        });
        let resp = server.client.post(server.url("/api/salary-snapshots")).json(&request).send().await?;
        assert_eq!(resp.status().as_u16(), 201);
        let issued: JsonValue = resp.json().await?;
        let id = issued["data"]["record"]["id"].as_i64().ok_or("snapshot id")?;

        let resp = server
            .client
            .get(server.url(&format!("/api/salary-snapshots/{id}")))
            .send()
            .await?;
        assert_eq!(resp.status().as_u16(), 200, "snapshot for w-{i} failed verification");
        let view: JsonValue = resp.json().await?;
        assert_eq!(view["data"]["digest"], issued["data"]["digest"]);
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn snapshot_without_digest_column_is_still_verified() -> Result<(), Box<dyn std::error::Error>> {
    let store = InMemoryRecordStore::baseline().without_column("salary_snapshots", "digest");
    let server = spawn_server(store).await;

    let resp = server
        .client
        .post(server.url("/api/salary-snapshots"))
        .json(&json!({
            "site_id": "site-9",
            "worker_id": "w-7",
            "period": "2024-05",
            "earnings": [{ "label": "base", "amount": 2800.0 }]
        }))
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 201);
    let issued: JsonValue = resp.json().await?;
    assert!(issued["data"]["record"].get("digest").is_none());
    let id = issued["data"]["record"]["id"].as_i64().ok_or("snapshot id")?;

    let resp = server
        .client
        .get(server.url(&format!("/api/salary-snapshots/{id}")))
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 200);
    let view: JsonValue = resp.json().await?;
    assert_eq!(view["data"]["digest"], issued["data"]["digest"]);

    let key = issued["data"]["blob_key"].as_str().ok_or("blob key")?;
    server.blobs.put(key, serde_json::to_vec(&json!({ "net_total": 9999999.0 }))?).await?;
    let resp = server
        .client
        .get(server.url(&format!("/api/salary-snapshots/{id}")))
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 500);
    Ok(())
}
