mod common;

use axum::{body, http::Method, response::Response};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use rust_xlsxwriter::Workbook;
use serde_json::{json, Value};
use std::io::Cursor;

use common::{multipart_file, TestApp};

async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

async fn response_bytes(response: Response) -> Vec<u8> {
    body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes")
        .to_vec()
}

fn shipment_payload(shipment_id: &str) -> Value {
    json!({
        "shipment_id": shipment_id,
        "order_id": "ORD-1",
        "item_id": "ITEM-1",
        "sku_id": "SKU-1",
        "reason": "Damaged in transit",
        "aging": 5,
        "receiving_date": "2025-08-02T00:00:00Z",
        "photos_received": true,
        "status": "pending",
        "checked": false
    })
}

/// Builds workbook bytes with the column headers the importer expects.
fn workbook_bytes(rows: &[[&str; 10]]) -> Vec<u8> {
    let headers = [
        "Shipment Id",
        "Order Id",
        "Item ID",
        "SKU ID",
        "REASON",
        "Aging",
        "RECEIVING DATE",
        "PHOTOS RECEIVED",
        "STATUS",
        "CHECK BOX",
    ];
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    for (col, header) in headers.iter().enumerate() {
        worksheet.write_string(0, col as u16, *header).unwrap();
    }
    for (row_idx, row) in rows.iter().enumerate() {
        for (col, value) in row.iter().enumerate() {
            worksheet
                .write_string(row_idx as u32 + 1, col as u16, *value)
                .unwrap();
        }
    }
    workbook.save_to_buffer().unwrap()
}

fn cell_text(value: &Data) -> String {
    match value {
        Data::String(s) => s.clone(),
        Data::Float(f) => format!("{}", *f as i64),
        other => other.to_string(),
    }
}

#[tokio::test]
async fn shipment_crud_lifecycle() {
    let app = TestApp::new().await;

    // Create
    let response = app
        .request(
            Method::POST,
            "/api/v1/shipments",
            Some(shipment_payload("SH-1001")),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);
    let created = response_json(response).await;
    assert_eq!(created["success"], true);
    let id = created["data"]["id"].as_str().expect("record id").to_string();
    assert_eq!(created["data"]["shipment_id"], "SH-1001");
    assert_eq!(created["data"]["status"], "pending");

    // Read
    let response = app
        .request(Method::GET, &format!("/api/v1/shipments/{}", id), None, None)
        .await;
    assert_eq!(response.status(), 200);
    let fetched = response_json(response).await;
    assert_eq!(fetched["data"]["shipment_id"], "SH-1001");

    // Update
    let mut update = shipment_payload("SH-1001");
    update["status"] = json!("delivered");
    update["checked"] = json!(true);
    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/shipments/{}", id),
            Some(update),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);
    let updated = response_json(response).await;
    assert_eq!(updated["data"]["status"], "delivered");
    assert_eq!(updated["data"]["checked"], true);

    // Delete
    let response = app
        .request(
            Method::DELETE,
            &format!("/api/v1/shipments/{}", id),
            None,
            None,
        )
        .await;
    assert_eq!(response.status(), 200);

    // Gone
    let response = app
        .request(Method::GET, &format!("/api/v1/shipments/{}", id), None, None)
        .await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn create_rejects_missing_required_fields() {
    let app = TestApp::new().await;

    let mut payload = shipment_payload("SH-1");
    payload["shipment_id"] = json!("");
    let response = app
        .request(Method::POST, "/api/v1/shipments", Some(payload), None)
        .await;
    assert_eq!(response.status(), 400);
    let body = response_json(response).await;
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("Shipment ID is required"));
}

#[tokio::test]
async fn unknown_shipment_returns_404() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::GET,
            "/api/v1/shipments/00000000-0000-0000-0000-000000000000",
            None,
            None,
        )
        .await;
    assert_eq!(response.status(), 404);

    let response = app
        .request(
            Method::DELETE,
            "/api/v1/shipments/00000000-0000-0000-0000-000000000000",
            None,
            None,
        )
        .await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn list_filters_and_paginates() {
    let app = TestApp::new().await;

    for i in 1..=5 {
        let mut payload = shipment_payload(&format!("SH-{:04}", i));
        if i % 2 == 0 {
            payload["status"] = json!("delivered");
        }
        let response = app
            .request(Method::POST, "/api/v1/shipments", Some(payload), None)
            .await;
        assert_eq!(response.status(), 200);
    }

    // Plain listing
    let response = app
        .request(Method::GET, "/api/v1/shipments?page=1&limit=3", None, None)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["data"]["total"], 5);
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 3);
    assert_eq!(body["data"]["total_pages"], 2);

    // Status filter
    let response = app
        .request(
            Method::GET,
            "/api/v1/shipments?status=delivered",
            None,
            None,
        )
        .await;
    let body = response_json(response).await;
    assert_eq!(body["data"]["total"], 2);

    // "all" disables the status filter
    let response = app
        .request(Method::GET, "/api/v1/shipments?status=all", None, None)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["data"]["total"], 5);

    // Substring search is case-insensitive
    let response = app
        .request(Method::GET, "/api/v1/shipments?search=sh-0003", None, None)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["shipment_id"], "SH-0003");
}

#[tokio::test]
async fn search_treats_like_metacharacters_literally() {
    let app = TestApp::new().await;

    let mut torn = shipment_payload("SH-PCT");
    torn["reason"] = json!("50% torn label");
    for payload in [shipment_payload("SH-PLAIN"), torn] {
        let response = app
            .request(Method::POST, "/api/v1/shipments", Some(payload), None)
            .await;
        assert_eq!(response.status(), 200);
    }

    // "%" only matches records that literally contain a percent sign
    let response = app
        .request(Method::GET, "/api/v1/shipments?search=%25", None, None)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["shipment_id"], "SH-PCT");

    // "_" is literal too, not a single-character wildcard
    let response = app
        .request(Method::GET, "/api/v1/shipments?search=_", None, None)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["data"]["total"], 0);

    // The export filter agrees with the list endpoint on the same term
    let response = app
        .request(
            Method::POST,
            "/api/v1/shipments/export",
            Some(json!({ "filter": { "search": "%" } })),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);
    let bytes = response_bytes(response).await;
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes)).expect("readable workbook");
    let range = workbook.worksheet_range("Shipments").expect("sheet");
    assert_eq!(range.height(), 2);
    assert_eq!(
        range.get_value((1, 0)),
        Some(&Data::String("SH-PCT".to_string()))
    );
}

#[tokio::test]
async fn bulk_create_persists_every_record() {
    let app = TestApp::new().await;

    let payload = json!({
        "shipments": [
            shipment_payload("SH-A"),
            shipment_payload("SH-B"),
            shipment_payload("SH-C"),
        ]
    });
    let response = app
        .request(Method::POST, "/api/v1/shipments/bulk", Some(payload), None)
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 3);

    let response = app
        .request(Method::GET, "/api/v1/shipments", None, None)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["data"]["total"], 3);
}

#[tokio::test]
async fn bulk_create_rejects_invalid_rows_without_persisting() {
    let app = TestApp::new().await;

    let mut bad = shipment_payload("SH-BAD");
    bad["order_id"] = json!("");
    let payload = json!({ "shipments": [shipment_payload("SH-OK"), bad] });
    let response = app
        .request(Method::POST, "/api/v1/shipments/bulk", Some(payload), None)
        .await;
    assert_eq!(response.status(), 400);

    let response = app
        .request(Method::GET, "/api/v1/shipments", None, None)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["data"]["total"], 0);
}

#[tokio::test]
async fn import_parses_workbook_without_persisting() {
    let app = TestApp::new().await;

    let bytes = workbook_bytes(&[
        [
            "SH-1", "ORD-1", "ITEM-1", "SKU-1", "Damaged", "5 days", "2025-08-02", "received",
            "In Transit", "done",
        ],
        [
            "SH-2", "ORD-2", "ITEM-2", "SKU-2", "", "3", "2025-08-01", "no", "Delivered", "",
        ],
    ]);
    let boundary = "test-boundary-7f2a";
    let body = multipart_file(boundary, "shipments.xlsx", &bytes);
    let response = app
        .request_raw(
            Method::POST,
            "/api/v1/shipments/import",
            &format!("multipart/form-data; boundary={}", boundary),
            body,
        )
        .await;
    assert_eq!(response.status(), 200);
    let outcome = response_json(response).await;
    assert_eq!(outcome["success"], true);
    let records = outcome["records"].as_array().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["shipment_id"], "SH-1");
    assert_eq!(records[0]["status"], "in-transit");
    assert_eq!(records[0]["aging"], 5);
    assert_eq!(records[0]["photos_received"], true);
    assert_eq!(records[0]["checked"], true);
    assert_eq!(records[1]["status"], "delivered");

    // Parsing never persists anything
    let response = app
        .request(Method::GET, "/api/v1/shipments", None, None)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["data"]["total"], 0);
}

#[tokio::test]
async fn import_reports_row_errors_and_returns_no_records() {
    let app = TestApp::new().await;

    let bytes = workbook_bytes(&[
        [
            "SH-1", "ORD-1", "ITEM-1", "SKU-1", "", "1", "2025-08-02", "", "Pending", "",
        ],
        [
            "", "ORD-2", "ITEM-2", "SKU-2", "", "2", "2025-08-01", "", "Pending", "",
        ],
    ]);
    let boundary = "test-boundary-7f2a";
    let body = multipart_file(boundary, "shipments.xlsx", &bytes);
    let response = app
        .request_raw(
            Method::POST,
            "/api/v1/shipments/import",
            &format!("multipart/form-data; boundary={}", boundary),
            body,
        )
        .await;
    assert_eq!(response.status(), 200);
    let outcome = response_json(response).await;
    assert_eq!(outcome["success"], false);
    assert!(outcome.get("records").is_none());
    let errors = outcome["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0], "Row 3: Missing Shipment ID");
}

#[tokio::test]
async fn import_rejects_missing_file_field() {
    let app = TestApp::new().await;

    let boundary = "test-boundary-7f2a";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nhello\r\n--{b}--\r\n",
        b = boundary
    );
    let response = app
        .request_raw(
            Method::POST,
            "/api/v1/shipments/import",
            &format!("multipart/form-data; boundary={}", boundary),
            body.into_bytes(),
        )
        .await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn export_returns_downloadable_workbook() {
    let app = TestApp::new().await;

    for shipment_id in ["SH-1", "SH-2"] {
        let response = app
            .request(
                Method::POST,
                "/api/v1/shipments",
                Some(shipment_payload(shipment_id)),
                None,
            )
            .await;
        assert_eq!(response.status(), 200);
    }

    let response = app
        .request(
            Method::POST,
            "/api/v1/shipments/export",
            Some(json!({ "options": { "filename": "batch.xlsx" } })),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);
    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert_eq!(
        content_type,
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
    );
    let disposition = response
        .headers()
        .get("content-disposition")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.contains("batch.xlsx"));

    let bytes = response_bytes(response).await;
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes)).expect("readable workbook");
    let range = workbook.worksheet_range("Shipments").expect("sheet");
    assert_eq!(range.get_value((0, 0)), Some(&Data::String("Shipment ID".to_string())));
    // Header plus two records
    assert_eq!(range.height(), 3);
}

#[tokio::test]
async fn export_filter_restricts_records() {
    let app = TestApp::new().await;

    let mut delivered = shipment_payload("SH-DONE");
    delivered["status"] = json!("delivered");
    for payload in [shipment_payload("SH-OPEN"), delivered] {
        let response = app
            .request(Method::POST, "/api/v1/shipments", Some(payload), None)
            .await;
        assert_eq!(response.status(), 200);
    }

    let response = app
        .request(
            Method::POST,
            "/api/v1/shipments/export",
            Some(json!({ "filter": { "status": "delivered" } })),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);
    let bytes = response_bytes(response).await;
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes)).expect("readable workbook");
    let range = workbook.worksheet_range("Shipments").expect("sheet");
    assert_eq!(range.height(), 2);
    assert_eq!(
        range.get_value((1, 0)),
        Some(&Data::String("SH-DONE".to_string()))
    );
}

#[tokio::test]
async fn iso_export_reimports_without_loss() {
    let app = TestApp::new().await;

    let mut moving = shipment_payload("SH-RT-2");
    moving["status"] = json!("in-transit");
    moving["aging"] = json!(12);
    moving["photos_received"] = json!(false);
    moving["checked"] = json!(true);
    for payload in [shipment_payload("SH-RT-1"), moving] {
        let response = app
            .request(Method::POST, "/api/v1/shipments", Some(payload), None)
            .await;
        assert_eq!(response.status(), 200);
    }

    // Export with exact dates
    let response = app
        .request(
            Method::POST,
            "/api/v1/shipments/export",
            Some(json!({ "options": { "date_format": "iso" } })),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);
    let bytes = response_bytes(response).await;
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes)).expect("readable workbook");
    let range = workbook.worksheet_range("Shipments").expect("sheet");

    // Rebuild an upload-shaped workbook from the exported cells; the first
    // ten export columns line up with the upload columns one-to-one.
    let rows: Vec<[String; 10]> = range
        .rows()
        .skip(1)
        .map(|row| std::array::from_fn(|col| cell_text(&row[col])))
        .collect();
    assert_eq!(rows.len(), 2);
    let row_refs: Vec<[&str; 10]> = rows
        .iter()
        .map(|row| std::array::from_fn(|col| row[col].as_str()))
        .collect();
    let upload = workbook_bytes(&row_refs);

    let boundary = "test-boundary-7f2a";
    let body = multipart_file(boundary, "reimport.xlsx", &upload);
    let response = app
        .request_raw(
            Method::POST,
            "/api/v1/shipments/import",
            &format!("multipart/form-data; boundary={}", boundary),
            body,
        )
        .await;
    assert_eq!(response.status(), 200);
    let outcome = response_json(response).await;
    assert_eq!(outcome["success"], true);
    let records = outcome["records"].as_array().unwrap();
    assert_eq!(records.len(), 2);

    // Every field comes back exactly, regardless of export order
    for record in records {
        match record["shipment_id"].as_str().unwrap() {
            "SH-RT-1" => {
                assert_eq!(record["status"], "pending");
                assert_eq!(record["aging"], 5);
                assert_eq!(record["photos_received"], true);
                assert_eq!(record["checked"], false);
            }
            "SH-RT-2" => {
                assert_eq!(record["status"], "in-transit");
                assert_eq!(record["aging"], 12);
                assert_eq!(record["photos_received"], false);
                assert_eq!(record["checked"], true);
            }
            other => panic!("unexpected shipment id {}", other),
        }
        assert_eq!(record["order_id"], "ORD-1");
        assert_eq!(record["sku_id"], "SKU-1");
        assert_eq!(record["receiving_date"], "2025-08-02T00:00:00Z");
    }
}

#[tokio::test]
async fn stats_aggregates_status_and_photos() {
    let app = TestApp::new().await;

    let mut delivered = shipment_payload("SH-2");
    delivered["status"] = json!("delivered");
    delivered["photos_received"] = json!(false);
    delivered["aging"] = json!(20);
    for payload in [shipment_payload("SH-1"), delivered] {
        let response = app
            .request(Method::POST, "/api/v1/shipments", Some(payload), None)
            .await;
        assert_eq!(response.status(), 200);
    }

    let response = app
        .request(Method::GET, "/api/v1/shipments/stats", None, None)
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    let stats = &body["data"];
    assert_eq!(stats["total"], 2);
    assert_eq!(stats["by_status"]["pending"], 1);
    assert_eq!(stats["by_status"]["delivered"], 1);
    assert_eq!(stats["photos_received"], 1);
    assert_eq!(stats["photos_pending"], 1);
    assert_eq!(stats["aging_buckets"]["4-7 days"], 1);
    assert_eq!(stats["aging_buckets"]["15-30 days"], 1);
    assert_eq!(stats["average_aging"], 12.5);
}

#[tokio::test]
async fn session_login_validate_logout() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/auth/login",
            Some(json!({ "username": "ana", "password": "secret" })),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    let token = body["data"]["token"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["username"], "ana");

    let response = app
        .request(Method::GET, "/auth/session", None, Some(&token))
        .await;
    assert_eq!(response.status(), 200);

    let response = app
        .request(Method::POST, "/auth/logout", None, Some(&token))
        .await;
    assert_eq!(response.status(), 200);

    let response = app
        .request(Method::GET, "/auth/session", None, Some(&token))
        .await;
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn expired_session_is_rejected() {
    let app = TestApp::with_session_ttl(0).await;

    let response = app
        .request(
            Method::POST,
            "/auth/login",
            Some(json!({ "username": "ana", "password": "secret" })),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    let token = body["data"]["token"].as_str().unwrap().to_string();

    let response = app
        .request(Method::GET, "/auth/session", None, Some(&token))
        .await;
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn login_requires_credentials() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/auth/login",
            Some(json!({ "username": "", "password": "" })),
            None,
        )
        .await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn health_and_status_endpoints_respond() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(body["data"]["status"], "healthy");

    let response = app.request(Method::GET, "/api/v1/status", None, None).await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["service"], "shipment-tracker-api");
}
