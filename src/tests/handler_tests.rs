//! tests/handler_tests.rs
//! Pruebas HTTP de extremo a extremo sobre las rutas /api.

#[cfg(test)]
mod tests {
    use actix_web::{http::StatusCode, test, web, App};
    use serde_json::{json, Value};
    use std::sync::Arc;

    use crate::app;
    use crate::tests::{wait_for_task, FakeSender, TestContext};

    macro_rules! test_app {
        ($ctx:expr, $dispatch:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($ctx.campaigns.clone()))
                    .app_data(web::Data::new($ctx.executions.clone()))
                    .app_data(web::Data::new($dispatch.clone()))
                    .configure(app::init_app),
            )
            .await
        };
    }

    fn campaign_body(contacts: Value) -> Value {
        json!({
            "user_id": "user-1",
            "name": "Black Friday",
            "instance_name": "ventas",
            "message_blocks": [
                { "type": "text", "content": "Hola!", "delay_secs": 0 },
                { "type": "media", "content": "Catálogo", "media_url": "https://cdn/x.pdf",
                  "media_type": "document", "file_name": "x.pdf", "delay_secs": 0 }
            ],
            "contacts": contacts
        })
    }

    #[actix_rt::test]
    async fn test_campaign_lifecycle_over_http() {
        let ctx = TestContext::new().await;
        let dispatch = ctx.dispatch(Arc::new(FakeSender::new()));
        let app = test_app!(ctx, dispatch);

        let req = test::TestRequest::post()
            .uri("/api/campaigns")
            .set_json(campaign_body(json!([
                { "phone": "111", "name": "Ana" },
                { "phone": "222" }
            ])))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created: Value = test::read_body_json(resp).await;
        let id = created["id"].as_str().unwrap().to_string();
        assert_eq!(created["status"], "draft");
        assert_eq!(created["total_contacts"], 2);

        // Pausar algo que no corre
        let req = test::TestRequest::post()
            .uri(&format!("/api/campaigns/{}/pause", id))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let req = test::TestRequest::post()
            .uri(&format!("/api/campaigns/{}/start", id))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        let started: Value = test::read_body_json(resp).await;
        assert_eq!(started["campaign"]["status"], "running");
        let task_id = started["task_id"].as_str().unwrap().to_string();

        wait_for_task(&dispatch, &task_id).await;

        let req = test::TestRequest::get()
            .uri(&format!("/api/dispatch/tasks/{}", task_id))
            .to_request();
        let task: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(task["status"], "finished");
        assert_eq!(task["final_campaign_status"], "completed");

        let req = test::TestRequest::get()
            .uri(&format!("/api/campaigns/{}", id))
            .to_request();
        let campaign: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(campaign["status"], "completed");
        assert_eq!(campaign["sent_count"], 4);
        assert_eq!(campaign["failed_count"], 0);

        let req = test::TestRequest::get()
            .uri(&format!("/api/campaigns/{}/executions?status=sent", id))
            .to_request();
        let log: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(log["summary"]["total"], 4);
        assert_eq!(log["summary"]["sent"], 4);
        assert_eq!(log["items"].as_array().unwrap().len(), 4);
    }

    #[actix_rt::test]
    async fn test_start_without_contacts_is_bad_request() {
        let ctx = TestContext::new().await;
        let dispatch = ctx.dispatch(Arc::new(FakeSender::new()));
        let app = test_app!(ctx, dispatch);

        let req = test::TestRequest::post()
            .uri("/api/campaigns")
            .set_json(campaign_body(json!([])))
            .to_request();
        let created: Value = test::call_and_read_body_json(&app, req).await;
        let id = created["id"].as_str().unwrap().to_string();

        let req = test::TestRequest::post()
            .uri(&format!("/api/campaigns/{}/start", id))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
    }

    #[actix_rt::test]
    async fn test_unknown_campaign_and_task_are_not_found() {
        let ctx = TestContext::new().await;
        let dispatch = ctx.dispatch(Arc::new(FakeSender::new()));
        let app = test_app!(ctx, dispatch);

        for uri in [
            "/api/campaigns/nope",
            "/api/campaigns/nope/executions",
            "/api/dispatch/tasks/nope",
        ] {
            let req = test::TestRequest::get().uri(uri).to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{}", uri);
        }

        let req = test::TestRequest::delete()
            .uri("/api/campaigns/nope")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_rt::test]
    async fn test_invalid_execution_status_filter() {
        let ctx = TestContext::new().await;
        let dispatch = ctx.dispatch(Arc::new(FakeSender::new()));
        let app = test_app!(ctx, dispatch);

        let req = test::TestRequest::get()
            .uri("/api/campaigns/any/executions?status=delivered")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_rt::test]
    async fn test_update_running_campaign_is_conflict() {
        let ctx = TestContext::new().await;
        let dispatch = ctx.dispatch(Arc::new(FakeSender::new()));
        let app = test_app!(ctx, dispatch);

        let req = test::TestRequest::post()
            .uri("/api/campaigns")
            .set_json(campaign_body(json!([{ "phone": "111" }])))
            .to_request();
        let created: Value = test::call_and_read_body_json(&app, req).await;
        let id = created["id"].as_str().unwrap().to_string();
        ctx.campaigns.begin_run(&id).await.unwrap();

        let req = test::TestRequest::put()
            .uri(&format!("/api/campaigns/{}", id))
            .set_json(json!({ "name": "otro" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let req = test::TestRequest::delete()
            .uri(&format!("/api/campaigns/{}", id))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[actix_rt::test]
    async fn test_health() {
        let ctx = TestContext::new().await;
        let dispatch = ctx.dispatch(Arc::new(FakeSender::new()));
        let app = test_app!(ctx, dispatch);

        let req = test::TestRequest::get().uri("/api/health").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "ok");
    }
}
