// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::{json, multipart, png, spawn_app, spawn_app_with_config};
use rambuid::detect::Detection;

fn det(class_id: u32, confidence: f32) -> Detection {
    Detection {
        class_id,
        confidence,
        bbox: Some([4.0, 4.0, 60.0, 60.0]),
    }
}

#[tokio::test]
async fn root_and_health() {
    let app = spawn_app(vec![]);

    let (status, body) = app.get("/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Server Rambuid Berjalan!");

    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["detector"]["loaded"], true);

    let lazy = spawn_app_with_config(|_| {});
    let (_, body) = lazy.get("/health").await;
    assert_eq!(body["detector"]["loaded"], false);
    assert_eq!(body["detector"]["backend"], "yolo");
}

#[tokio::test]
async fn register_and_login() {
    let app = spawn_app(vec![]);
    let user_id = app.register("budi", "rahasia123").await;

    let (status, body) = app
        .send(json(
            Method::POST,
            "/register",
            json!({ "username": "budi", "password": "lainnya123" }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Username sudah terdaftar!");

    let (status, body) = app
        .send(json(
            Method::POST,
            "/login",
            json!({ "username": "budi", "password": "rahasia123" }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Login sukses!");
    assert_eq!(body["user_id"], user_id);

    for (username, password) in [("budi", "salah123"), ("siapa", "rahasia123")] {
        let (status, body) = app
            .send(json(
                Method::POST,
                "/login",
                json!({ "username": username, "password": password }),
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Username atau Password salah!");
    }
}

#[tokio::test]
async fn register_rejects_weak_credentials() {
    let app = spawn_app(vec![]);
    for (username, password) in [("ab", "rahasia123"), ("budi santoso", "rahasia123"), ("budi", "123")] {
        let (status, body) = app
            .send(json(
                Method::POST,
                "/register",
                json!({ "username": username, "password": password }),
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{username}");
        assert!(body["detail"].is_string());
    }
}

#[tokio::test]
async fn malformed_requests_answer_with_detail() {
    let app = spawn_app(vec![]);

    let (status, body) = app
        .send(json(Method::POST, "/register", json!({ "username": "budi" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("password"), "{body}");

    for uri in ["/rambu/abc", "/users/abc/profile", "/jelajahi/1.5"] {
        let (status, body) = app.get(uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert!(body["detail"].is_string(), "{uri}");
    }

    let (status, body) = app.get("/jelajahi/?user_id=abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn sign_create_list_and_serve_image() {
    let app = spawn_app(vec![]);
    let created = app.create_sign("Dilarang Parkir", "Larangan").await;
    app.create_sign("Persimpangan 4", "peringatan").await;

    assert_eq!(created["kategori"], "larangan");
    let gambar = created["gambar_url"].as_str().unwrap();
    assert!(gambar.starts_with("/static/images/rambu/"));
    assert!(gambar.ends_with(".png"));
    assert!(app.image_exists(gambar));

    let (status, _) = app.get(gambar).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.get("/rambu/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (_, body) = app.get("/rambu?kategori=larangan").await;
    let signs = body.as_array().unwrap();
    assert_eq!(signs.len(), 1);
    assert_eq!(signs[0]["nama"], "Dilarang Parkir");

    let (status, _) = app.get("/rambu/?kategori=bebas").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let id = created["id"].as_i64().unwrap();
    let (status, body) = app.get(&format!("/rambu/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deskripsi"], "Contoh");

    let (status, body) = app.get("/rambu/999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Rambu tidak ditemukan");
}

#[tokio::test]
async fn sign_create_validates_input() {
    let app = spawn_app(vec![]);
    let image = png(4, 4);

    let (status, body) = app
        .send(multipart(
            Method::POST,
            "/rambu/",
            &[("nama", "Berhenti"), ("kategori", "bebas")],
            &[("gambar", "stop.png", &image[..])],
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().starts_with("Kategori tidak valid"));

    let (status, _) = app
        .send(multipart(
            Method::POST,
            "/rambu/",
            &[("nama", "Berhenti"), ("kategori", "larangan")],
            &[("gambar", "stop.exe", &image[..])],
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(multipart(
            Method::POST,
            "/rambu/",
            &[("nama", "Berhenti"), ("kategori", "larangan")],
            &[],
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let stored = std::fs::read_dir(app.state.images.root().join("images/rambu"))
        .unwrap()
        .count();
    assert_eq!(stored, 0);
}

#[tokio::test]
async fn sign_update_replaces_image_and_delete_cleans_up() {
    let app = spawn_app(vec![]);
    let created = app.create_sign("Dilarang Masuk", "larangan").await;
    let id = created["id"].as_i64().unwrap();
    let old_image = created["gambar_url"].as_str().unwrap().to_string();

    let image = png(6, 6);
    let (status, updated) = app
        .send(multipart(
            Method::PUT,
            &format!("/rambu/{id}"),
            &[("deskripsi", "Kendaraan dilarang masuk.")],
            &[("gambar", "baru.jpg", &image[..])],
        ))
        .await;
    assert_eq!(status, StatusCode::OK, "{updated}");
    assert_eq!(updated["nama"], "Dilarang Masuk");
    assert_eq!(updated["deskripsi"], "Kendaraan dilarang masuk.");
    let new_image = updated["gambar_url"].as_str().unwrap().to_string();
    assert_ne!(new_image, old_image);
    assert!(!app.image_exists(&old_image));
    assert!(app.image_exists(&new_image));

    let (status, _) = app
        .send(multipart(Method::PUT, "/rambu/999", &[("nama", "X")], &[]))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // a blank description clears it, a missing one leaves it alone
    let (status, cleared) = app
        .send(multipart(Method::PUT, &format!("/rambu/{id}"), &[("deskripsi", "")], &[]))
        .await;
    assert_eq!(status, StatusCode::OK, "{cleared}");
    assert_eq!(cleared["deskripsi"], "");
    let (_, kept) = app
        .send(multipart(Method::PUT, &format!("/rambu/{id}"), &[("nama", "Dilarang Masuk!")], &[]))
        .await;
    assert_eq!(kept["nama"], "Dilarang Masuk!");
    assert_eq!(kept["deskripsi"], "");
    assert_eq!(kept["gambar_url"], new_image.as_str());

    let user_id = app.register("sari", "rahasia123").await;
    let (status, _) = app
        .send(json(
            Method::POST,
            "/jelajahi/",
            json!({ "user_id": user_id, "rambu_id": id, "latitude": -6.2, "longitude": 106.8 }),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app.delete(&format!("/rambu/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Rambu berhasil dihapus");
    assert!(!app.image_exists(&new_image));

    let (_, sightings) = app.get("/jelajahi/").await;
    assert!(sightings.as_array().unwrap().is_empty());

    let (status, _) = app.delete(&format!("/rambu/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn sighting_crud() {
    let app = spawn_app(vec![]);
    let budi = app.register("budi", "rahasia123").await;
    let sari = app.register("sari", "rahasia123").await;
    let sign = app.create_sign("Berhenti", "larangan").await;
    let rambu_id = sign["id"].as_i64().unwrap();

    let (status, created) = app
        .send(json(
            Method::POST,
            "/jelajahi",
            json!({
                "user_id": budi,
                "rambu_id": rambu_id,
                "latitude": -6.9147,
                "longitude": 107.6098,
                "alamat": "Jl. Asia Afrika, Bandung",
            }),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    assert_eq!(created["rambu_nama"], "Berhenti");
    assert_eq!(created["kategori"], "larangan");
    let id = created["id"].as_i64().unwrap();

    app.send(json(
        Method::POST,
        "/jelajahi/",
        json!({ "user_id": sari, "rambu_id": rambu_id, "latitude": 1.0, "longitude": 2.0 }),
    ))
    .await;

    let (_, all) = app.get("/jelajahi/").await;
    assert_eq!(all.as_array().unwrap().len(), 2);
    let (_, mine) = app.get(&format!("/jelajahi/?user_id={budi}")).await;
    assert_eq!(mine.as_array().unwrap().len(), 1);
    assert_eq!(mine[0]["id"], id);

    let (status, _) = app
        .send(json(
            Method::POST,
            "/jelajahi/",
            json!({ "user_id": budi, "rambu_id": 999, "latitude": 0.0, "longitude": 0.0 }),
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .send(json(Method::PUT, &format!("/jelajahi/{id}"), json!({ "latitude": 91.0 })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().starts_with("Koordinat tidak valid"));

    let (status, updated) = app
        .send(json(
            Method::PUT,
            &format!("/jelajahi/{id}"),
            json!({ "catatan": "Tertutup pohon" }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["catatan"], "Tertutup pohon");
    assert_eq!(updated["alamat"], "Jl. Asia Afrika, Bandung");

    let (status, body) = app.delete(&format!("/jelajahi/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Jelajahi berhasil dihapus");

    let (status, _) = app.get(&format!("/jelajahi/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.delete(&format!("/jelajahi/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn profile_update_and_image_lifecycle() {
    let app = spawn_app(vec![]);
    let id = app.register("budi", "rahasia123").await;

    let (status, profile) = app.get(&format!("/users/{id}/profile")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["username"], "budi");
    assert_eq!(profile["total_jelajahi"], 0);
    assert!(profile.get("password_hash").is_none());

    let (status, updated) = app
        .send(json(
            Method::PUT,
            &format!("/users/{id}/profile"),
            json!({ "alamat": "Jl. Merdeka 1", "password": "barubaru1" }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK, "{updated}");
    assert_eq!(updated["alamat"], "Jl. Merdeka 1");

    let (status, _) = app
        .send(json(
            Method::POST,
            "/login",
            json!({ "username": "budi", "password": "barubaru1" }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);

    let image = png(5, 5);
    let (status, first) = app
        .send(multipart(
            Method::PUT,
            &format!("/users/{id}/profile-image"),
            &[],
            &[("file", "me.png", &image[..])],
        ))
        .await;
    assert_eq!(status, StatusCode::OK, "{first}");
    let first_path = first["foto_profil"].as_str().unwrap().to_string();
    assert!(first_path.starts_with("/static/images/profiles/"));

    let (_, second) = app
        .send(multipart(
            Method::PUT,
            &format!("/users/{id}/profile-image"),
            &[],
            &[("file", "me2.webp", &image[..])],
        ))
        .await;
    let second_path = second["foto_profil"].as_str().unwrap().to_string();
    assert!(!app.image_exists(&first_path));
    assert!(app.image_exists(&second_path));

    let (status, _) = app.delete(&format!("/users/{id}/profile-image")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!app.image_exists(&second_path));
    let (_, profile) = app.get(&format!("/users/{id}/profile")).await;
    assert!(profile["foto_profil"].is_null());

    let (status, _) = app
        .send(multipart(
            Method::PUT,
            "/users/999/profile-image",
            &[],
            &[("file", "me.png", &image[..])],
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_account_cascades() {
    let app = spawn_app(vec![]);
    let id = app.register("budi", "rahasia123").await;
    app.register("sari", "rahasia123").await;
    let sign = app.create_sign("Berhenti", "larangan").await;

    app.send(json(
        Method::POST,
        "/jelajahi/",
        json!({ "user_id": id, "rambu_id": sign["id"], "latitude": 0.5, "longitude": 0.5 }),
    ))
    .await;

    let image = png(5, 5);
    let (_, uploaded) = app
        .send(multipart(
            Method::PUT,
            &format!("/users/{id}/profile-image"),
            &[],
            &[("file", "me.png", &image[..])],
        ))
        .await;
    let photo = uploaded["foto_profil"].as_str().unwrap().to_string();

    let (_, profile) = app.get(&format!("/users/{id}/profile")).await;
    assert_eq!(profile["total_jelajahi"], 1);

    let (status, _) = app.delete(&format!("/users/{id}/profile")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!app.image_exists(&photo));

    let (_, users) = app.get("/users/").await;
    let users = users.as_array().unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["username"], "sari");

    let (_, stats) = app.get("/stats/").await;
    assert_eq!(stats["total_users"], 1);
    assert_eq!(stats["total_rambu"], 1);
    assert_eq!(stats["total_jelajahi"], 0);
    assert_eq!(stats["rambu_per_kategori"]["larangan"], 1);

    let (status, _) = app.get(&format!("/users/{id}/profile")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn detection_matches_catalogue() {
    let app = spawn_app(vec![det(0, 0.91), det(2, 0.4)]);
    let sign = app.create_sign("Dilarang Parkir", "larangan").await;

    let photo = png(64, 64);
    let (status, body) = app
        .send(multipart(
            Method::POST,
            "/deteksi-rambu/",
            &[],
            &[("file", "foto.jpg", &photo[..])],
        ))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["detected"], true);
    assert_eq!(body["class_id"], 0);
    assert_eq!(body["label"], "Dilarang Parkir");
    assert_eq!(body["kategori"], "larangan");
    assert_eq!(body["match_type"], "exact");
    assert_eq!(body["rambu"]["id"], sign["id"]);
}

#[tokio::test]
async fn detection_without_hits() {
    let app = spawn_app(vec![det(3, 0.05)]);
    let photo = png(32, 32);
    let (status, body) = app
        .send(multipart(
            Method::POST,
            "/deteksi-rambu",
            &[],
            &[("file", "foto.png", &photo[..])],
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["detected"], false);
    assert_eq!(body["message"], "Tidak ada rambu yang terdeteksi");
}

#[tokio::test]
async fn detection_rejects_bad_uploads() {
    let app = spawn_app(vec![det(0, 0.9)]);

    let (status, _) = app
        .send(multipart(
            Method::POST,
            "/deteksi-rambu/",
            &[],
            &[("file", "foto.jpg", &b"not really a jpeg"[..])],
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(multipart(
            Method::POST,
            "/deteksi-rambu/",
            &[],
            &[("file", "catatan.txt", &b"hello"[..])],
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(multipart(Method::POST, "/deteksi-rambu/", &[("x", "y")], &[]))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unreachable_detector_is_service_unavailable() {
    let app = spawn_app_with_config(|config| {
        config.detector.url = "http://127.0.0.1:9".to_string();
        config.detector.timeout_secs = 1;
        config.detector.retries = 0;
    });

    let photo = png(16, 16);
    let (status, body) = app
        .send(multipart(
            Method::POST,
            "/deteksi-rambu/",
            &[],
            &[("file", "foto.png", &photo[..])],
        ))
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["detail"].as_str().unwrap().contains("Detector not available"));
    assert!(!app.state.detector.is_loaded());
}

#[tokio::test]
async fn garbled_detector_reply_is_service_unavailable() {
    // inference server that is up but answers /predict with HTML
    let stub = axum::Router::new()
        .route("/health", axum::routing::get(|| async { "ok" }))
        .route("/predict", axum::routing::post(|| async { "<html>oops</html>" }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, stub).await.unwrap() });

    let app = spawn_app_with_config(|config| {
        config.detector.url = format!("http://{addr}");
        config.detector.timeout_secs = 5;
        config.detector.retries = 0;
    });

    let photo = png(16, 16);
    let (status, body) = app
        .send(multipart(
            Method::POST,
            "/deteksi-rambu/",
            &[],
            &[("file", "foto.png", &photo[..])],
        ))
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE, "{body}");
    assert!(body["detail"].as_str().unwrap().contains("invalid detector response"));
    assert!(app.state.detector.is_loaded());
}
