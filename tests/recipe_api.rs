mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use common::{body_json, ids, TestApp};
use image::{ImageBuffer, ImageFormat, Rgb};
use serde_json::json;

#[tokio::test]
async fn requires_authentication() {
    let app = TestApp::new().await;
    let (status, body) = app.api(Method::GET, "/api/recipes/", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let (status, _) = app.api(Method::GET, "/api/recipes/", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn accepts_token_scheme_header() {
    let app = TestApp::new().await;
    let cook = app.user("cook@example.com").await;
    let request = Request::builder()
        .uri("/api/recipes/")
        .header(header::AUTHORIZATION, format!("Token {}", cook.token))
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.send(request).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn lists_only_own_recipes_newest_first() {
    let app = TestApp::new().await;
    let cook = app.user("cook@example.com").await;
    let other = app.user("other@example.com").await;

    let first = app.recipe(&cook, "Soup", &[], &[]).await;
    let second = app.recipe(&cook, "Bread", &[], &[]).await;
    app.recipe(&other, "Stew", &[], &[]).await;

    let (status, body) = app.api(Method::GET, "/api/recipes/", Some(&cook.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body), vec![second.id as i64, first.id as i64]);
    assert!(body[0].get("description").is_none(), "list uses the summary shape");
}

#[tokio::test]
async fn filters_by_tag_ids_within_own_recipes() {
    let app = TestApp::new().await;
    let cook = app.user("cook@example.com").await;
    let other = app.user("other@example.com").await;

    let vegan = app.tag(&cook, "Vegan").await;
    let dessert = app.tag(&cook, "Dessert").await;
    let quick = app.tag(&cook, "Quick").await;
    let foreign = app.tag(&other, "Vegan").await;

    let salad = app.recipe(&cook, "Salad", &[vegan], &[]).await;
    let cake = app.recipe(&cook, "Cake", &[dessert, vegan], &[]).await;
    app.recipe(&cook, "Toast", &[quick], &[]).await;
    app.recipe(&other, "Foreign salad", &[foreign], &[]).await;

    let uri = format!("/api/recipes/?tags={vegan},{dessert}");
    let (status, body) = app.api(Method::GET, &uri, Some(&cook.token), None).await;
    assert_eq!(status, StatusCode::OK);
    // Cake carries both tags but appears once.
    assert_eq!(ids(&body), vec![cake.id as i64, salad.id as i64]);

    // Another user's tag id never reveals their recipes.
    let uri = format!("/api/recipes/?tags={foreign}");
    let (_, body) = app.api(Method::GET, &uri, Some(&cook.token), None).await;
    assert!(ids(&body).is_empty());
}

#[tokio::test]
async fn tag_and_ingredient_filters_are_combined_with_and() {
    let app = TestApp::new().await;
    let cook = app.user("cook@example.com").await;

    let dinner = app.tag(&cook, "Dinner").await;
    let chicken = app.ingredient(&cook, "Chicken").await;
    let rice = app.ingredient(&cook, "Rice").await;

    let both = app.recipe(&cook, "Chicken dinner", &[dinner], &[chicken]).await;
    app.recipe(&cook, "Plain chicken", &[], &[chicken]).await;
    app.recipe(&cook, "Rice lunch", &[], &[rice]).await;

    let uri = format!("/api/recipes/?tags={dinner}&ingredients={chicken},{rice}");
    let (status, body) = app.api(Method::GET, &uri, Some(&cook.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body), vec![both.id as i64]);
}

#[tokio::test]
async fn malformed_id_list_is_a_client_error() {
    let app = TestApp::new().await;
    let cook = app.user("cook@example.com").await;
    let (status, body) = app.api(Method::GET, "/api/recipes/?tags=1,abc", Some(&cook.token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("abc"));
}

#[tokio::test]
async fn creates_recipe_with_nested_names() {
    let app = TestApp::new().await;
    let cook = app.user("cook@example.com").await;
    let existing = app.tag(&cook, "Dinner").await;

    let payload = json!({
        "title": "Curry",
        "description": "Spicy",
        "tags": [{"name": "Dinner"}, {"name": "Indian"}],
        "ingredients": [{"name": "Chicken"}]
    });
    let (status, body) = app.api(Method::POST, "/api/recipes/", Some(&cook.token), Some(payload)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["title"], "Curry");
    assert_eq!(body["description"], "Spicy");
    assert!(body["image"].is_null());

    let tag_names: Vec<&str> = body["tags"].as_array().unwrap().iter().map(|t| t["name"].as_str().unwrap()).collect();
    assert_eq!(tag_names, vec!["Dinner", "Indian"]);
    assert_eq!(body["tags"][0]["id"].as_i64().unwrap(), existing as i64, "existing tag is reused");
    assert_eq!(body["ingredients"][0]["name"], "Chicken");

    let (_, tags) = app.api(Method::GET, "/api/tags/", Some(&cook.token), None).await;
    assert_eq!(tags.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn rejected_write_leaves_no_new_tags_or_ingredients() {
    let app = TestApp::new().await;
    let cook = app.user("cook@example.com").await;

    let (status, _) = app
        .api(
            Method::POST,
            "/api/recipes/",
            Some(&cook.token),
            Some(json!({
                "title": "Dal",
                "tags": [{"name": "Indian"}],
                "ingredients": [{"name": "   "}]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let recipe = app.recipe(&cook, "Soup", &[], &[]).await;
    let (status, _) = app
        .api(
            Method::PATCH,
            &format!("/api/recipes/{}/", recipe.id),
            Some(&cook.token),
            Some(json!({"title": "  ", "tags": [{"name": "Winter"}]})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, tags) = app.api(Method::GET, "/api/tags/", Some(&cook.token), None).await;
    assert_eq!(tags, json!([]));
    let (_, ingredients) = app.api(Method::GET, "/api/ingredients/", Some(&cook.token), None).await;
    assert_eq!(ingredients, json!([]));
    let (_, recipes) = app.api(Method::GET, "/api/recipes/", Some(&cook.token), None).await;
    assert_eq!(ids(&recipes), vec![recipe.id as i64]);
}

#[tokio::test]
async fn create_requires_title() {
    let app = TestApp::new().await;
    let cook = app.user("cook@example.com").await;
    let (status, _) = app
        .api(Method::POST, "/api/recipes/", Some(&cook.token), Some(json!({"description": "x"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn patch_keeps_links_put_requires_title() {
    let app = TestApp::new().await;
    let cook = app.user("cook@example.com").await;
    let tag = app.tag(&cook, "Dinner").await;
    let recipe = app.recipe(&cook, "Soup", &[tag], &[]).await;
    let uri = format!("/api/recipes/{}/", recipe.id);

    let (status, body) = app
        .api(Method::PATCH, &uri, Some(&cook.token), Some(json!({"title": "Tomato soup"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Tomato soup");
    assert_eq!(body["description"], "Some description");
    assert_eq!(body["tags"][0]["id"].as_i64().unwrap(), tag as i64);

    let (status, _) = app
        .api(Method::PUT, &uri, Some(&cook.token), Some(json!({"description": "No title"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .api(
            Method::PUT,
            &uri,
            Some(&cook.token),
            Some(json!({"title": "Soup", "description": "Hot", "tags": []})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["tags"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn other_users_recipes_are_not_found() {
    let app = TestApp::new().await;
    let cook = app.user("cook@example.com").await;
    let other = app.user("other@example.com").await;
    let recipe = app.recipe(&cook, "Soup", &[], &[]).await;
    let uri = format!("/api/recipes/{}/", recipe.id);

    let (status, _) = app.api(Method::GET, &uri, Some(&other.token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.api(Method::DELETE, &uri, Some(&other.token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.api(Method::DELETE, &uri, Some(&cook.token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.api(Method::GET, &uri, Some(&cook.token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

fn png_bytes() -> Vec<u8> {
    let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_pixel(8, 8, Rgb([200, 40, 40]));
    let mut bytes = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut bytes), ImageFormat::Png).unwrap();
    bytes
}

fn multipart_request(uri: &str, token: &str, field: &str, content: &[u8]) -> Request<Body> {
    let boundary = "recipe-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{field}\"; filename=\"upload.png\"\r\n").as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: image/png\r\n\r\n");
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn uploads_and_replaces_recipe_image() {
    let app = TestApp::new().await;
    let cook = app.user("cook@example.com").await;
    let recipe = app.recipe(&cook, "Soup", &[], &[]).await;
    let uri = format!("/api/recipes/{}/upload-image/", recipe.id);

    let response = app.send(multipart_request(&uri, &cook.token, "image", &png_bytes())).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["id"].as_i64().unwrap(), recipe.id as i64);
    let first_url = body["image"].as_str().unwrap().to_string();
    assert!(first_url.starts_with("/media/uploads/recipe/"));
    let first_path = app.media.path().join(first_url.trim_start_matches("/media/"));
    assert!(first_path.exists());

    let response = app.send(multipart_request(&uri, &cook.token, "image", &png_bytes())).await;
    assert_eq!(response.status(), StatusCode::OK);
    let second_url = body_json(response).await["image"].as_str().unwrap().to_string();
    assert_ne!(first_url, second_url);
    assert!(!first_path.exists(), "previous image is removed");

    let (_, detail) = app
        .api(Method::GET, &format!("/api/recipes/{}/", recipe.id), Some(&cook.token), None)
        .await;
    assert_eq!(detail["image"], second_url.as_str());
}

#[tokio::test]
async fn rejects_invalid_image_upload() {
    let app = TestApp::new().await;
    let cook = app.user("cook@example.com").await;
    let recipe = app.recipe(&cook, "Soup", &[], &[]).await;
    let uri = format!("/api/recipes/{}/upload-image/", recipe.id);

    let response = app.send(multipart_request(&uri, &cook.token, "image", b"notanimage")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.send(multipart_request(&uri, &cook.token, "photo", &png_bytes())).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let (_, detail) = app
        .api(Method::GET, &format!("/api/recipes/{}/", recipe.id), Some(&cook.token), None)
        .await;
    assert!(detail["image"].is_null());
}
