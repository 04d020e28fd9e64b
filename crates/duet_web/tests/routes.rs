use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use duet_core::db::open_db_in_memory;
use duet_core::{Identity, SessionContext, UploadStore};
use duet_web::identity::{AuthenticationError, IdentityProvider};
use duet_web::invitation::{ExternalServiceError, ImageGenerator};
use duet_web::router;
use duet_web::session::{SessionId, SessionStore};
use duet_web::state::AppState;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

/// Treats the authorization code as the verified email.
struct CodeIsEmail;

#[async_trait]
impl IdentityProvider for CodeIsEmail {
    fn authorize_url(&self, state: &str) -> String {
        format!("https://provider.test/authorize?state={state}")
    }

    async fn resolve(&self, code: &str) -> Result<Identity, AuthenticationError> {
        Identity::parse(code).map_err(AuthenticationError::InvalidIdentity)
    }
}

struct EchoImages;

#[async_trait]
impl ImageGenerator for EchoImages {
    async fn generate(&self, prompt: &str) -> Result<String, ExternalServiceError> {
        if prompt == "fail" {
            return Err(ExternalServiceError::Status(503));
        }
        Ok(format!("https://img.test/{}.png", prompt.replace(' ', "-")))
    }
}

struct Harness {
    state: Arc<AppState>,
    upload_dir: TempDir,
}

impl Harness {
    fn new() -> Self {
        let upload_dir = tempfile::tempdir().unwrap();
        let state = Arc::new(AppState::new(
            open_db_in_memory().unwrap(),
            UploadStore::open(upload_dir.path()).unwrap(),
            SessionStore::new(Duration::from_secs(3600)),
            Arc::new(CodeIsEmail),
            Arc::new(EchoImages),
            false,
        ));
        Self { state, upload_dir }
    }

    async fn send(&self, request: Request<Body>) -> Response {
        router(Arc::clone(&self.state))
            .oneshot(request)
            .await
            .unwrap()
    }

    async fn get(&self, path: &str, cookie: Option<&str>) -> Response {
        let mut builder = Request::get(path);
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    async fn post_form(&self, path: &str, cookie: &str, body: &str) -> Response {
        self.send(
            Request::post(path)
                .header(COOKIE, cookie)
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Runs the full OAuth round trip and returns the authenticated cookie pair.
    async fn login(&self, email: &str) -> String {
        let start = self.get("/login", None).await;
        assert_eq!(start.status(), StatusCode::SEE_OTHER);
        let pending_cookie = cookie_pair(&start);
        let oauth_state = location(&start)
            .split_once("state=")
            .map(|(_, state)| state.to_string())
            .unwrap();

        let callback = self
            .get(
                &format!("/login/callback?code={email}&state={oauth_state}"),
                Some(pending_cookie.as_str()),
            )
            .await;
        assert_eq!(callback.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&callback), "/gallery");
        cookie_pair(&callback)
    }

    fn session(&self, cookie: &str) -> Option<SessionContext> {
        let id = SessionId::parse(cookie.split_once('=').unwrap().1).unwrap();
        self.state.sessions.load(&id).unwrap()
    }
}

fn cookie_pair(response: &Response) -> String {
    response.headers()[SET_COOKIE]
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string()
}

fn location(response: &Response) -> String {
    response.headers()[LOCATION].to_str().unwrap().to_string()
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn multipart(parts: &[(&str, Option<&str>, &[u8])]) -> (String, Vec<u8>) {
    let boundary = "duet-test-boundary";
    let mut body = Vec::new();
    for (name, file_name, bytes) in parts {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        match file_name {
            Some(file_name) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            ),
        }
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={boundary}"), body)
}

async fn upload(harness: &Harness, cookie: &str, file_name: &str, note: &str) -> Response {
    let (content_type, body) = multipart(&[
        ("action", None, &b"upload"[..]),
        ("file", Some(file_name), &b"fake png bytes"[..]),
        ("note", None, note.as_bytes()),
    ]);
    harness
        .send(
            Request::post("/gallery")
                .header(COOKIE, cookie)
                .header(CONTENT_TYPE, content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
}

fn stored_files(harness: &Harness) -> Vec<String> {
    std::fs::read_dir(harness.upload_dir.path())
        .unwrap()
        .map(|entry| entry.unwrap())
        .filter(|entry| entry.path().is_file())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect()
}

#[tokio::test]
async fn gated_routes_redirect_anonymous_callers() {
    let harness = Harness::new();

    for path in [
        "/gallery",
        "/words-together",
        "/profile",
        "/partner-management",
        "/generate-invitation",
        "/uploads/anything.png",
    ] {
        let response = harness.get(path, None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{path}");
        assert_eq!(location(&response), "/error-login", "{path}");
    }

    let forged = harness
        .get("/gallery", Some("duet_session=0123456789abcdef0123456789abcdef"))
        .await;
    assert_eq!(location(&forged), "/error-login");
}

#[tokio::test]
async fn public_pages_render_without_login() {
    let harness = Harness::new();

    for path in ["/", "/ask-girl", "/ask-boyfriend", "/our-story", "/error-login"] {
        assert_eq!(harness.get(path, None).await.status(), StatusCode::OK, "{path}");
    }
}

#[tokio::test]
async fn proposal_answers_render_their_messages() {
    let harness = Harness::new();
    let post = |path: &'static str, body: &'static str| {
        Request::post(path)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap()
    };

    let yes = body_text(harness.send(post("/ask-girl", "response=yes")).await).await;
    assert!(yes.contains("Congratulations! She said YES!"));

    let no = body_text(harness.send(post("/ask-boyfriend", "response=no")).await).await;
    assert!(no.contains("Sorry, he said NO."));

    let other = body_text(harness.send(post("/ask-girl", "response=maybe")).await).await;
    assert!(other.contains("Invalid response."));
}

#[tokio::test]
async fn login_resolves_the_couple_once_and_caches_it() {
    let harness = Harness::new();
    let cookie = harness.login("A@x.com").await;

    assert!(matches!(
        harness.session(&cookie),
        Some(SessionContext::Authenticated { .. })
    ));

    let gallery = harness.get("/gallery", Some(cookie.as_str())).await;
    assert_eq!(gallery.status(), StatusCode::OK);
    assert!(body_text(gallery).await.contains("0 of 10 photos"));

    let paired = harness.session(&cookie).unwrap();
    assert_eq!(paired.couple_id(), Some(1));
    assert_eq!(paired.identity().unwrap().as_str(), "a@x.com");

    let profile = body_text(harness.get("/profile", Some(cookie.as_str())).await).await;
    assert!(profile.contains("a@x.com"));
    assert!(profile.contains("#1"));
}

#[tokio::test]
async fn callback_with_wrong_state_is_rejected() {
    let harness = Harness::new();
    let start = harness.get("/login", None).await;
    let cookie = cookie_pair(&start);
    let oauth_state = location(&start).split_once("state=").unwrap().1.to_string();

    let forged = harness
        .get("/login/callback?code=a@x.com&state=forged", Some(cookie.as_str()))
        .await;
    assert_eq!(forged.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&forged), "/error-login");
    assert!(harness.session(&cookie).unwrap().is_anonymous());

    // The pending state was consumed by the failed attempt.
    let replay = harness
        .get(
            &format!("/login/callback?code=a@x.com&state={oauth_state}"),
            Some(cookie.as_str()),
        )
        .await;
    assert_eq!(location(&replay), "/error-login");

    let without_session = harness
        .get(&format!("/login/callback?code=a@x.com&state={oauth_state}"), None)
        .await;
    assert_eq!(location(&without_session), "/error-login");
}

#[tokio::test]
async fn logout_returns_the_session_to_anonymous() {
    let harness = Harness::new();
    let cookie = harness.login("a@x.com").await;
    assert_eq!(
        harness.get("/gallery", Some(cookie.as_str())).await.status(),
        StatusCode::OK
    );

    let logout = harness.get("/logout", Some(cookie.as_str())).await;
    assert_eq!(location(&logout), "/");
    assert_eq!(harness.session(&cookie), Some(SessionContext::default()));

    let after = harness.get("/gallery", Some(cookie.as_str())).await;
    assert_eq!(location(&after), "/error-login");
}

#[tokio::test]
async fn gallery_upload_lists_and_serves_only_to_the_owning_couple() {
    let harness = Harness::new();
    let ours = harness.login("a@x.com").await;
    let theirs = harness.login("c@x.com").await;

    let rejected = body_text(upload(&harness, &ours, "photo.txt", "nope").await).await;
    assert!(rejected.contains("is not an allowed image type"));
    assert!(stored_files(&harness).is_empty());

    let accepted = upload(&harness, &ours, "photo.png", "hi").await;
    assert_eq!(accepted.status(), StatusCode::OK);
    let page = body_text(accepted).await;
    assert!(page.contains("Photo uploaded."));
    assert!(page.contains("1 of 10 photos"));

    let files = stored_files(&harness);
    assert_eq!(files.len(), 1);
    assert_ne!(files[0], "photo.png");
    assert!(files[0].ends_with("_photo.png"));

    let served = harness
        .get(&format!("/uploads/{}", files[0]), Some(ours.as_str()))
        .await;
    assert_eq!(served.status(), StatusCode::OK);
    assert_eq!(served.headers()[CONTENT_TYPE], "image/png");
    assert_eq!(body_text(served).await, "fake png bytes");

    let foreign = harness
        .get(&format!("/uploads/{}", files[0]), Some(theirs.as_str()))
        .await;
    assert_eq!(foreign.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn gallery_delete_removes_the_photo() {
    let harness = Harness::new();
    let cookie = harness.login("a@x.com").await;
    upload(&harness, &cookie, "gone.gif", "").await;
    assert_eq!(stored_files(&harness).len(), 1);

    let (content_type, body) = multipart(&[
        ("action", None, &b"delete"[..]),
        ("image_id", None, &b"1"[..]),
    ]);
    let deleted = harness
        .send(
            Request::post("/gallery")
                .header(COOKIE, &cookie)
                .header(CONTENT_TYPE, content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await;

    assert_eq!(deleted.status(), StatusCode::OK);
    assert!(body_text(deleted).await.contains("0 of 10 photos"));
    assert!(stored_files(&harness).is_empty());
}

#[tokio::test]
async fn words_are_added_escaped_and_validated() {
    let harness = Harness::new();
    let cookie = harness.login("a@x.com").await;

    let blank = body_text(
        harness
            .post_form("/words-together", &cookie, "action=add&text=+++")
            .await,
    )
    .await;
    assert!(blank.contains("please write something"));

    let added = body_text(
        harness
            .post_form(
                "/words-together",
                &cookie,
                "action=add&text=%3Cb%3Eforever%3C%2Fb%3E",
            )
            .await,
    )
    .await;
    assert!(added.contains("Saved."));
    assert!(added.contains("&lt;b&gt;forever&lt;/b&gt;"));

    let missing = harness
        .post_form("/words-together", &cookie, "action=delete&word_id=99")
        .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn partner_joins_and_removal_purges_shared_content() {
    let harness = Harness::new();
    let a = harness.login("a@x.com").await;
    harness.get("/gallery", Some(a.as_str())).await;

    let invalid = body_text(
        harness
            .post_form("/add-partner", &a, "partner_email=not-an-email")
            .await,
    )
    .await;
    assert!(invalid.contains("class=\"error\""));

    let saved = body_text(
        harness
            .post_form("/add-partner", &a, "partner_email=b%40x.com")
            .await,
    )
    .await;
    assert!(saved.contains("Partner saved."));

    let b = harness.login("b@x.com").await;
    let b_profile = body_text(harness.get("/profile", Some(b.as_str())).await).await;
    assert!(b_profile.contains("#1"));
    assert!(b_profile.contains("a@x.com"));

    upload(&harness, &b, "us.jpg", "together").await;
    assert_eq!(stored_files(&harness).len(), 1);

    let removed = body_text(
        harness
            .post_form("/partner-management", &b, "action=remove")
            .await,
    )
    .await;
    assert!(removed.contains("Partner removed."));
    assert!(stored_files(&harness).is_empty());
    assert_eq!(harness.session(&b).unwrap().couple_id(), None);

    let b_again = body_text(harness.get("/profile", Some(b.as_str())).await).await;
    assert!(b_again.contains("#2"));
}

#[tokio::test]
async fn removed_partner_loses_access_to_the_old_couple() {
    let harness = Harness::new();
    let a = harness.login("a@x.com").await;
    harness
        .post_form("/add-partner", &a, "partner_email=b%40x.com")
        .await;

    let b = harness.login("b@x.com").await;
    harness.get("/words-together", Some(b.as_str())).await;
    assert_eq!(harness.session(&b).unwrap().couple_id(), Some(1));

    let removed = harness
        .post_form("/partner-management", &a, "action=remove")
        .await;
    assert_eq!(removed.status(), StatusCode::OK);

    let written = harness
        .post_form("/words-together", &b, "action=add&text=still-here")
        .await;
    assert_eq!(written.status(), StatusCode::OK);
    assert_eq!(harness.session(&b).unwrap().couple_id(), Some(2));

    let a_words = body_text(harness.get("/words-together", Some(a.as_str())).await).await;
    assert!(!a_words.contains("still-here"));
    let b_words = body_text(harness.get("/words-together", Some(b.as_str())).await).await;
    assert!(b_words.contains("still-here"));
}

#[tokio::test]
async fn replaced_partner_is_moved_out_of_the_couple() {
    let harness = Harness::new();
    let a = harness.login("a@x.com").await;
    harness
        .post_form("/add-partner", &a, "partner_email=b%40x.com")
        .await;
    let b = harness.login("b@x.com").await;
    harness.get("/gallery", Some(b.as_str())).await;
    assert_eq!(harness.session(&b).unwrap().couple_id(), Some(1));

    harness
        .post_form("/add-partner", &a, "partner_email=c%40x.com")
        .await;

    let b_profile = body_text(harness.get("/profile", Some(b.as_str())).await).await;
    assert!(b_profile.contains("#2"));
    assert!(!b_profile.contains("a@x.com"));
}

#[tokio::test]
async fn invitation_failures_are_reported_inline() {
    let harness = Harness::new();
    let cookie = harness.login("a@x.com").await;

    let generated = body_text(
        harness
            .post_form("/generate-invitation", &cookie, "prompt=two+cats")
            .await,
    )
    .await;
    assert!(generated.contains("https://img.test/two-cats.png"));

    let failed = harness
        .post_form("/generate-invitation", &cookie, "prompt=fail")
        .await;
    assert_eq!(failed.status(), StatusCode::OK);
    assert!(body_text(failed).await.contains("Could not generate the invitation"));

    let empty = body_text(
        harness
            .post_form("/generate-invitation", &cookie, "prompt=")
            .await,
    )
    .await;
    assert!(empty.contains("Please describe the invitation first."));
}
