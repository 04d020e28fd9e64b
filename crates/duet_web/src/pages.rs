//! Server-rendered HTML.
//!
//! Every interpolated value goes through `escape_html`.

use axum::response::Html;
use duet_core::{
    Couple, GalleryItem, Identity, Proposal, WordItem, GALLERY_CAPACITY,
};

/// Inline message shown above a form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    Error(String),
}

impl Notice {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::Info(message.into())
    }

    fn render(&self) -> String {
        match self {
            Self::Info(message) => format!(r#"<p class="notice">{}</p>"#, escape_html(message)),
            Self::Error(message) => format!(r#"<p class="error">{}</p>"#, escape_html(message)),
        }
    }
}

pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn layout(title: &str, logged_in: bool, body: &str) -> Html<String> {
    let account = if logged_in {
        r#"<a href="/gallery">Gallery</a> <a href="/words-together">Words</a> <a href="/generate-invitation">Invitation</a> <a href="/profile">Profile</a> <a href="/logout">Log out</a>"#
    } else {
        r#"<a href="/login">Log in</a>"#
    };
    Html(format!(
        r#"<!doctype html>
<html lang="en">
<head><meta charset="utf-8"><title>{title} · Duet</title></head>
<body>
<nav><a href="/">Home</a> <a href="/our-story">Our story</a> {account}</nav>
<main>
<h1>{title}</h1>
{body}
</main>
</body>
</html>"#,
        title = escape_html(title),
    ))
}

fn notice_html(notice: Option<&Notice>) -> String {
    notice.map(Notice::render).unwrap_or_default()
}

pub fn message_page(title: &str, message: &str) -> Html<String> {
    layout(title, false, &format!("<p>{}</p>", escape_html(message)))
}

pub fn home(logged_in: bool) -> Html<String> {
    layout(
        "Welcome",
        logged_in,
        r#"<p>A small shared space for two.</p>
<ul>
<li><a href="/ask-girl">Ask her</a></li>
<li><a href="/ask-boyfriend">Ask him</a></li>
<li><a href="/our-story">Read our story</a></li>
</ul>"#,
    )
}

pub fn proposal(proposal: Proposal, logged_in: bool, message: Option<&str>) -> Html<String> {
    let action = match proposal {
        Proposal::Girlfriend => "/ask-girl",
        Proposal::Boyfriend => "/ask-boyfriend",
    };
    let outcome = message
        .map(|text| format!(r#"<p class="notice">{}</p>"#, escape_html(text)))
        .unwrap_or_default();
    layout(
        proposal.question(),
        logged_in,
        &format!(
            r#"{outcome}
<form method="post" action="{action}">
<button name="response" value="yes">Yes</button>
<button name="response" value="no">No</button>
</form>"#
        ),
    )
}

pub fn our_story(logged_in: bool) -> Html<String> {
    layout(
        "Our story",
        logged_in,
        "<p>It started with a question and a yes. Everything since lives in the gallery \
         and in the words we keep for each other.</p>",
    )
}

pub fn error_login() -> Html<String> {
    layout(
        "Please log in",
        false,
        r#"<p>You need to be logged in to see this page, or the login did not go through.</p>
<p><a href="/login">Try logging in again</a></p>"#,
    )
}

pub fn gallery(items: &[GalleryItem], notice: Option<&Notice>) -> Html<String> {
    let cards: String = items
        .iter()
        .map(|item| {
            format!(
                r#"<figure>
<img src="/uploads/{filename}" alt="{note}" width="240">
<figcaption>{note}</figcaption>
<form method="post" action="/gallery" enctype="multipart/form-data">
<input type="hidden" name="action" value="delete">
<input type="hidden" name="image_id" value="{id}">
<button>Delete</button>
</form>
</figure>"#,
                filename = escape_html(&item.filename),
                note = escape_html(&item.note),
                id = item.id,
            )
        })
        .collect();

    layout(
        "Our gallery",
        true,
        &format!(
            r#"{notice}
<p>{count} of {GALLERY_CAPACITY} photos.</p>
<form method="post" action="/gallery" enctype="multipart/form-data">
<input type="hidden" name="action" value="upload">
<input type="file" name="file" accept=".png,.jpg,.jpeg,.gif" required>
<input type="text" name="note" placeholder="A few words about it">
<button>Upload</button>
</form>
{cards}"#,
            notice = notice_html(notice),
            count = items.len(),
        ),
    )
}

pub fn words(items: &[WordItem], notice: Option<&Notice>) -> Html<String> {
    let entries: String = items
        .iter()
        .map(|word| {
            format!(
                r#"<li><pre>{text}</pre>
<form method="post" action="/words-together">
<input type="hidden" name="action" value="delete">
<input type="hidden" name="word_id" value="{id}">
<button>Delete</button>
</form></li>"#,
                text = escape_html(&word.text),
                id = word.id,
            )
        })
        .collect();

    layout(
        "Words together",
        true,
        &format!(
            r#"{notice}
<form method="post" action="/words-together">
<input type="hidden" name="action" value="add">
<textarea name="text" rows="3" required></textarea>
<button>Save</button>
</form>
<ul>{entries}</ul>"#,
            notice = notice_html(notice),
        ),
    )
}

fn partner_label(couple: &Couple, viewer: &Identity) -> String {
    match couple.partner_of(viewer) {
        Some(partner) => escape_html(partner.as_str()),
        None => "not set".to_string(),
    }
}

pub fn profile(viewer: &Identity, couple: &Couple, notice: Option<&Notice>) -> Html<String> {
    layout(
        "Profile",
        true,
        &format!(
            r#"{notice}
<dl>
<dt>Email</dt><dd>{email}</dd>
<dt>Couple</dt><dd>#{couple_id}</dd>
<dt>Partner</dt><dd>{partner}</dd>
</dl>
<form method="post" action="/add-partner">
<input type="email" name="partner_email" placeholder="partner@example.com" required>
<button>Set partner</button>
</form>
<p><a href="/partner-management">Manage pairing</a></p>"#,
            notice = notice_html(notice),
            email = escape_html(viewer.as_str()),
            couple_id = couple.id,
            partner = partner_label(couple, viewer),
        ),
    )
}

pub fn partner_management(
    viewer: &Identity,
    couple: &Couple,
    notice: Option<&Notice>,
) -> Html<String> {
    let controls = if couple.is_paired() {
        r#"<p>Removing your partner deletes every photo and note you share.</p>
<form method="post" action="/partner-management">
<input type="hidden" name="action" value="remove">
<button>Remove partner</button>
</form>"#
    } else {
        r#"<p>You are not paired. <a href="/profile">Add a partner</a>.</p>"#
    };

    layout(
        "Partner management",
        true,
        &format!(
            "{notice}\n<p>Partner: {partner}</p>\n{controls}",
            notice = notice_html(notice),
            partner = partner_label(couple, viewer),
        ),
    )
}

pub fn invitation(image_url: Option<&str>, notice: Option<&Notice>) -> Html<String> {
    let image = image_url
        .map(|url| {
            format!(
                r#"<img src="{src}" alt="Generated invitation" width="512">"#,
                src = escape_html(url)
            )
        })
        .unwrap_or_default();

    layout(
        "Make an invitation",
        true,
        &format!(
            r#"{notice}
<form method="post" action="/generate-invitation">
<input type="text" name="prompt" placeholder="Describe your invitation" required>
<button>Generate</button>
</form>
{image}"#,
            notice = notice_html(notice),
        ),
    )
}
