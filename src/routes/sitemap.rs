/**
 * Sitemap Routes
 * sitemap.xml from static pages plus blog, event and project slugs; robots.txt
 */
use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, SecondsFormat, Utc};

use crate::{
    db::{models::text_field, Collection, Document, Store},
    slug::slugify,
    state::AppState,
};

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[derive(Debug, Clone, PartialEq)]
pub struct SitemapEntry {
    pub url: String,
    pub last_modified: DateTime<Utc>,
    pub change_frequency: &'static str,
    pub priority: f32,
}

/// (path, change frequency, priority)
const STATIC_PAGES: [(&str, &str, f32); 7] = [
    ("", "weekly", 1.0),
    ("/about", "monthly", 0.8),
    ("/blog", "daily", 0.9),
    ("/events", "weekly", 0.8),
    ("/projects", "monthly", 0.8),
    ("/services", "monthly", 0.7),
    ("/contact", "yearly", 0.5),
];

/// A collection published under `prefix/<slug of title_field>`.
struct Section {
    collection: Collection,
    prefix: &'static str,
    title_field: &'static str,
    change_frequency: &'static str,
    priority: f32,
}

const SECTIONS: [Section; 3] = [
    Section {
        collection: Collection::Blogs,
        prefix: "/blog",
        title_field: "title",
        change_frequency: "weekly",
        priority: 0.7,
    },
    Section {
        collection: Collection::Events,
        prefix: "/events",
        title_field: "name",
        change_frequency: "monthly",
        priority: 0.6,
    },
    Section {
        collection: Collection::Projects,
        prefix: "/projects",
        title_field: "title",
        change_frequency: "monthly",
        priority: 0.6,
    },
];

impl Section {
    fn entries<'a>(
        &'a self,
        base_url: &'a str,
        docs: &'a [Document],
    ) -> impl Iterator<Item = SitemapEntry> + 'a {
        docs.iter().filter_map(move |doc| {
            let slug = slugify(text_field(&doc.body, self.title_field)?);
            if slug.is_empty() {
                return None;
            }
            Some(SitemapEntry {
                url: format!("{}{}/{}", base_url, self.prefix, slug),
                last_modified: doc.created_at,
                change_frequency: self.change_frequency,
                priority: self.priority,
            })
        })
    }
}

pub fn static_entries(base_url: &str, now: DateTime<Utc>) -> Vec<SitemapEntry> {
    STATIC_PAGES
        .iter()
        .map(|&(path, change_frequency, priority)| SitemapEntry {
            url: format!("{base_url}{path}"),
            last_modified: now,
            change_frequency,
            priority,
        })
        .collect()
}

/// Static pages plus every readable section; a failing collection is
/// logged and left out.
pub async fn collect_entries(store: &dyn Store, base_url: &str) -> Vec<SitemapEntry> {
    let mut entries = static_entries(base_url, Utc::now());
    for section in &SECTIONS {
        match store.list(section.collection).await {
            Ok(docs) => entries.extend(section.entries(base_url, &docs)),
            Err(e) => tracing::warn!(
                collection = %section.collection,
                error = %e,
                "omitting collection from sitemap"
            ),
        }
    }
    entries
}

pub fn render(entries: &[SitemapEntry]) -> String {
    let urls: String = entries
        .iter()
        .map(|entry| {
            format!(
                "  <url>\n    <loc>{}</loc>\n    <lastmod>{}</lastmod>\n    <changefreq>{}</changefreq>\n    <priority>{:.1}</priority>\n  </url>\n",
                escape_xml(&entry.url),
                entry.last_modified.to_rfc3339_opts(SecondsFormat::Secs, true),
                entry.change_frequency,
                entry.priority
            )
        })
        .collect();

    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n{urls}</urlset>\n"
    )
}

/// GET /sitemap.xml
pub async fn sitemap_xml(State(state): State<AppState>) -> Response {
    let entries = collect_entries(state.store.as_ref(), &state.config.public_base_url).await;
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/xml; charset=utf-8"),
            (header::CACHE_CONTROL, "public, max-age=3600"),
        ],
        Body::from(render(&entries)),
    )
        .into_response()
}

/// GET /robots.txt
pub async fn robots_txt(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        format!(
            "User-agent: *\nAllow: /\nDisallow: /dashboard\n\nSitemap: {}/sitemap.xml\n",
            state.config.public_base_url
        ),
    )
}
