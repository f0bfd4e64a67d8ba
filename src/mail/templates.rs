use ammonia::clean_text;

use super::OutgoingEmail;
use crate::db::models::{BlogPost, ContactMessage, Event, Record};
use crate::slug::slugify;

/// Number of blog posts featured in a newsletter issue.
pub const NEWSLETTER_POSTS: usize = 3;

pub fn contact_notification(to: &str, message: &ContactMessage) -> OutgoingEmail {
    let mut rows = vec![
        ("Name", format!("{} {}", message.first_name, message.last_name)),
        ("Email", message.email.clone()),
        ("Type", message.kind.clone()),
    ];
    if let Some(service) = &message.service_id {
        rows.push(("Service", service.clone()));
    }
    if let Some(date) = &message.appointment_date {
        rows.push(("Appointment date", date.clone()));
    }
    if let Some(time) = &message.appointment_time {
        rows.push(("Appointment time", time.clone()));
    }

    let table: String = rows
        .iter()
        .map(|(label, value)| {
            format!(
                "<tr><td><strong>{}</strong></td><td>{}</td></tr>",
                label,
                clean_text(value)
            )
        })
        .collect();

    OutgoingEmail {
        to: vec![to.to_string()],
        subject: format!(
            "New contact request from {} {}",
            message.first_name, message.last_name
        ),
        html: format!(
            "<h2>New contact request</h2><table>{}</table><p>{}</p>",
            table,
            clean_text(&message.description).replace('\n', "<br>")
        ),
    }
}

/// Body of a newsletter issue; the unsubscribe footer is added per recipient.
pub struct Newsletter {
    pub subject: String,
    html: String,
}

impl Newsletter {
    pub fn build(base_url: &str, posts: &[Record<BlogPost>], events: &[Record<Event>]) -> Self {
        let post_items: String = posts
            .iter()
            .take(NEWSLETTER_POSTS)
            .map(|post| {
                format!(
                    "<li><a href=\"{}/blog/{}\">{}</a> <small>by {}</small></li>",
                    base_url,
                    slugify(&post.data.title),
                    clean_text(&post.data.title),
                    clean_text(&post.data.author)
                )
            })
            .collect();

        let event_items: String = events
            .iter()
            .map(|event| {
                format!(
                    "<li><a href=\"{}/events/{}\">{}</a> &middot; {} &middot; {}</li>",
                    base_url,
                    slugify(&event.data.name),
                    clean_text(&event.data.name),
                    clean_text(&event.data.date),
                    clean_text(&event.data.location)
                )
            })
            .collect();

        let mut html = String::from("<h1>What's new</h1>");
        if post_items.is_empty() {
            html.push_str("<p>No new articles this time.</p>");
        } else {
            html.push_str(&format!("<h2>Latest articles</h2><ul>{post_items}</ul>"));
        }
        if !event_items.is_empty() {
            html.push_str(&format!("<h2>Upcoming events</h2><ul>{event_items}</ul>"));
        }
        Newsletter {
            subject: "Portfolio newsletter".to_string(),
            html,
        }
    }

    pub fn html_for(&self, unsubscribe_url: &str) -> String {
        format!(
            "{}<hr><p><small><a href=\"{}\">Unsubscribe</a></small></p>",
            self.html, unsubscribe_url
        )
    }

    pub fn email_to(&self, address: &str, unsubscribe_url: &str) -> OutgoingEmail {
        OutgoingEmail {
            to: vec![address.to_string()],
            subject: self.subject.clone(),
            html: self.html_for(unsubscribe_url),
        }
    }
}
