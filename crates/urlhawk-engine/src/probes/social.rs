//! Social profile discovery from homepage links.

use async_trait::async_trait;

use urlhawk_core::{Outcome, Target};

use crate::probe::{Probe, ProbeContext};

const SOCIAL_DOMAINS: [&str; 6] = [
    "twitter.com",
    "github.com",
    "linkedin.com",
    "facebook.com",
    "instagram.com",
    "youtube.com",
];
const HOMEPAGE_BODY_LIMIT: usize = 50_000;
const MAX_LINKS: usize = 10;

pub struct SocialLinks;

#[async_trait]
impl Probe for SocialLinks {
    async fn execute(&self, ctx: ProbeContext, target: Target) -> Outcome {
        let Ok(response) = ctx.get(target.as_str()).await else {
            return Outcome::Empty;
        };
        let Ok(body) = ctx.read_text(response, HOMEPAGE_BODY_LIMIT).await else {
            return Outcome::Empty;
        };
        Outcome::list(social_links(&body))
    }
}

/// Distinct `href="..."` targets pointing at a known social network, in
/// page order, capped at ten.
pub fn social_links(html: &str) -> Vec<String> {
    let mut links: Vec<String> = Vec::new();
    for chunk in html.split("href=\"").skip(1) {
        let Some((link, _)) = chunk.split_once('"') else {
            continue;
        };
        if SOCIAL_DOMAINS.iter().any(|d| link.contains(d)) && !links.iter().any(|l| l == link) {
            links.push(link.to_string());
            if links.len() == MAX_LINKS {
                break;
            }
        }
    }
    links
}
