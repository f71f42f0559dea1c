use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use remediation_core::LinkChecker;
use tracing::{debug, info};

/// AWS documentation links as the model tends to write them.
static DOC_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://(?:docs\.aws\.amazon\.com|aws\.amazon\.com)/\S+").expect("valid regex")
});

const LINKS_HEADING: &str = "AWS Documentation Links:";

/// Documentation links in `text`, in order of first appearance, without duplicates.
pub fn extract_doc_links(text: &str) -> Vec<&str> {
    let mut links: Vec<&str> = Vec::new();
    for m in DOC_LINK.find_iter(text) {
        if !links.contains(&m.as_str()) {
            links.push(m.as_str());
        }
    }
    links
}

/// Keep only documentation links that resolve.
///
/// If any survive, the advice is cut where the first of them appeared and the
/// surviving links are listed under a heading. Otherwise the advice is
/// returned unchanged.
pub async fn validate_advice_links(checker: &dyn LinkChecker, advice: &str) -> String {
    let mut valid = Vec::new();
    for url in extract_doc_links(advice) {
        if checker.is_reachable(url).await {
            valid.push(url);
        } else {
            debug!(url, "dropping unreachable documentation link");
        }
    }

    let Some(first) = valid.first() else {
        return advice.to_string();
    };

    info!(count = valid.len(), "validated documentation links");
    let cut = advice.find(first).unwrap_or(advice.len());
    format!(
        "{}\n\n{LINKS_HEADING}\n{}",
        advice[..cut].trim(),
        valid.join("\n")
    )
}

/// Link checker issuing a HEAD request per URL.
///
/// Redirects are not followed: a 3xx already proves the page exists.
pub struct HttpLinkChecker {
    http: reqwest::Client,
}

impl HttpLinkChecker {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl LinkChecker for HttpLinkChecker {
    async fn is_reachable(&self, url: &str) -> bool {
        match self.http.head(url).send().await {
            Ok(resp) => {
                let status = resp.status();
                status.is_success() || status.is_redirection()
            }
            Err(e) => {
                debug!(url, error = %e, "link check failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    struct StaticLinks(HashSet<&'static str>);

    #[async_trait]
    impl LinkChecker for StaticLinks {
        async fn is_reachable(&self, url: &str) -> bool {
            self.0.contains(url)
        }
    }

    #[test]
    fn extracts_only_aws_doc_domains() {
        let text = "See https://docs.aws.amazon.com/ec2/latest/guide.html and \
                    https://example.com/x and https://aws.amazon.com/premiumsupport/kb \
                    again https://docs.aws.amazon.com/ec2/latest/guide.html";
        assert_eq!(
            extract_doc_links(text),
            vec![
                "https://docs.aws.amazon.com/ec2/latest/guide.html",
                "https://aws.amazon.com/premiumsupport/kb",
            ]
        );
    }

    #[tokio::test]
    async fn keeps_only_reachable_links_and_truncates_advice() {
        let advice = "Kill the process.\nMore: https://docs.aws.amazon.com/ok and https://docs.aws.amazon.com/dead";
        let checker = StaticLinks(HashSet::from(["https://docs.aws.amazon.com/ok"]));
        let result = validate_advice_links(&checker, advice).await;
        assert_eq!(
            result,
            "Kill the process.\nMore:\n\nAWS Documentation Links:\nhttps://docs.aws.amazon.com/ok"
        );
        assert!(!result.contains("/dead"));
    }

    #[tokio::test]
    async fn unreachable_links_leave_advice_untouched() {
        let advice = "Read https://docs.aws.amazon.com/nope for details.";
        let checker = StaticLinks(HashSet::new());
        assert_eq!(validate_advice_links(&checker, advice).await, advice);
    }

    #[tokio::test]
    async fn head_check_accepts_success_and_redirect() {
        let mut server = mockito::Server::new_async().await;
        let ok = server.mock("HEAD", "/ok").with_status(200).create_async().await;
        let moved = server
            .mock("HEAD", "/moved")
            .with_status(301)
            .with_header("location", "/elsewhere")
            .create_async()
            .await;
        let gone = server.mock("HEAD", "/gone").with_status(404).create_async().await;

        let checker = HttpLinkChecker::new(Duration::from_secs(5)).unwrap();
        assert!(checker.is_reachable(&format!("{}/ok", server.url())).await);
        assert!(checker.is_reachable(&format!("{}/moved", server.url())).await);
        assert!(!checker.is_reachable(&format!("{}/gone", server.url())).await);

        ok.assert_async().await;
        moved.assert_async().await;
        gone.assert_async().await;
    }

    #[tokio::test]
    async fn connection_errors_are_unreachable() {
        let checker = HttpLinkChecker::new(Duration::from_millis(200)).unwrap();
        assert!(!checker.is_reachable("http://127.0.0.1:9/nothing").await);
    }
}
