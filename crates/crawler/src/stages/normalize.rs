use async_trait::async_trait;
use url::{Host, Url};

use crate::pipeline::{Context, Flow, Stage, StageError};

/// Set of hosts considered part of the same site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteScope {
    key: String,
    include_subdomains: bool,
}

impl SiteScope {
    /// Scope of `url`, or `None` when the URL has no host.
    ///
    /// With `include_subdomains` the key is the last two host labels, so
    /// `a.example.com` and `b.example.com` share the scope `example.com`.
    /// IP hosts always scope to themselves.
    pub fn of(url: &Url, include_subdomains: bool) -> Option<Self> {
        let host = url.host()?;
        let key = match host {
            Host::Domain(domain) if include_subdomains => registrable_part(domain),
            Host::Domain(domain) => domain.to_string(),
            Host::Ipv4(ip) => ip.to_string(),
            Host::Ipv6(ip) => ip.to_string(),
        };
        Some(Self {
            key,
            include_subdomains,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether `url` belongs to this site
    pub fn contains(&self, url: &Url) -> bool {
        Self::of(url, self.include_subdomains).is_some_and(|other| other.key == self.key)
    }
}

fn registrable_part(domain: &str) -> String {
    let labels: Vec<&str> = domain.trim_end_matches('.').split('.').collect();
    if labels.len() <= 2 {
        return labels.join(".");
    }
    labels[labels.len() - 2..].join(".")
}

/// Parse a raw URL into canonical form.
///
/// Lowercases scheme and host, drops default ports and the fragment, and
/// assumes `http://` for scheme-less input such as `example.com/page`.
pub fn normalize_url(raw: &str) -> Result<Url, url::ParseError> {
    let mut url = match Url::parse(raw) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(&format!("http://{raw}"))?,
        Err(e) => return Err(e),
    };
    url.set_fragment(None);
    Ok(url)
}

/// Canonicalizes the URL and records its site scope
pub struct NormalizeUrl {
    pub follow_sub_domain: bool,
}

#[async_trait]
impl Stage for NormalizeUrl {
    fn name(&self) -> &str {
        "normalize_url"
    }

    async fn process(&self, ctx: &mut Context) -> Result<Flow, StageError> {
        let raw = ctx.require_raw_url()?;
        let url = normalize_url(raw)
            .map_err(|e| StageError::InvalidTask(format!("unparsable url {raw:?}: {e}")))?;

        ctx.site = SiteScope::of(&url, self.follow_sub_domain);
        ctx.url = Some(url);
        Ok(Flow::Continue)
    }
}
