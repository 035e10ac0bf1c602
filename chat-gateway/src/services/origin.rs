use regex::Regex;

/// Decides which browser origins may call the notification endpoints and
/// maps each one to its broadcast topic.
///
/// An origin is admitted when it is exactly `https://<label>.<parent domain>`
/// with a single DNS label in front of the parent.
#[derive(Debug, Clone)]
pub struct OriginPolicy {
    parent_domain: String,
    pattern: Regex,
}

/// An origin that passed the policy, with the values handlers need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedOrigin {
    pub origin: String,
    pub subdomain: String,
    pub topic: String,
}

impl OriginPolicy {
    pub fn new(parent_domain: &str) -> Result<Self, regex::Error> {
        let parent_domain = parent_domain.trim_matches('.').to_ascii_lowercase();
        let pattern = Regex::new(&format!(
            r"(?i)^https://([a-z0-9](?:[a-z0-9-]*[a-z0-9])?)\.{}$",
            regex::escape(&parent_domain)
        ))?;

        Ok(Self {
            parent_domain,
            pattern,
        })
    }

    pub fn parent_domain(&self) -> &str {
        &self.parent_domain
    }

    pub fn is_allowed(&self, origin: &str) -> bool {
        self.pattern.is_match(origin)
    }

    /// The leading label of an allowed origin.
    pub fn subdomain<'a>(&self, origin: &'a str) -> Option<&'a str> {
        self.pattern
            .captures(origin)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }

    /// Topic name for a subdomain: `<subdomain>-<parent with dots as dashes>`.
    pub fn topic_for(&self, subdomain: &str) -> String {
        format!(
            "{}-{}",
            subdomain.to_ascii_lowercase(),
            self.parent_domain.replace('.', "-")
        )
    }

    pub fn admit(&self, origin: &str) -> Option<AllowedOrigin> {
        let subdomain = self.subdomain(origin)?;
        Some(AllowedOrigin {
            origin: origin.to_string(),
            subdomain: subdomain.to_ascii_lowercase(),
            topic: self.topic_for(subdomain),
        })
    }
}
