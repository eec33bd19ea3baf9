use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::app::ports::HttpClientPort;
use crate::constants::{skin_code_token, SKIN_CODE_PATTERN, SKIN_CODE_PREFIX};
use crate::error::{MergeError, Result};

static SKIN_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(SKIN_CODE_PATTERN).expect("valid skin code pattern"));
static NAME_RE: Lazy<Regex> = Lazy::new(|| field_pattern("name"));
static RARITY_RE: Lazy<Regex> = Lazy::new(|| field_pattern("rarity"));

fn field_pattern(key: &str) -> Regex {
    Regex::new(&format!(r#""{}":\s*"([^"]+)""#, regex::escape(key))).expect("valid field pattern")
}

/// Display data for a single skin code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkinDetails {
    pub name: String,
    pub rarity: String,
}

impl fmt::Display for SkinDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.rarity)
    }
}

/// Resolves the numeric part of a `CHAMPION_SKIN_RENTAL_<digits>` code.
///
/// Every failure mode (network, missing code, missing field) is `None`; callers leave
/// the code untouched in that case.
#[async_trait]
pub trait SkinResolver: Send + Sync {
    async fn resolve(&self, code: &str) -> Option<SkinDetails>;
}

/// Find the object keyed by `code` in the skin document and pull `name` and `rarity` out of it.
///
/// This is a pattern search, not a JSON parse: the object body is taken up to the first
/// closing brace, so fields after a nested object are not visible. `name` and `rarity` sit
/// before any nested object in the upstream document.
pub fn extract_skin_details(document: &str, code: &str) -> Option<SkinDetails> {
    let object_re = Regex::new(&format!(r#""{}":\s*\{{([^}}]+)\}}"#, regex::escape(code))).ok()?;
    let body = object_re.captures(document)?.get(1)?.as_str();
    let name = NAME_RE.captures(body)?.get(1)?.as_str().to_string();
    let rarity = RARITY_RE.captures(body)?.get(1)?.as_str().to_string();
    Some(SkinDetails { name, rarity })
}

/// Resolver backed by the remote skin document.
///
/// The document is downloaded on first use and held for the lifetime of the resolver.
/// A failed download is not remembered, so the next lookup makes its own single attempt.
pub struct RemoteSkinResolver {
    http: Arc<dyn HttpClientPort>,
    url: String,
    document: OnceCell<String>,
}

impl RemoteSkinResolver {
    pub fn new(http: Arc<dyn HttpClientPort>, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
            document: OnceCell::new(),
        }
    }

    async fn fetch_document(&self) -> std::result::Result<String, String> {
        let resp = self.http.get(&self.url).await?;
        if !resp.is_success() {
            return Err(format!("skin data endpoint returned status {}", resp.status));
        }
        Ok(resp.body)
    }
}

#[async_trait]
impl SkinResolver for RemoteSkinResolver {
    async fn resolve(&self, code: &str) -> Option<SkinDetails> {
        let document = match self
            .document
            .get_or_try_init(|| self.fetch_document())
            .await
        {
            Ok(doc) => doc,
            Err(e) => {
                warn!("Skin data unavailable for code {}: {}", code, e);
                return None;
            }
        };

        let details = extract_skin_details(document, code);
        if details.is_none() {
            debug!("Skin code {} not found in skin data", code);
        }
        details
    }
}

/// Memoizes another resolver for the duration of a run, misses included.
///
/// Two workers asking for the same code at the same time may both reach the inner
/// resolver; the later insert simply overwrites an identical entry.
pub struct CachingResolver<R> {
    inner: R,
    cache: Mutex<HashMap<String, Option<SkinDetails>>>,
}

impl<R: SkinResolver> CachingResolver<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn cached(&self, code: &str) -> Option<Option<SkinDetails>> {
        let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.get(code).cloned()
    }

    pub fn cached_codes(&self) -> usize {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl<R: SkinResolver> SkinResolver for CachingResolver<R> {
    async fn resolve(&self, code: &str) -> Option<SkinDetails> {
        if let Some(hit) = self.cached(code) {
            return hit;
        }
        let resolved = self.inner.resolve(code).await;
        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(code.to_string(), resolved.clone());
        resolved
    }
}

/// Resolve a single code given either as digits or as the full `CHAMPION_SKIN_RENTAL_` token
pub async fn resolve_token(resolver: &dyn SkinResolver, raw: &str) -> Result<SkinDetails> {
    let code = raw.trim().trim_start_matches(SKIN_CODE_PREFIX);
    resolver
        .resolve(code)
        .await
        .ok_or_else(|| MergeError::SkinNotFound(code.to_string()))
}

/// A line after code substitution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichedLine {
    pub line: String,
    pub resolved: usize,
    pub unresolved: usize,
}

/// Distinct numeric codes embedded in `line`, in sorted order
pub fn find_skin_codes(line: &str) -> BTreeSet<String> {
    SKIN_CODE_RE
        .captures_iter(line)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// Replace every resolvable skin code in `line` with `"<name> (<rarity>)"`.
///
/// Each code token is matched whole, so `CHAMPION_SKIN_RENTAL_12` never rewrites the front
/// of `CHAMPION_SKIN_RENTAL_123`. Unresolved tokens stay verbatim.
pub async fn enrich_line(line: &str, resolver: &dyn SkinResolver) -> EnrichedLine {
    let codes = find_skin_codes(line);
    if codes.is_empty() {
        return EnrichedLine {
            line: line.to_string(),
            resolved: 0,
            unresolved: 0,
        };
    }

    let mut labels: HashMap<String, String> = HashMap::new();
    let mut unresolved = 0;
    for code in &codes {
        match resolver.resolve(code).await {
            Some(details) => {
                labels.insert(code.clone(), details.to_string());
            }
            None => unresolved += 1,
        }
    }

    let rewritten = SKIN_CODE_RE.replace_all(line, |caps: &regex::Captures| {
        let code = &caps[1];
        labels
            .get(code)
            .cloned()
            .unwrap_or_else(|| skin_code_token(code))
    });

    EnrichedLine {
        line: rewritten.into_owned(),
        resolved: labels.len(),
        unresolved,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::HttpGetResult;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const DOCUMENT: &str = r#"{
        "1001": {
            "id": 1001,
            "isBase": false,
            "name": "Star Guardian Ahri",
            "rarity": "kEpic",
            "chromas": [{"id": 1}]
        },
        "1002":{"name":"Arcade Sona","rarity":"kLegendary"},
        "1003": { "id": 1003, "name": "Broken Skin" },
        "10011": { "name": "Wrong Skin", "rarity": "kNoRarity" }
    }"#;

    struct FakeHttp {
        status: u16,
        body: String,
        calls: AtomicUsize,
    }

    impl FakeHttp {
        fn ok(body: &str) -> Self {
            Self { status: 200, body: body.to_string(), calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl HttpClientPort for FakeHttp {
        async fn get(&self, _url: &str) -> std::result::Result<HttpGetResult, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(HttpGetResult { status: self.status, body: self.body.clone() })
        }
    }

    struct FailingHttp;

    #[async_trait]
    impl HttpClientPort for FailingHttp {
        async fn get(&self, _url: &str) -> std::result::Result<HttpGetResult, String> {
            Err("connection refused".to_string())
        }
    }

    struct CountingResolver {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SkinResolver for CountingResolver {
        async fn resolve(&self, code: &str) -> Option<SkinDetails> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (code == "7").then(|| SkinDetails { name: "Seven".into(), rarity: "kEpic".into() })
        }
    }

    #[test]
    fn test_extract_finds_fields_across_whitespace() {
        let details = extract_skin_details(DOCUMENT, "1001").unwrap();
        assert_eq!(details.name, "Star Guardian Ahri");
        assert_eq!(details.rarity, "kEpic");

        let compact = extract_skin_details(DOCUMENT, "1002").unwrap();
        assert_eq!(compact.to_string(), "Arcade Sona (kLegendary)");
    }

    #[test]
    fn test_extract_missing_code_or_field() {
        assert!(extract_skin_details(DOCUMENT, "999999").is_none());
        assert!(extract_skin_details(DOCUMENT, "1003").is_none());
        assert!(extract_skin_details("not json at all", "1001").is_none());
    }

    #[test]
    fn test_extract_requires_exact_key() {
        // "1001" must not pick up the object keyed "10011" or vice versa
        let details = extract_skin_details(DOCUMENT, "10011").unwrap();
        assert_eq!(details.name, "Wrong Skin");
    }

    #[tokio::test]
    async fn test_remote_resolver_downloads_once() {
        let http = Arc::new(FakeHttp::ok(DOCUMENT));
        let resolver = RemoteSkinResolver::new(http.clone(), "http://skins.test/skins.json");

        assert!(resolver.resolve("1001").await.is_some());
        assert!(resolver.resolve("1002").await.is_some());
        assert!(resolver.resolve("999999").await.is_none());
        assert_eq!(http.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_remote_resolver_non_200_is_not_found() {
        let http = Arc::new(FakeHttp { status: 503, body: DOCUMENT.to_string(), calls: AtomicUsize::new(0) });
        let resolver = RemoteSkinResolver::new(http.clone(), "http://skins.test/skins.json");
        assert!(resolver.resolve("1001").await.is_none());
        // failure is not remembered; the next code tries again
        assert!(resolver.resolve("1002").await.is_none());
        assert_eq!(http.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_remote_resolver_transport_error_is_not_found() {
        let resolver = RemoteSkinResolver::new(Arc::new(FailingHttp), "http://skins.test");
        assert!(resolver.resolve("1001").await.is_none());
    }

    #[tokio::test]
    async fn test_caching_resolver_remembers_hits_and_misses() {
        let cache = CachingResolver::new(CountingResolver { calls: AtomicUsize::new(0) });
        for _ in 0..3 {
            assert!(cache.resolve("7").await.is_some());
            assert!(cache.resolve("8").await.is_none());
        }
        assert_eq!(cache.inner.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.cached_codes(), 2);
    }

    #[tokio::test]
    async fn test_enrich_line_substitutes_resolved_codes() {
        let resolver = CountingResolver { calls: AtomicUsize::new(0) };
        let out = enrich_line(
            "bob:CHAMPION_SKIN_RENTAL_7:CHAMPION_SKIN_RENTAL_7:true:false:tag",
            &resolver,
        )
        .await;
        assert_eq!(out.line, "bob:Seven (kEpic):Seven (kEpic):true:false:tag");
        assert_eq!(out.resolved, 1);
        assert_eq!(out.unresolved, 0);
        // duplicate codes in a line are looked up once
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_enrich_line_leaves_unresolved_verbatim() {
        let resolver = CountingResolver { calls: AtomicUsize::new(0) };
        let line = "bob:CHAMPION_SKIN_RENTAL_999999:CHAMPION_SKIN_RENTAL_77:true:false:tag";
        let out = enrich_line(line, &resolver).await;
        assert_eq!(out.line, line);
        assert_eq!(out.resolved, 0);
        assert_eq!(out.unresolved, 2);
    }

    #[tokio::test]
    async fn test_enrich_line_does_not_touch_longer_codes() {
        // "7" resolves, "77" does not; the 77 token must stay whole
        let resolver = CountingResolver { calls: AtomicUsize::new(0) };
        let out = enrich_line("CHAMPION_SKIN_RENTAL_7:CHAMPION_SKIN_RENTAL_77", &resolver).await;
        assert_eq!(out.line, "Seven (kEpic):CHAMPION_SKIN_RENTAL_77");
    }

    #[tokio::test]
    async fn test_resolve_token_accepts_digits_or_full_token() {
        let resolver = CountingResolver { calls: AtomicUsize::new(0) };
        assert_eq!(resolve_token(&resolver, "7").await.unwrap().name, "Seven");
        assert_eq!(resolve_token(&resolver, " CHAMPION_SKIN_RENTAL_7 ").await.unwrap().name, "Seven");
        assert!(matches!(
            resolve_token(&resolver, "CHAMPION_SKIN_RENTAL_8").await,
            Err(MergeError::SkinNotFound(code)) if code == "8"
        ));
    }

    #[test]
    fn test_only_ascii_digits_form_codes() {
        // Arabic-Indic and full-width digits are not part of a code
        assert!(find_skin_codes("CHAMPION_SKIN_RENTAL_\u{0661}\u{0662}").is_empty());
        assert!(find_skin_codes("CHAMPION_SKIN_RENTAL_\u{FF11}").is_empty());
        let codes = find_skin_codes("CHAMPION_SKIN_RENTAL_12\u{0663}");
        assert_eq!(codes.into_iter().collect::<Vec<_>>(), vec!["12".to_string()]);
    }

    #[test]
    fn test_find_skin_codes_distinct() {
        let codes = find_skin_codes("CHAMPION_SKIN_RENTAL_3 x CHAMPION_SKIN_RENTAL_12 CHAMPION_SKIN_RENTAL_3");
        assert_eq!(codes.into_iter().collect::<Vec<_>>(), vec!["12".to_string(), "3".to_string()]);
    }
}
